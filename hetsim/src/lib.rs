//! Heterogeneous multicore design space model (`hetsim`)
//!
//! Analytical model of multicore processors mixing conventional cores with
//! accelerators, scaled across technology nodes under an area and power budget.

// Modules
pub mod app;
pub mod budget;
pub mod core;
pub mod device;
pub mod freq;
pub mod kernel;
pub mod sweep;
pub mod system;
pub mod tech;
pub mod ucore;

// Exports
pub use self::{
	app::{App, Workload},
	budget::Budget,
	core::{Core, CoreSpec, CoreUpdate, FedCore, SerialCore},
	device::{DeviceCore, DeviceCoreType, DevicePerf},
	freq::{DataSource, DirSource, MemSource},
	kernel::{AccKind, Kernel, KernelPool, UCoreParam},
	sweep::{SweepPoint, SweepSpec},
	system::{DimPerf, HetPerf, HetSystem, SymPerf, SymSystem},
	tech::{CoreType, Device, DeviceScale, Mech, TechNode, TechPoint},
	ucore::UCore,
};
