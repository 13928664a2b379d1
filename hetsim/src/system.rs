//! Systems
//!
//! Composes cores and accelerators under an area and power budget, using
//! Amdahl's law to combine the serial, parallel and offloaded parts of an
//! application.

// Modules
pub mod dim;
pub mod het;
pub mod sym;

// Exports
pub use self::{
	dim::DimPerf,
	het::{HetPerf, HetSystem},
	sym::{SymPerf, SymSystem},
};

// Imports
use crate::tech::{base, CoreType};

/// Lowest supply voltage considered (V)
pub const VMIN: f64 = 0.3;

/// Highest supply voltage, relative to the nominal voltage
pub const VSF_MAX: f64 = 1.3;

/// Precision of voltage searches (V)
pub const V_PRECISION: f64 = 0.001;

/// Returns the performance all results are normalized to.
///
/// This is the performance of a 45nm in-order core at its nominal frequency.
pub fn perf_base() -> f64 {
	base::area(CoreType::Io).sqrt() * base::freq(CoreType::Io)
}

#[cfg(test)]
mod tests {
	use {super::*, hetsim_util::ApproxEq};

	#[test]
	fn perf_base_matches_45nm_io() {
		assert!(perf_base().approx_eq(7.65_f64.sqrt() * 4.2));
	}
}
