//! Symmetric systems
//!
//! A system made up of a single type of core, which runs both the serial and
//! the parallel part of an application.

// Imports
use {
	super::{dim, perf_base, VSF_MAX},
	crate::{
		app::App,
		core::{Core, CoreUpdate},
		freq::DataSource,
	},
	anyhow::Context,
};

/// Symmetric system performance
#[derive(PartialEq, Clone, Copy, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct SymPerf {
	/// Speedup, normalized to the base performance
	pub perf: f64,

	/// Active cores
	pub cnum: usize,

	/// Cores that fit in the system
	pub core_num: usize,

	/// Supply voltage of the active cores (V)
	pub vdd: f64,

	/// Percentage of cores active
	pub util: f64,
}

/// Speedup at a single point of a voltage sweep
#[derive(PartialEq, Clone, Copy, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Speedup {
	/// Supply voltage (V)
	pub vdd: f64,

	/// Speedup, normalized to the base performance
	pub speedup: f64,

	/// Percentage of the area in use
	pub util: f64,
}

/// Symmetric system
#[derive(Clone, Debug)]
pub struct SymSystem {
	/// Area budget (mm^2)
	area: f64,

	/// Power budget (W)
	power: f64,

	/// Core
	core: Core,
}

impl SymSystem {
	/// Creates a new system of `core`s within `area` and `power`.
	///
	/// # Errors
	/// Returns an error if not even a single core fits in `area`.
	pub fn new(area: f64, power: f64, core: Core) -> Result<Self, anyhow::Error> {
		anyhow::ensure!(power > 0.0, "Power budget must be positive, found {power}");
		let system = Self { area, power, core };
		anyhow::ensure!(
			system.core_num() > 0,
			"Core with area {} doesn't fit in {area}mm^2",
			system.core.area()
		);

		Ok(system)
	}

	/// Re-configures the core.
	///
	/// # Errors
	/// Returns an error if the core can't be re-configured, or no longer fits, in
	/// which case the system is left unchanged.
	pub fn config_core(&mut self, source: &impl DataSource, update: CoreUpdate) -> Result<(), anyhow::Error> {
		let mut core = self.core.clone();
		core.config(source, update)?;
		*self = Self::new(self.area, self.power, core).context("Re-configured core no longer fits")?;

		Ok(())
	}

	/// Returns the number of cores that fit in the system
	pub fn core_num(&self) -> usize {
		dim::max_cnum(&self.core, self.area)
	}

	/// Returns the performance with `cnum` active cores, at the highest voltage the power budget allows.
	///
	/// Returns `None` if `cnum` is zero or more cores than fit. If the budget isn't
	/// met even at `vmin`, the returned point has fewer active cores than requested.
	pub fn perf_by_cnum(&self, cnum: usize, app: &App, vmin: f64) -> Option<SymPerf> {
		let dim = dim::perf_by_cnum(&self.core, self.area, self.power, cnum, vmin)?;
		let perf = self.amdahl(app, dim.cnum as f64 * self.core.perf_at(dim.vdd));

		Some(SymPerf {
			perf,
			cnum: dim.cnum,
			core_num: self.core_num(),
			vdd: dim.vdd,
			util: dim.util,
		})
	}

	/// Finds the number of active cores with the highest performance.
	///
	/// # Errors
	/// Returns an error if no core count can meet the power budget.
	pub fn opt_core_num(&self, app: &App, vmin: f64) -> Result<SymPerf, anyhow::Error> {
		let mut best = None::<SymPerf>;
		for cnum in 1..=self.core_num() {
			let Some(point) = self.perf_by_cnum(cnum, app, vmin) else {
				break;
			};
			if point.cnum < cnum {
				break;
			}

			if best.map_or(true, |best| point.perf > best.perf) {
				best = Some(point);
			}
		}

		best.ok_or_else(|| anyhow::anyhow!("No core count meets the {}W power budget", self.power))
	}

	/// Returns the performance with all cores at `vdd`, activating as many as the power budget allows
	pub fn perf_by_vdd(&self, vdd: f64, app: &App) -> SymPerf {
		let core_num = self.core_num();
		let active = core_num.min((self.power / self.core.power_at(vdd)).floor() as usize);
		let perf = self.amdahl(app, active as f64 * self.core.perf_at(vdd));

		SymPerf {
			perf,
			cnum: active,
			core_num,
			vdd,
			util: 100.0 * active as f64 / core_num as f64,
		}
	}

	/// Returns the performance with all cores at `vsf` times their nominal voltage.
	///
	/// See [`SymSystem::perf_by_vdd`].
	pub fn perf_by_vfs(&self, vsf: f64, app: &App) -> SymPerf {
		self.perf_by_vdd(self.core.v0() * vsf, app)
	}

	/// Returns the performance of a dark silicon system, where active cores run at their highest voltage
	pub fn perf_by_dark(&self, app: &App) -> SymPerf {
		self.perf_by_vdd(self.core.v0() * VSF_MAX, app)
	}

	/// Returns the speedup at each of `volts`.
	///
	/// Unlike [`SymSystem::perf_by_vdd`], fractional active core counts are allowed.
	pub fn speedup_by_vlist(&self, volts: &[f64], app: &App) -> Vec<Speedup> {
		volts
			.iter()
			.map(|&vdd| {
				let active = (self.area / self.core.area()).min(self.power / self.core.power_at(vdd));
				Speedup {
					vdd,
					speedup: self.amdahl(app, active * self.core.perf_at(vdd)),
					util: 100.0 * active * self.core.area() / self.area,
				}
			})
			.collect()
	}

	/// Returns the speedup at each of `vsfs`, relative to the nominal voltage.
	///
	/// See [`SymSystem::speedup_by_vlist`].
	pub fn speedup_by_vfslist(&self, vsfs: &[f64], app: &App) -> Vec<Speedup> {
		let volts = vsfs.iter().map(|vsf| self.core.v0() * vsf).collect::<Vec<_>>();
		self.speedup_by_vlist(&volts, app)
	}

	/// Returns the core
	pub fn core(&self) -> &Core {
		&self.core
	}

	/// Applies Amdahl's law, with the serial part running on a single core at its highest voltage
	fn amdahl(&self, app: &App, parallel_perf: f64) -> f64 {
		let serial_perf = self.core.perf_at(self.core.v0() * VSF_MAX);
		let serial = (1.0 - app.f()) / serial_perf;
		let parallel = match app.f() > 0.0 {
			true => app.f() / parallel_perf,
			false => 0.0,
		};

		1.0 / (serial + parallel) / perf_base()
	}
}
