//! Heterogeneous systems
//!
//! A serial core, a dim silicon array of throughput cores and a set of
//! accelerators, sharing the system's area and power budget.
//!
//! Kernels of an application run on their ASIC when one is allocated,
//! otherwise on the general-purpose accelerator (an FPGA) when enabled, and
//! otherwise on the throughput cores.

// Imports
use {
	super::{dim, perf_base, DimPerf, VMIN, VSF_MAX},
	crate::{
		app::App,
		budget::Budget,
		core::{Core, CoreUpdate, SerialCore},
		freq::DataSource,
		kernel::{AccKind, Kernel, KernelPool, UCoreParam},
		tech::{Mech, TechNode},
		ucore::UCore,
	},
	anyhow::Context,
	std::collections::BTreeMap,
};

/// Heterogeneous system performance
#[derive(PartialEq, Clone, Copy, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct HetPerf {
	/// Speedup, normalized to the base performance
	pub perf: f64,

	/// Active throughput cores
	pub cnum: usize,

	/// Supply voltage of the active throughput cores (V)
	pub vdd: f64,
}

/// ASIC dedicated to a kernel
#[derive(Clone, Debug)]
struct Asic {
	/// Kernel id
	kernel: String,

	/// Kernel parameters on this ASIC
	param: UCoreParam,

	/// Accelerator
	ucore: UCore,
}

/// Heterogeneous system
#[derive(Clone, Debug)]
pub struct HetSystem {
	/// Budget
	budget: Budget,

	/// Technology node
	tech: TechNode,

	/// Off-chip bandwidth at the current node (GB/s)
	bandwidth: f64,

	/// Serial core
	serial_core: SerialCore,

	/// Throughput core
	thru_core: Core,

	/// Area left for throughput cores (mm^2)
	thru_core_area: f64,

	/// ASICs, by id
	asics: BTreeMap<String, Asic>,

	/// ASIC ids, by kernel id
	kernel_asics: BTreeMap<String, Vec<String>>,

	/// General-purpose accelerator
	gpacc: UCore,

	/// Whether kernels without an ASIC run on the general-purpose accelerator
	use_gpacc: bool,

	/// Optimal dim silicon configuration, if computed since the last change
	dim_perf: Option<DimPerf>,
}

impl HetSystem {
	/// Creates a new system without accelerators.
	///
	/// The serial core's area is taken from the system, all remaining area
	/// goes to throughput cores.
	///
	/// # Errors
	/// Returns an error if the budget has no bandwidth for `tech`, the cores aren't
	/// at `tech` or the serial core doesn't fit.
	pub fn new(
		budget: Budget,
		tech: TechNode,
		serial_core: impl Into<SerialCore>,
		thru_core: Core,
	) -> Result<Self, anyhow::Error> {
		let serial_core = serial_core.into();
		anyhow::ensure!(
			serial_core.tech() == tech && thru_core.tech() == tech,
			"Cores must be at {tech}, found {} (serial) and {} (throughput)",
			serial_core.tech(),
			thru_core.tech()
		);
		let bandwidth = budget.bandwidth(tech)?;

		let thru_core_area = budget.area - serial_core.area();
		anyhow::ensure!(
			thru_core_area >= 0.0,
			"Serial core with area {} doesn't fit in {}mm^2",
			serial_core.area(),
			budget.area
		);

		let gpacc = UCore::new(AccKind::Fpga, self::ucore_mech(thru_core.mech()), tech, 0.0)
			.context("Unable to create general-purpose accelerator")?;

		tracing::debug!(
			serial_core = %serial_core,
			serial_area = serial_core.area(),
			thru_ctype = %thru_core.ctype(),
			thru_area = thru_core.area(),
			thru_cnum = dim::max_cnum(&thru_core, thru_core_area),
			"Created heterogeneous system"
		);

		Ok(Self {
			budget,
			tech,
			bandwidth,
			serial_core,
			thru_core,
			thru_core_area,
			asics: BTreeMap::new(),
			kernel_asics: BTreeMap::new(),
			gpacc,
			use_gpacc: false,
			dim_perf: None,
		})
	}

	/// Allocates `area_ratio` of the system area to ASIC `aid`, targeting `kernel`.
	///
	/// Creates the ASIC if it doesn't exist, otherwise resizes it. The area is
	/// taken from (or given back to) the throughput cores.
	///
	/// # Errors
	/// Returns an error if there isn't enough area, `kernel` has no ASIC parameters,
	/// or `aid` already targets another kernel. The system is unchanged on error.
	pub fn set_asic(&mut self, kernel: &Kernel, aid: &str, area_ratio: f64) -> Result<(), anyhow::Error> {
		anyhow::ensure!(
			(0.0..=1.0).contains(&area_ratio),
			"Area ratio must be within [0, 1], found {area_ratio}"
		);
		let area = self.budget.area * area_ratio;

		match self.asics.get_mut(aid) {
			Some(asic) => {
				anyhow::ensure!(
					asic.kernel == kernel.id,
					"ASIC {aid:?} targets kernel {:?}, not {:?}",
					asic.kernel,
					kernel.id
				);
				anyhow::ensure!(
					self.thru_core_area + asic.ucore.area() >= area,
					"Not enough area to resize ASIC {aid:?} to {area}mm^2"
				);

				self.thru_core_area += asic.ucore.area() - area;
				asic.ucore.set_area(area);
			},
			None => {
				anyhow::ensure!(
					self.thru_core_area >= area,
					"Not enough area for a new {area}mm^2 ASIC {aid:?}"
				);
				let param = *kernel.acc(AccKind::Asic)?;
				let ucore = UCore::new(AccKind::Asic, self::ucore_mech(self.thru_core.mech()), self.tech, area)
					.context("Unable to create ASIC")?;

				self.thru_core_area -= area;
				self.asics.insert(aid.to_owned(), Asic {
					kernel: kernel.id.clone(),
					param,
					ucore,
				});
				self.kernel_asics
					.entry(kernel.id.clone())
					.or_default()
					.push(aid.to_owned());
			},
		}
		tracing::trace!(aid, kernel = %kernel.id, area, thru_core_area = self.thru_core_area, "Set ASIC");

		self.dim_perf = None;
		Ok(())
	}

	/// Removes ASIC `aid`, giving its area back to the throughput cores.
	///
	/// # Errors
	/// Returns an error if `aid` doesn't exist.
	pub fn del_asic(&mut self, aid: &str) -> Result<(), anyhow::Error> {
		let asic = self.asics.remove(aid).with_context(|| format!("No ASIC {aid:?}"))?;
		self.thru_core_area += asic.ucore.area();

		if let Some(aids) = self.kernel_asics.get_mut(&asic.kernel) {
			aids.retain(|other| other != aid);
			if aids.is_empty() {
				self.kernel_asics.remove(&asic.kernel);
			}
		}

		self.dim_perf = None;
		Ok(())
	}

	/// Removes all ASICs targeting kernel `kid`, returning how many were removed
	pub fn del_target_asics(&mut self, kid: &str) -> usize {
		let aids = self.kernel_asics.remove(kid).unwrap_or_default();
		for aid in &aids {
			if let Some(asic) = self.asics.remove(aid) {
				self.thru_core_area += asic.ucore.area();
			}
		}

		if !aids.is_empty() {
			self.dim_perf = None;
		}
		aids.len()
	}

	/// Removes all ASICs
	pub fn del_all_asics(&mut self) {
		self.thru_core_area += self.asics.values().map(|asic| asic.ucore.area()).sum::<f64>();
		self.asics.clear();
		self.kernel_asics.clear();
		self.dim_perf = None;
	}

	/// Returns the ids of all ASICs targeting kernel `kid`
	pub fn target_asics(&self, kid: &str) -> &[String] {
		self.kernel_asics.get(kid).map(Vec::as_slice).unwrap_or_default()
	}

	/// Returns all kernels with at least one ASIC
	pub fn supported_kernels(&self) -> impl Iterator<Item = &str> + '_ {
		self.kernel_asics.keys().map(String::as_str)
	}

	/// Returns the area of each ASIC, by id
	pub fn asic_areas(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
		self.asics.iter().map(|(aid, asic)| (aid.as_str(), asic.ucore.area()))
	}

	/// Allocates `area_ratio` of the system area to the general-purpose accelerator.
	///
	/// # Errors
	/// Returns an error if there isn't enough area, in which case the system is unchanged.
	pub fn realloc_gpacc(&mut self, area_ratio: f64) -> Result<(), anyhow::Error> {
		anyhow::ensure!(
			(0.0..=1.0).contains(&area_ratio),
			"Area ratio must be within [0, 1], found {area_ratio}"
		);
		let area = self.budget.area * area_ratio;
		anyhow::ensure!(
			self.thru_core_area + self.gpacc.area() >= area,
			"Not enough area to resize general-purpose accelerator to {area}mm^2"
		);

		self.thru_core_area += self.gpacc.area() - area;
		self.gpacc.set_area(area);

		self.dim_perf = None;
		Ok(())
	}

	/// Sets whether kernels without an ASIC run on the general-purpose accelerator
	pub fn set_use_gpacc(&mut self, use_gpacc: bool) {
		self.use_gpacc = use_gpacc;
	}

	/// Moves all cores and accelerators to `tech`.
	///
	/// # Errors
	/// Returns an error if any component or the budget doesn't support `tech`, in
	/// which case the system is unchanged.
	pub fn set_tech(&mut self, source: &impl DataSource, tech: TechNode) -> Result<(), anyhow::Error> {
		let update = CoreUpdate {
			tech: Some(tech),
			..CoreUpdate::default()
		};
		let bandwidth = self.budget.bandwidth(tech)?;

		let mut serial_core = self.serial_core.clone();
		serial_core
			.config(source, update.clone())
			.context("Unable to move serial core")?;
		let mut thru_core = self.thru_core.clone();
		thru_core
			.config(source, update)
			.context("Unable to move throughput core")?;

		// Area allocations are kept, only the throughput core area follows the serial core
		let thru_core_area = self.thru_core_area + self.serial_core.area() - serial_core.area();
		anyhow::ensure!(
			thru_core_area >= 0.0,
			"Serial core with area {} doesn't fit at {tech}",
			serial_core.area()
		);

		let mut gpacc = self.gpacc.clone();
		gpacc
			.config(None, Some(tech), None)
			.context("Unable to move general-purpose accelerator")?;
		let mut asics = self.asics.clone();
		for (aid, asic) in &mut asics {
			asic.ucore
				.config(None, Some(tech), None)
				.with_context(|| format!("Unable to move ASIC {aid:?}"))?;
		}

		self.tech = tech;
		self.bandwidth = bandwidth;
		self.serial_core = serial_core;
		self.thru_core = thru_core;
		self.thru_core_area = thru_core_area;
		self.gpacc = gpacc;
		self.asics = asics;
		self.dim_perf = None;

		Ok(())
	}

	/// Returns the optimal dim silicon configuration of the throughput cores.
	///
	/// The result is cached until the area allocation or technology changes.
	///
	/// # Errors
	/// Returns an error if no throughput core configuration is feasible.
	pub fn dim_perf(&mut self) -> Result<DimPerf, anyhow::Error> {
		if let Some(dim_perf) = self.dim_perf {
			return Ok(dim_perf);
		}

		let dim_perf = dim::opt(&self.thru_core, self.thru_core_area, self.budget.power, VMIN)
			.context("Unable to find optimal throughput core configuration")?;
		self.dim_perf = Some(dim_perf);

		Ok(dim_perf)
	}

	/// Returns the serial performance, with the serial core at its highest voltage
	pub fn serial_perf(&self) -> f64 {
		self.serial_core.perf_at(self.serial_core.v0() * VSF_MAX) / perf_base()
	}

	/// Returns the performance running `app`, with kernel parameters from `pool`.
	///
	/// # Errors
	/// Returns an error if the throughput cores have no feasible configuration, or if
	/// a kernel running on the general-purpose accelerator isn't in `pool`.
	pub fn get_perf(&mut self, app: &App, pool: &KernelPool) -> Result<HetPerf, anyhow::Error> {
		let dim_perf = self.dim_perf()?;

		let mut perf_inv = (1.0 - app.f()) / self.serial_perf() + app.f_noacc() / dim_perf.perf;
		for (kid, cov) in app.kernels() {
			let asic = match self.target_asics(kid) {
				[] => None,
				[aid] => self.asics.get(aid),
				aids @ [aid, ..] => {
					tracing::warn!(kid, ?aids, "Several ASICs target kernel, using the first");
					self.asics.get(aid)
				},
			};

			let kernel_perf = match asic {
				Some(asic) if asic.ucore.area() > 0.0 =>
					asic.ucore
						.perf(&asic.param, Some(self.budget.power), Some(self.bandwidth)) /
						perf_base(),
				_ if self.use_gpacc => {
					let param = pool
						.get(kid)
						.and_then(|kernel| kernel.acc(AccKind::Fpga))
						.with_context(|| format!("Unable to get FPGA parameters of kernel {kid:?}"))?;
					self.gpacc.perf(param, Some(self.budget.power), Some(self.bandwidth)) / perf_base()
				},
				_ => dim_perf.perf,
			};
			perf_inv += cov / kernel_perf;
		}

		Ok(HetPerf {
			perf: 1.0 / perf_inv,
			cnum: dim_perf.cnum,
			vdd:  dim_perf.vdd,
		})
	}

	/// Returns the budget
	pub fn budget(&self) -> &Budget {
		&self.budget
	}

	/// Returns the technology node
	pub fn tech(&self) -> TechNode {
		self.tech
	}

	/// Returns the serial core
	pub fn serial_core(&self) -> &SerialCore {
		&self.serial_core
	}

	/// Returns the throughput core
	pub fn thru_core(&self) -> &Core {
		&self.thru_core
	}

	/// Returns the area left for throughput cores
	pub fn thru_core_area(&self) -> f64 {
		self.thru_core_area
	}

	/// Returns the general-purpose accelerator
	pub fn gpacc(&self) -> &UCore {
		&self.gpacc
	}

	/// Returns whether kernels without an ASIC run on the general-purpose accelerator
	pub fn use_gpacc(&self) -> bool {
		self.use_gpacc
	}
}

/// Returns the mechanism accelerators use alongside cores scaled with `mech`.
///
/// Accelerators have no `LP` model, so they use `HKMGS` at the same node.
fn ucore_mech(mech: Mech) -> Mech {
	match mech {
		Mech::Lp => Mech::Hkmgs,
		mech => mech,
	}
}

#[cfg(test)]
mod tests {
	use {
		super::*,
		crate::{
			core::{CoreSpec, FedCore},
			freq::MemSource,
			tech::CoreType,
		},
		hetsim_util::ApproxEq,
	};

	fn system(source: &MemSource) -> HetSystem {
		let serial_core = Core::new(source, CoreSpec::new(CoreType::O3, Mech::Hkmgs, TechNode::N22)).unwrap();
		let thru_core = Core::new(source, CoreSpec::new(CoreType::Io, Mech::Hkmgs, TechNode::N22)).unwrap();
		HetSystem::new(Budget::large(), TechNode::N22, serial_core, thru_core).unwrap()
	}

	/// Returns the area of all components, which must add up to the system area
	fn total_area(system: &HetSystem) -> f64 {
		system.serial_core().area() +
			system.thru_core_area() +
			system.gpacc().area() +
			system.asic_areas().map(|(_, area)| area).sum::<f64>()
	}

	#[test]
	fn serial_core_takes_area() {
		let source = MemSource::synthetic().unwrap();
		let system = system(&source);
		assert!(system.thru_core_area().approx_eq(200.0 - 26.48 * 0.25));
		assert!(total_area(&system).approx_eq(200.0));
	}

	#[test]
	fn asic_allocation() {
		let source = MemSource::synthetic().unwrap();
		let pool = KernelPool::builtin();
		let mut system = system(&source);
		let before = system.thru_core_area();

		system.set_asic(pool.get("MMM").unwrap(), "mmm0", 0.1).unwrap();
		assert!(system.thru_core_area().approx_eq(before - 20.0));
		assert_eq!(system.target_asics("MMM"), ["mmm0"]);

		// Resizing gives back the old area first
		system.set_asic(pool.get("MMM").unwrap(), "mmm0", 0.2).unwrap();
		assert!(system.thru_core_area().approx_eq(before - 40.0));
		assert!(total_area(&system).approx_eq(200.0));

		system.set_asic(pool.get("FFT").unwrap(), "fft0", 0.05).unwrap();
		assert_eq!(system.supported_kernels().collect::<Vec<_>>(), ["FFT", "MMM"]);

		system.del_asic("mmm0").unwrap();
		assert!(system.del_asic("mmm0").is_err());
		assert!(system.target_asics("MMM").is_empty());
		assert!(system.thru_core_area().approx_eq(before - 10.0));

		system.del_all_asics();
		assert!(system.thru_core_area().approx_eq(before));
		assert_eq!(system.supported_kernels().count(), 0);
	}

	#[test]
	fn del_target_asics() {
		let source = MemSource::synthetic().unwrap();
		let pool = KernelPool::builtin();
		let mut system = system(&source);
		let before = system.thru_core_area();

		system.set_asic(pool.get("BS").unwrap(), "bs0", 0.1).unwrap();
		system.set_asic(pool.get("BS").unwrap(), "bs1", 0.1).unwrap();
		system.set_asic(pool.get("FFT").unwrap(), "fft0", 0.1).unwrap();

		assert_eq!(system.del_target_asics("BS"), 2);
		assert_eq!(system.del_target_asics("BS"), 0);
		assert_eq!(system.supported_kernels().collect::<Vec<_>>(), ["FFT"]);
		assert!(system.thru_core_area().approx_eq(before - 20.0));
	}

	#[test]
	fn over_allocation_keeps_state() {
		let source = MemSource::synthetic().unwrap();
		let pool = KernelPool::builtin();
		let mut system = system(&source);

		system.set_asic(pool.get("MMM").unwrap(), "mmm0", 0.5).unwrap();
		let before = system.thru_core_area();

		assert!(system.set_asic(pool.get("FFT").unwrap(), "fft0", 0.6).is_err());
		assert!(system.set_asic(pool.get("MMM").unwrap(), "mmm0", 1.0).is_err());
		assert!(system.set_asic(pool.get("FFT").unwrap(), "mmm0", 0.1).is_err());
		assert!(system.realloc_gpacc(0.6).is_err());

		assert_eq!(system.thru_core_area(), before);
		assert!(system.target_asics("FFT").is_empty());
		assert_eq!(system.asic_areas().collect::<Vec<_>>(), [("mmm0", 100.0)]);
		assert_eq!(system.gpacc().area(), 0.0);
	}

	#[test]
	fn amdahl_limits() {
		let source = MemSource::synthetic().unwrap();
		let pool = KernelPool::builtin();
		let mut system = system(&source);

		let dim_perf = system.dim_perf().unwrap();
		let parallel = system.get_perf(&App::new("par", 1.0).unwrap(), &pool).unwrap();
		assert!(parallel.perf.approx_eq(dim_perf.perf));
		assert_eq!((parallel.cnum, parallel.vdd), (dim_perf.cnum, dim_perf.vdd));

		let serial = system.get_perf(&App::new("ser", 0.0).unwrap(), &pool).unwrap();
		assert!(serial.perf.approx_eq(system.serial_perf()));
	}

	#[test]
	fn accelerators_speed_up_kernels() {
		let source = MemSource::synthetic().unwrap();
		let pool = KernelPool::builtin();
		let mut system = system(&source);

		let mut app = App::new("app", 0.99).unwrap();
		app.add_kernel("BS", 0.5).unwrap();
		let cores_only = system.get_perf(&app, &pool).unwrap();

		system.set_asic(pool.get("BS").unwrap(), "bs0", 0.05).unwrap();
		let with_asic = system.get_perf(&app, &pool).unwrap();
		assert!(with_asic.perf > cores_only.perf);

		// The FPGA is only used for kernels without an ASIC
		system.realloc_gpacc(0.05).unwrap();
		system.set_use_gpacc(true);
		assert!(system.get_perf(&app, &pool).unwrap().perf.approx_eq(with_asic.perf));

		system.del_asic("bs0").unwrap();
		let with_fpga = system.get_perf(&app, &pool).unwrap();
		assert!(with_fpga.perf < with_asic.perf);

		// An empty FPGA is useless
		system.realloc_gpacc(0.0).unwrap();
		assert_eq!(system.get_perf(&app, &pool).unwrap().perf, 0.0);
	}

	#[test]
	fn dim_perf_cache_invalidation() {
		let source = MemSource::synthetic().unwrap();
		let pool = KernelPool::builtin();
		let mut system = system(&source);

		let full = system.dim_perf().unwrap();
		system.set_asic(pool.get("FFT").unwrap(), "fft0", 0.9).unwrap();
		let reduced = system.dim_perf().unwrap();
		assert!(reduced.cnum as f64 * system.thru_core().area() <= system.thru_core_area());
		assert!(reduced.perf <= full.perf);
	}

	#[test]
	fn tech_change() {
		let source = MemSource::synthetic().unwrap();
		let pool = KernelPool::builtin();
		let mut system = system(&source);
		system.set_asic(pool.get("MMM").unwrap(), "mmm0", 0.1).unwrap();

		assert!(system.set_tech(&source, TechNode::N11).is_err());
		assert_eq!(system.tech(), TechNode::N22);

		system.set_tech(&source, TechNode::N16).unwrap();
		assert_eq!(system.tech(), TechNode::N16);
		assert_eq!(system.serial_core().tech(), TechNode::N16);
		assert!(system.asic_areas().all(|(aid, area)| aid == "mmm0" && area.approx_eq(20.0)));
		assert!(total_area(&system).approx_eq(200.0));
	}

	#[test]
	fn fed_serial_core() {
		let source = MemSource::synthetic().unwrap();
		let io_core = Core::new(&source, CoreSpec::new(CoreType::Io, Mech::Hkmgs, TechNode::N22)).unwrap();
		let fed_core = FedCore::new(&source, Mech::Hkmgs, TechNode::N22).unwrap();
		let mut system = HetSystem::new(Budget::large(), TechNode::N22, fed_core, io_core.clone()).unwrap();

		assert!(system
			.thru_core_area()
			.approx_eq(200.0 - 2.0 * 1.037 * io_core.area()));
		assert!(total_area(&system).approx_eq(200.0));
		assert!(system
			.serial_perf()
			.approx_eq(2.0 * io_core.perf_at(io_core.v0() * VSF_MAX) / perf_base()));

		system.set_tech(&source, TechNode::N16).unwrap();
		assert!(matches!(system.serial_core(), SerialCore::Fed(fed_core) if fed_core.tech() == TechNode::N16));
		assert!(total_area(&system).approx_eq(200.0));
	}

	#[test]
	fn cores_at_other_node_fail() {
		let source = MemSource::synthetic().unwrap();
		let serial_core = Core::new(&source, CoreSpec::new(CoreType::O3, Mech::Hkmgs, TechNode::N32)).unwrap();
		let thru_core = Core::new(&source, CoreSpec::new(CoreType::Io, Mech::Hkmgs, TechNode::N22)).unwrap();
		assert!(HetSystem::new(Budget::large(), TechNode::N22, serial_core, thru_core).is_err());
	}
}
