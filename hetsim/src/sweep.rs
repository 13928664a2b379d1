//! Design space sweeps
//!
//! Evaluates a workload on heterogeneous systems across technology nodes and
//! ASIC area allocations.

// Imports
use {
	crate::{
		app::Workload,
		budget::Budget,
		core::{Core, CoreSpec, SerialCore},
		freq::DataSource,
		kernel::{AccKind, Kernel, KernelPool},
		system::HetSystem,
		tech::TechNode,
	},
	anyhow::Context,
	itertools::Itertools,
	std::fmt,
};

/// Sweep specification
#[derive(PartialEq, Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct SweepSpec {
	/// System budget
	pub budget: Budget,

	/// Serial core, its node is replaced by each of `techs`
	pub serial_core: CoreSpec,

	/// Whether the serial core is a federated core
	#[serde(default)]
	pub fed_serial: bool,

	/// Throughput core, its node is replaced by each of `techs`
	pub thru_core: CoreSpec,

	/// Technology nodes
	pub techs: Vec<TechNode>,

	/// Fractions of the system area given to ASICs, split evenly among the workload's kernels
	pub asic_ratios: Vec<f64>,

	/// Fraction of the system area given to the general-purpose accelerator
	#[serde(default)]
	pub gpacc_ratio: f64,

	/// Whether kernels without an ASIC run on the general-purpose accelerator
	#[serde(default)]
	pub use_gpacc: bool,
}

/// Sweep point
#[derive(PartialEq, Clone, Copy, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct SweepPoint {
	/// Technology node
	pub tech: TechNode,

	/// Fraction of the system area given to ASICs
	pub asic_ratio: f64,

	/// Mean performance over all applications
	pub perf_mean: f64,

	/// Standard error of the mean performance
	pub perf_err: f64,

	/// Minimum performance
	pub perf_min: f64,

	/// Maximum performance
	pub perf_max: f64,

	/// Active throughput cores
	pub cnum: usize,

	/// Supply voltage of the active throughput cores (V)
	pub vdd: f64,
}

impl fmt::Display for SweepPoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} @ {:.1}% ASIC: {:.4} ± {:.4} ({:.4}..{:.4}), {} cores @ {:.3}V",
			self.tech,
			100.0 * self.asic_ratio,
			self.perf_mean,
			self.perf_err,
			self.perf_min,
			self.perf_max,
			self.cnum,
			self.vdd
		)
	}
}

/// Runs a sweep of `workload` over `spec`.
///
/// Points that can't be built or evaluated are logged and skipped.
///
/// # Errors
/// Returns an error if the workload is empty or uses kernels not in `pool`.
pub fn sweep(
	spec: &SweepSpec,
	source: &impl DataSource,
	pool: &KernelPool,
	workload: &Workload,
) -> Result<Vec<SweepPoint>, anyhow::Error> {
	anyhow::ensure!(!workload.apps.is_empty(), "Workload has no applications");

	// Only kernels with ASIC parameters get an ASIC
	let kernels = workload
		.kernel_ids()
		.into_iter()
		.map(|kid| pool.get(kid))
		.collect::<Result<Vec<_>, _>>()
		.context("Workload uses unknown kernels")?
		.into_iter()
		.filter(|kernel| kernel.acc(AccKind::Asic).is_ok())
		.collect::<Vec<_>>();

	let mut points = vec![];
	for &tech in &spec.techs {
		let system = match self::build_system(spec, source, tech) {
			Ok(system) => system,
			Err(err) => {
				tracing::warn!(%tech, ?err, "Unable to build system, skipping node");
				continue;
			},
		};

		for &asic_ratio in &spec.asic_ratios {
			let mut system = system.clone();
			match self::alloc_asics(&mut system, &kernels, asic_ratio)
				.and_then(|()| self::eval_point(&mut system, pool, workload, asic_ratio))
			{
				Ok(point) => {
					tracing::debug!(%point, "Evaluated sweep point");
					points.push(point);
				},
				Err(err) => tracing::warn!(%tech, asic_ratio, ?err, "Unable to evaluate sweep point, skipping"),
			}
		}
	}

	Ok(points)
}

/// Builds the system of `spec` at `tech`
fn build_system(spec: &SweepSpec, source: &impl DataSource, tech: TechNode) -> Result<HetSystem, anyhow::Error> {
	let serial_core = SerialCore::new(
		source,
		CoreSpec {
			tech,
			..spec.serial_core.clone()
		},
		spec.fed_serial,
	)
	.context("Unable to build serial core")?;
	let thru_core = Core::new(source, CoreSpec {
		tech,
		..spec.thru_core.clone()
	})
	.context("Unable to build throughput core")?;

	let mut system = HetSystem::new(spec.budget.clone(), tech, serial_core, thru_core)?;
	system
		.realloc_gpacc(spec.gpacc_ratio)
		.context("Unable to allocate general-purpose accelerator")?;
	system.set_use_gpacc(spec.use_gpacc);

	Ok(system)
}

/// Splits `asic_ratio` of the system area evenly among ASICs for each of `kernels`
fn alloc_asics(system: &mut HetSystem, kernels: &[&Kernel], asic_ratio: f64) -> Result<(), anyhow::Error> {
	if kernels.is_empty() {
		return Ok(());
	}

	let kernel_ratio = asic_ratio / kernels.len() as f64;
	for kernel in kernels {
		system
			.set_asic(kernel, &format!("asic_{}", kernel.id), kernel_ratio)
			.with_context(|| format!("Unable to allocate ASIC for {:?}", kernel.id))?;
	}

	Ok(())
}

/// Evaluates all applications of `workload` on `system`
fn eval_point(
	system: &mut HetSystem,
	pool: &KernelPool,
	workload: &Workload,
	asic_ratio: f64,
) -> Result<SweepPoint, anyhow::Error> {
	let perfs = workload
		.apps
		.iter()
		.map(|app| {
			system
				.get_perf(app, pool)
				.with_context(|| format!("Unable to evaluate application {:?}", app.name()))
		})
		.collect::<Result<Vec<_>, _>>()?;

	let perf = perfs.iter().map(|perf| perf.perf).collect::<average::Variance>();
	let (perf_min, perf_max) = perfs
		.iter()
		.map(|perf| perf.perf)
		.minmax()
		.into_option()
		.context("Workload has no applications")?;
	let dim_perf = system.dim_perf()?;

	Ok(SweepPoint {
		tech: system.tech(),
		asic_ratio,
		perf_mean: perf.mean(),
		perf_err: perf.error(),
		perf_min,
		perf_max,
		cnum: dim_perf.cnum,
		vdd: dim_perf.vdd,
	})
}

#[cfg(test)]
mod tests {
	use {
		super::*,
		crate::{
			app::App,
			freq::MemSource,
			tech::{CoreType, Mech},
		},
	};

	fn spec() -> SweepSpec {
		SweepSpec {
			budget:      Budget::large(),
			serial_core: CoreSpec::new(CoreType::O3, Mech::Hkmgs, TechNode::N45),
			fed_serial:  false,
			thru_core:   CoreSpec::new(CoreType::Io, Mech::Hkmgs, TechNode::N45),
			techs:       vec![TechNode::N32, TechNode::N11, TechNode::N16],
			asic_ratios: vec![0.0, 0.1, 0.3, 1.0],
			gpacc_ratio: 0.0,
			use_gpacc:   false,
		}
	}

	fn workload() -> Workload {
		let mut mmm = App::new("mmm", 0.99).unwrap();
		mmm.add_kernel("MMM", 0.4).unwrap();
		let mut fft = App::new("fft", 0.99).unwrap();
		fft.add_kernel("FFT", 0.2).unwrap();
		Workload::new(vec![mmm, fft])
	}

	#[test]
	fn skips_infeasible_points() {
		let source = MemSource::synthetic().unwrap();
		let points = sweep(&spec(), &source, &KernelPool::builtin(), &workload()).unwrap();

		// 11nm has no bandwidth budget, and giving all the area to ASICs leaves no throughput cores
		let evaluated = points.iter().map(|point| (point.tech, point.asic_ratio)).collect::<Vec<_>>();
		assert_eq!(evaluated, [
			(TechNode::N32, 0.0),
			(TechNode::N32, 0.1),
			(TechNode::N32, 0.3),
			(TechNode::N16, 0.0),
			(TechNode::N16, 0.1),
			(TechNode::N16, 0.3),
		]);

		for point in &points {
			assert!(point.perf_min <= point.perf_mean && point.perf_mean <= point.perf_max, "{point}");
		}
	}

	#[test]
	fn asics_help_covered_workloads() {
		let source = MemSource::synthetic().unwrap();
		let points = sweep(&spec(), &source, &KernelPool::builtin(), &workload()).unwrap();

		let at = |tech, ratio| {
			points
				.iter()
				.find(|point| point.tech == tech && point.asic_ratio == ratio)
				.unwrap()
		};
		assert!(at(TechNode::N16, 0.1).perf_mean > at(TechNode::N16, 0.0).perf_mean);
	}

	#[test]
	fn fed_serial_core() {
		let source = MemSource::synthetic().unwrap();
		let single = sweep(&spec(), &source, &KernelPool::builtin(), &workload()).unwrap();
		let spec = SweepSpec {
			fed_serial: true,
			..spec()
		};
		let fed = sweep(&spec, &source, &KernelPool::builtin(), &workload()).unwrap();

		assert_eq!(fed.len(), single.len());
		assert!(fed.iter().zip(&single).all(|(fed, single)| fed.tech == single.tech));

		let spec = serde_json::from_str::<SweepSpec>(&serde_json::to_string(&spec).unwrap()).unwrap();
		assert!(spec.fed_serial);
	}

	#[test]
	fn unknown_kernels_fail() {
		let source = MemSource::synthetic().unwrap();
		assert!(sweep(&spec(), &source, &KernelPool::new(), &workload()).is_err());
		assert!(sweep(&spec(), &source, &KernelPool::builtin(), &Workload::default()).is_err());
	}
}
