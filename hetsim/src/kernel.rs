//! Kernels
//!
//! A kernel is a piece of an application that may be offloaded to an
//! accelerator. Each kernel describes how well every kind of accelerator
//! runs it, relative to a baseline core.

// Imports
use {
	anyhow::Context,
	rand::Rng,
	rand_distr::{Distribution, Normal},
	std::{collections::BTreeMap, fmt, fs, path::Path, str::FromStr},
};

/// Ratio of ASIC to FPGA throughput for generated kernels
pub const ASIC_PERF_RATIO: f64 = 5.0;

/// Average number of kernels per application, used to scale generated occurrences
pub const KERNELS_PER_APP: f64 = 1.5;

/// Accelerator kind
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum AccKind {
	#[serde(rename = "ASIC")]
	Asic,

	#[serde(rename = "FPGA")]
	Fpga,

	#[serde(rename = "GPU")]
	Gpu,

	/// Out-of-order core, as a baseline
	#[serde(rename = "O3CPU")]
	O3Cpu,

	/// In-order core, as a baseline
	#[serde(rename = "IO")]
	Io,
}

impl AccKind {
	/// Returns the name of this kind
	pub const fn name(self) -> &'static str {
		match self {
			Self::Asic => "ASIC",
			Self::Fpga => "FPGA",
			Self::Gpu => "GPU",
			Self::O3Cpu => "O3CPU",
			Self::Io => "IO",
		}
	}
}

impl FromStr for AccKind {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_uppercase().as_str() {
			"ASIC" => Ok(Self::Asic),
			"FPGA" => Ok(Self::Fpga),
			"GPU" => Ok(Self::Gpu),
			"O3CPU" => Ok(Self::O3Cpu),
			"IO" => Ok(Self::Io),
			_ => anyhow::bail!("Unknown accelerator kind: {s:?}"),
		}
	}
}

impl fmt::Display for AccKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.pad(self.name())
	}
}

/// Accelerator parameters for a kernel
#[derive(PartialEq, Clone, Copy, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct UCoreParam {
	/// Throughput, relative to the baseline core
	pub miu: f64,

	/// Power, relative to the baseline core
	#[serde(default = "UCoreParam::default_factor")]
	pub phi: f64,

	/// Bandwidth, relative to the baseline core
	#[serde(default = "UCoreParam::default_factor")]
	pub bw: f64,
}

impl UCoreParam {
	/// Creates new parameters
	pub const fn new(miu: f64, phi: f64, bw: f64) -> Self {
		Self { miu, phi, bw }
	}

	/// Creates parameters with only a throughput, with negligible power and bandwidth
	pub fn with_miu(miu: f64) -> Self {
		Self::new(miu, Self::default_factor(), Self::default_factor())
	}

	fn default_factor() -> f64 {
		0.001
	}
}

/// Kernel
#[derive(PartialEq, Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Kernel {
	/// Id
	pub id: String,

	/// Probability of occurring in an application
	#[serde(default = "Kernel::default_occur")]
	pub occur: f64,

	/// Accelerator parameters
	pub accs: BTreeMap<AccKind, UCoreParam>,
}

impl Kernel {
	/// Creates a new kernel
	pub fn new(id: impl Into<String>, occur: f64, accs: impl IntoIterator<Item = (AccKind, UCoreParam)>) -> Self {
		Self {
			id: id.into(),
			occur,
			accs: accs.into_iter().collect(),
		}
	}

	/// Returns the parameters of accelerator `kind`
	pub fn acc(&self, kind: AccKind) -> Result<&UCoreParam, anyhow::Error> {
		self.accs
			.get(&kind)
			.with_context(|| format!("Kernel {:?} has no {kind} parameters", self.id))
	}

	fn default_occur() -> f64 {
		1.0
	}
}

/// Kernel pool
#[derive(PartialEq, Clone, Default, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(from = "Vec<Kernel>", into = "Vec<Kernel>")]
pub struct KernelPool {
	/// All kernels, by id
	kernels: BTreeMap<String, Kernel>,
}

impl KernelPool {
	/// Creates an empty pool
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates the built-in pool, with parameters measured on real accelerators
	pub fn builtin() -> Self {
		use AccKind::*;
		#[rustfmt::skip]
		let kernels = [
			("MMM", [(Gpu, 3.41, 0.74, 0.725), (Fpga, 0.75, 0.31, 0.325), (Asic, 27.4, 0.79, 3.62),    (O3Cpu, 1.0, 1.0, 0.216), (Io, 1.0, 1.0, 0.16)]),
			("BS",  [(Gpu, 17.0, 0.57, 5.85),  (Fpga, 5.68, 0.26, 3.975), (Asic, 482.0, 4.75, 66.249), (O3Cpu, 1.0, 1.0, 0.35),  (Io, 1.0, 1.0, 0.26)]),
			("FFT", [(Gpu, 2.42, 0.59, 1.0),   (Fpga, 2.81, 0.29, 1.0),   (Asic, 733.0, 5.34, 1.0),    (O3Cpu, 1.0, 1.0, 1.0),   (Io, 1.0, 1.0, 1.0)]),
			("fpgaeff1", [(Gpu, 3.41, 0.74, 0.725), (Fpga, 20.0, 0.5, 2.0),  (Asic, 27.4, 0.79, 3.62),    (O3Cpu, 1.0, 1.0, 0.216), (Io, 1.0, 1.0, 0.16)]),
			("fpgaeff2", [(Gpu, 3.41, 0.74, 0.725), (Fpga, 40.0, 2.5, 20.0), (Asic, 87.4, 2.79, 30.62),   (O3Cpu, 1.0, 1.0, 0.216), (Io, 1.0, 1.0, 0.16)]),
			("asiceff1", [(Gpu, 17.0, 0.57, 5.85),  (Fpga, 20.0, 2.0, 8.0),  (Asic, 482.0, 4.75, 66.249), (O3Cpu, 1.0, 1.0, 0.35),  (Io, 1.0, 1.0, 0.26)]),
		];

		kernels
			.into_iter()
			.map(|(id, accs)| {
				let accs = accs
					.into_iter()
					.map(|(kind, miu, phi, bw)| (kind, UCoreParam::new(miu, phi, bw)));
				Kernel::new(id, 1.0, accs)
			})
			.collect()
	}

	/// Generates kernels with ASIC throughput evenly spaced over `[0.5 * mean, 1.5 * mean]`.
	///
	/// Each kernel occurs with the probability of its bin under a normal distribution
	/// with `mean` and `std`, scaled by [`KERNELS_PER_APP`].
	pub fn fixed_norm(mean: f64, std: f64, size: usize, prefix: &str) -> Result<Self, anyhow::Error> {
		anyhow::ensure!(size >= 2, "Need at least 2 kernels, found {size}");
		anyhow::ensure!(std > 0.0, "Standard deviation must be positive, found {std}");

		let mius = self::linspace(0.5 * mean, 1.5 * mean, size);
		let cdfs = self::linspace(0.5 * mean, 1.5 * mean, size - 1)
			.into_iter()
			.map(|x| self::normal_cdf(x, mean, std));
		let bounds = std::iter::once(0.0).chain(cdfs).chain(std::iter::once(1.0)).collect::<Vec<_>>();

		let pool = mius
			.into_iter()
			.zip(bounds.windows(2))
			.enumerate()
			.map(|(idx, (miu, bounds))| {
				let occur = (bounds[1] - bounds[0]) * KERNELS_PER_APP;
				self::gen_kernel(format!("_gen_{prefix}_{idx:03}"), miu, occur)
			})
			.collect();

		Ok(pool)
	}

	/// Generates kernels with ASIC throughput drawn from a normal distribution.
	///
	/// Each kernel occurs with the density of its throughput.
	pub fn rand_norm(mean: f64, std: f64, size: usize, prefix: &str, rng: &mut impl Rng) -> Result<Self, anyhow::Error> {
		anyhow::ensure!(std > 0.0, "Standard deviation must be positive, found {std}");
		let dist = Normal::new(mean, std).context("Unable to create normal distribution")?;

		let pool = (0..size)
			.map(|idx| {
				let miu = dist.sample(rng);
				let occur = self::normal_pdf(miu, mean, std).min(1.0);
				self::gen_kernel(format!("{prefix}{idx:03}"), miu, occur)
			})
			.collect();

		Ok(pool)
	}

	/// Loads a pool from a json file
	pub fn load(path: &Path) -> Result<Self, anyhow::Error> {
		let file = fs::File::open(path).with_context(|| format!("Unable to open kernel pool {path:?}"))?;
		serde_json::from_reader(file).with_context(|| format!("Unable to parse kernel pool {path:?}"))
	}

	/// Saves this pool to a json file
	pub fn save(&self, path: &Path) -> Result<(), anyhow::Error> {
		let file = fs::File::create(path).with_context(|| format!("Unable to create kernel pool {path:?}"))?;
		serde_json::to_writer_pretty(file, self).context("Unable to write kernel pool")
	}

	/// Adds a kernel, replacing any existing kernel with the same id
	pub fn insert(&mut self, kernel: Kernel) -> Option<Kernel> {
		self.kernels.insert(kernel.id.clone(), kernel)
	}

	/// Adds all kernels of `other`
	pub fn merge(&mut self, other: Self) {
		self.kernels.extend(other.kernels);
	}

	/// Returns a kernel by id
	pub fn get(&self, id: &str) -> Result<&Kernel, anyhow::Error> {
		self.kernels
			.get(id)
			.with_context(|| format!("Unknown kernel {id:?}"))
	}

	/// Returns if a kernel exists
	pub fn contains(&self, id: &str) -> bool {
		self.kernels.contains_key(id)
	}

	/// Returns all kernel ids, sorted
	pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
		self.kernels.keys().map(String::as_str)
	}

	/// Returns all kernels, sorted by id
	pub fn iter(&self) -> impl Iterator<Item = &Kernel> + '_ {
		self.kernels.values()
	}

	/// Returns the number of kernels
	pub fn len(&self) -> usize {
		self.kernels.len()
	}

	/// Returns if the pool is empty
	pub fn is_empty(&self) -> bool {
		self.kernels.is_empty()
	}
}

impl FromIterator<Kernel> for KernelPool {
	fn from_iter<I: IntoIterator<Item = Kernel>>(iter: I) -> Self {
		Self {
			kernels: iter.into_iter().map(|kernel| (kernel.id.clone(), kernel)).collect(),
		}
	}
}

impl From<Vec<Kernel>> for KernelPool {
	fn from(kernels: Vec<Kernel>) -> Self {
		kernels.into_iter().collect()
	}
}

impl From<KernelPool> for Vec<Kernel> {
	fn from(pool: KernelPool) -> Self {
		pool.kernels.into_values().collect()
	}
}

/// Creates a generated kernel, with only ASIC and FPGA parameters
fn gen_kernel(id: String, asic_miu: f64, occur: f64) -> Kernel {
	Kernel::new(id, occur, [
		(AccKind::Asic, UCoreParam::with_miu(asic_miu)),
		(AccKind::Fpga, UCoreParam::with_miu(asic_miu / ASIC_PERF_RATIO)),
	])
}

/// Returns `len` evenly spaced values over `[start, end]`
fn linspace(start: f64, end: f64, len: usize) -> Vec<f64> {
	match len {
		0 => vec![],
		1 => vec![start],
		_ => (0..len)
			.map(|idx| start + (end - start) * idx as f64 / (len - 1) as f64)
			.collect(),
	}
}

/// Normal distribution probability density
fn normal_pdf(x: f64, mean: f64, std: f64) -> f64 {
	let z = (x - mean) / std;
	(-0.5 * z * z).exp() / (std * (2.0 * std::f64::consts::PI).sqrt())
}

/// Normal distribution cumulative density
fn normal_cdf(x: f64, mean: f64, std: f64) -> f64 {
	0.5 * (1.0 + self::erf((x - mean) / (std * std::f64::consts::SQRT_2)))
}

/// Error function, accurate to about `1.5e-7`
fn erf(x: f64) -> f64 {
	// Abramowitz & Stegun, 7.1.26
	const P: f64 = 0.327_591_1;
	const A: [f64; 5] = [0.254_829_592, -0.284_496_736, 1.421_413_741, -1.453_152_027, 1.061_405_429];

	let t = 1.0 / (1.0 + P * x.abs());
	let poly = A.iter().rev().fold(0.0, |acc, &a| (acc + a) * t);
	let y = 1.0 - poly * (-x * x).exp();
	y.copysign(x)
}

#[cfg(test)]
mod tests {
	use {
		super::*,
		hetsim_util::ApproxEq,
		rand::{rngs::StdRng, SeedableRng},
	};

	#[test]
	fn builtin() {
		let pool = KernelPool::builtin();
		assert_eq!(pool.len(), 6);
		assert_eq!(pool.ids().collect::<Vec<_>>(), [
			"BS", "FFT", "MMM", "asiceff1", "fpgaeff1", "fpgaeff2"
		]);

		let bs = pool.get("BS").unwrap();
		assert_eq!(*bs.acc(AccKind::Asic).unwrap(), UCoreParam::new(482.0, 4.75, 66.249));
		assert_eq!(*pool.get("fpgaeff2").unwrap().acc(AccKind::Fpga).unwrap(), UCoreParam::new(40.0, 2.5, 20.0));
		assert!(pool.get("conv").is_err());
	}

	#[test]
	fn erf_values() {
		assert!(erf(0.0).abs() < 1e-7);
		assert!(erf(1.0).approx_eq_tol(0.842_700_79, 1e-6));
		assert!(erf(-2.0).approx_eq_tol(-0.995_322_27, 1e-6));
		assert!(normal_cdf(10.0, 10.0, 3.0).approx_eq_tol(0.5, 1e-6));
	}

	#[test]
	fn fixed_norm() {
		let pool = KernelPool::fixed_norm(200.0, 35.0, 10, "test").unwrap();
		assert_eq!(pool.len(), 10);

		let first = pool.get("_gen_test_000").unwrap();
		let last = pool.get("_gen_test_009").unwrap();
		assert!(first.acc(AccKind::Asic).unwrap().miu.approx_eq(100.0));
		assert!(last.acc(AccKind::Asic).unwrap().miu.approx_eq(300.0));
		assert!(last.acc(AccKind::Fpga).unwrap().miu.approx_eq(60.0));

		// Bins cover the whole distribution
		let total = pool.iter().map(|kernel| kernel.occur).sum::<f64>();
		assert!(total.approx_eq_tol(KERNELS_PER_APP, 1e-6));

		// And the middle is more likely than the tails
		let middle = pool.get("_gen_test_005").unwrap();
		assert!(middle.occur > first.occur);
		assert!(middle.occur > last.occur);
	}

	#[test]
	fn rand_norm() {
		let mut rng = StdRng::seed_from_u64(5);
		let pool = KernelPool::rand_norm(80.0, 10.0, 50, "norm", &mut rng).unwrap();
		assert_eq!(pool.len(), 50);
		assert!(pool.contains("norm049"));

		let mean = pool
			.iter()
			.map(|kernel| kernel.acc(AccKind::Asic).unwrap().miu)
			.collect::<average::Mean>();
		assert!((mean.mean() - 80.0).abs() < 10.0, "Sample mean too far: {}", mean.mean());
		assert!(pool.iter().all(|kernel| (0.0..=1.0).contains(&kernel.occur)));
	}

	#[test]
	fn rand_norm_is_seeded() {
		let draw = |seed| KernelPool::rand_norm(80.0, 10.0, 8, "norm", &mut StdRng::seed_from_u64(seed)).unwrap();
		assert_eq!(draw(3), draw(3));
		assert_ne!(draw(3), draw(4));

		let mut rng = StdRng::seed_from_u64(3);
		assert!(KernelPool::rand_norm(80.0, 0.0, 8, "norm", &mut rng).is_err());
		assert!(KernelPool::rand_norm(80.0, f64::NAN, 8, "norm", &mut rng).is_err());
	}

	#[test]
	fn json() {
		let pool = KernelPool::builtin();
		let json = serde_json::to_string(&pool).unwrap();
		assert_eq!(serde_json::from_str::<KernelPool>(&json).unwrap(), pool);

		let pool = serde_json::from_str::<KernelPool>(
			r#"[{ "id": "k0", "accs": { "ASIC": { "miu": 12.5 }, "FPGA": { "miu": 2.5, "phi": 0.3, "bw": 1.0 } } }]"#,
		)
		.unwrap();
		let kernel = pool.get("k0").unwrap();
		assert_eq!(kernel.occur, 1.0);
		assert_eq!(*kernel.acc(AccKind::Asic).unwrap(), UCoreParam::with_miu(12.5));
		assert!(kernel.acc(AccKind::Gpu).is_err());
	}

	#[test]
	fn save_and_load() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("pool.json");
		let pool = KernelPool::fixed_norm(80.0, 10.0, 20, "fixednorm").unwrap();
		pool.save(&path).unwrap();
		assert_eq!(KernelPool::load(&path).unwrap(), pool);
	}
}
