//! Applications and workloads

// Imports
use {
	crate::kernel::KernelPool,
	anyhow::Context,
	itertools::Itertools,
	rand::Rng,
	std::{
		collections::{BTreeMap, BTreeSet},
		fs,
		path::Path,
	},
};

/// Tolerance when checking coverages against the remaining parallel fraction
const COV_EPSILON: f64 = 1e-12;

/// Application.
///
/// A program split into a serial and a parallel fraction. Parts of the parallel
/// fraction may be covered by kernels, which can be offloaded to accelerators.
#[derive(PartialEq, Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(try_from = "AppData", into = "AppData")]
pub struct App {
	/// Name
	name: String,

	/// Parallel fraction
	f: f64,

	/// Parallel fraction not covered by any kernel
	f_noacc: f64,

	/// Kernel coverages, by kernel id
	kernels: BTreeMap<String, f64>,
}

impl App {
	/// Creates a new application with parallel fraction `f`, without kernels
	pub fn new(name: impl Into<String>, f: f64) -> Result<Self, anyhow::Error> {
		anyhow::ensure!((0.0..=1.0).contains(&f), "Parallel fraction must be within [0, 1], found {f}");

		Ok(Self {
			name: name.into(),
			f,
			f_noacc: f,
			kernels: BTreeMap::new(),
		})
	}

	/// Registers kernel `kid`, covering `cov` of the program.
	///
	/// # Errors
	/// Returns an error if the kernel is already registered, or if `cov` exceeds the
	/// parallel fraction not yet covered. The application is unchanged on error.
	pub fn add_kernel(&mut self, kid: &str, cov: f64) -> Result<(), anyhow::Error> {
		anyhow::ensure!(
			!self.kernels.contains_key(kid),
			"Kernel {kid:?} is already registered in {:?}",
			self.name
		);
		anyhow::ensure!(cov >= 0.0, "Coverage must not be negative, found {cov}");
		anyhow::ensure!(
			cov <= self.f_noacc + COV_EPSILON,
			"Coverage {cov} of kernel {kid:?} exceeds the remaining parallel fraction {}",
			self.f_noacc
		);

		self.kernels.insert(kid.to_owned(), cov);
		self.f_noacc = (self.f_noacc - cov).max(0.0);

		Ok(())
	}

	/// Changes the coverage of kernel `kid`.
	///
	/// # Errors
	/// Returns an error if the kernel isn't registered, or if `cov` exceeds the
	/// parallel fraction not covered by other kernels. The application is unchanged on error.
	pub fn set_cov(&mut self, kid: &str, cov: f64) -> Result<(), anyhow::Error> {
		let old_cov = *self
			.kernels
			.get(kid)
			.with_context(|| format!("Kernel {kid:?} is not registered in {:?}", self.name))?;
		anyhow::ensure!(cov >= 0.0, "Coverage must not be negative, found {cov}");
		anyhow::ensure!(
			cov <= self.f_noacc + old_cov + COV_EPSILON,
			"Coverage {cov} of kernel {kid:?} exceeds the remaining parallel fraction {}",
			self.f_noacc + old_cov
		);

		self.kernels.insert(kid.to_owned(), cov);
		self.f_noacc = (self.f_noacc + old_cov - cov).max(0.0);

		Ok(())
	}

	/// Returns an identifier summarizing the kernel coverages.
	///
	/// Formatted as `<accelerated %>-<kid>-<cov %>-...`.
	pub fn tag(&self) -> String {
		let percent = |frac: f64| (frac * 100.0) as i64;
		std::iter::once(percent(self.f - self.f_noacc).to_string())
			.chain(
				self.kernels
					.iter()
					.map(|(kid, &cov)| format!("{kid}-{}", percent(cov))),
			)
			.join("-")
	}

	/// Returns the name
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Returns the parallel fraction
	pub fn f(&self) -> f64 {
		self.f
	}

	/// Returns the parallel fraction not covered by kernels
	pub fn f_noacc(&self) -> f64 {
		self.f_noacc
	}

	/// Returns the coverage of kernel `kid`
	pub fn cov(&self, kid: &str) -> Option<f64> {
		self.kernels.get(kid).copied()
	}

	/// Returns all kernels with their coverage
	pub fn kernels(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
		self.kernels.iter().map(|(kid, &cov)| (kid.as_str(), cov))
	}
}

/// Serialized application
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
struct AppData {
	name:    String,
	f:       f64,
	#[serde(default)]
	kernels: BTreeMap<String, f64>,
}

impl TryFrom<AppData> for App {
	type Error = anyhow::Error;

	fn try_from(data: AppData) -> Result<Self, Self::Error> {
		let mut app = Self::new(data.name, data.f)?;
		for (kid, cov) in data.kernels {
			app.add_kernel(&kid, cov)?;
		}

		Ok(app)
	}
}

impl From<App> for AppData {
	fn from(app: App) -> Self {
		Self {
			name:    app.name,
			f:       app.f,
			kernels: app.kernels,
		}
	}
}

/// Workload, a set of applications
#[derive(PartialEq, Clone, Default, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Workload {
	pub apps: Vec<App>,
}

impl Workload {
	/// Creates a workload from `apps`
	pub fn new(apps: Vec<App>) -> Self {
		Self { apps }
	}

	/// Builds a workload where each of `kernels` occurs in each application with its
	/// occurrence probability.
	///
	/// Applications where no kernel occurred are dropped. Every application has
	/// parallel fraction `f`, of which `cov` is split evenly among its kernels.
	pub fn build_fixedcov(
		app_num: usize,
		pool: &KernelPool,
		kernels: &[&str],
		cov: f64,
		f: f64,
		rng: &mut impl Rng,
	) -> Result<Self, anyhow::Error> {
		anyhow::ensure!((0.0..=1.0).contains(&cov), "Coverage must be within [0, 1], found {cov}");
		let occurs = kernels
			.iter()
			.map(|&kid| Ok((kid, pool.get(kid)?.occur.clamp(0.0, 1.0))))
			.collect::<Result<Vec<_>, anyhow::Error>>()?;

		let mut apps = vec![];
		for _ in 0..app_num {
			let occurred = occurs
				.iter()
				.filter(|&&(_, occur)| rng.gen_bool(occur))
				.map(|&(kid, _)| kid)
				.collect::<Vec<_>>();
			if occurred.is_empty() {
				continue;
			}

			let mut app = App::new(format!("app{}", apps.len()), f)?;
			let kernel_cov = cov * f / occurred.len() as f64;
			for kid in occurred {
				app.add_kernel(kid, kernel_cov)?;
			}
			apps.push(app);
		}
		tracing::debug!(app_num, built = apps.len(), "Built fixed coverage workload");

		Ok(Self { apps })
	}

	/// Builds a workload with one application per kernel, each covering `cov` of its parallel fraction `f`
	pub fn build_single(kernels: &[&str], cov: f64, f: f64) -> Result<Self, anyhow::Error> {
		anyhow::ensure!((0.0..=1.0).contains(&cov), "Coverage must be within [0, 1], found {cov}");
		let width = kernels.len().to_string().len();
		let apps = kernels
			.iter()
			.enumerate()
			.map(|(idx, &kid)| {
				let mut app = App::new(format!("{idx:0width$}"), f)?;
				app.add_kernel(kid, cov * f)?;
				Ok(app)
			})
			.collect::<Result<_, anyhow::Error>>()?;

		Ok(Self { apps })
	}

	/// Loads a workload from a json file
	pub fn load(path: &Path) -> Result<Self, anyhow::Error> {
		let file = fs::File::open(path).with_context(|| format!("Unable to open workload {path:?}"))?;
		serde_json::from_reader(file).with_context(|| format!("Unable to parse workload {path:?}"))
	}

	/// Saves this workload to a json file
	pub fn save(&self, path: &Path) -> Result<(), anyhow::Error> {
		let file = fs::File::create(path).with_context(|| format!("Unable to create workload {path:?}"))?;
		serde_json::to_writer_pretty(file, self).context("Unable to write workload")
	}

	/// Returns all kernel ids used by any application
	pub fn kernel_ids(&self) -> BTreeSet<&str> {
		self.apps
			.iter()
			.flat_map(|app| app.kernels().map(|(kid, _)| kid))
			.collect()
	}
}
