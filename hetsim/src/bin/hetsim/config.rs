//! Configuration

// Imports
use {
	hetsim::{freq::SigmaLevel, Budget, CoreSpec, CoreType, Mech, TechNode},
	std::path::PathBuf,
};

/// Configuration
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Config {
	/// Circuit simulation data directory.
	///
	/// Synthetic tables are used when missing.
	#[serde(default)]
	pub data_dir: Option<PathBuf>,

	/// Whether to cache parsed circuit tables
	#[serde(default = "Config::default_data_cache")]
	pub data_cache: bool,

	/// System
	#[serde(default)]
	pub system: SystemConfig,

	/// Kernel pool file.
	///
	/// The built-in pool is used when missing.
	#[serde(default)]
	pub kernel_pool: Option<PathBuf>,

	/// Workload file
	#[serde(default)]
	pub workload: Option<PathBuf>,

	/// Sweep
	#[serde(default)]
	pub sweep: SweepConfig,
}

impl Config {
	fn default_data_cache() -> bool {
		true
	}
}

impl Default for Config {
	fn default() -> Self {
		Self {
			data_dir:    None,
			data_cache:  Self::default_data_cache(),
			system:      SystemConfig::default(),
			kernel_pool: None,
			workload:    None,
			sweep:       SweepConfig::default(),
		}
	}
}

/// System configuration
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct SystemConfig {
	/// Budget
	#[serde(default)]
	pub budget: BudgetConfig,

	/// Technology node
	#[serde(default = "SystemConfig::default_tech")]
	pub tech: TechNode,

	/// Serial core
	#[serde(default = "SystemConfig::default_serial_core")]
	pub serial_core: CoreConfig,

	/// Whether the serial core is a federated core, built from two IO cores
	/// with the serial core's mechanism
	#[serde(default)]
	pub fed_serial_core: bool,

	/// Throughput core
	#[serde(default = "SystemConfig::default_thru_core")]
	pub thru_core: CoreConfig,

	/// ASICs
	#[serde(default)]
	pub asics: Vec<AsicConfig>,

	/// Fraction of the area given to the general-purpose accelerator
	#[serde(default)]
	pub gpacc_ratio: f64,

	/// Whether kernels without an ASIC run on the general-purpose accelerator
	#[serde(default)]
	pub use_gpacc: bool,
}

impl SystemConfig {
	fn default_tech() -> TechNode {
		TechNode::N22
	}

	fn default_serial_core() -> CoreConfig {
		CoreConfig::new(CoreType::O3)
	}

	fn default_thru_core() -> CoreConfig {
		CoreConfig::new(CoreType::Io)
	}
}

impl Default for SystemConfig {
	fn default() -> Self {
		Self {
			budget:          BudgetConfig::default(),
			tech:            Self::default_tech(),
			serial_core:     Self::default_serial_core(),
			fed_serial_core: false,
			thru_core:       Self::default_thru_core(),
			asics:           vec![],
			gpacc_ratio:     0.0,
			use_gpacc:       false,
		}
	}
}

/// Budget configuration
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum BudgetConfig {
	/// Preset, by name
	Preset(String),

	/// Explicit budget
	Explicit(Budget),
}

impl BudgetConfig {
	/// Resolves this budget
	pub fn resolve(&self) -> Result<Budget, anyhow::Error> {
		match self {
			Self::Preset(name) => Budget::preset(name),
			Self::Explicit(budget) => Ok(budget.clone()),
		}
	}
}

impl Default for BudgetConfig {
	fn default() -> Self {
		Self::Preset("large".to_owned())
	}
}

/// Core configuration.
///
/// The node is taken from the system.
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct CoreConfig {
	pub ctype: CoreType,

	#[serde(default = "CoreConfig::default_mech")]
	pub mech: Mech,

	#[serde(default)]
	pub pv: bool,

	#[serde(default = "CoreConfig::default_pen_adjust")]
	pub pen_adjust: f64,

	#[serde(default)]
	pub sigma: SigmaLevel,

	#[serde(default)]
	pub ckt: Option<String>,
}

impl CoreConfig {
	/// Creates a `HKMGS` core config without process variation
	pub fn new(ctype: CoreType) -> Self {
		Self {
			ctype,
			mech: Self::default_mech(),
			pv: false,
			pen_adjust: Self::default_pen_adjust(),
			sigma: SigmaLevel::default(),
			ckt: None,
		}
	}

	/// Returns the spec of this core at `tech`
	pub fn spec(&self, tech: TechNode) -> CoreSpec {
		let mut spec = CoreSpec::new(self.ctype, self.mech, tech);
		if self.pv {
			spec = spec.with_variation(self.pen_adjust, self.sigma);
		}
		if let Some(ckt) = &self.ckt {
			spec.ckt = ckt.clone();
		}

		spec
	}

	fn default_mech() -> Mech {
		Mech::Hkmgs
	}

	fn default_pen_adjust() -> f64 {
		1.0
	}
}

/// ASIC configuration
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct AsicConfig {
	/// Target kernel
	pub kernel: String,

	/// Id, defaults to the kernel id
	#[serde(default)]
	pub id: Option<String>,

	/// Fraction of the system area
	pub area_ratio: f64,
}

/// Sweep configuration.
///
/// Uses the system's budget, cores and general-purpose accelerator.
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct SweepConfig {
	/// Technology nodes
	#[serde(default = "SweepConfig::default_techs")]
	pub techs: Vec<TechNode>,

	/// Fractions of the area given to ASICs
	#[serde(default = "SweepConfig::default_asic_ratios")]
	pub asic_ratios: Vec<f64>,
}

impl SweepConfig {
	fn default_techs() -> Vec<TechNode> {
		TechNode::PTM.to_vec()
	}

	fn default_asic_ratios() -> Vec<f64> {
		(0..=10).map(|idx| f64::from(idx) * 0.05).collect()
	}
}

impl Default for SweepConfig {
	fn default() -> Self {
		Self {
			techs:       Self::default_techs(),
			asic_ratios: Self::default_asic_ratios(),
		}
	}
}
