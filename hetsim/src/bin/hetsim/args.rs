//! Arguments

// Imports
use {hetsim::DeviceCoreType, std::path::PathBuf};

/// Arguments
#[derive(Debug)]
#[derive(clap::Parser)]
pub struct Args {
	/// Log file
	///
	/// Specifies a file to perform verbose logging to.
	/// You can use `RUST_LOG_FILE` to set filtering options
	#[clap(long = "log-file")]
	pub log_file: Option<PathBuf>,

	/// Whether to append to the log file
	#[clap(long = "log-file-append")]
	pub log_file_append: bool,

	/// Config file
	///
	/// Defaults are used for everything when not passed.
	#[clap(long = "config")]
	pub config_file: Option<PathBuf>,

	/// Output file
	#[clap(long = "output")]
	pub output_file: Option<PathBuf>,

	/// Sub-command
	#[command(subcommand)]
	pub sub_cmd: SubCmd,
}

/// Sub-command
#[derive(Debug)]
#[derive(clap::Subcommand)]
pub enum SubCmd {
	/// Frequency and power of the throughput core over a voltage range
	#[clap(name = "core-scale")]
	CoreScale(CoreScaleArgs),

	/// Performance of an emerging device core under a power budget
	#[clap(name = "device-core")]
	DeviceCore(DeviceCoreArgs),

	/// Optimal dim silicon configuration of the throughput cores
	#[clap(name = "dim-opt")]
	DimOpt(DimOptArgs),

	/// Performance of a single application
	#[clap(name = "app-perf")]
	AppPerf(AppPerfArgs),

	/// Performance of each application in the configured workload
	#[clap(name = "workload")]
	Workload,

	/// Sweep of the configured workload over nodes and ASIC allocations
	#[clap(name = "sweep")]
	Sweep,

	/// Generates a kernel pool and a workload using it
	#[clap(name = "gen-workload")]
	GenWorkload(GenWorkloadArgs),
}

/// Core scaling arguments
#[derive(Debug)]
#[derive(clap::Args)]
pub struct CoreScaleArgs {
	/// Lowest voltage (V)
	#[clap(long = "vmin", default_value_t = 0.3)]
	pub vmin: f64,

	/// Highest voltage (V)
	#[clap(long = "vmax", default_value_t = 1.3)]
	pub vmax: f64,

	/// Voltage step (V)
	#[clap(long = "step", default_value_t = 0.05)]
	pub step: f64,
}

/// Emerging device core arguments
#[derive(Debug)]
#[derive(clap::Args)]
pub struct DeviceCoreArgs {
	/// Core type
	#[clap(long = "core", default_value = "io-tfet")]
	pub ctype: DeviceCoreType,

	/// Node, in nm
	#[clap(long = "nm", default_value_t = 22)]
	pub nm: u32,

	/// Power budget (W)
	#[clap(long = "power", default_value_t = 0.5)]
	pub power: f64,
}

/// Dim silicon arguments
#[derive(Debug)]
#[derive(clap::Args)]
pub struct DimOptArgs {
	/// Lowest voltage considered for the throughput cores (V)
	#[clap(long = "vmin", default_value_t = hetsim::system::VMIN)]
	pub vmin: f64,
}

/// Application performance arguments
#[derive(Debug)]
#[derive(clap::Args)]
pub struct AppPerfArgs {
	/// Parallel fraction
	#[clap(long = "f", default_value_t = 0.99)]
	pub f: f64,

	/// Kernel coverages, as `<kernel>=<coverage>`
	#[clap(long = "kernel", value_parser = parse_kernel_cov)]
	pub kernels: Vec<(String, f64)>,
}

/// Workload generation arguments
#[derive(Debug)]
#[derive(clap::Args)]
pub struct GenWorkloadArgs {
	/// Distribution of the generated kernels' ASIC throughput
	#[clap(long = "dist", value_enum, default_value_t = KernelDist::Fixed)]
	pub dist: KernelDist,

	/// Mean ASIC throughput
	#[clap(long = "mean", default_value_t = 100.0)]
	pub mean: f64,

	/// Standard deviation of the ASIC throughput
	#[clap(long = "std", default_value_t = 20.0)]
	pub std: f64,

	/// Number of kernels
	#[clap(long = "kernels", default_value_t = 10)]
	pub kernels: usize,

	/// Kernel id prefix
	#[clap(long = "prefix", default_value = "gen")]
	pub prefix: String,

	/// Number of applications to draw
	#[clap(long = "apps", default_value_t = 100)]
	pub apps: usize,

	/// Fraction of the parallel part covered by kernels
	#[clap(long = "cov", default_value_t = 0.5)]
	pub cov: f64,

	/// Parallel fraction
	#[clap(long = "f", default_value_t = 0.99)]
	pub f: f64,

	/// Random seed
	#[clap(long = "seed", default_value_t = 0)]
	pub seed: u64,

	/// Kernel pool output file
	#[clap(long = "pool-output")]
	pub pool_output: PathBuf,

	/// Workload output file
	#[clap(long = "workload-output")]
	pub workload_output: PathBuf,
}

/// Kernel throughput distribution
#[derive(PartialEq, Clone, Copy, Debug)]
#[derive(clap::ValueEnum)]
pub enum KernelDist {
	/// Evenly spaced, with normally distributed occurrences
	Fixed,

	/// Normally distributed
	Rand,
}

/// Parses a `<kernel>=<coverage>` pair
fn parse_kernel_cov(s: &str) -> Result<(String, f64), anyhow::Error> {
	let (kid, cov) = s
		.split_once('=')
		.ok_or_else(|| anyhow::anyhow!("Expected `<kernel>=<coverage>`, found {s:?}"))?;
	let cov = cov
		.parse()
		.map_err(|err| anyhow::anyhow!("Invalid coverage {cov:?}: {err}"))?;

	Ok((kid.to_owned(), cov))
}
