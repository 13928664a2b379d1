//! Generates synthetic circuit simulation tables, laid out
//! the way `hetsim`'s directory data source expects.

// Imports
use {
	anyhow::Context,
	clap::Parser,
	hetsim::{freq::synth, Device, DirSource, Mech, TechNode},
	hetsim_util::logger,
	std::{fs, io::BufWriter, path::PathBuf},
};

/// Arguments
#[derive(Debug)]
#[derive(clap::Parser)]
struct Args {
	/// Log file
	///
	/// Specifies a file to perform verbose logging to.
	/// You can use `RUST_LOG_FILE` to set filtering options
	#[clap(long = "log-file")]
	log_file: Option<PathBuf>,

	/// Whether to append to the log file
	#[clap(long = "log-file-append")]
	log_file_append: bool,

	/// Output directory
	output_dir: PathBuf,

	/// Circuit name
	#[clap(long = "ckt", default_value = hetsim::freq::DEFAULT_CKT)]
	ckt: String,

	/// Skip the Monte-Carlo tables
	#[clap(long = "no-mc")]
	no_mc: bool,
}

fn main() -> Result<(), anyhow::Error> {
	// Get arguments
	let args = Args::parse();
	logger::pre_init::debug(format!("Args: {args:?}"));

	// Initialize logging
	logger::init(args.log_file.as_deref(), args.log_file_append);

	let dir = DirSource::new(&args.output_dir);
	for mech in [Mech::Hkmgs, Mech::Lp] {
		for node in TechNode::PTM {
			let params = synth::Params::ptm(mech, node)?;

			let path = dir.norm_path(&args.ckt, mech, node);
			params
				.norm_dataset()
				.to_writer(self::create(&path)?)
				.with_context(|| format!("Unable to write {path:?}"))?;
			tracing::info!(?path, "Wrote nominal table");

			if !args.no_mc {
				let path = dir.mc_path(&args.ckt, mech, node);
				params
					.mc_dataset()
					.to_writer(self::create(&path)?)
					.with_context(|| format!("Unable to write {path:?}"))?;
				tracing::info!(?path, "Wrote Monte-Carlo table");
			}
		}
	}

	for device in Device::ALL {
		for &nm in device.nodes() {
			let path = dir.device_path(&args.ckt, device, nm);
			synth::Params::device(device, nm)?
				.norm_dataset()
				.to_writer(self::create(&path)?)
				.with_context(|| format!("Unable to write {path:?}"))?;
			tracing::info!(?path, "Wrote {device} table");
		}
	}

	let path = dir.inv_path();
	synth::Params::inv()
		.norm_dataset()
		.to_writer(self::create(&path)?)
		.with_context(|| format!("Unable to write {path:?}"))?;
	tracing::info!(?path, "Wrote inverter chain table");

	Ok(())
}

/// Creates `path`, along with its parent directories
fn create(path: &std::path::Path) -> Result<BufWriter<fs::File>, anyhow::Error> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).with_context(|| format!("Unable to create directory {parent:?}"))?;
	}
	let file = fs::File::create(path).with_context(|| format!("Unable to create {path:?}"))?;

	Ok(BufWriter::new(file))
}
