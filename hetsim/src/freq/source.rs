//! Dataset sources

// Imports
use {
	super::{synth, McDataset, RefDataset},
	crate::tech::{Device, Mech, TechNode},
	anyhow::Context,
	std::{
		collections::HashMap,
		fs,
		io,
		path::{Path, PathBuf},
	},
};

/// Circuit used for the frequency model by default
pub const DEFAULT_CKT: &str = "adder";

/// Circuit of the reference table used by projection scaling
pub const INV_CKT: &str = "inv";

/// Source of circuit simulation datasets
pub trait DataSource {
	/// Returns the nominal dataset of circuit `ckt` under `mech` at `node`
	fn norm_data(&self, ckt: &str, mech: Mech, node: TechNode) -> Result<RefDataset, anyhow::Error>;

	/// Returns the Monte-Carlo dataset of circuit `ckt` under `mech` at `node`
	fn mc_data(&self, ckt: &str, mech: Mech, node: TechNode) -> Result<McDataset, anyhow::Error>;

	/// Returns the 45nm inverter chain dataset, used by projection scaling
	fn inv_data(&self) -> Result<RefDataset, anyhow::Error>;

	/// Returns the nominal dataset of circuit `ckt` built with `device` at `nm`
	fn device_data(&self, ckt: &str, device: Device, nm: u32) -> Result<RefDataset, anyhow::Error>;
}

impl<S: DataSource + ?Sized> DataSource for &S {
	fn norm_data(&self, ckt: &str, mech: Mech, node: TechNode) -> Result<RefDataset, anyhow::Error> {
		(**self).norm_data(ckt, mech, node)
	}

	fn mc_data(&self, ckt: &str, mech: Mech, node: TechNode) -> Result<McDataset, anyhow::Error> {
		(**self).mc_data(ckt, mech, node)
	}

	fn inv_data(&self) -> Result<RefDataset, anyhow::Error> {
		(**self).inv_data()
	}

	fn device_data(&self, ckt: &str, device: Device, nm: u32) -> Result<RefDataset, anyhow::Error> {
		(**self).device_data(ckt, device, nm)
	}
}

/// Directory-backed dataset source.
///
/// Expects the layout `<root>/<ckt>/NonVar/<ckt>_<mech>_<nm>.data` for nominal
/// datasets, `<root>/<ckt>/ProcessAndMismatch/<ckt>_<mech>_<nm>.mcdata` for
/// Monte-Carlo datasets and `<root>/inv/NonVar/inv_45.data` for the inverter chain.
/// Emerging device datasets share the nominal layout, with the device in place
/// of the mechanism.
///
/// Parsed datasets are cached next to each table, in a `.cache` file, which
/// is reused as long as it's newer than the table.
#[derive(Clone, Debug)]
pub struct DirSource {
	/// Root directory
	root: PathBuf,

	/// Whether to use the caches
	use_cache: bool,
}

impl DirSource {
	/// Creates a new directory source
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root:      root.into(),
			use_cache: true,
		}
	}

	/// Sets whether to read and write the caches
	#[must_use]
	pub fn with_cache(self, use_cache: bool) -> Self {
		Self { use_cache, ..self }
	}

	/// Returns the root directory
	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Returns the path of a nominal dataset
	pub fn norm_path(&self, ckt: &str, mech: Mech, node: TechNode) -> PathBuf {
		self.root
			.join(ckt)
			.join("NonVar")
			.join(format!("{ckt}_{mech}_{}.data", node.nm()))
	}

	/// Returns the path of a Monte-Carlo dataset
	pub fn mc_path(&self, ckt: &str, mech: Mech, node: TechNode) -> PathBuf {
		self.root
			.join(ckt)
			.join("ProcessAndMismatch")
			.join(format!("{ckt}_{mech}_{}.mcdata", node.nm()))
	}

	/// Returns the path of an emerging device dataset
	pub fn device_path(&self, ckt: &str, device: Device, nm: u32) -> PathBuf {
		self.root
			.join(ckt)
			.join("NonVar")
			.join(format!("{ckt}_{device}_{nm}.data"))
	}

	/// Returns the path of the inverter chain dataset
	pub fn inv_path(&self) -> PathBuf {
		self.root
			.join(INV_CKT)
			.join("NonVar")
			.join(format!("{INV_CKT}_{}.data", TechNode::N45.nm()))
	}

	/// Loads a dataset from `path`, going through its cache
	fn load<T>(&self, path: &Path, parse: fn(fs::File) -> Result<T, anyhow::Error>) -> Result<T, anyhow::Error>
	where
		T: bincode::Encode + bincode::Decode<()>,
	{
		let cache_path = path.with_extension(match path.extension() {
			Some(ext) => format!("{}.cache", ext.to_string_lossy()),
			None => "cache".to_owned(),
		});

		if self.use_cache {
			match self::read_cache(path, &cache_path) {
				Ok(Some(value)) => {
					tracing::trace!(?cache_path, "Using cached dataset");
					return Ok(value);
				},
				Ok(None) => (),
				Err(err) => tracing::debug!(?cache_path, ?err, "Ignoring unusable dataset cache"),
			}
		}

		let file = fs::File::open(path).with_context(|| format!("Unable to open dataset {path:?}"))?;
		let value = parse(file).with_context(|| format!("Unable to parse dataset {path:?}"))?;
		tracing::debug!(?path, "Parsed dataset");

		if self.use_cache {
			if let Err(err) = self::write_cache(&cache_path, &value) {
				tracing::warn!(?cache_path, ?err, "Unable to write dataset cache");
			}
		}

		Ok(value)
	}
}

impl DataSource for DirSource {
	fn norm_data(&self, ckt: &str, mech: Mech, node: TechNode) -> Result<RefDataset, anyhow::Error> {
		self.load(&self.norm_path(ckt, mech, node), RefDataset::from_reader)
	}

	fn mc_data(&self, ckt: &str, mech: Mech, node: TechNode) -> Result<McDataset, anyhow::Error> {
		self.load(&self.mc_path(ckt, mech, node), McDataset::from_reader)
	}

	fn inv_data(&self) -> Result<RefDataset, anyhow::Error> {
		self.load(&self.inv_path(), RefDataset::from_reader)
	}

	fn device_data(&self, ckt: &str, device: Device, nm: u32) -> Result<RefDataset, anyhow::Error> {
		self.load(&self.device_path(ckt, device, nm), RefDataset::from_reader)
	}
}

/// Reads the cache at `cache_path`, if it's newer than `path`
fn read_cache<T: bincode::Decode<()>>(path: &Path, cache_path: &Path) -> Result<Option<T>, anyhow::Error> {
	let cache_modified = match fs::metadata(cache_path) {
		Ok(metadata) => metadata.modified().context("Unable to get cache modification time")?,
		Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
		Err(err) => return Err(err).context("Unable to get cache metadata"),
	};
	let modified = fs::metadata(path)
		.and_then(|metadata| metadata.modified())
		.context("Unable to get dataset modification time")?;
	if cache_modified <= modified {
		return Ok(None);
	}

	let mut cache_file = io::BufReader::new(fs::File::open(cache_path).context("Unable to open cache")?);
	let value = bincode::decode_from_std_read(&mut cache_file, bincode::config::standard())
		.context("Unable to decode cache")?;

	Ok(Some(value))
}

/// Writes `value` to the cache at `cache_path`
fn write_cache<T: bincode::Encode>(cache_path: &Path, value: &T) -> Result<(), anyhow::Error> {
	let mut cache_file = io::BufWriter::new(fs::File::create(cache_path).context("Unable to create cache")?);
	bincode::encode_into_std_write(value, &mut cache_file, bincode::config::standard())
		.context("Unable to encode cache")?;

	Ok(())
}

/// In-memory dataset source
#[derive(Clone, Default, Debug)]
pub struct MemSource {
	/// Nominal datasets
	norm: HashMap<(String, Mech, TechNode), RefDataset>,

	/// Monte-Carlo datasets
	mc: HashMap<(String, Mech, TechNode), McDataset>,

	/// Inverter chain dataset
	inv: Option<RefDataset>,

	/// Emerging device datasets
	device: HashMap<(String, Device, u32), RefDataset>,
}

impl MemSource {
	/// Creates an empty source
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a source with synthetic datasets for [`DEFAULT_CKT`] under
	/// every PTM mechanism and node, every emerging device node, plus the
	/// inverter chain.
	pub fn synthetic() -> Result<Self, anyhow::Error> {
		let mut source = Self::new();
		for mech in [Mech::Hkmgs, Mech::Lp] {
			for node in TechNode::PTM {
				let params = synth::Params::ptm(mech, node)?;
				source.insert_norm(DEFAULT_CKT, mech, node, params.norm_dataset());
				source.insert_mc(DEFAULT_CKT, mech, node, params.mc_dataset());
			}
		}
		for device in Device::ALL {
			for &nm in device.nodes() {
				let params = synth::Params::device(device, nm)?;
				source.insert_device(DEFAULT_CKT, device, nm, params.norm_dataset());
			}
		}
		source.set_inv(synth::Params::inv().norm_dataset());

		Ok(source)
	}

	/// Adds a nominal dataset
	pub fn insert_norm(&mut self, ckt: &str, mech: Mech, node: TechNode, dataset: RefDataset) {
		self.norm.insert((ckt.to_owned(), mech, node), dataset);
	}

	/// Adds a Monte-Carlo dataset
	pub fn insert_mc(&mut self, ckt: &str, mech: Mech, node: TechNode, dataset: McDataset) {
		self.mc.insert((ckt.to_owned(), mech, node), dataset);
	}

	/// Sets the inverter chain dataset
	pub fn set_inv(&mut self, dataset: RefDataset) {
		self.inv = Some(dataset);
	}

	/// Adds an emerging device dataset
	pub fn insert_device(&mut self, ckt: &str, device: Device, nm: u32, dataset: RefDataset) {
		self.device.insert((ckt.to_owned(), device, nm), dataset);
	}
}

impl DataSource for MemSource {
	fn norm_data(&self, ckt: &str, mech: Mech, node: TechNode) -> Result<RefDataset, anyhow::Error> {
		self.norm
			.get(&(ckt.to_owned(), mech, node))
			.cloned()
			.with_context(|| format!("No nominal dataset for {ckt} under {mech} at {node}"))
	}

	fn mc_data(&self, ckt: &str, mech: Mech, node: TechNode) -> Result<McDataset, anyhow::Error> {
		self.mc
			.get(&(ckt.to_owned(), mech, node))
			.cloned()
			.with_context(|| format!("No Monte-Carlo dataset for {ckt} under {mech} at {node}"))
	}

	fn inv_data(&self) -> Result<RefDataset, anyhow::Error> {
		self.inv.clone().context("No inverter chain dataset")
	}

	fn device_data(&self, ckt: &str, device: Device, nm: u32) -> Result<RefDataset, anyhow::Error> {
		self.device
			.get(&(ckt.to_owned(), device, nm))
			.cloned()
			.with_context(|| format!("No {device} dataset for {ckt} at {nm}nm"))
	}
}

#[cfg(test)]
mod tests {
	use {super::*, std::time::Duration};

	#[test]
	fn synthetic_covers_ptm() {
		let source = MemSource::synthetic().unwrap();
		for mech in [Mech::Hkmgs, Mech::Lp] {
			for node in TechNode::PTM {
				assert!(source.norm_data(DEFAULT_CKT, mech, node).is_ok());
				assert!(source.mc_data(DEFAULT_CKT, mech, node).is_ok());
			}
		}
		assert!(source.inv_data().is_ok());
		assert!(source.device_data(DEFAULT_CKT, Device::Tfet, 22).is_ok());
		assert!(source.device_data(DEFAULT_CKT, Device::Finfet, 7).is_ok());
		assert!(source.device_data(DEFAULT_CKT, Device::Finfet, 22).is_err());
		assert!(source.norm_data(DEFAULT_CKT, Mech::Itrs, TechNode::N45).is_err());
		assert!(source.norm_data("mult", Mech::Hkmgs, TechNode::N45).is_err());
		assert!(MemSource::new().inv_data().is_err());
	}

	#[test]
	fn dir_source_layout() {
		let source = DirSource::new("data");
		assert_eq!(
			source.norm_path("adder", Mech::Hkmgs, TechNode::N16),
			Path::new("data/adder/NonVar/adder_HKMGS_16.data")
		);
		assert_eq!(
			source.mc_path("adder", Mech::Lp, TechNode::N32),
			Path::new("data/adder/ProcessAndMismatch/adder_LP_32.mcdata")
		);
		assert_eq!(source.inv_path(), Path::new("data/inv/NonVar/inv_45.data"));
		assert_eq!(
			source.device_path("adder", Device::Finfet, 14),
			Path::new("data/adder/NonVar/adder_FinFET_14.data")
		);
	}

	#[test]
	fn dir_source_reads_and_caches() {
		let dir = tempfile::tempdir().unwrap();
		let source = DirSource::new(dir.path());
		let dataset = synth::Params::ptm(Mech::Hkmgs, TechNode::N22).unwrap().norm_dataset();

		let path = source.norm_path(DEFAULT_CKT, Mech::Hkmgs, TechNode::N22);
		fs::create_dir_all(path.parent().unwrap()).unwrap();
		dataset.to_writer(fs::File::create(&path).unwrap()).unwrap();

		let read = source.norm_data(DEFAULT_CKT, Mech::Hkmgs, TechNode::N22).unwrap();
		assert_eq!(read.vdd.len(), dataset.vdd.len());

		let cache_path = path.with_extension("data.cache");
		assert!(cache_path.exists(), "Cache should have been written");

		// Make sure the cache is strictly newer, then read through it
		let cache_file = fs::File::options().write(true).open(&cache_path).unwrap();
		let newer = fs::metadata(&path).unwrap().modified().unwrap() + Duration::from_secs(10);
		cache_file.set_modified(newer).unwrap();
		assert_eq!(source.norm_data(DEFAULT_CKT, Mech::Hkmgs, TechNode::N22).unwrap(), read);

		assert!(source.norm_data(DEFAULT_CKT, Mech::Lp, TechNode::N22).is_err());
	}
}
