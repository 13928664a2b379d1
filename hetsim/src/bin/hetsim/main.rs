//! Heterogeneous multicore design space model (`hetsim`)

// Modules
mod args;
mod config;

// Imports
use {
	self::{
		args::{AppPerfArgs, Args, CoreScaleArgs, DeviceCoreArgs, DimOptArgs, GenWorkloadArgs, KernelDist, SubCmd},
		config::Config,
	},
	anyhow::Context,
	clap::Parser,
	hetsim::{
		sweep,
		system::{dim, SymSystem, VMIN},
		App,
		Core,
		DataSource,
		DeviceCore,
		DeviceCoreType,
		DevicePerf,
		DirSource,
		HetPerf,
		HetSystem,
		KernelPool,
		MemSource,
		SerialCore,
		SweepSpec,
		SymPerf,
		Workload,
	},
	hetsim_util::{logger, DisplayWrapper},
	rand::SeedableRng,
	std::{fs, path::Path},
};

fn main() -> Result<(), anyhow::Error> {
	// Get arguments
	let args = Args::parse();
	logger::pre_init::debug(format!("Args: {args:?}"));
	if args.log_file_append && args.log_file.is_none() {
		logger::pre_init::warn("`--log-file-append` has no effect without `--log-file`");
	}

	// Initialize logging
	logger::init(args.log_file.as_deref(), args.log_file_append);

	// Read the config file
	let config = match &args.config_file {
		Some(config_path) => {
			let config_file = fs::File::open(config_path).context("Unable to open config file")?;
			serde_json::from_reader::<_, Config>(config_file).context("Unable to parse config file")?
		},
		None => Config::default(),
	};
	tracing::trace!(?config, "Loaded config");

	// Get the circuit data
	let source: Box<dyn DataSource> = match &config.data_dir {
		Some(data_dir) => Box::new(DirSource::new(data_dir).with_cache(config.data_cache)),
		None => {
			tracing::warn!("No data directory configured, using synthetic circuit tables");
			Box::new(MemSource::synthetic().context("Unable to build synthetic circuit tables")?)
		},
	};
	let source = &*source;

	let output_file = args.output_file.as_deref();
	match &args.sub_cmd {
		SubCmd::CoreScale(sub_args) => self::core_scale(&source, &config, sub_args, output_file),
		SubCmd::DeviceCore(sub_args) => self::device_core(&source, sub_args, output_file),
		SubCmd::DimOpt(sub_args) => self::dim_opt(&source, &config, sub_args, output_file),
		SubCmd::AppPerf(sub_args) => self::app_perf(&source, &config, sub_args, output_file),
		SubCmd::Workload => self::workload(&source, &config, output_file),
		SubCmd::Sweep => self::sweep(&source, &config, output_file),
		SubCmd::GenWorkload(sub_args) => self::gen_workload(sub_args),
	}
}

/// Frequency and power of the throughput core over a voltage range
fn core_scale(
	source: &impl DataSource,
	config: &Config,
	args: &CoreScaleArgs,
	output_file: Option<&Path>,
) -> Result<(), anyhow::Error> {
	anyhow::ensure!(args.step > 0.0, "Voltage step must be positive, found {}", args.step);
	anyhow::ensure!(
		args.vmin <= args.vmax,
		"Voltage range is empty: {}..{}",
		args.vmin,
		args.vmax
	);

	let core = Core::new(source, config.system.thru_core.spec(config.system.tech)).context("Unable to build core")?;
	let steps = ((args.vmax - args.vmin) / args.step + 1e-9).floor() as usize;
	let volts = (0..=steps)
		.map(|idx| args.vmin + idx as f64 * args.step)
		.collect::<Vec<_>>();

	let scaling = core.scale_with_vlist(&volts);
	for (idx, vdd) in scaling.vdd.iter().enumerate() {
		tracing::info!(
			vdd,
			freq = scaling.freq[idx],
			dp = scaling.dp[idx],
			sp = scaling.sp[idx],
			"Core scaling"
		);
	}

	self::write_output(output_file, &scaling)
}

/// Emerging device core output
#[derive(Debug)]
#[derive(serde::Serialize)]
struct DeviceCoreOutput {
	/// Core type
	ctype: DeviceCoreType,

	/// Node, in nm
	nm: u32,

	/// Area (mm^2)
	area: f64,

	/// Nominal supply voltage (V)
	v0: f64,

	/// Performance at the nominal supply
	perf0: f64,

	/// Power at the nominal supply (W)
	power0: f64,

	/// Power budget (W)
	power_budget: f64,

	/// Highest performance within the budget, if any supply fits it
	perf: Option<DevicePerf>,
}

/// Performance of an emerging device core under a power budget
fn device_core(source: &impl DataSource, args: &DeviceCoreArgs, output_file: Option<&Path>) -> Result<(), anyhow::Error> {
	let core = DeviceCore::new(source, args.ctype, args.nm).context("Unable to build device core")?;

	let perf = core.perf_within(args.power);
	match perf {
		Some(perf) => tracing::info!(ctype = %args.ctype, nm = args.nm, perf.perf, perf.vdd, "Device core performance"),
		None => tracing::warn!(
			ctype = %args.ctype,
			nm = args.nm,
			power = args.power,
			"Power budget is below the lowest supply's power"
		),
	}

	let output = DeviceCoreOutput {
		ctype: args.ctype,
		nm: args.nm,
		area: core.area(),
		v0: core.v0(),
		perf0: core.perf0(),
		power0: core.dp0() + core.sp0(),
		power_budget: args.power,
		perf,
	};
	self::write_output(output_file, &output)
}

/// Optimal dim silicon configuration of the throughput cores
fn dim_opt(
	source: &impl DataSource,
	config: &Config,
	args: &DimOptArgs,
	output_file: Option<&Path>,
) -> Result<(), anyhow::Error> {
	let pool = self::load_pool(config)?;
	let system = self::build_system(source, config, &pool)?;

	let dim_perf = dim::opt(
		system.thru_core(),
		system.thru_core_area(),
		system.budget().power,
		args.vmin,
	)
	.context("Unable to find optimal dim silicon configuration")?;
	tracing::info!(?dim_perf, "Optimal dim silicon configuration");

	self::write_output(output_file, &dim_perf)
}

/// Application performance output
#[derive(Debug)]
#[derive(serde::Serialize)]
struct AppPerfOutput {
	/// Application
	app: App,

	/// Heterogeneous system performance
	het: HetPerf,

	/// Symmetric system of throughput cores, at the optimal core count
	sym_opt: SymPerf,

	/// Symmetric system of throughput cores, with dark silicon
	sym_dark: SymPerf,
}

/// Performance of a single application
fn app_perf(
	source: &impl DataSource,
	config: &Config,
	args: &AppPerfArgs,
	output_file: Option<&Path>,
) -> Result<(), anyhow::Error> {
	let mut app = App::new("app", args.f)?;
	for (kid, cov) in &args.kernels {
		app.add_kernel(kid, *cov)
			.with_context(|| format!("Unable to add kernel {kid:?}"))?;
	}

	let pool = self::load_pool(config)?;
	let mut system = self::build_system(source, config, &pool)?;
	let het = system.get_perf(&app, &pool).context("Unable to evaluate application")?;
	tracing::info!(tag = app.tag(), ?het, "Heterogeneous system performance");

	let budget = system.budget();
	let sym = SymSystem::new(budget.area, budget.power, system.thru_core().clone())
		.context("Unable to build symmetric system")?;
	let sym_opt = sym
		.opt_core_num(&app, VMIN)
		.context("Unable to find optimal core count")?;
	let sym_dark = sym.perf_by_dark(&app);
	tracing::info!(?sym_opt, ?sym_dark, "Symmetric system performance");

	self::write_output(output_file, &AppPerfOutput {
		app,
		het,
		sym_opt,
		sym_dark,
	})
}

/// Workload application output
#[derive(Debug)]
#[derive(serde::Serialize)]
struct WorkloadAppOutput {
	name: String,
	tag:  String,
	perf: HetPerf,
}

/// Performance of each application in the configured workload
fn workload(source: &impl DataSource, config: &Config, output_file: Option<&Path>) -> Result<(), anyhow::Error> {
	let pool = self::load_pool(config)?;
	let workload = self::load_workload(config)?;
	let mut system = self::build_system(source, config, &pool)?;

	let outputs = workload
		.apps
		.iter()
		.map(|app| {
			let perf = system
				.get_perf(app, &pool)
				.with_context(|| format!("Unable to evaluate application {:?}", app.name()))?;
			tracing::info!(name = app.name(), tag = app.tag(), perf = perf.perf, "Evaluated application");

			Ok(WorkloadAppOutput {
				name: app.name().to_owned(),
				tag: app.tag(),
				perf,
			})
		})
		.collect::<Result<Vec<_>, anyhow::Error>>()?;

	self::write_output(output_file, &outputs)
}

/// Sweep of the configured workload
fn sweep(source: &impl DataSource, config: &Config, output_file: Option<&Path>) -> Result<(), anyhow::Error> {
	let pool = self::load_pool(config)?;
	let workload = self::load_workload(config)?;

	let spec = SweepSpec {
		budget:      config.system.budget.resolve()?,
		serial_core: config.system.serial_core.spec(config.system.tech),
		fed_serial:  config.system.fed_serial_core,
		thru_core:   config.system.thru_core.spec(config.system.tech),
		techs:       config.sweep.techs.clone(),
		asic_ratios: config.sweep.asic_ratios.clone(),
		gpacc_ratio: config.system.gpacc_ratio,
		use_gpacc:   config.system.use_gpacc,
	};
	let points = sweep::sweep(&spec, source, &pool, &workload).context("Unable to run sweep")?;
	for point in &points {
		tracing::info!("{point}");
	}

	self::write_output(output_file, &points)
}

/// Generates a kernel pool and a workload using it
fn gen_workload(args: &GenWorkloadArgs) -> Result<(), anyhow::Error> {
	let mut rng = rand::rngs::StdRng::seed_from_u64(args.seed);

	let pool = match args.dist {
		KernelDist::Fixed => KernelPool::fixed_norm(args.mean, args.std, args.kernels, &args.prefix),
		KernelDist::Rand => KernelPool::rand_norm(args.mean, args.std, args.kernels, &args.prefix, &mut rng),
	}
	.context("Unable to generate kernels")?;

	let kernels = pool.ids().collect::<Vec<_>>();
	let workload = Workload::build_fixedcov(args.apps, &pool, &kernels, args.cov, args.f, &mut rng)
		.context("Unable to build workload")?;
	tracing::info!(kernels = pool.len(), apps = workload.apps.len(), "Generated workload");

	pool.save(&args.pool_output).context("Unable to save kernel pool")?;
	workload
		.save(&args.workload_output)
		.context("Unable to save workload")?;

	Ok(())
}

/// Loads the configured kernel pool
fn load_pool(config: &Config) -> Result<KernelPool, anyhow::Error> {
	match &config.kernel_pool {
		Some(path) => KernelPool::load(path),
		None => Ok(KernelPool::builtin()),
	}
}

/// Loads the configured workload
fn load_workload(config: &Config) -> Result<Workload, anyhow::Error> {
	let path = config.workload.as_deref().context("No workload configured")?;
	Workload::load(path)
}

/// Builds the configured heterogeneous system
fn build_system(source: &impl DataSource, config: &Config, pool: &KernelPool) -> Result<HetSystem, anyhow::Error> {
	let tech = config.system.tech;
	let budget = config.system.budget.resolve()?;
	let serial_core = SerialCore::new(
		source,
		config.system.serial_core.spec(tech),
		config.system.fed_serial_core,
	)
	.context("Unable to build serial core")?;
	let thru_core = Core::new(source, config.system.thru_core.spec(tech)).context("Unable to build throughput core")?;

	let mut system = HetSystem::new(budget, tech, serial_core, thru_core).context("Unable to build system")?;
	for asic in &config.system.asics {
		let kernel = pool.get(&asic.kernel)?;
		let aid = asic.id.as_deref().unwrap_or(&asic.kernel);
		system
			.set_asic(kernel, aid, asic.area_ratio)
			.with_context(|| format!("Unable to allocate ASIC {aid:?}"))?;
	}
	system
		.realloc_gpacc(config.system.gpacc_ratio)
		.context("Unable to allocate general-purpose accelerator")?;
	system.set_use_gpacc(config.system.use_gpacc);

	tracing::debug!(
		%tech,
		thru_core_area = system.thru_core_area(),
		asics = %DisplayWrapper::new(|f| {
			for (aid, area) in system.asic_areas() {
				write!(f, "{aid}: {area:.2}mm^2; ")?;
			}
			Ok(())
		}),
		"Built system"
	);

	Ok(system)
}

/// Writes `value` as json to `output_file`, if any
fn write_output(output_file: Option<&Path>, value: &impl serde::Serialize) -> Result<(), anyhow::Error> {
	let Some(output_path) = output_file else {
		return Ok(());
	};

	let output_file = fs::File::create(output_path).context("Unable to create output file")?;
	serde_json::to_writer(output_file, value).context("Unable to write to output file")
}
