//! Conventional cores
//!
//! A [`Core`] is a CPU core of a given type, scaled to a technology node. Its
//! operating point is set with [`Core::dvfs_by_volt`] or [`Core::dvfs_by_factor`],
//! and its frequency, power and performance follow from it.
//!
//! A [`FedCore`] fuses two in-order cores into a single serial core.

// Imports
use {
	crate::{
		freq::{DataSource, FreqScaleModel, SigmaLevel, DEFAULT_CKT},
		tech::{CoreType, Mech, TechNode, TechPoint},
	},
	anyhow::Context,
	std::fmt,
};

/// Core specification
#[derive(PartialEq, Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct CoreSpec {
	/// Core type
	pub ctype: CoreType,

	/// Scaling mechanism
	pub mech: Mech,

	/// Technology node
	pub tech: TechNode,

	/// Whether to model process variation
	#[serde(default)]
	pub pv: bool,

	/// Fraction of the variation penalty that gets applied
	#[serde(default = "CoreSpec::default_pen_adjust")]
	pub pen_adjust: f64,

	/// Sigma level of the variation penalty
	#[serde(default)]
	pub sigma: SigmaLevel,

	/// Circuit used to model frequency scaling
	#[serde(default = "CoreSpec::default_ckt")]
	pub ckt: String,
}

impl CoreSpec {
	/// Creates a new spec, without process variation
	pub fn new(ctype: CoreType, mech: Mech, tech: TechNode) -> Self {
		Self {
			ctype,
			mech,
			tech,
			pv: false,
			pen_adjust: Self::default_pen_adjust(),
			sigma: SigmaLevel::default(),
			ckt: Self::default_ckt(),
		}
	}

	/// Enables process variation
	#[must_use]
	pub fn with_variation(self, pen_adjust: f64, sigma: SigmaLevel) -> Self {
		Self {
			pv: true,
			pen_adjust,
			sigma,
			..self
		}
	}

	fn default_pen_adjust() -> f64 {
		1.0
	}

	fn default_ckt() -> String {
		DEFAULT_CKT.to_owned()
	}
}

/// Core configuration update.
///
/// Fields left as `None` keep their current value.
#[derive(PartialEq, Clone, Default, Debug)]
pub struct CoreUpdate {
	pub ctype:      Option<CoreType>,
	pub mech:       Option<Mech>,
	pub tech:       Option<TechNode>,
	pub pv:         Option<bool>,
	pub pen_adjust: Option<f64>,
}

/// Operating point
#[derive(PartialEq, Clone, Copy, Debug)]
struct OpPoint {
	/// Voltage scaling factor
	vsf: f64,

	/// Frequency scaling factor
	fsf: f64,

	/// Variation penalty
	penalty: f64,
}

/// Frequency and power at a list of voltages
#[derive(PartialEq, Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct VoltScaling {
	pub vdd:  Vec<f64>,
	pub freq: Vec<f64>,
	pub dp:   Vec<f64>,
	pub sp:   Vec<f64>,
}

/// Conventional core
#[derive(Clone, Debug)]
pub struct Core {
	/// Spec
	spec: CoreSpec,

	/// Nominal characteristics
	point: TechPoint,

	/// Minimum voltage scaling factor
	vsf_min: f64,

	/// Maximum voltage scaling factor
	vsf_max: f64,

	/// Frequency model
	model: FreqScaleModel,

	/// Current operating point
	op: OpPoint,
}

impl Core {
	/// Creates a new core, running at its nominal voltage.
	///
	/// # Errors
	/// Returns an error if the technology tables or the circuit datasets
	/// don't cover `spec`.
	pub fn new(source: &impl DataSource, spec: CoreSpec) -> Result<Self, anyhow::Error> {
		let point = TechPoint::lookup(spec.mech, spec.ctype, spec.tech).context("Unable to look up technology")?;

		let (vsf_min, vsf_max, model) = match spec.mech.is_projection() {
			true => {
				if spec.pv {
					tracing::warn!(mech = %spec.mech, "Projection-based scaling does not support process variation, ignoring");
				}

				let model = FreqScaleModel::projection(source, point.vt, point.v0, point.f0)
					.context("Unable to build projection frequency model")?;
				(point.vt / point.v0, 1.0, model)
			},
			false => {
				let model = match spec.pv {
					true => FreqScaleModel::ptm_with_variation(
						source,
						&spec.ckt,
						spec.mech,
						spec.tech,
						point.v0,
						point.f0,
						spec.pen_adjust,
						spec.sigma,
					),
					false => FreqScaleModel::ptm(source, &spec.ckt, spec.mech, spec.tech, point.v0, point.f0),
				}
				.context("Unable to build PTM frequency model")?;
				(0.3 / point.v0, 1.1 / point.v0, model)
			},
		};

		let mut core = Self {
			spec,
			point,
			vsf_min,
			vsf_max,
			model,
			op: OpPoint {
				vsf:     1.0,
				fsf:     1.0,
				penalty: 1.0,
			},
		};
		core.op = core.op_point(point.v0);
		tracing::trace!(spec = ?core.spec, point = ?core.point, "Created core");

		Ok(core)
	}

	/// Re-configures this core, resetting it to its new nominal voltage.
	///
	/// # Errors
	/// Returns an error if the updated spec isn't supported, in which case
	/// the core is left unchanged.
	pub fn config(&mut self, source: &impl DataSource, update: CoreUpdate) -> Result<(), anyhow::Error> {
		let spec = CoreSpec {
			ctype: update.ctype.unwrap_or(self.spec.ctype),
			mech: update.mech.unwrap_or(self.spec.mech),
			tech: update.tech.unwrap_or(self.spec.tech),
			pv: update.pv.unwrap_or(self.spec.pv),
			pen_adjust: update.pen_adjust.unwrap_or(self.spec.pen_adjust),
			..self.spec.clone()
		};

		*self = Self::new(source, spec).context("Unable to re-configure core")?;
		Ok(())
	}

	/// Sets the supply voltage
	pub fn dvfs_by_volt(&mut self, volt: f64) {
		self.op = self.op_point(volt);
	}

	/// Sets the supply voltage, relative to the nominal voltage
	pub fn dvfs_by_factor(&mut self, vsf: f64) {
		self.dvfs_by_volt(self.point.v0 * vsf);
	}

	/// Returns the total power at `volt`, without changing the operating point
	pub fn power_at(&self, volt: f64) -> f64 {
		let op = self.op_point(volt);
		self.dp_of(op) + self.sp_of(op)
	}

	/// Returns the performance at `volt`, without changing the operating point
	pub fn perf_at(&self, volt: f64) -> f64 {
		self.perf_of(self.op_point(volt))
	}

	/// Returns the frequency and power at each voltage in `volts`
	pub fn scale_with_vlist(&self, volts: &[f64]) -> VoltScaling {
		let ops = volts.iter().map(|&volt| self.op_point(volt)).collect::<Vec<_>>();
		VoltScaling {
			vdd:  volts.to_vec(),
			freq: ops.iter().map(|&op| self.freq_of(op)).collect(),
			dp:   ops.iter().map(|&op| self.dp_of(op)).collect(),
			sp:   ops.iter().map(|&op| self.sp_of(op)).collect(),
		}
	}

	/// Computes the operating point at `volt`
	fn op_point(&self, volt: f64) -> OpPoint {
		OpPoint {
			vsf:     volt / self.point.v0,
			fsf:     self.model.freq(volt) / self.point.f0,
			penalty: match self.spec.pv {
				true => self.model.penalty(volt),
				false => 1.0,
			},
		}
	}

	fn freq_of(&self, op: OpPoint) -> f64 {
		self.point.f0 * op.fsf * op.penalty
	}

	fn dp_of(&self, op: OpPoint) -> f64 {
		self.point.dp0 * op.fsf * op.vsf.powi(2)
	}

	fn sp_of(&self, op: OpPoint) -> f64 {
		let slope = self.model.sp_slope();
		self.point.sp0 * 10.0_f64.powf(self.point.v0 * op.vsf * slope) / 10.0_f64.powf(self.point.v0 * slope)
	}

	fn perf_of(&self, op: OpPoint) -> f64 {
		self.point.perf0 * op.fsf * op.penalty
	}

	/// Returns the spec
	pub fn spec(&self) -> &CoreSpec {
		&self.spec
	}

	/// Returns the core type
	pub fn ctype(&self) -> CoreType {
		self.spec.ctype
	}

	/// Returns the scaling mechanism
	pub fn mech(&self) -> Mech {
		self.spec.mech
	}

	/// Returns the technology node
	pub fn tech(&self) -> TechNode {
		self.spec.tech
	}

	/// Returns the nominal voltage
	pub fn v0(&self) -> f64 {
		self.point.v0
	}

	/// Returns the nominal frequency
	pub fn f0(&self) -> f64 {
		self.point.f0
	}

	/// Returns the dynamic power at the nominal point
	pub fn dp0(&self) -> f64 {
		self.point.dp0
	}

	/// Returns the static power at the nominal point
	pub fn sp0(&self) -> f64 {
		self.point.sp0
	}

	/// Returns the threshold voltage
	pub fn vt(&self) -> f64 {
		self.point.vt
	}

	/// Returns the area
	pub fn area(&self) -> f64 {
		self.point.area
	}

	/// Returns the performance at the nominal frequency
	pub fn perf0(&self) -> f64 {
		self.point.perf0
	}

	/// Returns the minimum voltage scaling factor.
	///
	/// This is only recorded, [`Core::dvfs_by_factor`] doesn't enforce it.
	pub fn vsf_min(&self) -> f64 {
		self.vsf_min
	}

	/// Returns the maximum voltage scaling factor.
	///
	/// This is only recorded, [`Core::dvfs_by_factor`] doesn't enforce it.
	pub fn vsf_max(&self) -> f64 {
		self.vsf_max
	}

	/// Returns the current supply voltage
	pub fn vdd(&self) -> f64 {
		self.point.v0 * self.op.vsf
	}

	/// Returns the current voltage scaling factor
	pub fn vsf(&self) -> f64 {
		self.op.vsf
	}

	/// Returns the current frequency scaling factor
	pub fn fsf(&self) -> f64 {
		self.op.fsf
	}

	/// Returns the current frequency
	pub fn freq(&self) -> f64 {
		self.freq_of(self.op)
	}

	/// Returns the current dynamic power
	pub fn dp(&self) -> f64 {
		self.dp_of(self.op)
	}

	/// Returns the current static power
	pub fn sp(&self) -> f64 {
		self.sp_of(self.op)
	}

	/// Returns the current total power
	pub fn power(&self) -> f64 {
		self.dp() + self.sp()
	}

	/// Returns the current performance
	pub fn perf(&self) -> f64 {
		self.perf_of(self.op)
	}
}

/// Area overhead of federating two in-order cores, relative to their total area
pub const FED_AREA_OVERHEAD: f64 = 0.037;

/// Federated core.
///
/// Two in-order cores fused into a single out-of-order-like serial core.
#[derive(Clone, Debug)]
pub struct FedCore {
	/// Each of the in-order cores
	io_core: Core,
}

impl FedCore {
	/// Creates a new federated core, running at its nominal voltage
	pub fn new(source: &impl DataSource, mech: Mech, tech: TechNode) -> Result<Self, anyhow::Error> {
		let io_core =
			Core::new(source, CoreSpec::new(CoreType::Io, mech, tech)).context("Unable to create in-order core")?;
		Ok(Self { io_core })
	}

	/// Re-configures both in-order cores.
	///
	/// # Errors
	/// Returns an error if `update` changes the core type or isn't supported, in
	/// which case the core is left unchanged.
	pub fn config(&mut self, source: &impl DataSource, update: CoreUpdate) -> Result<(), anyhow::Error> {
		if let Some(ctype) = update.ctype {
			anyhow::ensure!(ctype == CoreType::Io, "Federated cores are built from IO cores, found {ctype}");
		}
		self.io_core.config(source, update)
	}

	/// Sets the supply voltage
	pub fn dvfs_by_volt(&mut self, volt: f64) {
		self.io_core.dvfs_by_volt(volt);
	}

	/// Returns the total power at `volt`, without changing the operating point
	pub fn power_at(&self, volt: f64) -> f64 {
		2.0 * self.io_core.power_at(volt)
	}

	/// Returns the performance at `volt`, without changing the operating point
	pub fn perf_at(&self, volt: f64) -> f64 {
		2.0 * self.io_core.perf_at(volt)
	}

	/// Returns one of the in-order cores
	pub fn io_core(&self) -> &Core {
		&self.io_core
	}

	/// Returns the scaling mechanism
	pub fn mech(&self) -> Mech {
		self.io_core.mech()
	}

	/// Returns the technology node
	pub fn tech(&self) -> TechNode {
		self.io_core.tech()
	}

	/// Returns the nominal voltage
	pub fn v0(&self) -> f64 {
		self.io_core.v0()
	}

	/// Returns the area
	pub fn area(&self) -> f64 {
		2.0 * self.io_core.area() * (1.0 + FED_AREA_OVERHEAD)
	}

	/// Returns the current total power
	pub fn power(&self) -> f64 {
		2.0 * self.io_core.power()
	}

	/// Returns the current performance
	pub fn perf(&self) -> f64 {
		2.0 * self.io_core.perf()
	}
}

/// Serial core of a heterogeneous system
#[derive(Clone, Debug)]
pub enum SerialCore {
	/// Single core
	Single(Core),

	/// Federated core
	Fed(FedCore),
}

impl SerialCore {
	/// Creates a serial core of `spec`, or a federated core at its mechanism and node if `fed`.
	///
	/// Federated cores ignore the type and variation settings of `spec`.
	pub fn new(source: &impl DataSource, spec: CoreSpec, fed: bool) -> Result<Self, anyhow::Error> {
		match fed {
			true => FedCore::new(source, spec.mech, spec.tech).map(Self::Fed),
			false => Core::new(source, spec).map(Self::Single),
		}
	}

	/// Re-configures this core.
	///
	/// # Errors
	/// Returns an error if `update` isn't supported, in which case the core is
	/// left unchanged.
	pub fn config(&mut self, source: &impl DataSource, update: CoreUpdate) -> Result<(), anyhow::Error> {
		match self {
			Self::Single(core) => core.config(source, update),
			Self::Fed(core) => core.config(source, update),
		}
	}

	/// Returns the performance at `volt`, without changing the operating point
	pub fn perf_at(&self, volt: f64) -> f64 {
		match self {
			Self::Single(core) => core.perf_at(volt),
			Self::Fed(core) => core.perf_at(volt),
		}
	}

	/// Returns the technology node
	pub fn tech(&self) -> TechNode {
		match self {
			Self::Single(core) => core.tech(),
			Self::Fed(core) => core.tech(),
		}
	}

	/// Returns the nominal voltage
	pub fn v0(&self) -> f64 {
		match self {
			Self::Single(core) => core.v0(),
			Self::Fed(core) => core.v0(),
		}
	}

	/// Returns the area
	pub fn area(&self) -> f64 {
		match self {
			Self::Single(core) => core.area(),
			Self::Fed(core) => core.area(),
		}
	}
}

impl From<Core> for SerialCore {
	fn from(core: Core) -> Self {
		Self::Single(core)
	}
}

impl From<FedCore> for SerialCore {
	fn from(core: FedCore) -> Self {
		Self::Fed(core)
	}
}

impl fmt::Display for SerialCore {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Single(core) => fmt::Display::fmt(&core.ctype(), f),
			Self::Fed(_) => f.pad("FED"),
		}
	}
}

#[cfg(test)]
mod tests {
	use {super::*, crate::freq::MemSource, hetsim_util::ApproxEq};

	fn io_hkmgs_16(source: &MemSource) -> Core {
		Core::new(source, CoreSpec::new(CoreType::Io, Mech::Hkmgs, TechNode::N16)).unwrap()
	}

	#[test]
	fn nominal_point() {
		let source = MemSource::synthetic().unwrap();
		let core = io_hkmgs_16(&source);
		assert!(core.vdd().approx_eq(0.7));
		assert!(core.fsf().approx_eq(1.0));
		assert!(core.freq().approx_eq(core.f0()));
		assert!(core.dp().approx_eq(core.dp0()));
		assert!(core.sp().approx_eq(core.sp0()));
		assert!(core.power().approx_eq(core.dp0() + core.sp0()));
		assert!(core.perf().approx_eq(core.perf0()));
		assert!(core.vsf_min().approx_eq(0.3 / 0.7));
		assert!(core.vsf_max().approx_eq(1.1 / 0.7));
	}

	#[test]
	fn dvfs() {
		let source = MemSource::synthetic().unwrap();
		let mut core = io_hkmgs_16(&source);

		core.dvfs_by_volt(0.5);
		assert!(core.vsf().approx_eq(0.5 / 0.7));
		assert!(core.freq() < core.f0());
		assert!(core.dp().approx_eq(core.dp0() * core.fsf() * core.vsf().powi(2)));
		assert!(core.power() < core.dp0() + core.sp0());
		assert!(core.power().approx_eq(core.power_at(0.5)));
		assert!(core.perf().approx_eq(core.perf_at(0.5)));

		core.dvfs_by_factor(1.2);
		assert!(core.vdd().approx_eq(0.84));
		assert!(core.freq() > core.f0());
	}

	#[test]
	fn power_increases_with_voltage() {
		let source = MemSource::synthetic().unwrap();
		for mech in [Mech::Hkmgs, Mech::Lp] {
			for node in TechNode::PTM {
				let core = Core::new(&source, CoreSpec::new(CoreType::O3, mech, node)).unwrap();
				let volts = (30..=140).map(|idx| f64::from(idx) * 0.01).collect::<Vec<_>>();
				let scaling = core.scale_with_vlist(&volts);
				for idx in 1..volts.len() {
					let (prev, cur) = (scaling.dp[idx - 1] + scaling.sp[idx - 1], scaling.dp[idx] + scaling.sp[idx]);
					assert!(prev < cur, "Power should increase with voltage for {mech} at {node}");
				}
			}
		}
	}

	#[test]
	fn variation_slows_down() {
		let source = MemSource::synthetic().unwrap();
		let spec = CoreSpec::new(CoreType::Io, Mech::Lp, TechNode::N32);
		let nominal = Core::new(&source, spec.clone()).unwrap();
		let varied = Core::new(&source, spec.with_variation(1.0, SigmaLevel::Three)).unwrap();

		assert!(varied.freq() < nominal.freq());
		assert!(varied.perf() < nominal.perf());
		assert!(varied.power().approx_eq(nominal.power()));
	}

	#[test]
	fn projection_bounds() {
		let source = MemSource::synthetic().unwrap();
		let core = Core::new(&source, CoreSpec::new(CoreType::Io, Mech::Itrs, TechNode::N8)).unwrap();
		assert!(core.vsf_max().approx_eq(1.0));
		assert!(core.vsf_min().approx_eq(core.vt() / core.v0()));
		assert!(core.freq().approx_eq(core.f0()));
	}

	#[test]
	fn config_failure_keeps_core() {
		let source = MemSource::synthetic().unwrap();
		let mut core = io_hkmgs_16(&source);
		core.dvfs_by_volt(0.5);

		let update = CoreUpdate {
			tech: Some(TechNode::N8),
			..CoreUpdate::default()
		};
		assert!(core.config(&source, update).is_err());
		assert_eq!(core.tech(), TechNode::N16);
		assert!(core.vdd().approx_eq(0.5));

		let update = CoreUpdate {
			tech: Some(TechNode::N32),
			ctype: Some(CoreType::O3),
			..CoreUpdate::default()
		};
		core.config(&source, update).unwrap();
		assert_eq!((core.ctype(), core.tech()), (CoreType::O3, TechNode::N32));
		assert!(core.vdd().approx_eq(core.v0()));
	}

	#[test]
	fn fed_core_doubles_io_core() {
		let source = MemSource::synthetic().unwrap();
		let io_core = io_hkmgs_16(&source);
		let fed_core = FedCore::new(&source, Mech::Hkmgs, TechNode::N16).unwrap();

		assert!(fed_core.area().approx_eq(io_core.area() * 2.0 * 1.037));
		assert!(fed_core.perf().approx_eq(2.0 * io_core.perf0()));
		assert!(fed_core.power().approx_eq(2.0 * (io_core.dp0() + io_core.sp0())));
		assert!(fed_core.perf_at(0.5).approx_eq(2.0 * io_core.perf_at(0.5)));
		assert!(fed_core.v0().approx_eq(io_core.v0()));
	}

	#[test]
	fn fed_core_config() {
		let source = MemSource::synthetic().unwrap();
		let mut fed_core = FedCore::new(&source, Mech::Hkmgs, TechNode::N16).unwrap();

		let update = CoreUpdate {
			ctype: Some(CoreType::O3),
			..CoreUpdate::default()
		};
		assert!(fed_core.config(&source, update).is_err());
		assert_eq!(fed_core.io_core().ctype(), CoreType::Io);

		let update = CoreUpdate {
			tech: Some(TechNode::N32),
			mech: Some(Mech::Lp),
			..CoreUpdate::default()
		};
		fed_core.config(&source, update).unwrap();
		assert_eq!((fed_core.mech(), fed_core.tech()), (Mech::Lp, TechNode::N32));

		let serial_core = SerialCore::from(fed_core.clone());
		assert_eq!(serial_core.to_string(), "FED");
		assert!(serial_core.area().approx_eq(fed_core.area()));
	}
}
