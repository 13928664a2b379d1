//! Emerging device cores
//!
//! Cores built with tunnel FETs or FinFETs. Unlike [`Core`](crate::Core), their
//! characteristics come straight from the device's circuit simulation, normalized
//! to the nominal supply, and are only defined over the simulated voltage range.

// Imports
use {
	crate::{
		freq::{CubicSpline, DataSource, RefDataset, DEFAULT_CKT},
		tech::{Device, DeviceScale},
	},
	anyhow::Context,
	std::{fmt, str::FromStr},
};

/// Emerging device core type
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum DeviceCoreType {
	/// In-order tunnel FET core
	#[serde(rename = "io-tfet")]
	IoTfet,

	/// Out-of-order tunnel FET core
	#[serde(rename = "o3-tfet")]
	O3Tfet,

	/// Server-class tunnel FET core
	#[serde(rename = "big-tfet")]
	BigTfet,

	/// Server-class FinFET core, after a Xeon E5-2630 v3 core
	#[serde(rename = "big-finfet")]
	BigFinfet,

	/// Micro-server FinFET core, after an Atom C2750 core
	#[serde(rename = "small-finfet")]
	SmallFinfet,
}

/// Characteristics of a core type at its base node
#[derive(PartialEq, Clone, Copy, Debug)]
struct DeviceBase {
	/// Performance
	perf: f64,

	/// Dynamic power (W)
	dp: f64,

	/// Static power (W)
	sp: f64,

	/// Area (mm^2)
	area: f64,

	/// Nominal frequency (GHz)
	freq: f64,

	/// Node, in nm
	nm: u32,
}

/// Slowdown of tunnel FET cores relative to CMOS at the same node
const TFET_SLOWDOWN: f64 = 1.65;

/// Power reduction of tunnel FET cores relative to CMOS at the same node
const TFET_POWER_RATIO: f64 = 2.965;

impl DeviceCoreType {
	/// All core types
	pub const ALL: [Self; 5] = [
		Self::IoTfet,
		Self::O3Tfet,
		Self::BigTfet,
		Self::BigFinfet,
		Self::SmallFinfet,
	];

	/// Returns the name of this core type
	pub const fn name(self) -> &'static str {
		match self {
			Self::IoTfet => "io-tfet",
			Self::O3Tfet => "o3-tfet",
			Self::BigTfet => "big-tfet",
			Self::BigFinfet => "big-finfet",
			Self::SmallFinfet => "small-finfet",
		}
	}

	/// Returns the device this core is built with
	pub const fn device(self) -> Device {
		match self {
			Self::IoTfet | Self::O3Tfet | Self::BigTfet => Device::Tfet,
			Self::BigFinfet | Self::SmallFinfet => Device::Finfet,
		}
	}

	/// Returns the characteristics at the base node.
	///
	/// Tunnel FET cores are the CMOS cores scaled to 22nm, then slowed down by
	/// [`TFET_SLOWDOWN`], with negligible static power.
	fn base(self) -> DeviceBase {
		match self {
			Self::IoTfet => DeviceBase {
				perf: 12.92 * 1.21 / TFET_SLOWDOWN,
				dp:   0.5,
				sp:   0.0,
				area: 7.65 / 4.0,
				freq: 4.2 / TFET_SLOWDOWN,
				nm:   22,
			},
			Self::O3Tfet => DeviceBase {
				perf: 28.48 * 1.21 / TFET_SLOWDOWN,
				dp:   (19.83 + 5.34) * 0.206 / TFET_POWER_RATIO,
				sp:   0.0,
				area: 26.48 / 4.0,
				freq: 3.7 / TFET_SLOWDOWN,
				nm:   22,
			},
			Self::BigTfet => DeviceBase {
				perf: 105.0 / TFET_SLOWDOWN,
				dp:   10.625 / TFET_POWER_RATIO,
				sp:   0.0,
				area: 22.125,
				freq: 2.4 / TFET_SLOWDOWN,
				nm:   22,
			},
			Self::BigFinfet => DeviceBase {
				perf: 105.0,
				dp:   8.5,
				sp:   2.125,
				area: 22.125,
				freq: 2.4,
				nm:   20,
			},
			Self::SmallFinfet => DeviceBase {
				perf: 23.3,
				dp:   1.12,
				sp:   0.28,
				area: 6.392,
				freq: 2.4,
				nm:   20,
			},
		}
	}
}

impl FromStr for DeviceCoreType {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.to_ascii_lowercase();
		Self::ALL
			.into_iter()
			.find(|ctype| ctype.name() == s)
			.ok_or_else(|| anyhow::anyhow!("Unknown device core type: {s:?}"))
	}
}

impl fmt::Display for DeviceCoreType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.pad(self.name())
	}
}

/// Performance under a power budget
#[derive(PartialEq, Clone, Copy, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct DevicePerf {
	/// Performance
	pub perf: f64,

	/// Supply voltage (V)
	pub vdd: f64,
}

/// Voltage curve, normalized to its value at the nominal supply
#[derive(Clone, Debug)]
struct NormCurve {
	spline: CubicSpline,
	nominal: f64,
}

impl NormCurve {
	fn new(samples: impl IntoIterator<Item = (f64, f64)>, v0: f64) -> Result<Self, anyhow::Error> {
		let spline = CubicSpline::new(samples)?;
		let nominal = spline.eval(v0);
		anyhow::ensure!(
			nominal.is_finite() && nominal > 0.0,
			"Value at nominal supply must be positive, found {nominal}"
		);

		Ok(Self { spline, nominal })
	}

	fn eval(&self, volt: f64) -> f64 {
		self.spline.eval(volt) / self.nominal
	}
}

/// Emerging device core
#[derive(Clone, Debug)]
pub struct DeviceCore {
	/// Core type
	ctype: DeviceCoreType,

	/// Node, in nm
	nm: u32,

	/// Nominal supply voltage (V)
	v0: f64,

	/// Nominal frequency (GHz)
	f0: f64,

	/// Dynamic power at the nominal supply (W)
	dp0: f64,

	/// Static power at the nominal supply (W)
	sp0: f64,

	/// Area (mm^2)
	area: f64,

	/// Performance at the nominal supply
	perf0: f64,

	/// Lowest simulated supply, in mV
	vmin_mv: u32,

	/// Highest simulated supply, in mV
	vmax_mv: u32,

	/// Frequency curve
	freq: NormCurve,

	/// Dynamic power curve
	dp: NormCurve,

	/// Static power curve
	sp: NormCurve,

	/// Current supply voltage (V)
	vdd: f64,
}

impl DeviceCore {
	/// Creates a new core at `nm`, running at its nominal supply.
	///
	/// Characteristics are scaled from the core type's base node with the
	/// device's scaling tables.
	///
	/// # Errors
	/// Returns an error if the device has no scaling data or circuit dataset for `nm`.
	pub fn new(source: &impl DataSource, ctype: DeviceCoreType, nm: u32) -> Result<Self, anyhow::Error> {
		let device = ctype.device();
		let base = ctype.base();
		let base_scale = DeviceScale::lookup(device, base.nm).context("Unable to look up base node scaling")?;
		let scale = DeviceScale::lookup(device, nm).context("Unable to look up node scaling")?;

		let dataset = source
			.device_data(DEFAULT_CKT, device, nm)
			.with_context(|| format!("Unable to get {device} dataset at {nm}nm"))?;
		let (vmin_mv, vmax_mv) = self::mv_range(&dataset)?;

		let v0 = scale.vnom;
		let v0_mv = self::to_mv(v0);
		anyhow::ensure!(
			(vmin_mv..=vmax_mv).contains(&v0_mv),
			"Nominal supply {v0_mv}mV is outside of the simulated range {vmin_mv}mV..={vmax_mv}mV"
		);

		let samples = |col: &[f64]| dataset.vdd.iter().copied().zip(col.iter().copied()).collect::<Vec<_>>();
		let freq = NormCurve::new(samples(&dataset.freq), v0).context("Unable to fit frequency curve")?;
		let dp = NormCurve::new(samples(&dataset.dp), v0).context("Unable to fit dynamic power curve")?;
		let sp = NormCurve::new(samples(&dataset.sp), v0).context("Unable to fit static power curve")?;

		let core = Self {
			ctype,
			nm,
			v0,
			f0: base.freq * scale.fnom / base_scale.fnom,
			dp0: base.dp * scale.dp / base_scale.dp,
			sp0: base.sp * scale.sp / base_scale.sp,
			area: base.area * scale.area / base_scale.area,
			perf0: base.perf * scale.perf / base_scale.perf,
			vmin_mv,
			vmax_mv,
			freq,
			dp,
			sp,
			vdd: v0,
		};
		tracing::trace!(
			%ctype,
			nm,
			core.v0,
			core.f0,
			core.dp0,
			core.sp0,
			core.area,
			core.perf0,
			"Created device core"
		);

		Ok(core)
	}

	/// Sets the supply voltage.
	///
	/// # Errors
	/// Returns an error if `volt` is outside of the simulated range, in which
	/// case the operating point is unchanged.
	pub fn dvfs_by_volt(&mut self, volt: f64) -> Result<(), anyhow::Error> {
		self.check_vdd(volt)?;
		self.vdd = volt;
		Ok(())
	}

	/// Returns the frequency at `volt`
	pub fn freq_at(&self, volt: f64) -> Result<f64, anyhow::Error> {
		self.check_vdd(volt)?;
		Ok(self.f0 * self.freq.eval(volt))
	}

	/// Returns the total power at `volt`
	pub fn power_at(&self, volt: f64) -> Result<f64, anyhow::Error> {
		self.check_vdd(volt)?;
		Ok(self.power_of(volt))
	}

	/// Returns the performance at `volt`
	pub fn perf_at(&self, volt: f64) -> Result<f64, anyhow::Error> {
		self.check_vdd(volt)?;
		Ok(self.perf_of(volt))
	}

	/// Returns the highest performance within `power`.
	///
	/// Searches the simulated range with 1mV steps. Returns `None` if even the
	/// lowest simulated supply exceeds `power`.
	pub fn perf_within(&self, power: f64) -> Option<DevicePerf> {
		let power_mv = |mv: u32| self.power_of(self::to_volt(mv));
		let (mut lo, mut hi) = (self.vmin_mv, self.vmax_mv);
		if power_mv(lo) > power {
			return None;
		}

		// Highest `mv` with `power_mv(mv) <= power`, within `[lo, hi]`
		while lo < hi {
			let mid = lo + (hi - lo).div_ceil(2);
			match power_mv(mid) <= power {
				true => lo = mid,
				false => hi = mid - 1,
			}
		}

		let vdd = self::to_volt(lo);
		Some(DevicePerf {
			perf: self.perf_of(vdd),
			vdd,
		})
	}

	fn check_vdd(&self, volt: f64) -> Result<(), anyhow::Error> {
		anyhow::ensure!(
			(self.vmin()..=self.vmax()).contains(&volt),
			"Supply {volt}V is outside of the simulated range {}V..={}V",
			self.vmin(),
			self.vmax()
		);
		Ok(())
	}

	fn power_of(&self, volt: f64) -> f64 {
		self.dp0 * self.dp.eval(volt) + self.sp0 * self.sp.eval(volt)
	}

	fn perf_of(&self, volt: f64) -> f64 {
		self.perf0 * self.freq.eval(volt)
	}

	/// Returns the core type
	pub fn ctype(&self) -> DeviceCoreType {
		self.ctype
	}

	/// Returns the device
	pub fn device(&self) -> Device {
		self.ctype.device()
	}

	/// Returns the node, in nm
	pub fn nm(&self) -> u32 {
		self.nm
	}

	/// Returns the nominal supply voltage
	pub fn v0(&self) -> f64 {
		self.v0
	}

	/// Returns the nominal frequency
	pub fn f0(&self) -> f64 {
		self.f0
	}

	/// Returns the dynamic power at the nominal supply
	pub fn dp0(&self) -> f64 {
		self.dp0
	}

	/// Returns the static power at the nominal supply
	pub fn sp0(&self) -> f64 {
		self.sp0
	}

	/// Returns the area
	pub fn area(&self) -> f64 {
		self.area
	}

	/// Returns the performance at the nominal supply
	pub fn perf0(&self) -> f64 {
		self.perf0
	}

	/// Returns the lowest simulated supply
	pub fn vmin(&self) -> f64 {
		self::to_volt(self.vmin_mv)
	}

	/// Returns the highest simulated supply
	pub fn vmax(&self) -> f64 {
		self::to_volt(self.vmax_mv)
	}

	/// Returns the current supply voltage
	pub fn vdd(&self) -> f64 {
		self.vdd
	}

	/// Returns the current frequency
	pub fn freq(&self) -> f64 {
		self.f0 * self.freq.eval(self.vdd)
	}

	/// Returns the current total power
	pub fn power(&self) -> f64 {
		self.power_of(self.vdd)
	}

	/// Returns the current performance
	pub fn perf(&self) -> f64 {
		self.perf_of(self.vdd)
	}
}

/// Returns the whole-mV range covered by `dataset`
fn mv_range(dataset: &RefDataset) -> Result<(u32, u32), anyhow::Error> {
	let (vmin, vmax) = dataset
		.vdd
		.iter()
		.fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &vdd| (min.min(vdd), max.max(vdd)));
	anyhow::ensure!(vmin > 0.0 && vmin < vmax, "Dataset has invalid supply range {vmin}V..={vmax}V");

	let (vmin_mv, vmax_mv) = ((vmin * 1000.0 - 1e-6).ceil() as u32, (vmax * 1000.0 + 1e-6).floor() as u32);
	Ok((vmin_mv, vmax_mv))
}

fn to_mv(volt: f64) -> u32 {
	(volt * 1000.0).round() as u32
}

fn to_volt(mv: u32) -> f64 {
	f64::from(mv) / 1000.0
}

#[cfg(test)]
mod tests {
	use {super::*, crate::freq::MemSource, hetsim_util::ApproxEq};

	#[test]
	fn io_tfet_base_node() {
		let source = MemSource::synthetic().unwrap();
		let core = DeviceCore::new(&source, DeviceCoreType::IoTfet, 22).unwrap();
		assert_eq!(core.device(), Device::Tfet);
		assert!(core.v0().approx_eq(0.4));
		assert!(core.perf0().approx_eq(12.92 * 1.21 / 1.65));
		assert!(core.area().approx_eq(7.65 / 4.0));
		assert!(core.f0().approx_eq(4.2 / 1.65));
		assert!(core.sp0().approx_eq(0.0));

		// Nominal supply runs at the nominal point
		assert!(core.vdd().approx_eq(core.v0()));
		assert!(core.freq().approx_eq(core.f0()));
		assert!(core.power().approx_eq(core.dp0()));
		assert!(core.perf().approx_eq(core.perf0()));
	}

	#[test]
	fn scaled_from_base_node() {
		let source = MemSource::synthetic().unwrap();
		let core = DeviceCore::new(&source, DeviceCoreType::O3Tfet, 16).unwrap();
		assert!(core.area().approx_eq(26.48 / 4.0 * 0.125 / 0.25));
		assert!(core.perf0().approx_eq(28.48 * 1.21 / 1.65 * 1.331 / 1.21));
		assert!(core.f0().approx_eq(3.7 / 1.65 * 0.664 / 0.7945));

		let core = DeviceCore::new(&source, DeviceCoreType::SmallFinfet, 7).unwrap();
		assert!(core.v0().approx_eq(0.7));
		assert!(core.area().approx_eq(6.392 * 0.1225));
		assert!(core.sp0().approx_eq(0.28 * 0.4719));
		assert!(core.power_at(core.v0()).unwrap().approx_eq(core.dp0() + core.sp0()));
	}

	#[test]
	fn unsupported_nodes_fail() {
		let source = MemSource::synthetic().unwrap();
		assert!(DeviceCore::new(&source, DeviceCoreType::BigFinfet, 22).is_err());
		assert!(DeviceCore::new(&source, DeviceCoreType::BigTfet, 10).is_err());
		assert!(DeviceCore::new(&MemSource::new(), DeviceCoreType::BigTfet, 22).is_err());
	}

	#[test]
	fn voltage_range_is_enforced() {
		let source = MemSource::synthetic().unwrap();
		let mut core = DeviceCore::new(&source, DeviceCoreType::BigFinfet, 14).unwrap();
		assert!(core.vmin().approx_eq(0.2));
		assert!(core.vmax().approx_eq(1.5));

		assert!(core.power_at(0.1).is_err());
		assert!(core.perf_at(1.6).is_err());
		assert!(core.dvfs_by_volt(1.6).is_err());
		assert!(core.vdd().approx_eq(core.v0()));

		core.dvfs_by_volt(0.5).unwrap();
		assert!(core.freq() < core.f0());
		assert!(core.freq().approx_eq(core.freq_at(0.5).unwrap()));
		assert!(core.perf().approx_eq(core.perf_at(0.5).unwrap()));
	}

	#[test]
	fn perf_within_budget() {
		let source = MemSource::synthetic().unwrap();
		let core = DeviceCore::new(&source, DeviceCoreType::IoTfet, 22).unwrap();

		// Nominal power is enough for the nominal supply
		let nominal = core.perf_within(core.dp0()).unwrap();
		assert!(nominal.vdd >= core.v0() - 1e-9);
		assert!(core.power_at(nominal.vdd).unwrap() <= core.dp0() + 1e-9);
		assert!(core.power_at(nominal.vdd + 0.001).unwrap() > core.dp0());
		assert!(nominal.perf.approx_eq(core.perf_at(nominal.vdd).unwrap()));

		// Halving the budget lowers the supply
		let half = core.perf_within(core.dp0() / 2.0).unwrap();
		assert!(half.vdd < nominal.vdd);
		assert!(half.perf < nominal.perf);

		// Unlimited budgets run at the highest simulated supply
		let unlimited = core.perf_within(f64::INFINITY).unwrap();
		assert!(unlimited.vdd.approx_eq(core.vmax()));

		assert_eq!(core.perf_within(0.0), None);
	}

	#[test]
	fn names() {
		for ctype in DeviceCoreType::ALL {
			assert_eq!(ctype.name().parse::<DeviceCoreType>().unwrap(), ctype);
		}
		assert_eq!(
			serde_json::to_string(&DeviceCoreType::SmallFinfet).unwrap(),
			r#""small-finfet""#
		);
		assert!("mid-tfet".parse::<DeviceCoreType>().is_err());
	}
}
