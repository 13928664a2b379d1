//! Technology tables
//!
//! Nominal voltage, frequency, power and area scaling per technology node,
//! either projected (`ITRS`, `CONS`) or derived from PTM circuit simulation
//! (`HKMGS`, `LP`).
//!
//! Emerging devices ([`Device`]) have their own node sets and scaling tables,
//! see [`DeviceScale`].

// Imports
use std::{fmt, str::FromStr};

/// Technology node
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum TechNode {
	N45,
	N32,
	N22,
	N16,
	N11,
	N8,
}

impl TechNode {
	/// All nodes, from oldest to newest
	pub const ALL: [Self; 6] = [Self::N45, Self::N32, Self::N22, Self::N16, Self::N11, Self::N8];

	/// Nodes covered by the PTM circuit simulations
	pub const PTM: [Self; 4] = [Self::N45, Self::N32, Self::N22, Self::N16];

	/// Returns the feature size, in nm
	pub const fn nm(self) -> u32 {
		match self {
			Self::N45 => 45,
			Self::N32 => 32,
			Self::N22 => 22,
			Self::N16 => 16,
			Self::N11 => 11,
			Self::N8 => 8,
		}
	}

	/// Creates a node from its feature size
	pub fn from_nm(nm: u32) -> Option<Self> {
		Self::ALL.into_iter().find(|node| node.nm() == nm)
	}

	/// Index into the projection tables
	const fn idx(self) -> usize {
		self as usize
	}

	/// Index into the PTM tables, if simulated
	const fn ptm_idx(self) -> Option<usize> {
		match self {
			Self::N45 | Self::N32 | Self::N22 | Self::N16 => Some(self as usize),
			Self::N11 | Self::N8 => None,
		}
	}
}

impl TryFrom<u32> for TechNode {
	type Error = String;

	fn try_from(nm: u32) -> Result<Self, Self::Error> {
		Self::from_nm(nm).ok_or_else(|| format!("Unknown technology node: {nm}nm"))
	}
}

impl From<TechNode> for u32 {
	fn from(node: TechNode) -> Self {
		node.nm()
	}
}

impl FromStr for TechNode {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let nm = s.trim().trim_end_matches("nm").parse::<u32>()?;
		Self::try_from(nm).map_err(anyhow::Error::msg)
	}
}

impl fmt::Display for TechNode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}nm", self.nm())
	}
}

/// Scaling mechanism
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum Mech {
	/// ITRS projection
	#[serde(rename = "ITRS")]
	Itrs,

	/// Conservative projection
	#[serde(rename = "CONS")]
	Cons,

	/// High-k metal gate, from PTM simulation
	#[serde(rename = "HKMGS")]
	Hkmgs,

	/// Low power, from PTM simulation
	#[serde(rename = "LP")]
	Lp,
}

impl Mech {
	/// Returns the table name of this mechanism
	pub const fn name(self) -> &'static str {
		match self {
			Self::Itrs => "ITRS",
			Self::Cons => "CONS",
			Self::Hkmgs => "HKMGS",
			Self::Lp => "LP",
		}
	}

	/// Returns if this mechanism is a projection (as opposed to circuit simulation)
	pub const fn is_projection(self) -> bool {
		matches!(self, Self::Itrs | Self::Cons)
	}
}

impl FromStr for Mech {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_uppercase().as_str() {
			"ITRS" => Ok(Self::Itrs),
			"CONS" => Ok(Self::Cons),
			"HKMGS" => Ok(Self::Hkmgs),
			"LP" => Ok(Self::Lp),
			_ => anyhow::bail!("Unknown scaling mechanism: {s:?}"),
		}
	}
}

impl fmt::Display for Mech {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.pad(self.name())
	}
}

/// Core type
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum CoreType {
	/// In-order (throughput) core
	#[serde(rename = "IO")]
	Io,

	/// Out-of-order (wide-issue) core
	#[serde(rename = "O3")]
	O3,
}

impl CoreType {
	/// Returns the name of this core type
	pub const fn name(self) -> &'static str {
		match self {
			Self::Io => "IO",
			Self::O3 => "O3",
		}
	}
}

impl FromStr for CoreType {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_uppercase().as_str() {
			"IO" => Ok(Self::Io),
			"O3" => Ok(Self::O3),
			_ => anyhow::bail!("Unknown core type: {s:?}"),
		}
	}
}

impl fmt::Display for CoreType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.pad(self.name())
	}
}

/// Emerging device technology
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum Device {
	/// Homojunction tunnel FET, with a 30nm channel
	#[serde(rename = "TFET")]
	Tfet,

	/// High performance multi-gate FET
	#[serde(rename = "FinFET")]
	Finfet,
}

impl Device {
	/// All devices
	pub const ALL: [Self; 2] = [Self::Tfet, Self::Finfet];

	/// Returns the table name of this device
	pub const fn name(self) -> &'static str {
		match self {
			Self::Tfet => "TFET",
			Self::Finfet => "FinFET",
		}
	}

	/// Returns the nodes with scaling data, in nm, from oldest to newest
	pub const fn nodes(self) -> &'static [u32] {
		match self {
			Self::Tfet => &[45, 32, 22, 16],
			Self::Finfet => &[20, 16, 14, 10, 7],
		}
	}

	/// Returns the scaling table, indexed like [`Device::nodes`]
	const fn scale_table(self) -> &'static [DeviceScale] {
		match self {
			Self::Tfet => &TFET_SCALE,
			Self::Finfet => &FINFET_SCALE,
		}
	}
}

impl FromStr for Device {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_uppercase().as_str() {
			"TFET" => Ok(Self::Tfet),
			"FINFET" => Ok(Self::Finfet),
			_ => anyhow::bail!("Unknown device: {s:?}"),
		}
	}
}

impl fmt::Display for Device {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.pad(self.name())
	}
}

/// Device scaling at a node.
///
/// Apart from `vnom`, everything is relative to the device's oldest node.
#[derive(PartialEq, Clone, Copy, Debug)]
pub struct DeviceScale {
	/// Nominal supply voltage (V)
	pub vnom: f64,

	/// Area
	pub area: f64,

	/// Performance
	pub perf: f64,

	/// Nominal frequency
	pub fnom: f64,

	/// Dynamic power
	pub dp: f64,

	/// Static power
	pub sp: f64,
}

impl DeviceScale {
	/// Looks up the scaling of `device` at `nm`.
	///
	/// # Errors
	/// Returns an error if `device` has no scaling data for `nm`.
	pub fn lookup(device: Device, nm: u32) -> Result<Self, anyhow::Error> {
		let idx = device
			.nodes()
			.iter()
			.position(|&node| node == nm)
			.ok_or_else(|| anyhow::anyhow!("No {device} scaling data for {nm}nm"))?;

		Ok(device.scale_table()[idx])
	}
}

/// Creates a table entry
const fn device_scale(vnom: f64, area: f64, perf: f64, fnom: f64, dp: f64, sp: f64) -> DeviceScale {
	DeviceScale {
		vnom,
		area,
		perf,
		fnom,
		dp,
		sp,
	}
}

const TFET_SCALE: [DeviceScale; 4] = [
	self::device_scale(1.0, 1.0, 1.0, 1.0, 1.0, 1.0),
	self::device_scale(0.9, 0.5, 1.1, 0.95, 0.492, 0.306),
	self::device_scale(0.4, 0.25, 1.21, 0.7945, 0.206, 0.122),
	self::device_scale(0.35, 0.125, 1.331, 0.664, 0.092, 0.131),
];

// Note: FinFET performance scales with the nominal frequency
const FINFET_SCALE: [DeviceScale; 5] = [
	self::device_scale(0.9, 1.0, 1.0, 1.0, 1.0, 1.0),
	self::device_scale(0.85, 0.53, 1.5493, 1.5493, 0.9606, 0.8515),
	self::device_scale(0.8, 0.4, 2.2967, 2.2967, 0.9164, 0.7015),
	self::device_scale(0.75, 0.25, 2.6215, 2.6215, 0.7731, 0.6023),
	self::device_scale(0.7, 0.1225, 3.0719, 3.0719, 0.6086, 0.4719),
];

/// Base (45nm) core characteristics, picked up from McPAT
pub mod base {
	use super::CoreType;

	/// Nominal supply voltage
	pub const VDD: f64 = 1.0;

	/// Threshold voltage
	pub const VT: f64 = 0.45;

	/// Nominal frequency (GHz)
	pub const fn freq(ctype: CoreType) -> f64 {
		match ctype {
			CoreType::Io => 4.2,
			CoreType::O3 => 3.7,
		}
	}

	/// Dynamic power (W)
	pub const fn dp(ctype: CoreType) -> f64 {
		match ctype {
			CoreType::Io => 6.14,
			CoreType::O3 => 19.83,
		}
	}

	/// Static power (W)
	pub const fn sp(ctype: CoreType) -> f64 {
		match ctype {
			CoreType::Io => 1.058,
			CoreType::O3 => 5.34,
		}
	}

	/// Area (mm^2)
	pub const fn area(ctype: CoreType) -> f64 {
		match ctype {
			CoreType::Io => 7.65,
			CoreType::O3 => 26.48,
		}
	}
}

// Projection tables, indexed by `TechNode::idx`
const PROJ_VDD_ITRS: [f64; 6] = [1.0, 0.93, 0.84, 0.75, 0.68, 0.62];
const PROJ_VDD_CONS: [f64; 6] = [1.0, 0.93, 0.88, 0.86, 0.84, 0.84];
const PROJ_FREQ_ITRS: [f64; 6] = [1.0, 1.16, 1.45, 1.81, 2.26, 2.63];
const PROJ_FREQ_CONS: [f64; 6] = [1.0, 1.10, 1.19, 1.25, 1.30, 1.34];
const PROJ_POWER_ITRS: [f64; 6] = [1.0, 0.66, 0.54, 0.38, 0.25, 0.12];
const PROJ_POWER_CONS: [f64; 6] = [1.0, 0.71, 0.52, 0.39, 0.29, 0.22];
const AREA_SCALE: [f64; 6] = [1.0, 0.5, 0.25, 0.125, 0.0625, 0.03125];

/// ITRS 2009 high performance device threshold voltages, normalized to 45nm when used
const VT_ITRS: [f64; 6] = [0.33, 0.297, 0.2673, 0.2409, 0.2178, 0.198];

// PTM tables, indexed by `TechNode::ptm_idx`
const PTM_VDD_HKMGS: [f64; 4] = [1.0, 0.9, 0.8, 0.7];
const PTM_VDD_LP: [f64; 4] = [1.1, 1.0, 0.95, 0.9];
const PTM_VT_HKMGS: [f64; 4] = [0.424, 0.466, 0.508, 0.504];
const PTM_VT_LP: [f64; 4] = [0.622, 0.647, 0.707, 0.710];
const PTM_FREQ_HKMGS: [f64; 4] = [1.0, 1.10, 1.14, 1.15];
const PTM_DP_HKMGS: [f64; 4] = [1.0, 0.525, 0.239, 0.117];
const PTM_SP_HKMGS: [f64; 4] = [1.0, 0.567, 0.324, 0.492];

// Low power process, relative to `HKMGS`
const LP_FREQ: [f64; 4] = [0.298, 0.292, 0.248, 0.235];
const LP_DP: [f64; 4] = [0.337, 0.34, 0.331, 0.361];
const LP_SP: [f64; 4] = [3.34e-3, 0.01, 0.037, 0.076];

/// Returns the area scaling factor of `node`, relative to 45nm
pub const fn area_scale(node: TechNode) -> f64 {
	AREA_SCALE[node.idx()]
}

/// Returns the PTM table index of `node`, or an error if `mech` wasn't simulated for it.
fn ptm_idx(mech: Mech, node: TechNode) -> Result<usize, anyhow::Error> {
	node.ptm_idx()
		.ok_or_else(|| anyhow::anyhow!("No {mech} circuit simulation for {node}"))
}

/// Frequency and (dynamic) power scaling factors of `node`, relative to 45nm.
///
/// Used by the accelerator models, which don't support `LP`.
pub fn ucore_scale(mech: Mech, node: TechNode) -> Result<(f64, f64), anyhow::Error> {
	match mech {
		Mech::Itrs => Ok((PROJ_FREQ_ITRS[node.idx()], PROJ_POWER_ITRS[node.idx()])),
		Mech::Cons => Ok((PROJ_FREQ_CONS[node.idx()], PROJ_POWER_CONS[node.idx()])),
		Mech::Hkmgs => {
			let idx = self::ptm_idx(mech, node)?;
			Ok((PTM_FREQ_HKMGS[idx], PTM_DP_HKMGS[idx]))
		},
		Mech::Lp => anyhow::bail!("U-cores do not support LP processes"),
	}
}

/// Technology point.
///
/// Nominal characteristics of a core type under a scaling mechanism at a node.
#[derive(PartialEq, Clone, Copy, Debug)]
pub struct TechPoint {
	/// Scaling mechanism
	pub mech: Mech,

	/// Core type
	pub ctype: CoreType,

	/// Node
	pub node: TechNode,

	/// Nominal supply voltage (V)
	pub v0: f64,

	/// Nominal frequency (GHz)
	pub f0: f64,

	/// Dynamic power at nominal voltage/frequency (W)
	pub dp0: f64,

	/// Static power at nominal voltage (W)
	pub sp0: f64,

	/// Threshold voltage (V)
	pub vt: f64,

	/// Area (mm^2)
	pub area: f64,

	/// Performance at nominal frequency.
	///
	/// Follows Pollack's rule, `sqrt(base area) * f0`.
	pub perf0: f64,
}

impl TechPoint {
	/// Looks up the technology point of `ctype` under `mech` at `node`.
	///
	/// # Errors
	/// Returns an error if the tables have no entry for `(mech, node)`.
	pub fn lookup(mech: Mech, ctype: CoreType, node: TechNode) -> Result<Self, anyhow::Error> {
		let idx = node.idx();
		let (v0, f0, dp0, sp0, vt) = match mech {
			Mech::Itrs | Mech::Cons => {
				let (vdd, freq, power) = match mech {
					Mech::Itrs => (PROJ_VDD_ITRS, PROJ_FREQ_ITRS, PROJ_POWER_ITRS),
					_ => (PROJ_VDD_CONS, PROJ_FREQ_CONS, PROJ_POWER_CONS),
				};
				(
					base::VDD * vdd[idx],
					base::freq(ctype) * freq[idx],
					base::dp(ctype) * power[idx],
					base::sp(ctype) * power[idx],
					base::VT * VT_ITRS[idx] / VT_ITRS[TechNode::N45.idx()],
				)
			},
			Mech::Hkmgs => {
				let idx = self::ptm_idx(mech, node)?;
				(
					PTM_VDD_HKMGS[idx],
					base::freq(ctype) * PTM_FREQ_HKMGS[idx],
					base::dp(ctype) * PTM_DP_HKMGS[idx],
					base::sp(ctype) * PTM_SP_HKMGS[idx],
					PTM_VT_HKMGS[idx],
				)
			},
			// Note: `LP` scales relative to `HKMGS` at the same node
			Mech::Lp => {
				let idx = self::ptm_idx(mech, node)?;
				(
					PTM_VDD_LP[idx],
					base::freq(ctype) * PTM_FREQ_HKMGS[idx] * LP_FREQ[idx],
					base::dp(ctype) * PTM_DP_HKMGS[idx] * LP_DP[idx],
					base::sp(ctype) * PTM_SP_HKMGS[idx] * LP_SP[idx],
					PTM_VT_LP[idx],
				)
			},
		};

		Ok(Self {
			mech,
			ctype,
			node,
			v0,
			f0,
			dp0,
			sp0,
			vt,
			area: base::area(ctype) * AREA_SCALE[idx],
			perf0: base::area(ctype).sqrt() * f0,
		})
	}
}

#[cfg(test)]
mod tests {
	use {super::*, hetsim_util::ApproxEq};

	#[test]
	fn node_round_trips_through_nm() {
		for node in TechNode::ALL {
			assert_eq!(TechNode::from_nm(node.nm()), Some(node));
		}
		assert_eq!(TechNode::from_nm(7), None);
		assert_eq!("16nm".parse::<TechNode>().unwrap(), TechNode::N16);
		assert_eq!(serde_json::to_string(&TechNode::N22).unwrap(), "22");
		assert_eq!(serde_json::from_str::<TechNode>("32").unwrap(), TechNode::N32);
		assert!(serde_json::from_str::<TechNode>("33").is_err());
	}

	#[test]
	fn hkmgs_16nm_io() {
		let point = TechPoint::lookup(Mech::Hkmgs, CoreType::Io, TechNode::N16).unwrap();
		assert!(point.v0.approx_eq(0.7));
		assert!(point.f0.approx_eq(4.2 * 1.15));
		assert!(point.dp0.approx_eq(6.14 * 0.117));
		assert!(point.sp0.approx_eq(1.058 * 0.492));
		assert!(point.area.approx_eq(7.65 * 0.125));
		assert!(point.perf0.approx_eq(7.65_f64.sqrt() * 4.2 * 1.15));
	}

	#[test]
	fn lp_scales_relative_to_hkmgs() {
		let point = TechPoint::lookup(Mech::Lp, CoreType::O3, TechNode::N32).unwrap();
		assert!(point.v0.approx_eq(1.0));
		assert!(point.f0.approx_eq(3.7 * 1.10 * 0.292));
		assert!(point.sp0.approx_eq(5.34 * 0.567 * 0.01));
	}

	#[test]
	fn ptm_missing_nodes_fail() {
		assert!(TechPoint::lookup(Mech::Hkmgs, CoreType::Io, TechNode::N11).is_err());
		assert!(TechPoint::lookup(Mech::Lp, CoreType::Io, TechNode::N8).is_err());
		assert!(TechPoint::lookup(Mech::Itrs, CoreType::Io, TechNode::N8).is_ok());
	}

	#[test]
	fn device_scales() {
		let scale = DeviceScale::lookup(Device::Tfet, 22).unwrap();
		assert!(scale.vnom.approx_eq(0.4));
		assert!(scale.fnom.approx_eq(0.7945));

		let scale = DeviceScale::lookup(Device::Finfet, 7).unwrap();
		assert!(scale.area.approx_eq(0.1225));
		assert!(scale.perf.approx_eq(scale.fnom));

		for device in Device::ALL {
			assert_eq!(device.nodes().len(), device.scale_table().len());
			assert_eq!(device.name().parse::<Device>().unwrap(), device);
		}
		assert!(DeviceScale::lookup(Device::Tfet, 10).is_err());
		assert!(DeviceScale::lookup(Device::Finfet, 22).is_err());
		assert_eq!(serde_json::to_string(&Device::Finfet).unwrap(), r#""FinFET""#);
	}

	#[test]
	fn projection_vt_is_normalized() {
		let point = TechPoint::lookup(Mech::Cons, CoreType::Io, TechNode::N45).unwrap();
		assert!(point.vt.approx_eq(base::VT));
		assert!(ucore_scale(Mech::Lp, TechNode::N45).is_err());
	}
}
