//! Synthetic circuit datasets.
//!
//! Smooth stand-ins for circuit simulation results, following an alpha-power
//! law drive current with an EKV-like interpolation into sub-threshold.

// Imports
use {
	super::{McDataset, RefDataset},
	crate::tech::{self, CoreType, Device, DeviceScale, Mech, TechNode},
};

/// Thermal voltage at room temperature (V)
const THERMAL_VOLTAGE: f64 = 0.026;

/// Sub-threshold slope factor
const SLOPE_FACTOR: f64 = 1.5;

/// Velocity saturation exponent
const ALPHA: f64 = 1.3;

/// Lowest simulated supply voltage (V)
pub const VDD_MIN: f64 = 0.2;

/// Highest simulated supply voltage (V)
pub const VDD_MAX: f64 = 1.5;

/// Supply voltage step (V)
pub const VDD_STEP: f64 = 0.025;

/// Synthetic circuit parameters
#[derive(PartialEq, Clone, Copy, Debug)]
pub struct Params {
	/// Threshold voltage (V)
	pub vt: f64,

	/// Leakage slope (decades per volt)
	pub sp_slope: f64,

	/// Leakage at 0V
	pub sp_scale: f64,

	/// Relative frequency sigma, far above threshold
	pub sigma: f64,
}

impl Params {
	/// Parameters of the PTM circuit under `mech` at `node`
	pub fn ptm(mech: Mech, node: TechNode) -> Result<Self, anyhow::Error> {
		let point = tech::TechPoint::lookup(mech, CoreType::Io, node)?;
		let (sp_slope, sp_scale) = match mech {
			Mech::Lp => (1.6, 1e-10),
			_ => (1.0, 1e-7),
		};

		Ok(Self {
			vt: point.vt,
			sp_slope,
			sp_scale,
			// Note: Smaller devices vary more
			sigma: 0.02 / tech::area_scale(node).sqrt().sqrt(),
		})
	}

	/// Parameters of the circuit built with `device` at `nm`
	pub fn device(device: Device, nm: u32) -> Result<Self, anyhow::Error> {
		let scale = DeviceScale::lookup(device, nm)?;
		let params = match device {
			// Note: Tunnel FETs switch well below their nominal supply
			Device::Tfet => Self {
				vt:       0.12,
				sp_slope: 0.5,
				sp_scale: 1e-9,
				sigma:    0.02,
			},
			Device::Finfet => Self {
				vt:       0.4 * scale.vnom,
				sp_slope: 1.0,
				sp_scale: 1e-8,
				sigma:    0.02,
			},
		};

		Ok(params)
	}

	/// Parameters of the 45nm commercial inverter chain
	pub fn inv() -> Self {
		Self {
			vt:       0.5,
			sp_slope: 1.2,
			sp_scale: 1e-8,
			sigma:    0.02,
		}
	}

	/// Supply voltages that get simulated, from highest to lowest
	pub fn vdds() -> impl Iterator<Item = f64> {
		let steps = ((VDD_MAX - VDD_MIN) / VDD_STEP).round() as u32;
		(0..=steps).map(|step| VDD_MAX - f64::from(step) * VDD_STEP)
	}

	/// Frequency at `vdd`
	pub fn freq(&self, vdd: f64) -> f64 {
		let overdrive = (vdd - self.vt) / (2.0 * SLOPE_FACTOR * THERMAL_VOLTAGE);
		let drive = overdrive.exp().ln_1p().powf(ALPHA);
		drive / vdd
	}

	/// Relative frequency sigma at `vdd`, growing near and below threshold
	pub fn sigma_at(&self, vdd: f64) -> f64 {
		self.sigma * (1.0 + 2.0 / (1.0 + ((vdd - self.vt) / 0.1).exp()))
	}

	/// Generates the nominal dataset
	pub fn norm_dataset(&self) -> RefDataset {
		let mut dataset = RefDataset::default();
		for vdd in Self::vdds() {
			let freq = self.freq(vdd);
			dataset.vdd.push(vdd);
			dataset.freq.push(freq);
			dataset.dp.push(freq * vdd * vdd);
			dataset.sp.push(self.sp_scale * 10.0_f64.powf(vdd * self.sp_slope));
		}

		dataset
	}

	/// Generates the Monte-Carlo dataset
	pub fn mc_dataset(&self) -> McDataset {
		let mut dataset = McDataset::default();
		for vdd in Self::vdds() {
			let freq = self.freq(vdd);
			let sigma = self.sigma_at(vdd);
			dataset.vdd.push(vdd);
			dataset.freq_3sigma.push(freq * (1.0 - 3.0 * sigma));
			dataset.freq_min.push(freq * (1.0 - 4.0 * sigma));
			dataset.freq_mean.push(freq);
			dataset.freq_2sigma.push(freq * (1.0 - 2.0 * sigma));
			dataset.freq_sigma.push(freq * (1.0 - sigma));
		}

		dataset
	}
}
