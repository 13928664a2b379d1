//! Unconventional cores (accelerators)
//!
//! Accelerators are modelled relative to a baseline core (BCE), a Core i7-960
//! at 45nm. Their performance on a kernel is capped by their allocated area,
//! and optionally by a power and bandwidth budget.

// Imports
use {
	crate::{
		kernel::{AccKind, UCoreParam},
		tech::{self, Mech, TechNode},
	},
	anyhow::Context,
};

/// Area of the baseline core, without caches (mm^2)
pub const BCE_AREA: f64 = 24.125;

/// Performance of the baseline core (SPECfp2006)
pub const BCE_PERF: f64 = 43.5;

/// Power of the baseline core, excluding uncore components (W)
pub const BCE_POWER: f64 = 20.0;

/// Unconventional core
#[derive(PartialEq, Clone, Debug)]
pub struct UCore {
	/// Kind
	kind: AccKind,

	/// Scaling mechanism
	mech: Mech,

	/// Technology node
	tech: TechNode,

	/// Allocated area (mm^2)
	area: f64,

	/// Baseline area at this node
	a0: f64,

	/// Baseline performance at this node
	perf0: f64,

	/// Baseline power at this node
	p0: f64,

	/// Baseline bandwidth at this node
	bw0: f64,
}

impl UCore {
	/// Creates a new accelerator with `area`
	///
	/// # Errors
	/// Returns an error if `kind` isn't an accelerator or `(mech, tech)` isn't supported.
	pub fn new(kind: AccKind, mech: Mech, tech: TechNode, area: f64) -> Result<Self, anyhow::Error> {
		anyhow::ensure!(
			matches!(kind, AccKind::Asic | AccKind::Fpga | AccKind::Gpu),
			"{kind} is not an accelerator"
		);
		anyhow::ensure!(area >= 0.0, "Accelerator area must not be negative, found {area}");

		let (freq_scale, power_scale) =
			tech::ucore_scale(mech, tech).with_context(|| format!("Unable to scale {kind} to {mech} at {tech}"))?;

		Ok(Self {
			kind,
			mech,
			tech,
			area,
			a0: BCE_AREA * tech::area_scale(tech),
			perf0: BCE_PERF * freq_scale,
			p0: BCE_POWER * power_scale,
			bw0: freq_scale,
		})
	}

	/// Re-configures the technology and area.
	///
	/// # Errors
	/// Returns an error if the new technology isn't supported, in which case
	/// the accelerator is left unchanged.
	pub fn config(&mut self, mech: Option<Mech>, tech: Option<TechNode>, area: Option<f64>) -> Result<(), anyhow::Error> {
		*self = Self::new(
			self.kind,
			mech.unwrap_or(self.mech),
			tech.unwrap_or(self.tech),
			area.unwrap_or(self.area),
		)?;
		Ok(())
	}

	/// Returns the performance running a kernel with `param`.
	///
	/// The effective area is limited by `power` and `bandwidth`, when given.
	pub fn perf(&self, param: &UCoreParam, power: Option<f64>, bandwidth: Option<f64>) -> f64 {
		let area_power = power.map_or(f64::INFINITY, |power| power / self.p0 / param.phi * self.a0);
		let area_bw = bandwidth.map_or(f64::INFINITY, |bandwidth| bandwidth / self.bw0 / param.bw * self.a0);
		let area_eff = area_power.min(area_bw).min(self.area);

		self.perf0 * (area_eff / self.a0) * param.miu
	}

	/// Returns the power consumed running a kernel with `param`, using all of its area
	pub fn power(&self, param: &UCoreParam) -> f64 {
		self.p0 * (self.area / self.a0) * param.phi
	}

	/// Returns the bandwidth consumed running a kernel with `param`, using all of its area
	pub fn bandwidth(&self, param: &UCoreParam) -> f64 {
		self.bw0 * (self.area / self.a0) * param.bw
	}

	/// Returns the kind
	pub fn kind(&self) -> AccKind {
		self.kind
	}

	/// Returns the scaling mechanism
	pub fn mech(&self) -> Mech {
		self.mech
	}

	/// Returns the technology node
	pub fn tech(&self) -> TechNode {
		self.tech
	}

	/// Returns the allocated area
	pub fn area(&self) -> f64 {
		self.area
	}

	/// Sets the allocated area
	pub fn set_area(&mut self, area: f64) {
		self.area = area;
	}
}
