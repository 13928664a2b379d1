//! Voltage to frequency scaling
//!
//! Frequency models are fitted to circuit simulation datasets with a
//! [`CubicSpline`] and re-scaled so that the nominal voltage maps to the
//! nominal frequency of the core being modelled.

// Modules
pub mod dataset;
pub mod source;
pub mod spline;
pub mod synth;

// Exports
pub use self::{
	dataset::{McDataset, RefDataset, SigmaLevel},
	source::{DataSource, DirSource, MemSource, DEFAULT_CKT},
	spline::CubicSpline,
};

// Imports
use {
	crate::tech::{Mech, TechNode},
	anyhow::Context,
};

/// Threshold voltage of the inverter chain used by projection scaling (V)
pub const INV_VT: f64 = 0.5;

/// Frequency scaling model
#[derive(Clone, Debug)]
pub struct FreqScaleModel {
	/// Nominal frequency curve
	spline: CubicSpline,

	/// Voltage offset applied before evaluating the curve
	v_translator: f64,

	/// Frequency factor applied after evaluating the curve
	f_translator: f64,

	/// Static power log-linear slope
	sp_slope: f64,

	/// Variation model, if any
	variation: Option<Variation>,
}

/// Process variation model
#[derive(Clone, Debug)]
struct Variation {
	/// Variation-limited frequency curve
	spline: CubicSpline,

	/// Fraction of the variation penalty that gets applied
	pen_adjust: f64,
}

impl FreqScaleModel {
	/// Creates a model from PTM circuit simulations of `ckt`.
	///
	/// The model is re-scaled so that `v0` runs at `f0`.
	pub fn ptm(
		source: &impl DataSource,
		ckt: &str,
		mech: Mech,
		node: TechNode,
		v0: f64,
		f0: f64,
	) -> Result<Self, anyhow::Error> {
		let dataset = source
			.norm_data(ckt, mech, node)
			.with_context(|| format!("Unable to get {ckt} dataset for {mech} at {node}"))?;
		let spline = CubicSpline::new(dataset.freq_samples()).context("Unable to fit frequency curve")?;
		let sp_slope = dataset.sp_slope().context("Unable to fit static power slope")?;

		let f_translator = self::translator(f0, spline.eval(v0))?;
		tracing::trace!(%mech, %node, v0, f0, f_translator, sp_slope, "Built PTM frequency model");

		Ok(Self {
			spline,
			v_translator: 0.0,
			f_translator,
			sp_slope,
			variation: None,
		})
	}

	/// Creates a model from PTM circuit simulations of `ckt`, with process variation.
	///
	/// The frequency curve is the same as [`FreqScaleModel::ptm`], but
	/// [`FreqScaleModel::penalty`] reports the `sigma`-level slowdown, scaled by `pen_adjust`.
	#[expect(clippy::too_many_arguments, reason = "Mirrors the variation parameters of a core")]
	pub fn ptm_with_variation(
		source: &impl DataSource,
		ckt: &str,
		mech: Mech,
		node: TechNode,
		v0: f64,
		f0: f64,
		pen_adjust: f64,
		sigma: SigmaLevel,
	) -> Result<Self, anyhow::Error> {
		let mut model = Self::ptm(source, ckt, mech, node, v0, f0)?;

		let dataset = source
			.mc_data(ckt, mech, node)
			.with_context(|| format!("Unable to get {ckt} Monte-Carlo dataset for {mech} at {node}"))?;
		let spline =
			CubicSpline::new(dataset.freq_samples(sigma)).context("Unable to fit variation frequency curve")?;
		model.variation = Some(Variation { spline, pen_adjust });

		Ok(model)
	}

	/// Creates a projection model for a core with threshold voltage `vt`.
	///
	/// Uses the over-drive voltage (`v - vt`) to translate the core's voltage onto
	/// the 45nm inverter chain, re-scaled so that `v0` runs at `f0`.
	pub fn projection(source: &impl DataSource, vt: f64, v0: f64, f0: f64) -> Result<Self, anyhow::Error> {
		let dataset = source.inv_data().context("Unable to get inverter chain dataset")?;
		let spline = CubicSpline::new(dataset.freq_samples()).context("Unable to fit frequency curve")?;
		let sp_slope = dataset.sp_slope().context("Unable to fit static power slope")?;

		let v_translator = vt - INV_VT;
		let f_translator = self::translator(f0, spline.eval(v0 - v_translator))?;
		tracing::trace!(vt, v0, f0, v_translator, f_translator, sp_slope, "Built projection frequency model");

		Ok(Self {
			spline,
			v_translator,
			f_translator,
			sp_slope,
			variation: None,
		})
	}

	/// Returns the frequency at `volt`.
	///
	/// Voltages outside of the simulated range are extrapolated.
	pub fn freq(&self, volt: f64) -> f64 {
		self.spline.eval(volt - self.v_translator) * self.f_translator
	}

	/// Returns the variation penalty at `volt`, as a fraction of the nominal frequency.
	///
	/// Models without variation have no penalty.
	pub fn penalty(&self, volt: f64) -> f64 {
		match &self.variation {
			Some(variation) => {
				let freq_nom = self.spline.eval(volt);
				let freq_mc = variation.spline.eval(volt);
				(freq_nom - (freq_nom - freq_mc) * variation.pen_adjust) / freq_nom
			},
			None => 1.0,
		}
	}

	/// Returns whether this model includes process variation
	pub fn has_variation(&self) -> bool {
		self.variation.is_some()
	}

	/// Returns the static power log-linear slope, in decades per volt
	pub fn sp_slope(&self) -> f64 {
		self.sp_slope
	}
}

/// Computes the factor mapping `f_ref` to `f0`
fn translator(f0: f64, f_ref: f64) -> Result<f64, anyhow::Error> {
	anyhow::ensure!(
		f_ref.is_finite() && f_ref > 0.0,
		"Reference frequency at nominal voltage must be positive, found {f_ref}"
	);
	Ok(f0 / f_ref)
}

#[cfg(test)]
mod tests {
	use {super::*, crate::tech::TechPoint, crate::tech::CoreType, hetsim_util::ApproxEq};

	#[test]
	fn ptm_hits_nominal() {
		let source = MemSource::synthetic().unwrap();
		for mech in [Mech::Hkmgs, Mech::Lp] {
			for node in TechNode::PTM {
				let point = TechPoint::lookup(mech, CoreType::Io, node).unwrap();
				let model = FreqScaleModel::ptm(&source, DEFAULT_CKT, mech, node, point.v0, point.f0).unwrap();
				assert!(model.freq(point.v0).approx_eq(point.f0), "{mech} at {node}");
				assert!(model.freq(point.v0 * 0.8) < point.f0);
				assert_eq!(model.penalty(point.v0), 1.0);
			}
		}
	}

	#[test]
	fn projection_hits_nominal() {
		let source = MemSource::synthetic().unwrap();
		for mech in [Mech::Itrs, Mech::Cons] {
			for node in TechNode::ALL {
				let point = TechPoint::lookup(mech, CoreType::O3, node).unwrap();
				let model = FreqScaleModel::projection(&source, point.vt, point.v0, point.f0).unwrap();
				assert!(model.freq(point.v0).approx_eq(point.f0), "{mech} at {node}");
			}
		}
	}

	#[test]
	fn variation_penalty() {
		let source = MemSource::synthetic().unwrap();
		let point = TechPoint::lookup(Mech::Hkmgs, CoreType::Io, TechNode::N22).unwrap();
		let build = |pen_adjust| {
			FreqScaleModel::ptm_with_variation(
				&source,
				DEFAULT_CKT,
				Mech::Hkmgs,
				TechNode::N22,
				point.v0,
				point.f0,
				pen_adjust,
				SigmaLevel::Three,
			)
			.unwrap()
		};

		let full = build(1.0);
		let half = build(0.5);
		assert!(full.has_variation());

		let penalty = full.penalty(point.v0);
		assert!(penalty > 0.0 && penalty < 1.0);
		assert!((1.0 - half.penalty(point.v0)).approx_eq_tol((1.0 - penalty) / 2.0, 1e-9));
		assert!(build(0.0).penalty(point.v0).approx_eq(1.0));

		// Variation doesn't change the nominal curve
		assert!(full.freq(point.v0).approx_eq(point.f0));
		assert!(full.penalty(0.4) < penalty, "Variation should be worse near threshold");
	}

	#[test]
	fn missing_dataset_fails() {
		let source = MemSource::new();
		assert!(FreqScaleModel::ptm(&source, DEFAULT_CKT, Mech::Hkmgs, TechNode::N45, 1.0, 4.2).is_err());
		assert!(FreqScaleModel::projection(&source, 0.45, 1.0, 4.2).is_err());

		let source = MemSource::synthetic().unwrap();
		assert!(FreqScaleModel::ptm(&source, "mult", Mech::Hkmgs, TechNode::N45, 1.0, 4.2).is_err());
		assert!(FreqScaleModel::ptm_with_variation(
			&source,
			DEFAULT_CKT,
			Mech::Hkmgs,
			TechNode::N11,
			1.0,
			4.2,
			1.0,
			SigmaLevel::One
		)
		.is_err());
	}
}
