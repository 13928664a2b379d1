//! Cubic spline

// Imports
use itertools::Itertools;

/// Natural cubic spline.
///
/// Interpolates owned samples with continuous second derivative and
/// zero curvature at both ends.
#[derive(PartialEq, Clone, Debug)]
pub struct CubicSpline {
	/// Sample positions, strictly increasing
	xs: Vec<f64>,

	/// Sample values
	ys: Vec<f64>,

	/// Second derivatives at each sample
	ms: Vec<f64>,
}

impl CubicSpline {
	/// Creates a new spline from `(x, y)` samples, in any order.
	///
	/// # Errors
	/// Returns an error if there are less than 2 samples, if any value isn't
	/// finite, or if two samples share the same position.
	pub fn new(samples: impl IntoIterator<Item = (f64, f64)>) -> Result<Self, anyhow::Error> {
		let mut samples = samples.into_iter().collect::<Vec<_>>();
		anyhow::ensure!(samples.len() >= 2, "Spline needs at least 2 samples, found {}", samples.len());
		anyhow::ensure!(
			samples.iter().all(|&(x, y)| x.is_finite() && y.is_finite()),
			"Spline samples must be finite"
		);

		samples.sort_by(|(lhs, _), (rhs, _)| lhs.total_cmp(rhs));
		if let Some(((x, _), _)) = samples.iter().tuple_windows().find(|((lhs, _), (rhs, _))| lhs == rhs) {
			anyhow::bail!("Spline samples must have unique positions, found {x} twice");
		}

		let (xs, ys): (Vec<_>, Vec<_>) = samples.into_iter().unzip();
		let ms = self::second_derivatives(&xs, &ys);

		Ok(Self { xs, ys, ms })
	}

	/// Returns the sampled range
	pub fn range(&self) -> (f64, f64) {
		(self.xs[0], self.xs[self.xs.len() - 1])
	}

	/// Evaluates the spline at `x`.
	///
	/// Outside of the sampled range, the closest end segment is extrapolated.
	pub fn eval(&self, x: f64) -> f64 {
		let idx = self
			.xs
			.partition_point(|&sample_x| sample_x <= x)
			.clamp(1, self.xs.len() - 1) -
			1;

		let (x0, x1) = (self.xs[idx], self.xs[idx + 1]);
		let (y0, y1) = (self.ys[idx], self.ys[idx + 1]);
		let (m0, m1) = (self.ms[idx], self.ms[idx + 1]);

		let h = x1 - x0;
		let a = (x1 - x) / h;
		let b = (x - x0) / h;
		a * y0 + b * y1 + ((a.powi(3) - a) * m0 + (b.powi(3) - b) * m1) * h * h / 6.0
	}
}

/// Solves the tridiagonal system for the second derivatives of a natural spline
fn second_derivatives(xs: &[f64], ys: &[f64]) -> Vec<f64> {
	let n = xs.len();
	let mut ms = vec![0.0; n];
	if n < 3 {
		return ms;
	}

	// Forward sweep over the interior rows
	let mut diag = vec![0.0; n];
	let mut rhs = vec![0.0; n];
	for i in 1..n - 1 {
		let h_prev = xs[i] - xs[i - 1];
		let h_next = xs[i + 1] - xs[i];
		diag[i] = 2.0 * (h_prev + h_next);
		rhs[i] = 6.0 * ((ys[i + 1] - ys[i]) / h_next - (ys[i] - ys[i - 1]) / h_prev);

		if i > 1 {
			let factor = h_prev / diag[i - 1];
			diag[i] -= factor * h_prev;
			rhs[i] -= factor * rhs[i - 1];
		}
	}

	// Back substitution
	for i in (1..n - 1).rev() {
		let h_next = xs[i + 1] - xs[i];
		ms[i] = (rhs[i] - h_next * ms[i + 1]) / diag[i];
	}

	ms
}

#[cfg(test)]
mod tests {
	use {super::*, hetsim_util::ApproxEq};

	#[test]
	fn interpolates_samples() {
		let samples = [(0.3, 1.0), (0.1, 5.0), (0.7, -2.0), (0.5, 0.5), (0.9, 3.0)];
		let spline = CubicSpline::new(samples).unwrap();
		for (x, y) in samples {
			assert!(spline.eval(x).approx_eq_tol(y, 1e-12), "Spline should pass through ({x}, {y})");
		}
		assert_eq!(spline.range(), (0.1, 0.9));
	}

	#[test]
	fn reproduces_lines() {
		let spline = CubicSpline::new((0..10).map(|idx| f64::from(idx)).map(|x| (x, 2.0 * x + 1.0))).unwrap();
		for x in [0.25, 3.5, 8.75, -1.0, 12.0] {
			assert!(spline.eval(x).approx_eq_tol(2.0 * x + 1.0, 1e-12));
		}
	}

	#[test]
	fn two_samples_are_linear() {
		let spline = CubicSpline::new([(1.0, 1.0), (2.0, 3.0)]).unwrap();
		assert!(spline.eval(1.5).approx_eq(2.0));
	}

	#[test]
	fn close_to_smooth_function() {
		let spline = CubicSpline::new((0..=40).map(|idx| f64::from(idx) * 0.05).map(|x| (x, x.exp()))).unwrap();
		for x in [0.33, 0.71, 1.23, 1.57] {
			assert!(spline.eval(x).approx_eq_tol(x.exp(), 1e-4));
		}
	}

	#[test]
	fn rejects_bad_samples() {
		assert!(CubicSpline::new([(1.0, 1.0)]).is_err());
		assert!(CubicSpline::new([(1.0, 1.0), (1.0, 2.0), (2.0, 0.0)]).is_err());
		assert!(CubicSpline::new([(1.0, f64::NAN), (2.0, 0.0)]).is_err());
	}
}
