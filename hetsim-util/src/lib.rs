//! Utilities

// Modules
pub mod logger;

// Imports
use std::{cell::RefCell, fmt};

/// Default relative tolerance for [`ApproxEq::approx_eq`]
pub const APPROX_EQ_TOLERANCE: f64 = 1e-9;

/// Extension trait for comparing floating point values
#[extend::ext(name = ApproxEq)]
pub impl f64 {
	/// Returns if `self` and `other` are equal within [`APPROX_EQ_TOLERANCE`]
	fn approx_eq(self, other: f64) -> bool {
		self.approx_eq_tol(other, APPROX_EQ_TOLERANCE)
	}

	/// Returns if `self` and `other` are equal within relative tolerance `tol`.
	///
	/// The tolerance is scaled by the largest magnitude of both values.
	fn approx_eq_tol(self, other: f64, tol: f64) -> bool {
		(self - other).abs() <= self.abs().max(other.abs()) * tol
	}
}

/// [`fmt::Display`] helper to display using a `FnMut(&mut fmt::Formatter)`
pub struct DisplayWrapper<F: FnMut(&mut fmt::Formatter) -> fmt::Result>(RefCell<F>);

impl<F: FnMut(&mut fmt::Formatter) -> fmt::Result> DisplayWrapper<F> {
	/// Creates a new display wrapper
	#[must_use]
	pub const fn new(func: F) -> Self {
		Self(RefCell::new(func))
	}
}

impl<F: FnMut(&mut fmt::Formatter) -> fmt::Result> fmt::Display for DisplayWrapper<F> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		// Note: `f` cannot be re-entrant, so this cannot fail
		self.0.borrow_mut()(f)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn approx_eq_scales_with_magnitude() {
		assert!(1e9_f64.approx_eq(1e9 + 0.5));
		assert!(!1.0_f64.approx_eq(1.0 + 1e-6));
		assert!(0.0_f64.approx_eq(0.0));
		assert!(2.0_f64.approx_eq_tol(2.01, 1e-2));
	}

	#[test]
	fn display_wrapper_forwards() {
		let mut calls = 0;
		let wrapper = DisplayWrapper::new(|f| {
			calls += 1;
			write!(f, "cores: {}", 4)
		});
		assert_eq!(wrapper.to_string(), "cores: 4");
		drop(wrapper);
		assert_eq!(calls, 1);
	}
}
