//! Dim silicon
//!
//! A throughput array of identical cores, of which only as many are active
//! (and at a voltage low enough) as the power budget allows.

// Imports
use {
	super::{perf_base, VMIN, VSF_MAX, V_PRECISION},
	crate::core::Core,
};

/// Dim silicon operating point
#[derive(PartialEq, Clone, Copy, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct DimPerf {
	/// Active cores
	pub cnum: usize,

	/// Supply voltage of the active cores (V)
	pub vdd: f64,

	/// Percentage of cores active
	pub util: f64,

	/// Throughput, normalized to the base performance
	pub perf: f64,
}

/// Finds the highest voltage in `[vmin, vmax]` at which `core` consumes at most `budget`.
///
/// The result is within [`V_PRECISION`] of the boundary. Returns `None` if
/// the budget is exceeded even at `vmin`.
pub fn max_vdd_within(core: &Core, vmin: f64, vmax: f64, budget: f64) -> Option<f64> {
	if core.power_at(vmin) > budget {
		return None;
	}

	let (mut vl, mut vr) = (vmin, vmax.max(vmin));
	while vr - vl > V_PRECISION {
		let vm = (vl + vr) / 2.0;
		match core.power_at(vm) > budget {
			true => vr = vm,
			false => vl = vm,
		}
	}

	match core.power_at(vr) <= budget {
		true => Some(vr),
		false => Some(vl),
	}
}

/// Returns the maximum number of `core`s that fit in `area`
pub fn max_cnum(core: &Core, area: f64) -> usize {
	(area / core.area()).floor().max(0.0) as usize
}

/// Returns the dim silicon performance with `cnum` active cores.
///
/// Returns `None` if `cnum` is zero or more cores than fit in `area`.
/// If `cnum` cores exceed `power` even at `vmin`, the returned point
/// has fewer active cores than requested.
pub fn perf_by_cnum(core: &Core, area: f64, power: f64, cnum: usize, vmin: f64) -> Option<DimPerf> {
	let cnum_max = self::max_cnum(core, area);
	if cnum == 0 || cnum > cnum_max {
		return None;
	}

	let vmin = match vmin < VMIN {
		true => {
			tracing::warn!(vmin, "Minimum voltage is below {VMIN}V, clamping");
			VMIN
		},
		false => vmin,
	};

	let cpower = power / cnum as f64;
	let dim = match self::max_vdd_within(core, vmin, core.v0() * VSF_MAX, cpower) {
		Some(vdd) => DimPerf {
			cnum,
			vdd,
			util: 100.0 * cnum as f64 / cnum_max as f64,
			perf: cnum as f64 * core.perf_at(vdd) / perf_base(),
		},
		None => {
			let active = cnum_max.min((power / core.power_at(vmin)).floor() as usize);
			tracing::trace!(cnum, active, vmin, "Power budget not met at minimum voltage");
			DimPerf {
				cnum: active,
				vdd:  vmin,
				util: 100.0 * active as f64 / cnum_max as f64,
				perf: active as f64 * core.perf_at(vmin) / perf_base(),
			}
		},
	};

	Some(dim)
}

/// Finds the number of active cores with the highest dim silicon performance.
///
/// Scans upwards from a single core, stopping at the first count that can't
/// meet the power budget. Ties keep the lowest count.
///
/// # Errors
/// Returns an error if not even a single core fits the budget.
pub fn opt(core: &Core, area: f64, power: f64, vmin: f64) -> Result<DimPerf, anyhow::Error> {
	let mut best = None::<DimPerf>;
	for cnum in 1..=self::max_cnum(core, area) {
		let Some(dim) = self::perf_by_cnum(core, area, power, cnum, vmin) else {
			break;
		};
		if dim.cnum < cnum {
			break;
		}

		if best.map_or(true, |best| dim.perf > best.perf) {
			best = Some(dim);
		}
	}

	let best = best.ok_or_else(|| {
		anyhow::anyhow!(
			"No feasible dim silicon configuration for core with area {} within {area}mm^2 and {power}W",
			core.area()
		)
	})?;
	tracing::debug!(?best, "Found optimal dim silicon configuration");

	Ok(best)
}

#[cfg(test)]
mod tests {
	use {
		super::*,
		crate::{
			core::CoreSpec,
			freq::MemSource,
			tech::{CoreType, Mech, TechNode},
		},
	};

	fn core() -> Core {
		let source = MemSource::synthetic().unwrap();
		Core::new(&source, CoreSpec::new(CoreType::Io, Mech::Hkmgs, TechNode::N16)).unwrap()
	}

	#[test]
	fn bisection_stays_within_budget() {
		let core = core();
		let vmax = core.v0() * VSF_MAX;
		for budget in [0.05, 0.2, 0.5, 1.0, 2.0] {
			let Some(vdd) = max_vdd_within(&core, VMIN, vmax, budget) else {
				assert!(core.power_at(VMIN) > budget);
				continue;
			};
			assert!((VMIN..=vmax).contains(&vdd), "{vdd} outside of [{VMIN}, {vmax}]");
			assert!(core.power_at(vdd) <= budget);

			// Either we hit the top, or slightly above we exceed the budget
			assert!(vdd + 2.0 * V_PRECISION >= vmax || core.power_at(vdd + 2.0 * V_PRECISION) > budget);
		}
	}

	#[test]
	fn bisection_infeasible() {
		let core = core();
		assert_eq!(max_vdd_within(&core, VMIN, core.v0() * VSF_MAX, 0.0), None);
	}

	#[test]
	fn cnum_bounds() {
		let core = core();
		assert_eq!(perf_by_cnum(&core, 200.0, 120.0, 0, VMIN), None);
		assert_eq!(perf_by_cnum(&core, 200.0, 120.0, max_cnum(&core, 200.0) + 1, VMIN), None);

		let dim = perf_by_cnum(&core, 200.0, 120.0, 1, VMIN).unwrap();
		assert_eq!(dim.cnum, 1);
		assert!((dim.vdd - core.v0() * VSF_MAX).abs() <= V_PRECISION);
	}

	#[test]
	fn infeasible_reduces_active_cores() {
		let core = core();
		let cnum = max_cnum(&core, 200.0);
		let power = core.power_at(VMIN) * (cnum as f64 / 2.0);

		let dim = perf_by_cnum(&core, 200.0, power, cnum, VMIN).unwrap();
		assert!(dim.cnum < cnum);
		assert_eq!(dim.vdd, VMIN);
	}

	#[test]
	fn optimum_beats_neighbours() {
		let core = core();
		let best = opt(&core, 200.0, 120.0, VMIN).unwrap();

		for cnum in [best.cnum - 1, best.cnum + 1] {
			let Some(dim) = perf_by_cnum(&core, 200.0, 120.0, cnum, VMIN) else {
				continue;
			};
			if dim.cnum == cnum {
				assert!(best.perf >= dim.perf, "{cnum} cores beat the optimum: {dim:?} > {best:?}");
			}
		}
	}

	#[test]
	fn no_room_fails() {
		let core = core();
		assert!(opt(&core, core.area() / 2.0, 120.0, VMIN).is_err());
	}
}
