//! System budget

// Imports
use {crate::tech::TechNode, std::collections::BTreeMap};

/// System budget
#[derive(PartialEq, Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Budget {
	/// Area (mm^2)
	pub area: f64,

	/// Power (W)
	pub power: f64,

	/// Off-chip bandwidth per node (GB/s)
	#[serde(default)]
	pub bw: BTreeMap<TechNode, f64>,
}

impl Budget {
	/// Names of all presets, for [`Budget::preset`]
	pub const PRESETS: [&'static str; 4] = ["large", "medium", "small", "large-ideal-bw"];

	/// Creates a new budget
	pub fn new(area: f64, power: f64, bw: impl IntoIterator<Item = (TechNode, f64)>) -> Self {
		Self {
			area,
			power,
			bw: bw.into_iter().collect(),
		}
	}

	/// Large system budget
	pub fn large() -> Self {
		Self::new(200.0, 120.0, Self::ptm_bw([180.0, 198.0, 234.0, 252.0]))
	}

	/// Medium system budget
	pub fn medium() -> Self {
		Self::new(130.0, 65.0, Self::ptm_bw([117.0, 129.0, 152.0, 164.0]))
	}

	/// Small system budget
	pub fn small() -> Self {
		Self::new(107.0, 33.0, Self::ptm_bw([96.0, 106.0, 125.0, 135.0]))
	}

	/// Large system budget without any practical bandwidth limit
	pub fn large_ideal_bw() -> Self {
		Self::new(200.0, 120.0, Self::ptm_bw([1000.0; 4]))
	}

	/// Looks up a preset by name
	pub fn preset(name: &str) -> Result<Self, anyhow::Error> {
		match name {
			"large" => Ok(Self::large()),
			"medium" => Ok(Self::medium()),
			"small" => Ok(Self::small()),
			"large-ideal-bw" => Ok(Self::large_ideal_bw()),
			_ => anyhow::bail!("Unknown budget {name:?}, expected one of {:?}", Self::PRESETS),
		}
	}

	/// Returns the bandwidth available at `node`
	pub fn bandwidth(&self, node: TechNode) -> Result<f64, anyhow::Error> {
		self.bw
			.get(&node)
			.copied()
			.ok_or_else(|| anyhow::anyhow!("Budget has no bandwidth entry for {node}"))
	}

	/// Zips the PTM nodes with `bw`
	fn ptm_bw(bw: [f64; 4]) -> impl Iterator<Item = (TechNode, f64)> {
		TechNode::PTM.into_iter().zip(bw)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn presets() {
		for name in Budget::PRESETS {
			let budget = Budget::preset(name).unwrap();
			assert_eq!(budget.bw.len(), 4, "Preset {name} should cover all PTM nodes");
		}

		let large = Budget::large();
		assert_eq!((large.area, large.power), (200.0, 120.0));
		assert_eq!(large.bandwidth(TechNode::N22).unwrap(), 234.0);
		assert_eq!(Budget::large_ideal_bw().bandwidth(TechNode::N16).unwrap(), 1000.0);
		assert!(Budget::preset("huge").is_err());
	}

	#[test]
	fn missing_bandwidth() {
		assert!(Budget::small().bandwidth(TechNode::N11).is_err());
		assert!(Budget::new(10.0, 10.0, []).bandwidth(TechNode::N45).is_err());
	}

	#[test]
	fn json_uses_node_keys() {
		let json = serde_json::to_value(Budget::medium()).unwrap();
		assert_eq!(json["bw"]["32"], 129.0);

		let budget = serde_json::from_str::<Budget>(r#"{ "area": 50, "power": 20, "bw": { "45": 10 } }"#).unwrap();
		assert_eq!(budget.bandwidth(TechNode::N45).unwrap(), 10.0);
	}
}
