use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dictionaries::DistanceMetric;
use crate::error::Result;

/// Settings for one AR session. Every field is optional in JSON; missing ones take the defaults below.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
	/// Printed marker side length in millimeters. Translations come out in the same unit.
	pub model_size_mm: f32,
	/// How many codes to keep from the dictionary.
	pub marker_count: usize,
	/// Built-in dictionary name, see `ARDictionary::new_from_named_dict`.
	pub dictionary: String,
	pub distance_metric: DistanceMetric,
	pub draw_outlines: bool,
	/// Emit an overlay for the runner-up pose too.
	pub show_alternative: bool,
	/// Radians the overlay spins about the marker normal each frame.
	pub overlay_spin_step: f32,
	pub max_refinement_iterations: u32,
	/// Mean interior angle error in degrees at which pose refinement is considered converged.
	pub convergence_error: f32,
	/// Stop the loop after this many frames.
	pub max_frames: Option<u64>,
}

impl Default for SessionConfig {
	fn default() -> Self {
		SessionConfig {
			model_size_mm: 150.0,
			marker_count: 10,
			dictionary: "ARUCO".to_string(),
			distance_metric: DistanceMetric::Plain,
			draw_outlines: true,
			show_alternative: true,
			overlay_spin_step: 0.0,
			max_refinement_iterations: 100,
			convergence_error: 2.0,
			max_frames: None,
		}
	}
}

impl SessionConfig {
	pub fn from_json_str(json: &str) -> Result<Self> {
		Ok(serde_json::from_str(json)?)
	}

	pub fn load(path: &Path) -> Result<Self> {
		let contents = fs::read_to_string(path)?;
		Self::from_json_str(&contents)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ArError;

	#[test]
	fn test_partial_json_uses_defaults() {
		let config = SessionConfig::from_json_str(r#"{"marker_count": 4, "distance_metric": "RotationInvariant"}"#).unwrap();
		assert_eq!(config.marker_count, 4);
		assert_eq!(config.distance_metric, DistanceMetric::RotationInvariant);
		assert_eq!(config.model_size_mm, 150.0);
		assert_eq!(config.dictionary, "ARUCO");
		assert_eq!(config.max_frames, None);
	}

	#[test]
	fn test_round_trip_and_errors() {
		let config = SessionConfig { max_frames: Some(3), ..Default::default() };
		let json = serde_json::to_string(&config).unwrap();
		assert_eq!(SessionConfig::from_json_str(&json).unwrap(), config);
		assert!(matches!(SessionConfig::from_json_str("{not json"), Err(ArError::Config(_))));
		assert!(matches!(SessionConfig::load(Path::new("/definitely/not/here.json")), Err(ArError::Io(_))));
	}
}
