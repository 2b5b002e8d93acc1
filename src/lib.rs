mod aruco;
mod config;
mod dictionaries;
mod error;
pub mod overlay;
mod pinhole;
mod pose;
pub mod selection;
mod session;

pub use aruco::{FrameDetector, Marker};
pub use config::SessionConfig;
pub use dictionaries::{rotate_code, ARDictionary, DistanceMetric};
pub use error::{ArError, Result};
pub use overlay::{OverlayCandidate, OverlayTransform};
pub use pinhole::PinholeCamera;
pub use pose::{estimate_pose, EulerAngles, MarkerPose, PlanarPoseSolver, PoseEstimate, PoseEstimator};
pub use selection::{select_markers, Selection};
pub use session::{ArSession, FrameReport, FrameSource, PosedMarker, RenderTarget, RunSummary, StopHandle, StopReason, Tick};

pub(crate) fn hamming_distance(a: u64, b: u64) -> u8 {
	(a ^ b).count_ones() as u8
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_hamming_distance() {
		// Zero distance for the same numbers.
		for i in 0..255 {
			assert_eq!(hamming_distance(i as u64, i as u64), 0);
		}

		assert_eq!(hamming_distance(0xFFFFFFFF as u64, 0x0 as u64), 32);
		assert_eq!(hamming_distance(0x0 as u64, 0xFFFFFFFF_FFFFFFFF as u64), 64);

		// Test the highest bits.
		assert_eq!(hamming_distance(0b10000000_00000000_00000000_00000000, 0b01000000_00000000_00000000_00000000), 2);
		assert_eq!(hamming_distance(1 << 63, 0), 1);
	}
}
