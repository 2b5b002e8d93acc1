//! What gets drawn on top of a frame: corner outlines, projected pose axes, and the per-marker transforms
//! handed to a scene renderer.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use nalgebra as na;

use crate::pinhole::PinholeCamera;
use crate::pose::{EulerAngles, MarkerPose};

pub const OUTLINE_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
pub const ORIENTATION_CORNER_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const AXIS_COLORS: [Rgba<u8>; 3] = [
	Rgba([255, 0, 0, 255]),
	Rgba([0, 255, 0, 255]),
	Rgba([0, 0, 255, 255]),
];

/// Closed red polyline through `corners`, then a small green square on the first corner so the marker's
/// orientation can be read off the frame.
pub fn draw_marker_outline(image: &mut RgbaImage, corners: &[(f32, f32)]) {
	let Some(&(x0, y0)) = corners.first() else {
		return;
	};
	for (j, &start) in corners.iter().enumerate() {
		let end = corners[(j + 1) % corners.len()];
		draw_line_segment_mut(image, start, end, OUTLINE_COLOR);
	}
	let rect = Rect::at((x0 - 2.0).round() as i32, (y0 - 2.0).round() as i32).of_size(4, 4);
	draw_hollow_rect_mut(image, rect, ORIENTATION_CORNER_COLOR);
}

/// Projects the pose's x, y and z axes, each `axis_length` long in marker units, and draws them from the
/// marker center. Axes with an end behind the camera are left out.
pub fn draw_pose_axes(image: &mut RgbaImage, camera: &PinholeCamera, pose: &MarkerPose, axis_length: f32) {
	let Some(origin) = camera.project(&pose.translation) else {
		return;
	};
	// Z first so the in-plane axes stay visible where they overlap it.
	for axis in [2usize, 0, 1] {
		let mut tip = na::Vector3::<f32>::zeros();
		tip[axis] = axis_length;
		if let Some(end) = camera.project(&(pose.rotation * tip + pose.translation)) {
			draw_line_segment_mut(image, origin, end, AXIS_COLORS[axis]);
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayCandidate {
	Best,
	Alternative,
}

/// Placement of one overlay object for one frame.
#[derive(Clone, Debug)]
pub struct OverlayTransform {
	pub marker_id: usize,
	pub candidate: OverlayCandidate,
	pub position: na::Vector3<f32>,
	/// Pose rotation followed by the accumulated spin about the marker normal.
	pub rotation: na::Matrix3<f32>,
	/// Readout of the marker orientation itself, without spin.
	pub angles: EulerAngles,
	pub scale: f32,
	pub error: f32,
}

impl OverlayTransform {
	pub fn from_pose(marker_id: usize, candidate: OverlayCandidate, pose: &MarkerPose, spin: f32, scale: f32) -> Self {
		let spin = na::Rotation3::from_axis_angle(&na::Vector3::z_axis(), spin);
		Self {
			marker_id,
			candidate,
			position: pose.translation,
			rotation: pose.rotation * spin.matrix(),
			angles: pose.angles(),
			scale,
			error: pose.error,
		}
	}
}
