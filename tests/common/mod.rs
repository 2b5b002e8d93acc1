#![allow(dead_code)]

pub mod software_renderer;

use std::collections::VecDeque;

use fiducial_overlay::{
	ARDictionary, ArError, FrameDetector, FrameReport, FrameSource, Marker, MarkerPose, OverlayTransform, PinholeCamera,
	RenderTarget, Result, StopHandle, Tick,
};
use image::RgbaImage;
use nalgebra as na;

pub use software_renderer::{blank_frame, ground_truth_corners, render_marker, INK, PAPER};

pub fn init_logging() {
	let _ = env_logger::builder().is_test(true).try_init();
}

/// Plays back a fixed list of ticks, then reports closed.
pub struct ScriptedSource {
	pub size: std::result::Result<(u32, u32), String>,
	pub ticks: VecDeque<Tick>,
	pub opened: usize,
	pub ticks_requested: usize,
}

impl ScriptedSource {
	pub fn new(width: u32, height: u32, ticks: Vec<Tick>) -> Self {
		Self { size: Ok((width, height)), ticks: ticks.into(), opened: 0, ticks_requested: 0 }
	}

	pub fn failing(reason: &str) -> Self {
		Self {
			size: Err(reason.to_string()),
			ticks: VecDeque::new(),
			opened: 0,
			ticks_requested: 0,
		}
	}
}

impl FrameSource for ScriptedSource {
	fn open(&mut self) -> Result<(u32, u32)> {
		self.opened += 1;
		match &self.size {
			Ok(size) => Ok(*size),
			Err(reason) => Err(ArError::Acquisition(reason.clone())),
		}
	}

	fn next_tick(&mut self) -> Tick {
		self.ticks_requested += 1;
		self.ticks.pop_front().unwrap_or(Tick::Closed)
	}
}

/// Never runs dry: every tick is a blank frame.
pub struct EndlessSource {
	pub camera: PinholeCamera,
	pub ticks_requested: usize,
}

impl FrameSource for EndlessSource {
	fn open(&mut self) -> Result<(u32, u32)> {
		Ok((self.camera.image_width, self.camera.image_height))
	}

	fn next_tick(&mut self) -> Tick {
		self.ticks_requested += 1;
		Tick::Frame(blank_frame(&self.camera))
	}
}

/// Stands in for a real detector: hands back one prepared list of markers per frame, and repeats
/// `fallback` once the script is used up.
pub struct ScriptedDetector {
	pub dictionary: ARDictionary,
	pub frames: VecDeque<Vec<Marker>>,
	pub fallback: Vec<Marker>,
	pub frames_seen: usize,
}

impl ScriptedDetector {
	pub fn new(dictionary: ARDictionary, frames: Vec<Vec<Marker>>) -> Self {
		Self { dictionary, frames: frames.into(), fallback: vec![], frames_seen: 0 }
	}
}

impl FrameDetector for ScriptedDetector {
	fn dictionary(&self) -> &ARDictionary {
		&self.dictionary
	}

	fn dictionary_mut(&mut self) -> &mut ARDictionary {
		&mut self.dictionary
	}

	fn detect(&mut self, _frame: &RgbaImage) -> Vec<Marker> {
		self.frames_seen += 1;
		self.frames.pop_front().unwrap_or_else(|| self.fallback.clone())
	}
}

pub struct Presented {
	pub frame: RgbaImage,
	pub overlays: Vec<OverlayTransform>,
	pub report: FrameReport,
}

/// Keeps everything it is shown. Optionally raises a stop flag after a number of frames.
#[derive(Default)]
pub struct RecordingTarget {
	pub presented: Vec<Presented>,
	pub stop_after: Option<(usize, StopHandle)>,
}

impl RenderTarget for RecordingTarget {
	fn present(&mut self, frame: &RgbaImage, overlays: &[OverlayTransform], report: &FrameReport) {
		self.presented.push(Presented {
			frame: frame.clone(),
			overlays: overlays.to_vec(),
			report: report.clone(),
		});
		if let Some((count, stop)) = &self.stop_after {
			if self.presented.len() >= *count {
				stop.stop();
			}
		}
	}
}

pub fn rotation_angle_between(a: &na::Matrix3<f32>, b: &na::Matrix3<f32>) -> f32 {
	let cos = ((a.transpose() * b).trace() - 1.0) / 2.0;
	cos.clamp(-1.0, 1.0).acos().to_degrees()
}

pub fn pose_from_degrees(roll: f32, pitch: f32, yaw: f32, translation: (f32, f32, f32)) -> MarkerPose {
	MarkerPose {
		error: 0.0,
		rotation: na::Rotation3::from_euler_angles(roll.to_radians(), pitch.to_radians(), yaw.to_radians()).into_inner(),
		translation: na::Vector3::new(translation.0, translation.1, translation.2),
	}
}

#[test]
fn test_ground_truth_corners_fronto_parallel() {
	let camera = PinholeCamera::new(640, 480, 640.0);
	let pose = pose_from_degrees(0.0, 0.0, 0.0, (0.0, 0.0, 600.0));
	let corners = ground_truth_corners(&camera, &pose, 150.0).unwrap();
	assert_eq!(corners, vec![(240.0, 160.0), (400.0, 160.0), (400.0, 320.0), (240.0, 320.0)]);
	let behind = pose_from_degrees(0.0, 0.0, 0.0, (0.0, 0.0, -600.0));
	assert!(ground_truth_corners(&camera, &behind, 150.0).is_none());
}

#[test]
fn test_render_marker() {
	let camera = PinholeCamera::new(640, 480, 640.0);
	let dictionary = ARDictionary::new_from_named_dict("ARUCO").unwrap();
	let pose = pose_from_degrees(0.0, 0.0, 0.0, (0.0, 0.0, 600.0));
	let mut frame = blank_frame(&camera);
	render_marker(&mut frame, &camera, &dictionary, 0, &pose, 150.0);
	// The border cell in the upper left is ink, the paper around the marker is untouched.
	assert_eq!(*frame.get_pixel(250, 170), INK);
	assert_eq!(*frame.get_pixel(200, 100), PAPER);
	assert_eq!(*frame.get_pixel(10, 10), PAPER);

	// Every cell of code 0 has the same bits as its inner grid.
	let (width, cells) = dictionary.make_binary_image(0).unwrap();
	let cell_px = 160.0 / width as f32;
	for cy in 1..(width - 1) {
		for cx in 1..(width - 1) {
			let x = (240.0 + (cx as f32 + 0.5) * cell_px) as u32;
			let y = (160.0 + (cy as f32 + 0.5) * cell_px) as u32;
			let expected = if cells[(cx + cy * width) as usize] { PAPER } else { INK };
			assert_eq!(*frame.get_pixel(x, y), expected);
		}
	}
}
