//! Runs a full session against a synthetic camera that orbits one printed marker.
//! Detection is stood in for by the renderer's own knowledge of where the corners land.
//!
//! cargo run --example synthetic_ar [config.json]
use std::error::Error;
use std::path::Path;
use std::sync::mpsc::{channel, Receiver, Sender};

use fiducial_overlay::overlay::draw_pose_axes;
use fiducial_overlay::{
	select_markers, ARDictionary, ArSession, FrameDetector, FrameReport, FrameSource, Marker, MarkerPose, OverlayCandidate,
	OverlayTransform, PinholeCamera, RenderTarget, Result, SessionConfig, StopHandle, Tick,
};
use image::RgbaImage;
use nalgebra as na;

#[allow(dead_code)]
#[path = "../tests/common/software_renderer.rs"]
mod software_renderer;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

struct OrbitSource {
	camera: PinholeCamera,
	dictionary: ARDictionary,
	printed_id: usize,
	detected_id: usize,
	model_size: f32,
	tick: u32,
	corners_out: Sender<Vec<Marker>>,
}

impl FrameSource for OrbitSource {
	fn open(&mut self) -> Result<(u32, u32)> {
		Ok((self.camera.image_width, self.camera.image_height))
	}

	fn next_tick(&mut self) -> Tick {
		self.tick += 1;
		// Pretend the camera needs a couple of ticks to warm up.
		if self.tick <= 2 {
			return Tick::Pending;
		}
		let t = self.tick as f32 * 0.05;
		let pose = MarkerPose {
			error: 0.0,
			rotation: na::Rotation3::from_euler_angles(0.4 * t.sin(), 0.3 * t.cos(), t * 0.5).into_inner(),
			translation: na::Vector3::new(60.0 * t.cos(), 40.0 * t.sin(), 800.0 + 150.0 * (0.7 * t).sin()),
		};
		let mut frame = software_renderer::blank_frame(&self.camera);
		software_renderer::render_marker(&mut frame, &self.camera, &self.dictionary, self.printed_id, &pose, self.model_size);
		let found = software_renderer::ground_truth_corners(&self.camera, &pose, self.model_size)
			.map(|corners| vec![Marker::new(self.detected_id, corners)])
			.unwrap_or_default();
		if self.corners_out.send(found).is_err() {
			return Tick::Closed;
		}
		Tick::Frame(frame)
	}
}

struct KnownCornersDetector {
	dictionary: ARDictionary,
	corners_in: Receiver<Vec<Marker>>,
}

impl FrameDetector for KnownCornersDetector {
	fn dictionary(&self) -> &ARDictionary {
		&self.dictionary
	}

	fn dictionary_mut(&mut self) -> &mut ARDictionary {
		&mut self.dictionary
	}

	fn detect(&mut self, _frame: &RgbaImage) -> Vec<Marker> {
		self.corners_in.try_recv().unwrap_or_default()
	}
}

struct ReadoutTarget {
	camera: PinholeCamera,
	last_frame: Option<RgbaImage>,
}

impl RenderTarget for ReadoutTarget {
	fn present(&mut self, frame: &RgbaImage, overlays: &[OverlayTransform], report: &FrameReport) {
		let fps = report.fps.map(|f| format!("{f} fps")).unwrap_or_else(|| "-- fps".to_string());
		log::info!("Detected: {:?} ({fps})", report.detected_ids);
		let mut frame = frame.clone();
		for overlay in overlays.iter().filter(|o| o.candidate == OverlayCandidate::Best) {
			let angles = overlay.angles.to_degrees();
			log::info!(
				"  marker {} at ({:.0}, {:.0}, {:.0}) yaw {:.1} pitch {:.1} roll {:.1} error {:.2}",
				overlay.marker_id,
				overlay.position.x,
				overlay.position.y,
				overlay.position.z,
				angles.yaw,
				angles.pitch,
				angles.roll,
				overlay.error
			);
			let pose = MarkerPose {
				error: overlay.error,
				rotation: overlay.rotation,
				translation: overlay.position,
			};
			draw_pose_axes(&mut frame, &self.camera, &pose, overlay.scale * 0.5);
		}
		self.last_frame = Some(frame);
	}
}

fn main() -> std::result::Result<(), Box<dyn Error>> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let mut config = match std::env::args().nth(1) {
		Some(path) => SessionConfig::load(Path::new(&path))?,
		None => SessionConfig::default(),
	};
	config.max_frames.get_or_insert(90);
	if config.overlay_spin_step == 0.0 {
		config.overlay_spin_step = 0.05;
	}

	let dictionary = ARDictionary::new_from_named_dict(&config.dictionary)?;
	// The session narrows the detector's copy; print a code it will keep.
	let selection = select_markers(&dictionary, config.marker_count, config.distance_metric)?;
	let detected_id = selection.len() - 1;
	let printed_id = selection.indices()[detected_id];

	let camera = PinholeCamera::from_image_width(WIDTH, HEIGHT);
	let (corners_out, corners_in) = channel();
	let source = OrbitSource {
		camera,
		dictionary: dictionary.clone(),
		printed_id,
		detected_id,
		model_size: config.model_size_mm,
		tick: 0,
		corners_out,
	};
	let detector = KnownCornersDetector { dictionary, corners_in };
	let target = ReadoutTarget { camera, last_frame: None };

	let mut session = ArSession::new(config, source, detector, target)?;
	let summary = session.run(&StopHandle::new())?;
	log::info!("{summary:?}");

	if let Some(frame) = &session.target().last_frame {
		let path = std::env::temp_dir().join("synthetic_ar_last_frame.png");
		frame.save(&path)?;
		log::info!("Last frame written to {}", path.display());
	}
	Ok(())
}
