//! The per-frame driver: acquire a frame, detect, estimate poses, update overlays, present.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use log::{debug, error, info, warn};

use crate::aruco::FrameDetector;
use crate::config::SessionConfig;
use crate::error::{ArError, Result};
use crate::overlay::{self, OverlayCandidate, OverlayTransform};
use crate::pinhole::PinholeCamera;
use crate::pose::{PoseEstimate, PoseEstimator};
use crate::selection::{select_markers, Selection};

/// What a frame source has for us on this tick.
pub enum Tick {
	Frame(RgbaImage),
	/// The source is running but has nothing new yet.
	Pending,
	Closed,
}

pub trait FrameSource {
	/// One-time setup before the first tick. Returns the fixed frame size.
	fn open(&mut self) -> Result<(u32, u32)>;

	/// Waits for the next tick.
	fn next_tick(&mut self) -> Tick;
}

pub trait RenderTarget {
	/// `frame` already carries any outlines. `overlays` holds one entry per posed marker and candidate.
	fn present(&mut self, frame: &RgbaImage, overlays: &[OverlayTransform], report: &FrameReport);
}

/// Shared stop flag. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn stop(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_stopped(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

#[derive(Clone, Debug)]
pub struct PosedMarker {
	/// Id in the narrowed dictionary.
	pub id: usize,
	/// Id in the dictionary the session was built with.
	pub source_id: Option<usize>,
	pub pose: PoseEstimate,
}

#[derive(Clone, Debug)]
pub struct FrameReport {
	pub frame_index: u64,
	/// Every id the detector reported, ascending.
	pub detected_ids: Vec<usize>,
	pub markers: Vec<PosedMarker>,
	/// Detections dropped for not having four corners.
	pub skipped: usize,
	/// Time since the previous frame, or since the session started for the first one.
	pub elapsed: Duration,
	pub fps: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
	Stopped,
	FrameLimit,
	SourceClosed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
	pub frames: u64,
	pub pending_ticks: u64,
	pub markers_posed: usize,
	pub reason: StopReason,
}

pub struct ArSession<S, D, R> {
	config: SessionConfig,
	source: S,
	detector: D,
	target: R,
	selection: Selection,
	estimator: Option<PoseEstimator>,
	// Set once the source fails to open. The session never tries again.
	acquisition_failure: Option<String>,
	spin: f32,
	frame_index: u64,
	last_frame: Option<Instant>,
}

impl<S: FrameSource, D: FrameDetector, R: RenderTarget> ArSession<S, D, R> {
	/// Picks the configured number of well separated codes from the detector's dictionary and narrows the
	/// detector to them.
	pub fn new(config: SessionConfig, source: S, mut detector: D, target: R) -> Result<Self> {
		let selection = select_markers(detector.dictionary(), config.marker_count, config.distance_metric)?;
		detector.dictionary_mut().restrict_to(&selection)?;
		info!("Detector now matches {} codes.", detector.dictionary().len());
		Ok(Self {
			config,
			source,
			detector,
			target,
			selection,
			estimator: None,
			acquisition_failure: None,
			spin: 0.0,
			frame_index: 0,
			last_frame: None,
		})
	}

	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	pub fn selection(&self) -> &Selection {
		&self.selection
	}

	pub fn source(&self) -> &S {
		&self.source
	}

	pub fn detector(&self) -> &D {
		&self.detector
	}

	pub fn target(&self) -> &R {
		&self.target
	}

	pub fn is_started(&self) -> bool {
		self.estimator.is_some()
	}

	pub fn acquisition_failed(&self) -> bool {
		self.acquisition_failure.is_some()
	}

	/// Opens the frame source and sets up the pose solver for its frame size.
	/// A failure to open is final: later calls return it again without touching the source.
	pub fn start(&mut self) -> Result<(u32, u32)> {
		if let Some(reason) = &self.acquisition_failure {
			return Err(ArError::Acquisition(reason.clone()));
		}
		let (width, height) = match self.source.open() {
			Ok(size) => size,
			Err(e) => {
				error!("Could not acquire the camera: {e}");
				self.acquisition_failure = Some(match &e {
					ArError::Acquisition(reason) => reason.clone(),
					other => other.to_string(),
				});
				return Err(e);
			}
		};
		info!("Camera acquired, {width}x{height} frames.");

		let camera = PinholeCamera::from_image_width(width, height);
		let mut estimator = PoseEstimator::new(camera, self.config.model_size_mm)?;
		estimator.max_refinement_iterations = self.config.max_refinement_iterations;
		estimator.convergence_error = self.config.convergence_error;
		self.estimator = Some(estimator);
		self.last_frame = Some(Instant::now());
		Ok((width, height))
	}

	/// One full cycle on `frame`. The frame is drawn on and handed to the render target.
	pub fn process_frame(&mut self, mut frame: RgbaImage) -> Result<FrameReport> {
		let Some(estimator) = self.estimator.as_ref() else {
			return Err(ArError::NotStarted);
		};

		let now = Instant::now();
		let elapsed = now.duration_since(self.last_frame.unwrap_or(now));
		self.last_frame = Some(now);

		let detections = self.detector.detect(&frame);
		let mut detected_ids: Vec<usize> = detections.iter().map(|m| m.id).collect();
		detected_ids.sort_unstable();

		if self.config.draw_outlines {
			for marker in &detections {
				overlay::draw_marker_outline(&mut frame, &marker.corners);
			}
		}

		let mut markers = Vec::with_capacity(detections.len());
		let mut overlays = Vec::new();
		let mut skipped = 0;
		for marker in detections {
			if !marker.is_quad() {
				warn!("Marker {} came back with {} corners, skipping it.", marker.id, marker.corners.len());
				skipped += 1;
				continue;
			}
			let pose = match estimator.estimate_marker_pose(&marker.corners) {
				Ok(pose) => pose,
				Err(e) => {
					warn!("No pose for marker {}: {e}", marker.id);
					skipped += 1;
					continue;
				}
			};
			overlays.push(OverlayTransform::from_pose(marker.id, OverlayCandidate::Best, &pose.best, self.spin, self.config.model_size_mm));
			if self.config.show_alternative {
				overlays.push(OverlayTransform::from_pose(marker.id, OverlayCandidate::Alternative, &pose.alternative, self.spin, self.config.model_size_mm));
			}
			markers.push(PosedMarker {
				id: marker.id,
				source_id: self.detector.dictionary().source_id(marker.id),
				pose,
			});
		}
		self.spin += self.config.overlay_spin_step;

		let report = FrameReport {
			frame_index: self.frame_index,
			detected_ids,
			markers,
			skipped,
			elapsed,
			fps: frames_per_second(elapsed),
		};
		debug!(
			"Frame {} after {:?}: detected {:?}, posed {}",
			report.frame_index,
			report.elapsed,
			report.detected_ids,
			report.markers.len()
		);
		self.target.present(&frame, &overlays, &report);
		self.frame_index += 1;
		Ok(report)
	}

	/// Starts the session if needed, then cycles until `stop` is raised, the frame budget runs out, or the
	/// source closes. A failed start means no frame is ever requested.
	pub fn run(&mut self, stop: &StopHandle) -> Result<RunSummary> {
		if !self.is_started() {
			self.start()?;
		}
		let mut frames = 0u64;
		let mut pending_ticks = 0u64;
		let mut markers_posed = 0usize;
		let reason = loop {
			if stop.is_stopped() {
				break StopReason::Stopped;
			}
			if self.config.max_frames.is_some_and(|max| frames >= max) {
				break StopReason::FrameLimit;
			}
			match self.source.next_tick() {
				Tick::Frame(frame) => {
					let report = self.process_frame(frame)?;
					frames += 1;
					markers_posed += report.markers.len();
				}
				Tick::Pending => pending_ticks += 1,
				Tick::Closed => break StopReason::SourceClosed,
			}
		};
		info!("Session ended ({reason:?}) after {frames} frames.");
		Ok(RunSummary {
			frames,
			pending_ticks,
			markers_posed,
			reason,
		})
	}
}

/// `round(1000 / elapsed_ms)`, or None when no time has passed.
fn frames_per_second(elapsed: Duration) -> Option<u32> {
	let ms = elapsed.as_secs_f64() * 1000.0;
	if ms > 0.0 {
		Some((1000.0 / ms).round() as u32)
	} else {
		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_frames_per_second() {
		assert_eq!(frames_per_second(Duration::from_millis(16)), Some(63));
		assert_eq!(frames_per_second(Duration::from_millis(33)), Some(30));
		assert_eq!(frames_per_second(Duration::from_secs(2)), Some(1));
		assert_eq!(frames_per_second(Duration::ZERO), None);
	}

	#[test]
	fn test_stop_handle_is_shared() {
		let handle = StopHandle::new();
		let other = handle.clone();
		assert!(!other.is_stopped());
		handle.stop();
		assert!(other.is_stopped());
	}
}
