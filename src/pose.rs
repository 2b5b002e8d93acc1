use nalgebra as na;

use crate::error::{ArError, Result};
use crate::pinhole::PinholeCamera;

const INITIAL_SVD_EPSILON: f32 = 1e-5;
const MAX_POSE_ITERATIONS: u32 = 100;
// Mean interior angle error, in degrees, below which refinement stops.
const DEFAULT_CONVERGENCE_ERROR: f32 = 2.0;

#[derive(Clone, Debug)]
pub struct MarkerPose {
	pub error: f32,
	pub rotation: na::Matrix3<f32>,
	pub translation: na::Vector3<f32>,
}

impl MarkerPose {
	pub fn apply_transform_to_points(&self, points: &[(f32, f32, f32)]) -> Vec<(f32, f32, f32)> {
		let as_vec3: Vec<na::Vector3<f32>> = points.iter().map(|p| { na::Vector3::new(p.0, p.1, p.2) }).collect();
		self.apply_transform_to_vectors(&as_vec3).into_iter().map(|p| {(p.x, p.y, p.z)}).collect()
	}

	pub fn apply_transform_to_vectors(&self, points: &[na::Vector3<f32>]) -> Vec<na::Vector3<f32>> {
		points.iter().map(|p| {
			(self.rotation * p) + self.translation
		}).collect()
	}

	pub fn apply_inverse_transform_to_points(&self, points: &[(f32, f32, f32)]) -> Vec<(f32, f32, f32)> {
		let as_vec3: Vec<na::Vector3<f32>> = points.iter().map(|p| { na::Vector3::new(p.0, p.1, p.2) }).collect();
		self.apply_inverse_transform_to_vectors(&as_vec3).into_iter().map(|p| {(p.x, p.y, p.z)}).collect()
	}

	pub fn apply_inverse_transform_to_vectors(&self, points: &[na::Vector3<f32>]) -> Vec<na::Vector3<f32>> {
		points.iter().map(|p| {
			self.rotation.transpose() * (p - self.translation)
		}).collect()
	}

	pub fn angles(&self) -> EulerAngles {
		EulerAngles::from_rotation(&self.rotation)
	}
}

impl Default for MarkerPose {
	fn default() -> Self {
		Self {
			error: f32::INFINITY,
			rotation: na::Matrix3::identity(),
			translation: na::Vector3::zeros(),
		}
	}
}

/// Both readings of a planar marker's pose. A single view of a square cannot tell apart the two tilts that
/// mirror each other about the line of sight, so the runner-up is always kept alongside the winner.
#[derive(Clone, Debug)]
pub struct PoseEstimate {
	pub best: MarkerPose,
	pub alternative: MarkerPose,
}

impl PoseEstimate {
	/// Orders two candidates by ascending error. NaN errors sort last.
	pub fn from_candidates(a: MarkerPose, b: MarkerPose) -> Self {
		let swap = match (a.error.is_nan(), b.error.is_nan()) {
			(true, false) => true,
			(false, true) => false,
			_ => b.error < a.error,
		};
		if swap {
			Self { best: b, alternative: a }
		} else {
			Self { best: a, alternative: b }
		}
	}
}

/// Yaw, pitch and roll in radians, extracted as Y then X then Z.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EulerAngles {
	pub yaw: f32,
	pub pitch: f32,
	pub roll: f32,
}

impl EulerAngles {
	pub fn from_rotation(r: &na::Matrix3<f32>) -> Self {
		Self {
			yaw: -r[(0, 2)].atan2(r[(2, 2)]),
			// Clamped so a slightly non-orthonormal estimate reads +/-90 degrees rather than NaN.
			pitch: -((-r[(1, 2)]).clamp(-1.0, 1.0).asin()),
			roll: r[(1, 0)].atan2(r[(1, 1)]),
		}
	}

	pub fn to_degrees(self) -> Self {
		Self {
			yaw: self.yaw.to_degrees(),
			pitch: self.pitch.to_degrees(),
			roll: self.roll.to_degrees(),
		}
	}
}

/// Numeric solver for the pose of a square marker from its four corners.
pub trait PlanarPoseSolver {
	/// `centered` holds the corners with the origin at the principal point and +y up,
	/// in the same winding as the marker model. Returns both candidate poses, in no particular order.
	fn solve(&self, centered: &[(f32, f32); 4]) -> (MarkerPose, MarkerPose);
}

/// Recenters raster `corners` for `camera` and returns the solver's two poses ranked by error.
/// Anything other than four corners is rejected before the solver runs.
pub fn estimate_pose<S: PlanarPoseSolver + ?Sized>(solver: &S, camera: &PinholeCamera, corners: &[(f32, f32)]) -> Result<PoseEstimate> {
	let corners: &[(f32, f32); 4] = corners
		.try_into()
		.map_err(|_| ArError::CornerCount { expected: 4, found: corners.len() })?;
	let centered = corners.map(|c| camera.recenter(c));
	let (a, b) = solver.solve(&centered);
	Ok(PoseEstimate::from_candidates(a, b))
}

// This is a separate structure because we need to compute the pseudoinverse of the points for a given marker size + focal dist.
// It's faster to reuse it across frames than to recompute it from scratch.
/// Coplanar POSIT: "Iterative Pose Estimation using Coplanar Feature Points", Oberkampf, DeMenthon, Davis.
#[derive(Clone, Debug)]
pub struct PoseEstimator {
	camera: PinholeCamera,
	marker_size: f32,
	model_points: [na::Vector3<f32>; 4],
	model_vectors: na::Matrix4x3<f32>,
	model_normal: na::Vector3<f32>,
	pseudoinverse: na::Matrix3x4<f32>,
	pub max_refinement_iterations: u32,
	pub convergence_error: f32,
}

impl PoseEstimator {
	pub fn new(camera: PinholeCamera, marker_size: f32) -> Result<Self> {
		if !(marker_size > 0.0) {
			return Err(ArError::InvalidMarker(format!("marker size must be positive, got {marker_size}")));
		}
		if !(camera.focal_length > 0.0) {
			return Err(ArError::InvalidMarker(format!("focal length must be positive, got {}", camera.focal_length)));
		}
		let model_points = make_marker_square(marker_size);
		let model_vectors = na::Matrix4x3::from_rows(&[
			(model_points[0] - model_points[0]).transpose(),
			(model_points[1] - model_points[0]).transpose(),
			(model_points[2] - model_points[0]).transpose(),
			(model_points[3] - model_points[0]).transpose(),
		]);
		let pseudoinverse = model_vectors
			.pseudo_inverse(INITIAL_SVD_EPSILON)
			.map_err(|e| ArError::InvalidMarker(format!("model vectors have no pseudoinverse: {e}")))?;
		let model_normal = (model_points[1] - model_points[0])
			.cross(&(model_points[2] - model_points[0]))
			.normalize();

		Ok(Self {
			camera,
			marker_size,
			model_points,
			model_vectors,
			model_normal,
			pseudoinverse,
			max_refinement_iterations: MAX_POSE_ITERATIONS,
			convergence_error: DEFAULT_CONVERGENCE_ERROR,
		})
	}

	pub fn camera(&self) -> &PinholeCamera {
		&self.camera
	}

	pub fn marker_size(&self) -> f32 {
		self.marker_size
	}

	/// Corners of the marker in its own frame, centered on the origin in the z=0 plane.
	pub fn model_points(&self) -> &[na::Vector3<f32>; 4] {
		&self.model_points
	}

	pub fn estimate_marker_pose(&self, corners: &[(f32, f32)]) -> Result<PoseEstimate> {
		estimate_pose(self, &self.camera, corners)
	}

	fn make_initial_estimate(&self, camera_points: &[(f32, f32); 4]) -> (MarkerPose, MarkerPose) {
		// Image vectors are taken relative to the 0-th corner, matching the model vectors.
		let (x0, y0) = camera_points[0];
		let xs = na::Vector4::from_fn(|i, _| camera_points[i].0 - x0);
		let ys = na::Vector4::from_fn(|i, _| camera_points[i].1 - y0);
		let i0: na::Vector3<f32> = self.pseudoinverse * xs;
		let j0: na::Vector3<f32> = self.pseudoinverse * ys;

		let i0i0 = i0.dot(&i0);
		let j0j0 = j0.dot(&j0);
		let i0j0 = i0.dot(&j0);

		let delta = (j0j0 - i0i0) * (j0j0 - i0i0) + 4.0 * (i0j0 * i0j0);
		let q = if j0j0 - i0i0 >= 0.0 {
			(j0j0 - i0i0 + delta.sqrt()) / 2.0
		} else {
			(j0j0 - i0i0 - delta.sqrt()) / 2.0
		};

		let (lambda, mu) = if q >= 0.0 {
			let lambda = q.sqrt();
			let mu = if lambda.abs() < 1e-6 { 0.0 } else { -i0j0 / lambda };
			(lambda, mu)
		} else {
			let lambda = (-(i0j0 * i0j0) / q).sqrt();
			let mu = if lambda.abs() < 1e-6 { (i0i0 - j0j0).sqrt() } else { -i0j0 / lambda };
			(lambda, mu)
		};

		let compute_pose = |sign: f32| -> MarkerPose {
			let ivec = i0 + self.model_normal.scale(sign * lambda);
			let jvec = j0 + self.model_normal.scale(sign * mu);
			let scale = ivec.magnitude();
			let row1 = ivec.scale(1.0 / scale);
			let row2 = jvec.scale(1.0 / scale);
			let row3 = row1.cross(&row2);
			let rotation = na::Matrix3::from_rows(&[row1.transpose(), row2.transpose(), row3.transpose()]);
			// Scaled orthographic projection places the 0-th corner here; shift to the marker center.
			let reference = na::Vector3::new(x0 / scale, y0 / scale, self.camera.focal_length / scale);
			MarkerPose {
				error: f32::INFINITY,
				rotation,
				translation: reference - rotation * self.model_points[0],
			}
		};
		(compute_pose(1.0), compute_pose(-1.0))
	}

	// Walks one branch of the ambiguity towards the full perspective solution.
	fn refine_estimate(&self, points: &[(f32, f32); 4], pose: MarkerPose) -> MarkerPose {
		let mut best = pose;
		for _ in 0..self.max_refinement_iterations {
			if best.error <= self.convergence_error {
				break;
			}
			let reference_depth = (best.rotation * self.model_points[0] + best.translation).z;
			if reference_depth.abs() < 1e-6 || !reference_depth.is_finite() {
				log::debug!("Pose refinement stopped on a degenerate reference depth.");
				break;
			}

			// Undo the perspective foreshortening the previous pose predicts for each corner.
			let mut corrected = *points;
			for (i, p) in corrected.iter_mut().enumerate() {
				let relative_depth = (best.rotation * self.model_vectors.row(i).transpose()).z;
				let eps = 1.0 + relative_depth / reference_depth;
				p.0 *= eps;
				p.1 *= eps;
			}

			let (mut c1, mut c2) = self.make_initial_estimate(&corrected);
			c1.error = self.compute_pose_error(points, &c1);
			c2.error = self.compute_pose_error(points, &c2);
			// Stay on this branch: keep the candidate whose marker normal agrees with the current one.
			let normal = best.rotation.row(2);
			let candidate = if normal.dot(&c1.rotation.row(2)) >= normal.dot(&c2.rotation.row(2)) { c1 } else { c2 };
			if !(candidate.error < best.error) {
				break;
			}
			best = candidate;
		}
		best
	}

	// Mean absolute difference, in degrees, between the observed interior angles and those of the reprojected model.
	// Degenerate or behind-camera poses score infinity.
	fn compute_pose_error(&self, points: &[(f32, f32); 4], pose: &MarkerPose) -> f32 {
		let mut reprojected = [(0f32, 0f32); 4];
		for (i, m) in self.model_points.iter().enumerate() {
			let v = pose.rotation * m + pose.translation;
			if !(v.z > 1e-6) {
				return f32::INFINITY;
			}
			reprojected[i] = (self.camera.focal_length * v.x / v.z, self.camera.focal_length * v.y / v.z);
		}

		let mut error = 0.0;
		for (a, b, c) in [(0, 1, 3), (1, 2, 0), (2, 3, 1), (3, 0, 2)] {
			let observed = interior_angle(&points[a], &points[b], &points[c]);
			let modeled = interior_angle(&reprojected[a], &reprojected[b], &reprojected[c]);
			error += (observed - modeled).abs();
		}
		let error = error / 4.0;
		if error.is_nan() { f32::INFINITY } else { error }
	}
}

impl PlanarPoseSolver for PoseEstimator {
	fn solve(&self, centered: &[(f32, f32); 4]) -> (MarkerPose, MarkerPose) {
		let (mut c1, mut c2) = self.make_initial_estimate(centered);
		c1.error = self.compute_pose_error(centered, &c1);
		c2.error = self.compute_pose_error(centered, &c2);
		(self.refine_estimate(centered, c1), self.refine_estimate(centered, c2))
	}
}

fn make_marker_square(size: f32) -> [na::Vector3<f32>; 4] {
	let hs = size / 2.0f32;
	// +y is up and +x is right: upper left, upper right, lower right, lower left.
	// That is clockwise on screen, the order detectors report corners in.
	[
		na::Vector3::new(-hs, hs, 0.0),
		na::Vector3::new(hs, hs, 0.0),
		na::Vector3::new(hs, -hs, 0.0),
		na::Vector3::new(-hs, -hs, 0.0),
	]
}

/// Angle in degrees at corner A between AB and AC.
fn interior_angle(a: &(f32, f32), b: &(f32, f32), c: &(f32, f32)) -> f32 {
	let p = na::Vector2::new(b.0 - a.0, b.1 - a.1);
	let q = na::Vector2::new(c.0 - a.0, c.1 - a.1);
	let normalized_dot = p.dot(&q) / (p.magnitude() * q.magnitude());
	// Rounding can push the cosine just outside [-1, 1].
	normalized_dot.clamp(-1.0, 1.0).acos().to_degrees()
}
