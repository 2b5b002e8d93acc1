
use nalgebra as na;

/// Ideal pinhole camera with the principal point at the canvas center.
///
/// Two image frames are in play. Raster space has its origin at the top left with +y down, as frames and
/// detectors report pixels. Centered space has its origin at the principal point with +y up, which is what
/// the pose solver works in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PinholeCamera {
	pub image_width: u32,
	pub image_height: u32,
	pub focal_length: f32,
}

impl PinholeCamera {
	pub fn new(image_width: u32, image_height: u32, focal_length: f32) -> Self {
		Self {
			image_width,
			image_height,
			focal_length,
		}
	}

	/// Uses the canvas width as the focal length, which gives roughly a 53 degree horizontal field of view.
	/// Good enough for webcams when no calibration is available.
	pub fn from_image_width(image_width: u32, image_height: u32) -> Self {
		Self::new(image_width, image_height, image_width as f32)
	}

	/// Horizontal field of view in radians.
	pub fn horizontal_fov(&self) -> f32 {
		2.0 * ((self.image_width as f32 * 0.5) / self.focal_length).atan()
	}

	/// Raster pixel to centered, y-up coordinates.
	pub fn recenter(&self, raster: (f32, f32)) -> (f32, f32) {
		(
			raster.0 - (self.image_width as f32 * 0.5f32),
			(self.image_height as f32 * 0.5f32) - raster.1,
		)
	}

	/// Centered, y-up coordinates back to raster pixels.
	pub fn to_raster(&self, centered: (f32, f32)) -> (f32, f32) {
		(
			centered.0 + (self.image_width as f32 * 0.5f32),
			(self.image_height as f32 * 0.5f32) - centered.1,
		)
	}

	/// Camera-space point (x right, y up, z forward) to raster pixels, if it is in front of the camera.
	pub fn project(&self, p: &na::Vector3<f32>) -> Option<(f32, f32)> {
		if p.z <= 1e-6 {
			return None;
		}
		let centered = (self.focal_length * p.x / p.z, self.focal_length * p.y / p.z);
		Some(self.to_raster(centered))
	}
}

/// The K matrix taking camera space to homogeneous raster coordinates. The y row is negated since raster +y is down.
impl From<PinholeCamera> for na::Matrix3<f32> {
	fn from(camera: PinholeCamera) -> Self {
		na::Matrix3::new(
			camera.focal_length, 0.0f32, camera.image_width as f32 * 0.5f32,
			0f32, -camera.focal_length, camera.image_height as f32 * 0.5f32,
			0f32, 0f32, 1f32,
		)
	}
}
