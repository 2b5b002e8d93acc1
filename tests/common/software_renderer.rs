// Small software renderer for printed markers.
// This lets us paint a marker at a known pose into a frame to do a full pipeline test.
use fiducial_overlay::{ARDictionary, MarkerPose, PinholeCamera};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use nalgebra as na;

pub const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const INK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Upper left, upper right, lower right, lower left in the marker's own frame, +y up.
pub fn marker_square(size: f32) -> [na::Vector3<f32>; 4] {
	let hs = size / 2.0;
	[
		na::Vector3::new(-hs, hs, 0.0),
		na::Vector3::new(hs, hs, 0.0),
		na::Vector3::new(hs, -hs, 0.0),
		na::Vector3::new(-hs, -hs, 0.0),
	]
}

/// Where the marker's corners land in the frame. None if any corner is behind the camera.
pub fn ground_truth_corners(camera: &PinholeCamera, pose: &MarkerPose, size: f32) -> Option<Vec<(f32, f32)>> {
	pose.apply_transform_to_vectors(&marker_square(size))
		.iter()
		.map(|p| camera.project(p))
		.collect()
}

pub fn blank_frame(camera: &PinholeCamera) -> RgbaImage {
	RgbaImage::from_pixel(camera.image_width, camera.image_height, PAPER)
}

/// Paints dictionary code `id` on top of `frame`, one projected quad per cell.
pub fn render_marker(frame: &mut RgbaImage, camera: &PinholeCamera, dictionary: &ARDictionary, id: usize, pose: &MarkerPose, size: f32) {
	let (width, cells) = dictionary.make_binary_image(id).expect("Marker id out of range for the dictionary.");
	let width = width as usize;
	let cell_size = size / width as f32;
	let hs = size / 2.0;
	for cy in 0..width {
		for cx in 0..width {
			let left = -hs + cx as f32 * cell_size;
			let top = hs - cy as f32 * cell_size;
			let model = [
				na::Vector3::new(left, top, 0.0),
				na::Vector3::new(left + cell_size, top, 0.0),
				na::Vector3::new(left + cell_size, top - cell_size, 0.0),
				na::Vector3::new(left, top - cell_size, 0.0),
			];
			let projected: Option<Vec<Point<i32>>> = pose
				.apply_transform_to_vectors(&model)
				.iter()
				.map(|p| camera.project(p).map(|(x, y)| Point::new(x.round() as i32, y.round() as i32)))
				.collect();
			let Some(polygon) = projected else {
				continue;
			};
			// Cells that collapse to a point or a line are too small to matter.
			if polygon[0] == polygon[3] || polygon[0] == polygon[2] {
				continue;
			}
			let color = if cells[cx + cy * width] { PAPER } else { INK };
			draw_polygon_mut(frame, &polygon, color);
		}
	}
}
