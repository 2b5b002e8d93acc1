
use image::RgbaImage;

use crate::dictionaries::ARDictionary;

/// A marker found in one frame. Nothing about it survives into the next frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
	/// Index into the detector's active (narrowed) dictionary.
	pub id: usize,
	/// Raster corners, top left first, in a consistent winding. Well-formed detections have exactly four.
	pub corners: Vec<(f32, f32)>,
}

impl Marker {
	pub fn new(id: usize, corners: Vec<(f32, f32)>) -> Self {
		Self { id, corners }
	}

	pub fn is_quad(&self) -> bool {
		self.corners.len() == 4
	}
}

/// A marker detector. Locating quads and decoding their bits happen on the other side of this trait;
/// the only state it exposes is the dictionary it matches against, which callers may narrow.
pub trait FrameDetector {
	fn dictionary(&self) -> &ARDictionary;

	fn dictionary_mut(&mut self) -> &mut ARDictionary;

	fn detect(&mut self, frame: &RgbaImage) -> Vec<Marker>;
}
