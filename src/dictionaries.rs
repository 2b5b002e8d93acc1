use phf::phf_map;
use serde::{Deserialize, Serialize};

use crate::error::{ArError, Result};
use crate::hamming_distance;
use crate::selection::Selection;

type DictionaryBuilder = fn() -> ARDictionary;

static NAMED_DICTIONARIES: phf::Map<&'static str, DictionaryBuilder> = phf_map! {
	"ARUCO" => aruco_classic as DictionaryBuilder,
	"ARUCO_DEFAULT" => aruco_classic as DictionaryBuilder,
	"ARUCO_4X4_50" => aruco_4x4_50 as DictionaryBuilder,
	"APRILTAG_16h5" => apriltag_16h5 as DictionaryBuilder,
};

/// How two codes are compared when measuring their separation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
	/// Bitwise Hamming distance of the codes as stored.
	#[default]
	Plain,
	/// Smallest Hamming distance over the four 90 degree rotations of the second code.
	/// A marker seen upside down must not read as another marker, so this is the stricter measure.
	RotationInvariant,
}

/// An ordered list of square marker codes.
/// Each code packs `marker_size * marker_size` inner bits, row-major, bit index `y * marker_size + x`, white = 1.
#[derive(Clone, Debug)]
pub struct ARDictionary {
	pub name: String,
	pub marker_size: usize,
	codes: Vec<u64>,
	// Index of each code in the dictionary it was narrowed from. Identity until restrict_to is called.
	source_ids: Vec<usize>,
}

impl ARDictionary {
	pub fn new_custom(name: &str, marker_size: usize, codes: Vec<u64>) -> Result<Self> {
		if marker_size == 0 || marker_size * marker_size > 64 {
			return Err(ArError::InvalidMarker(format!("{marker_size}x{marker_size} codes do not fit in 64 bits")));
		}
		let mask = bit_mask(marker_size);
		if let Some(bad) = codes.iter().find(|&&c| c & !mask != 0) {
			return Err(ArError::InvalidMarker(format!("code {bad:#x} has bits outside a {marker_size}x{marker_size} grid")));
		}
		let source_ids = (0..codes.len()).collect();
		Ok(Self {
			name: name.to_string(),
			marker_size,
			codes,
			source_ids,
		})
	}

	pub fn new_from_named_dict(name: &str) -> Result<Self> {
		NAMED_DICTIONARIES
			.get(name)
			.map(|build| build())
			.ok_or_else(|| ArError::UnknownDictionary(name.to_string()))
	}

	pub fn named_dictionaries() -> impl Iterator<Item = &'static str> {
		NAMED_DICTIONARIES.keys().copied()
	}

	pub fn len(&self) -> usize {
		self.codes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.codes.is_empty()
	}

	pub fn codes(&self) -> &[u64] {
		&self.codes
	}

	pub fn code(&self, id: usize) -> Option<u64> {
		self.codes.get(id).copied()
	}

	/// Maps an id in this (possibly narrowed) dictionary back to the id it had before narrowing.
	pub fn source_id(&self, id: usize) -> Option<usize> {
		self.source_ids.get(id).copied()
	}

	pub fn bit_count(&self) -> usize {
		self.marker_size * self.marker_size
	}

	pub fn code_distance(&self, a: u64, b: u64, metric: DistanceMetric) -> u32 {
		match metric {
			DistanceMetric::Plain => hamming_distance(a, b) as u32,
			DistanceMetric::RotationInvariant => {
				let mut rotated = b;
				let mut best = u32::MAX;
				for _ in 0..4 {
					best = best.min(hamming_distance(a, rotated) as u32);
					rotated = rotate_code(rotated, self.marker_size);
				}
				best
			}
		}
	}

	/// Distance between the codes with ids `a` and `b`.
	/// Panics if either id is out of range.
	pub fn distance(&self, a: usize, b: usize, metric: DistanceMetric) -> u32 {
		self.code_distance(self.codes[a], self.codes[b], metric)
	}

	/// Narrows the active code list to the selected codes, in selection order.
	/// Ids reported by a detector using this dictionary afterwards index the narrowed list.
	pub fn restrict_to(&mut self, selection: &Selection) -> Result<()> {
		if let Some(&bad) = selection.indices().iter().find(|&&i| i >= self.codes.len()) {
			return Err(ArError::SelectionSize { requested: bad + 1, available: self.codes.len() });
		}
		let codes = selection.indices().iter().map(|&i| self.codes[i]).collect();
		let source_ids = selection.indices().iter().map(|&i| self.source_ids[i]).collect();
		self.codes = codes;
		self.source_ids = source_ids;
		Ok(())
	}

	/// Returns the side length of the printed marker (inner bits plus a one-cell black border)
	/// and its cells in row-major order, `true` for white.
	pub fn make_binary_image(&self, id: usize) -> Option<(u32, Vec<bool>)> {
		let code = self.code(id)?;
		let n = self.marker_size;
		let width = n + 2;
		let mut bits = vec![false; width * width];
		for y in 0..n {
			for x in 0..n {
				bits[(x + 1) + (y + 1) * width] = (code >> (y * n + x)) & 1 == 1;
			}
		}
		Some((width as u32, bits))
	}
}

/// Rotates a row-major square code 90 degrees clockwise.
pub fn rotate_code(code: u64, n: usize) -> u64 {
	let mut out = 0u64;
	for y in 0..n {
		for x in 0..n {
			if (code >> (y * n + x)) & 1 == 1 {
				out |= 1 << (x * n + (n - 1 - y));
			}
		}
	}
	out
}

fn bit_mask(marker_size: usize) -> u64 {
	let bits = marker_size * marker_size;
	if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}

// The classic 5x5 ArUco family: every row is one of four words, bits 1 and 3 of the row carry two id bits.
const ARUCO_ROW_WORDS: [[u8; 5]; 4] = [
	[1, 0, 0, 0, 0],
	[1, 0, 1, 1, 1],
	[0, 1, 0, 0, 1],
	[0, 1, 1, 1, 0],
];

fn aruco_classic() -> ARDictionary {
	let codes = (0u64..1024).map(|id| {
		let mut code = 0u64;
		for y in 0..5 {
			let word = &ARUCO_ROW_WORDS[((id >> (2 * (4 - y))) & 3) as usize];
			for (x, &bit) in word.iter().enumerate() {
				code |= (bit as u64) << (y * 5 + x);
			}
		}
		code
	}).collect();
	ARDictionary {
		name: "ARUCO".to_string(),
		marker_size: 5,
		codes,
		source_ids: (0..1024).collect(),
	}
}

fn from_table(name: &str, marker_size: usize, table: &[u64]) -> ARDictionary {
	ARDictionary {
		name: name.to_string(),
		marker_size,
		codes: table.to_vec(),
		source_ids: (0..table.len()).collect(),
	}
}

fn aruco_4x4_50() -> ARDictionary {
	from_table("ARUCO_4X4_50", 4, &ARUCO_4X4_50_CODES)
}

fn apriltag_16h5() -> ARDictionary {
	from_table("APRILTAG_16h5", 4, &APRILTAG_16H5_CODES)
}

#[rustfmt::skip]
const ARUCO_4X4_50_CODES: [u64; 50] = [
	0x4cad, 0x59f0, 0xb4cc, 0x6299, 0x792a, 0xb39e, 0x7479, 0x4f23,
	0x5b7f, 0x6af3, 0x899f, 0xe588, 0xed70, 0xf054, 0x8d24, 0x7c64,
	0xa662, 0x0066, 0x7a36, 0xf56e, 0xd161, 0xd40d, 0xab33, 0x41bb,
	0xe27f, 0x8e29, 0x2735, 0x2aa5, 0xc484, 0xf62c, 0xa822, 0x4dea,
	0xf379, 0xd30f, 0x7510, 0x9490, 0xae18, 0xff20, 0x6fb0, 0x5a38,
	0x18e8, 0x1454, 0x314c, 0x4d1c, 0x1724, 0xd774, 0xfcb4, 0x26d2,
	0x740a, 0xc80a,
];

#[rustfmt::skip]
const APRILTAG_16H5_CODES: [u64; 30] = [
	0xe960, 0x91ce, 0x1d29, 0x707c, 0x2d9e, 0xbd7b, 0xe721, 0xb3d1,
	0xd773, 0x34e9, 0x0d62, 0x0f7c, 0x3086, 0xf898, 0x5a0b, 0xf302,
	0x60aa, 0xe68c, 0x3b40, 0x98f4, 0x6bd8, 0xf4d4, 0xbe13, 0x54e2,
	0x63b7, 0xa5fc, 0x7be3, 0x7618, 0xb825, 0xbbaa,
];
