//! Farthest-point sampling of marker codes in Hamming space.
//!
//! Seeded at index 0, each round adds the code whose distance to its nearest already-chosen code is largest,
//! so the worst-case separation among chosen markers only ever improves greedily.

use log::{debug, info};
use rayon::prelude::*;

use crate::dictionaries::{ARDictionary, DistanceMetric};
use crate::error::{ArError, Result};

/// A set of dictionary indices, unique and strictly increasing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
	indices: Vec<usize>,
}

impl Selection {
	/// Builds a selection from arbitrary indices, sorting and removing duplicates.
	/// Outside the crate selections only come from `select_markers`, so they always hold index 0.
	pub(crate) fn from_indices(mut indices: Vec<usize>) -> Self {
		indices.sort_unstable();
		indices.dedup();
		Self { indices }
	}

	pub fn indices(&self) -> &[usize] {
		&self.indices
	}

	pub fn len(&self) -> usize {
		self.indices.len()
	}

	pub fn is_empty(&self) -> bool {
		self.indices.is_empty()
	}

	pub fn contains(&self, index: usize) -> bool {
		self.indices.binary_search(&index).is_ok()
	}
}

/// Picks `k` maximally separated codes from `dictionary`.
pub fn select_markers(dictionary: &ARDictionary, k: usize, metric: DistanceMetric) -> Result<Selection> {
	let selection = select_farthest_points(dictionary.len(), k, |a, b| dictionary.distance(a, b, metric))?;
	info!(
		"Selected {} of {} '{}' codes, minimum pairwise distance {}: {:?}",
		selection.len(),
		dictionary.len(),
		dictionary.name,
		min_pairwise_distance(selection.indices(), |a, b| dictionary.distance(a, b, metric)),
		selection.indices()
	);
	Ok(selection)
}

/// Greedy max-min selection over `count` items under an arbitrary symmetric distance.
/// Ties go to the lowest index; already chosen items are never picked twice, even when every remaining
/// distance has collapsed to zero.
pub fn select_farthest_points<F>(count: usize, k: usize, dist: F) -> Result<Selection>
where
	F: Fn(usize, usize) -> u32 + Sync,
{
	if count == 0 {
		return Err(ArError::EmptyDictionary);
	}
	if k == 0 || k > count {
		return Err(ArError::SelectionSize { requested: k, available: count });
	}

	let mut chosen = vec![false; count];
	chosen[0] = true;
	let mut picked = Vec::with_capacity(k);
	picked.push(0usize);

	// Distance from every candidate to its nearest chosen code.
	let mut min_dist: Vec<u32> = (0..count).into_par_iter().map(|j| dist(0, j)).collect();

	for _ in 1..k {
		let next = farthest_unchosen(&min_dist, &chosen);
		debug!("Picked code {} at separation {}", next, min_dist[next]);
		chosen[next] = true;
		picked.push(next);
		min_dist.par_iter_mut().enumerate().for_each(|(j, d)| {
			*d = (*d).min(dist(next, j));
		});
	}

	Ok(Selection::from_indices(picked))
}

fn farthest_unchosen(min_dist: &[u32], chosen: &[bool]) -> usize {
	let mut best: Option<usize> = None;
	for (j, &d) in min_dist.iter().enumerate() {
		if chosen[j] {
			continue;
		}
		match best {
			Some(b) if min_dist[b] >= d => {}
			_ => best = Some(j),
		}
	}
	// Callers guarantee k <= count, so an unchosen item always remains.
	best.unwrap_or(0)
}

/// Smallest distance between any two of `indices`, or `u32::MAX` when there are fewer than two.
pub fn min_pairwise_distance<F>(indices: &[usize], dist: F) -> u32
where
	F: Fn(usize, usize) -> u32,
{
	let mut smallest = u32::MAX;
	for (n, &a) in indices.iter().enumerate() {
		for &b in &indices[n + 1..] {
			smallest = smallest.min(dist(a, b));
		}
	}
	smallest
}
