use std::cmp::Ordering;

/// A candidate of the opposite population scored against a source vector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredCandidate {
	pub target_id: i64,
	/// Cosine similarity, `1 - cosine distance`.
	pub score: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RankedEdge {
	pub target_id: i64,
	pub score: f32,
	/// 1-based position, 1 being the most similar.
	pub rank: i32,
}

/// Orders candidates by descending score, breaking exact ties by ascending id, keeps the first
/// `top_k` and numbers them `1..=len`.
///
/// Candidates with a non-finite score (for example a zero vector on either side) are dropped.
pub fn rank_candidates(mut candidates: Vec<ScoredCandidate>, top_k: usize) -> Vec<RankedEdge> {
	candidates.retain(|candidate| candidate.score.is_finite());
	candidates.sort_by(|a, b| {
		b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal).then(a.target_id.cmp(&b.target_id))
	});
	candidates.truncate(top_k);

	candidates
		.into_iter()
		.zip(1_i32..)
		.map(|(candidate, rank)| RankedEdge {
			target_id: candidate.target_id,
			score: candidate.score,
			rank,
		})
		.collect()
}
