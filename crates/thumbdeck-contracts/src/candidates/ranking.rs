use crate::error::{NoCandidatesReason, PipelineError};

use super::VideoCandidate;

/// Keep candidates with at least `min_views`, most viewed first, then cap at `top`.
///
/// The sort is stable, so equal view counts keep their search order.
pub fn rank_candidates(
    candidates: Vec<VideoCandidate>,
    min_views: u64,
    top: usize,
) -> Result<Vec<VideoCandidate>, PipelineError> {
    if candidates.is_empty() {
        return Err(PipelineError::NoCandidates(NoCandidatesReason::EmptySearch));
    }
    let total = candidates.len();
    let mut kept = candidates
        .into_iter()
        .filter(|candidate| candidate.view_count >= min_views)
        .collect::<Vec<VideoCandidate>>();
    if kept.is_empty() {
        return Err(PipelineError::NoCandidates(
            NoCandidatesReason::BelowThreshold { min_views, total },
        ));
    }
    kept.sort_by(|left, right| right.view_count.cmp(&left.view_count));
    kept.truncate(top);
    Ok(kept)
}
