//! Candidate-vs-reference correspondence.
//!
//! A run is two passes over fresh spatial indices. The reference pass decides
//! every reference's [`MissType`] and gives the candidates it reaches a
//! preliminary multiplicity; the candidate pass turns those into final
//! [`MatchResult`]s, promoting candidates that see several references.
//! Accounting then applies the edge and contamination exclusions to the counts.

use tracing::debug;

use crate::observation::Observation;
use crate::spatial::SpatialIndex;

mod accounting;
mod candidate_pass;
mod reference_pass;
mod types;

pub use types::{MatchOutcome, MatchParams, MatchResult, MatchStats, MissType, NearestReference};

use accounting::{build_stats, contamination_flags, reconciliation_warnings};
use candidate_pass::run_candidate_pass;
use reference_pass::run_reference_pass;

pub fn match_observations(
    candidates: &[Observation],
    references: &[Observation],
    params: &MatchParams,
) -> MatchOutcome {
    let index_all = SpatialIndex::from_points(
        candidates
            .iter()
            .enumerate()
            .map(|(row, candidate)| (row, candidate.position)),
    );
    let index_non_special = SpatialIndex::from_points(
        candidates
            .iter()
            .enumerate()
            .filter(|(_, candidate)| !candidate.is_special_type)
            .map(|(row, candidate)| (row, candidate.position)),
    );
    let index_ref = SpatialIndex::from_points(
        references
            .iter()
            .enumerate()
            .map(|(row, reference)| (row, reference.position)),
    );

    if index_ref.is_empty() && !candidates.is_empty() {
        debug!("no reference points; every non-special candidate is an over-detection");
    }

    let reference_pass = run_reference_pass(
        references,
        candidates.len(),
        &index_all,
        &index_non_special,
        params.radius,
    );
    let candidate_results =
        run_candidate_pass(candidates, &reference_pass, &index_ref, params.radius);

    let nearest_references = candidates
        .iter()
        .map(|candidate| {
            index_ref
                .nearest(candidate.position)
                .map(|(reference, distance)| NearestReference {
                    reference,
                    distance,
                })
        })
        .collect::<Vec<Option<NearestReference>>>();

    let contaminated = contamination_flags(candidates, &candidate_results, &params.contamination);
    let stats = build_stats(
        candidates,
        &candidate_results,
        &reference_pass.miss_types,
        &contaminated,
    );
    let warnings = reconciliation_warnings(&stats);

    debug!(
        candidates = stats.candidate_count,
        references = stats.reference_count,
        non_special = index_non_special.len(),
        radius = params.radius,
        correct = stats.correct,
        over_detect = stats.over_detect,
        "correspondence run complete"
    );

    MatchOutcome {
        candidate_results,
        reference_results: reference_pass.miss_types,
        nearest_references,
        contaminated,
        stats,
        warnings,
    }
}
