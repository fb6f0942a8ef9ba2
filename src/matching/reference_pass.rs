use super::types::MissType;
use crate::observation::Observation;
use crate::spatial::SpatialIndex;

/// Candidate multiplicity seen from the reference side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Preliminary {
    One,
    Many,
}

/// Result of the reference pass, consumed read-only by the candidate pass.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct ReferencePass {
    pub(super) miss_types: Vec<MissType>,
    /// Indexed by candidate row; `None` for candidates no reference claimed.
    pub(super) preliminary: Vec<Option<Preliminary>>,
}

/// Decide each reference's miss type and tag the non-special candidates it
/// reaches. References are visited in input order and a later reference
/// overwrites the tag an earlier one gave to a shared candidate.
pub(super) fn run_reference_pass(
    references: &[Observation],
    candidate_count: usize,
    index_all: &SpatialIndex,
    index_non_special: &SpatialIndex,
    radius: f64,
) -> ReferencePass {
    let mut miss_types = Vec::with_capacity(references.len());
    let mut preliminary = vec![None; candidate_count];

    for reference in references {
        let near_non_special = index_non_special.query_radius(reference.position, radius);

        if near_non_special.is_empty() {
            let anything_near = !index_all
                .query_radius(reference.position, radius)
                .is_empty();
            miss_types.push(if anything_near {
                MissType::ClassifiedMiss
            } else {
                MissType::BasicMiss
            });
            continue;
        }

        miss_types.push(MissType::Matched);
        let tag = if near_non_special.len() == 1 {
            Preliminary::One
        } else {
            Preliminary::Many
        };
        for row in near_non_special {
            preliminary[row] = Some(tag);
        }
    }

    ReferencePass {
        miss_types,
        preliminary,
    }
}
