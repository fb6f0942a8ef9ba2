use super::reference_pass::{Preliminary, ReferencePass};
use super::types::MatchResult;
use crate::observation::Observation;
use crate::spatial::SpatialIndex;

/// Final tag for every candidate.
///
/// Special-type candidates keep `SpecialTypeExcluded`. A candidate the
/// reference pass never claimed is an over-detection. A claimed candidate that
/// itself sees more than one reference is promoted to the `*ToMany` variant.
pub(super) fn run_candidate_pass(
    candidates: &[Observation],
    reference_pass: &ReferencePass,
    index_ref: &SpatialIndex,
    radius: f64,
) -> Vec<MatchResult> {
    candidates
        .iter()
        .enumerate()
        .map(|(row, candidate)| {
            if candidate.is_special_type {
                return MatchResult::SpecialTypeExcluded;
            }

            let Some(tag) = reference_pass.preliminary.get(row).copied().flatten() else {
                return MatchResult::OverDetect;
            };

            let sees_several = index_ref.query_radius(candidate.position, radius).len() > 1;
            match (tag, sees_several) {
                (Preliminary::One, false) => MatchResult::OneToOne,
                (Preliminary::One, true) => MatchResult::OneToMany,
                (Preliminary::Many, false) => MatchResult::ManyToOne,
                (Preliminary::Many, true) => MatchResult::ManyToMany,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::types::MissType;
    use crate::observation::Position;

    #[test]
    fn promotion_depends_on_reference_neighbourhood() {
        let candidates = vec![
            Observation::at(0.0, 0.0),
            Observation::at(100.0, 0.0),
            Observation::at(200.0, 0.0),
            Observation::at(300.0, 0.0).with_special_type(true),
            Observation::at(400.0, 0.0),
        ];
        let pass = ReferencePass {
            miss_types: vec![MissType::Matched; 3],
            preliminary: vec![
                Some(Preliminary::One),
                Some(Preliminary::Many),
                Some(Preliminary::One),
                Some(Preliminary::One),
                None,
            ],
        };
        // two references near candidate 0 and candidate 1, one near candidate 2
        let index_ref = SpatialIndex::from_points(vec![
            (0, Position::new(0.0, 5.0)),
            (1, Position::new(0.0, -5.0)),
            (2, Position::new(100.0, 5.0)),
            (3, Position::new(100.0, -5.0)),
            (4, Position::new(200.0, 5.0)),
        ]);

        let results = run_candidate_pass(&candidates, &pass, &index_ref, 10.0);
        assert_eq!(
            results,
            vec![
                MatchResult::OneToMany,
                MatchResult::ManyToMany,
                MatchResult::OneToOne,
                MatchResult::SpecialTypeExcluded,
                MatchResult::OverDetect,
            ]
        );
    }
}
