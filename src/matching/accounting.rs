use tracing::warn;

use super::types::{MatchResult, MatchStats, MissType};
use crate::model::ContaminationRule;
use crate::observation::Observation;
use crate::util::ratio;

/// Contamination flag per candidate. Only over-detections can be contaminated.
pub(super) fn contamination_flags(
    candidates: &[Observation],
    results: &[MatchResult],
    rule: &ContaminationRule,
) -> Vec<bool> {
    candidates
        .iter()
        .zip(results)
        .map(|(candidate, result)| {
            *result == MatchResult::OverDetect && candidate.is_contaminated(rule)
        })
        .collect()
}

/// Aggregate counts. Edge and contamination exclusions change counts only,
/// never tags.
pub(super) fn build_stats(
    candidates: &[Observation],
    results: &[MatchResult],
    miss_types: &[MissType],
    contaminated: &[bool],
) -> MatchStats {
    let mut stats = MatchStats {
        candidate_count: candidates.len(),
        reference_count: miss_types.len(),
        ..MatchStats::default()
    };

    for ((candidate, result), is_contaminated) in candidates.iter().zip(results).zip(contaminated) {
        match result {
            MatchResult::SpecialTypeExcluded => stats.special_type_count += 1,
            MatchResult::OneToOne => stats.one_to_one += 1,
            MatchResult::ManyToOne => stats.many_to_one += 1,
            MatchResult::OneToMany => stats.one_to_many += 1,
            MatchResult::ManyToMany => stats.many_to_many += 1,
            MatchResult::OverDetect => {}
        }

        if candidate.is_special_type {
            continue;
        }
        if candidate.is_edge_point {
            stats.edge_count += 1;
            if *result == MatchResult::OverDetect {
                stats.edge_over_detect += 1;
            }
            continue;
        }

        stats.detected_candidate_count += 1;
        if *result == MatchResult::OverDetect {
            stats.over_detect_tagged += 1;
            if *is_contaminated {
                stats.contaminated += 1;
            }
        }
    }

    for miss_type in miss_types {
        match miss_type {
            MissType::BasicMiss => stats.basic_miss += 1,
            MissType::ClassifiedMiss => stats.classified_miss += 1,
            MissType::Matched => {}
        }
    }

    stats.correct = stats.reference_count - (stats.basic_miss + stats.classified_miss);
    stats.over_detect = stats.detected_candidate_count as i64 - stats.correct as i64;
    stats.clean_over_detect = stats.over_detect_tagged - stats.contaminated;
    stats.capture_rate = ratio(stats.correct, stats.reference_count);
    stats.over_detect_rate = ratio(stats.clean_over_detect, stats.detected_candidate_count);

    stats
}

/// Checks that tagged over-detections and correct detections add up to the
/// detected candidate count. A mismatch is reported, never fatal.
pub(super) fn reconciliation_warnings(stats: &MatchStats) -> Vec<String> {
    let accounted = stats.over_detect_tagged + stats.correct;
    if accounted == stats.detected_candidate_count {
        return Vec::new();
    }

    warn!(
        over_detect_tagged = stats.over_detect_tagged,
        correct = stats.correct,
        detected = stats.detected_candidate_count,
        "over-detect and correct counts do not reconcile with detected candidates"
    );

    vec![format!(
        "over-detect ({}) + correct ({}) = {} does not equal detected candidate count ({})",
        stats.over_detect_tagged, stats.correct, accounted, stats.detected_candidate_count
    )]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_and_contaminated_over_detections_are_counted_apart() {
        let saturated = ContaminationRule::default();
        let candidates = vec![
            Observation::at(0.0, 0.0),
            Observation::at(0.0, 0.0).with_feature("DW1O_MaxOrg", 65_535.0),
            Observation::at(0.0, 0.0).with_edge_point(true),
            Observation::at(0.0, 0.0).with_special_type(true).with_edge_point(true),
            Observation::at(0.0, 0.0),
        ];
        let results = vec![
            MatchResult::OverDetect,
            MatchResult::OverDetect,
            MatchResult::OverDetect,
            MatchResult::SpecialTypeExcluded,
            MatchResult::OneToOne,
        ];
        let misses = vec![MissType::Matched, MissType::BasicMiss, MissType::ClassifiedMiss];

        let flags = contamination_flags(&candidates, &results, &saturated);
        assert_eq!(flags, vec![false, true, false, false, false]);

        let stats = build_stats(&candidates, &results, &misses, &flags);
        assert_eq!(stats.special_type_count, 1);
        assert_eq!(stats.edge_count, 1);
        assert_eq!(stats.edge_over_detect, 1);
        assert_eq!(stats.detected_candidate_count, 3);
        assert_eq!(stats.over_detect_tagged, 2);
        assert_eq!(stats.contaminated, 1);
        assert_eq!(stats.clean_over_detect, 1);
        assert_eq!(stats.correct, 1);
        assert_eq!(stats.basic_miss, 1);
        assert_eq!(stats.classified_miss, 1);
        assert_eq!(stats.over_detect, 2);
        assert_eq!(stats.capture_rate, Some(1.0 / 3.0));
        assert_eq!(stats.over_detect_rate, Some(1.0 / 3.0));
        assert!(reconciliation_warnings(&stats).is_empty());
    }

    #[test]
    fn shared_reference_breaks_reconciliation_with_a_warning() {
        let candidates = vec![Observation::at(0.0, 0.0), Observation::at(1.0, 0.0)];
        let results = vec![MatchResult::ManyToOne, MatchResult::ManyToOne];
        let misses = vec![MissType::Matched];

        let stats = build_stats(&candidates, &results, &misses, &[false, false]);
        assert_eq!(stats.over_detect, 1);
        assert_eq!(stats.over_detect_tagged, 0);

        let warnings = reconciliation_warnings(&stats);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("detected candidate count (2)"));
    }

    #[test]
    fn empty_tables_have_no_rates() {
        let stats = build_stats(&[], &[], &[], &[]);
        assert_eq!(stats, MatchStats::default());
        assert!(reconciliation_warnings(&stats).is_empty());
    }
}
