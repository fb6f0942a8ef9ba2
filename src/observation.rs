use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{ContaminationRule, ObservationRecord, WaferGeometry};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// One defect observation, candidate or reference.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Observation {
    pub position: Position,
    pub features: BTreeMap<String, Option<f64>>,
    pub defect_type: Option<i64>,
    pub is_special_type: bool,
    pub is_edge_point: bool,
    pub size: Option<f64>,
}

impl Default for Position {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

#[cfg(test)]
impl Observation {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            position: Position::new(x, y),
            ..Self::default()
        }
    }

    pub fn with_feature(mut self, name: &str, value: f64) -> Self {
        self.features.insert(name.to_string(), Some(value));
        self
    }

    pub fn with_special_type(mut self, special: bool) -> Self {
        self.is_special_type = special;
        self
    }

    pub fn with_edge_point(mut self, edge: bool) -> Self {
        self.is_edge_point = edge;
        self
    }
}

impl Observation {
    /// Missing features read as `0.0`; null features read as NaN.
    pub fn feature(&self, name: &str) -> f64 {
        match self.features.get(name) {
            None => 0.0,
            Some(None) => f64::NAN,
            Some(Some(value)) => *value,
        }
    }

    pub fn is_contaminated(&self, rule: &ContaminationRule) -> bool {
        rule.features.iter().any(|name| {
            matches!(self.features.get(name), Some(Some(value)) if *value == rule.sentinel)
        })
    }
}

impl WaferGeometry {
    pub fn is_edge(&self, position: Position) -> bool {
        position.distance_to(Position::new(self.center_x, self.center_y)) >= self.edge_radius
    }
}

/// Builds observations from loader rows.
///
/// A row is special-type when it says so explicitly or when its defect type is
/// one of `special_type_codes`. Rows that do not state `is_edge_point` get it
/// from the wafer geometry.
pub fn observations_from_records(
    records: &[ObservationRecord],
    wafer: &WaferGeometry,
    special_type_codes: &[i64],
) -> Vec<Observation> {
    records
        .iter()
        .map(|record| {
            let position = Position::new(record.x, record.y);
            let code_is_special = record
                .defect_type
                .map(|code| special_type_codes.contains(&code))
                .unwrap_or(false);

            Observation {
                position,
                features: record.features.clone(),
                defect_type: record.defect_type,
                is_special_type: record.is_special_type.unwrap_or(false) || code_is_special,
                is_edge_point: record
                    .is_edge_point
                    .unwrap_or_else(|| wafer.is_edge(position)),
                size: record.size,
            }
        })
        .collect()
}
