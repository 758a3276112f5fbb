//! One learning write per room per tick
//!
//! Several devices may qualify as learning sources for the same room in one
//! tick. Feeding each would multiply the room's learning rate by the number
//! of sources, so candidates are grouped by room and combined per scanner
//! with a median before a single update. When any reference device reports
//! for a room, only references are used for it.

use std::collections::BTreeMap;

use crate::{
    fusion::ConfidenceScore,
    model::{AreaId, DeviceId, ScannerId},
};

/// A device that passed the per-device gates this tick
#[derive(Debug, Clone, PartialEq)]
pub struct LearningCandidate {
    /// Source device
    pub device_id: DeviceId,
    /// Room the device was decided into
    pub area_id: AreaId,
    /// Smoothed RSSI per contributing scanner
    pub readings: BTreeMap<ScannerId, f64>,
    /// Decision confidence
    pub confidence: ConfidenceScore,
    /// Fixed-location reference device
    pub is_reference: bool,
}

/// Combined update for one room
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedUpdate {
    /// Target room
    pub area_id: AreaId,
    /// Median RSSI per scanner
    pub readings: BTreeMap<ScannerId, f64>,
    /// Median confidence
    pub confidence: ConfidenceScore,
    /// Devices that contributed
    pub sources: usize,
    /// Built from references only
    pub from_references: bool,
}

/// Median of `values`; averages the middle pair for even lengths
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) * 0.5)
    } else {
        Some(values[mid])
    }
}

/// Group candidates by room and median-combine each group
///
/// Output is ordered by room id.
pub fn aggregate(candidates: &[LearningCandidate]) -> Vec<AggregatedUpdate> {
    let mut by_room: BTreeMap<&AreaId, Vec<&LearningCandidate>> = BTreeMap::new();
    for candidate in candidates {
        by_room.entry(&candidate.area_id).or_default().push(candidate);
    }

    by_room
        .into_iter()
        .filter_map(|(area_id, group)| {
            let from_references = group.iter().any(|c| c.is_reference);
            let sources: Vec<&LearningCandidate> = group
                .into_iter()
                .filter(|c| !from_references || c.is_reference)
                .collect();

            let mut per_scanner: BTreeMap<&ScannerId, Vec<f64>> = BTreeMap::new();
            for source in &sources {
                for (scanner, rssi) in &source.readings {
                    per_scanner.entry(scanner).or_default().push(*rssi);
                }
            }

            let readings: BTreeMap<ScannerId, f64> = per_scanner
                .into_iter()
                .filter_map(|(scanner, mut values)| median(&mut values).map(|m| (scanner.clone(), m)))
                .collect();
            if readings.is_empty() {
                return None;
            }

            let mut confidences: Vec<f64> = sources.iter().map(|c| c.confidence.as_float()).collect();
            let confidence = median(&mut confidences).map(ConfidenceScore::from_float)?;

            Some(AggregatedUpdate {
                area_id: area_id.clone(),
                readings,
                confidence,
                sources: sources.len(),
                from_references,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(device: &str, area: &str, readings: &[(&str, f64)], reference: bool) -> LearningCandidate {
        LearningCandidate {
            device_id: device.into(),
            area_id: area.into(),
            readings: readings.iter().map(|(s, r)| (ScannerId::from(*s), *r)).collect(),
            confidence: ConfidenceScore::from_float(0.9),
            is_reference: reference,
        }
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn one_update_per_room() {
        let candidates: Vec<_> = (0..5)
            .map(|i| candidate(&format!("ref{}", i), "office", &[("a", -60.0 - i as f64), ("b", -70.0)], true))
            .collect();

        let updates = aggregate(&candidates);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].sources, 5);
        assert_eq!(updates[0].readings[&ScannerId::from("a")], -62.0);
        assert_eq!(updates[0].readings[&ScannerId::from("b")], -70.0);
    }

    #[test]
    fn references_take_precedence() {
        let candidates = vec![
            candidate("phone", "office", &[("a", -80.0)], false),
            candidate("beacon", "office", &[("a", -58.0)], true),
            candidate("watch", "kitchen", &[("a", -75.0)], false),
        ];

        let updates = aggregate(&candidates);
        assert_eq!(updates.len(), 2);

        let office = updates.iter().find(|u| u.area_id.as_str() == "office").unwrap();
        assert!(office.from_references);
        assert_eq!(office.sources, 1);
        assert_eq!(office.readings[&ScannerId::from("a")], -58.0);

        let kitchen = updates.iter().find(|u| u.area_id.as_str() == "kitchen").unwrap();
        assert!(!kitchen.from_references);
    }
}
