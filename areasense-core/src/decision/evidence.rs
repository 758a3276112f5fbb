//! Scanner evidence for one device at one tick

use std::collections::BTreeMap;

use crate::{
    filter::{DistanceModel, LinkState},
    model::{AreaId, FloorId, ScannerId, Topology},
    time::Timestamp,
};

use super::state::EvidenceSource;

/// One fresh, online scanner observing the device
#[derive(Debug, Clone, PartialEq)]
pub struct ScannerEvidence {
    /// Observing scanner
    pub scanner_id: ScannerId,
    /// Room the scanner is installed in
    pub area_id: AreaId,
    /// Floor of that room
    pub floor_id: FloorId,
    /// Smoothed RSSI (dBm)
    pub rssi: f64,
    /// Smoothed RSSI variance (dB²)
    pub rssi_variance: f64,
    /// Path-loss distance (m)
    pub distance: f64,
    /// Propagated distance variance (m²)
    pub distance_variance: f64,
    /// Link samples since the filter was last reset
    pub sample_count: u32,
    /// Raw RSSI variance over recent history
    pub raw_variance: Option<f64>,
    /// Time of the link's latest accepted reading
    pub last_update: Timestamp,
}

/// A room competing in the decision
#[derive(Debug, Clone, PartialEq)]
pub struct AreaCandidate {
    /// Room
    pub area_id: AreaId,
    /// Its floor, if known
    pub floor_id: Option<FloorId>,
    /// Evidence kind
    pub source: EvidenceSource,
    /// Distance or virtual distance (m); `None` for RSSI fallback
    pub distance: Option<f64>,
    /// Distance variance (m²)
    pub variance: f64,
    /// Strongest smoothed RSSI backing the room
    pub rssi: Option<f64>,
    /// Scanner behind the candidate
    pub scanner_id: Option<ScannerId>,
    /// Link history behind the candidate
    pub sample_count: u32,
}

/// Evidence from every fresh link whose scanner is known and online
///
/// Scanners missing from the topology, offline or stale beyond
/// `evidence_window_secs` contribute nothing. Ordered by scanner id.
pub fn gather_evidence<M: DistanceModel>(
    links: &BTreeMap<ScannerId, LinkState>,
    topology: &Topology,
    model: &M,
    now: Timestamp,
    evidence_window_secs: f64,
) -> Vec<ScannerEvidence> {
    links
        .iter()
        .filter_map(|(scanner_id, link)| {
            let info = topology.scanner(scanner_id)?;
            if !info.online {
                return None;
            }
            let estimate = link.fresh_estimate(now, evidence_window_secs)?;
            let distance = model.distance(estimate.smoothed_rssi);
            let distance_variance = model.distance_variance(estimate.smoothed_rssi, estimate.variance);
            if !distance.is_finite() || !distance_variance.is_finite() {
                return None;
            }
            Some(ScannerEvidence {
                scanner_id: scanner_id.clone(),
                area_id: info.area_id.clone(),
                floor_id: info.floor_id.clone(),
                rssi: estimate.smoothed_rssi,
                rssi_variance: estimate.variance,
                distance,
                distance_variance,
                sample_count: estimate.sample_count,
                raw_variance: link.raw_variance(),
                last_update: estimate.last_update,
            })
        })
        .collect()
}

/// Closest in-radius scanner per room
pub fn physical_candidates(evidence: &[ScannerEvidence], max_radius: f64) -> BTreeMap<AreaId, AreaCandidate> {
    let mut out: BTreeMap<AreaId, AreaCandidate> = BTreeMap::new();
    for e in evidence.iter().filter(|e| e.distance <= max_radius) {
        let closer = out
            .get(&e.area_id)
            .and_then(|c| c.distance)
            .map_or(true, |d| e.distance < d);
        if closer {
            out.insert(
                e.area_id.clone(),
                AreaCandidate {
                    area_id: e.area_id.clone(),
                    floor_id: Some(e.floor_id.clone()),
                    source: EvidenceSource::Physical,
                    distance: Some(e.distance),
                    variance: e.distance_variance,
                    rssi: Some(e.rssi),
                    scanner_id: Some(e.scanner_id.clone()),
                    sample_count: e.sample_count,
                },
            );
        }
    }
    out
}

/// Strongest scanner per room, ignoring distance
pub fn rssi_candidates(evidence: &[ScannerEvidence]) -> BTreeMap<AreaId, AreaCandidate> {
    let mut out: BTreeMap<AreaId, AreaCandidate> = BTreeMap::new();
    for e in evidence {
        let stronger = out
            .get(&e.area_id)
            .and_then(|c| c.rssi)
            .map_or(true, |r| e.rssi > r);
        if stronger {
            out.insert(
                e.area_id.clone(),
                AreaCandidate {
                    area_id: e.area_id.clone(),
                    floor_id: Some(e.floor_id.clone()),
                    source: EvidenceSource::RssiFallback,
                    distance: None,
                    variance: e.rssi_variance,
                    rssi: Some(e.rssi),
                    scanner_id: Some(e.scanner_id.clone()),
                    sample_count: e.sample_count,
                },
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::FilterConfig, filter::{LinkFilter, LogDistanceModel}};

    fn topology() -> Topology {
        let mut t = Topology::new();
        t.add_scanner("k1", "kitchen", "ground");
        t.add_scanner("k2", "kitchen", "ground");
        t.add_scanner("l1", "lounge", "ground");
        t
    }

    fn link(rssi: f64, at: Timestamp) -> LinkState {
        let mut state = LinkState::new(LinkFilter::from_config(&FilterConfig::default()));
        state.observe(rssi, at, 20.0);
        state
    }

    #[test]
    fn stale_offline_and_unknown_links_are_dropped() {
        let mut t = topology();
        t.set_online(&"l1".into(), false);

        let mut links = BTreeMap::new();
        links.insert(ScannerId::from("k1"), link(-60.0, 9_000));
        links.insert(ScannerId::from("k2"), link(-60.0, 1_000));
        links.insert(ScannerId::from("l1"), link(-60.0, 9_000));
        links.insert(ScannerId::from("ghost"), link(-60.0, 9_000));

        let model = LogDistanceModel::new(-59.0, 3.0);
        let evidence = gather_evidence(&links, &t, &model, 25_000, 20.0);
        let ids: Vec<&str> = evidence.iter().map(|e| e.scanner_id.as_str()).collect();
        assert_eq!(ids, vec!["k1"]);
    }

    #[test]
    fn closest_scanner_represents_room() {
        let model = LogDistanceModel::new(-59.0, 3.0);
        let mut links = BTreeMap::new();
        links.insert(ScannerId::from("k1"), link(-75.0, 1_000));
        links.insert(ScannerId::from("k2"), link(-62.0, 1_000));
        links.insert(ScannerId::from("l1"), link(-95.0, 1_000));

        let evidence = gather_evidence(&links, &topology(), &model, 1_000, 20.0);
        let physical = physical_candidates(&evidence, 20.0);

        let kitchen = &physical[&AreaId::from("kitchen")];
        assert_eq!(kitchen.scanner_id.as_ref().map(|s| s.as_str()), Some("k2"));
        // -95 dBm at n = 3 is ~15.8 m, inside the radius
        assert!(physical.contains_key(&AreaId::from("lounge")));

        let near_only = physical_candidates(&evidence, 10.0);
        assert!(!near_only.contains_key(&AreaId::from("lounge")));

        let fallback = rssi_candidates(&evidence);
        assert_eq!(fallback[&AreaId::from("kitchen")].rssi, Some(-62.0));
    }
}
