//! Fingerprint matching against learned room profiles
//!
//! For each room, over the scanners the UKF and the profile share:
//!
//! ```text
//! Σ   = P_ukf[overlap] + diag(σ²_profile)
//! d²  = (x - μ)ᵀ Σ⁻¹ (x - μ)                     absolute terms
//!     + Σ_pairs (δ_obs - δ_μ)² / (σ²_δ + Var(x_a - x_b))
//! dof = n_absolute + n_pairs
//! score = exp(-0.5 · d² / dof)
//! ```
//!
//! Normalising by `dof` keeps scores comparable between rooms that share
//! different numbers of scanners with the device.

use std::cmp::Ordering;

use crate::{
    config::DecisionConfig,
    constants::{
        estimator::{MAX_DIMENSIONS, MIN_MATCH_SCANNERS},
        learning::MIN_VARIANCE,
    },
    correlation::AreaProfileMap,
    model::AreaId,
};

use super::{
    matrix::{self, MahalanobisMethod},
    RssiUkf,
};

/// Fit of one room to the current joint estimate
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintMatch {
    /// Candidate room
    pub area_id: AreaId,
    /// Combined squared distance
    pub d_squared: f64,
    /// `exp(-0.5 · d² / dof)` in (0, 1]
    pub score: f64,
    /// Absolute scanner terms
    pub scanners_used: usize,
    /// Pair delta terms
    pub pairs_used: usize,
    /// How the absolute term was inverted
    pub method: MahalanobisMethod,
}

/// Outcome of the fingerprint margin rules
#[derive(Debug, Clone, PartialEq)]
pub enum FingerprintVerdict {
    /// The best match may be used as evidence
    Accept {
        /// Selected room
        area_id: AreaId,
        /// Its score
        score: f64,
    },
    /// Ambiguous between the current room and one other; keep the current room
    Hold,
    /// Nothing usable
    NoMatch,
}

impl RssiUkf {
    /// Score every profile, best first
    ///
    /// Rooms sharing fewer than `MIN_MATCH_SCANNERS` scanners with the state
    /// are skipped. Ties sort by room id so ranking is deterministic.
    pub fn match_fingerprints(&self, profiles: &AreaProfileMap, auto_weight_cap: f64) -> Vec<FingerprintMatch> {
        let mut matches: Vec<FingerprintMatch> = profiles
            .iter()
            .filter_map(|(area_id, profile)| {
                let mut overlap: heapless::Vec<(usize, f64, f64), MAX_DIMENSIONS> = heapless::Vec::new();
                for (index, scanner) in self.scanners().iter().enumerate() {
                    if let Some(fused) = profile.absolute(scanner, auto_weight_cap) {
                        let _ = overlap.push((index, fused.mean, fused.variance));
                    }
                }
                let n = overlap.len();
                if n < MIN_MATCH_SCANNERS {
                    return None;
                }

                let mut cov = matrix::zeros();
                let mut diff = [0.0; MAX_DIMENSIONS];
                for (a, (ia, mean_a, var_a)) in overlap.iter().enumerate() {
                    diff[a] = self.mean_at(*ia) - mean_a;
                    for (b, (ib, _, _)) in overlap.iter().enumerate() {
                        cov[a][b] = self.covariance_at(*ia, *ib);
                    }
                    cov[a][a] += var_a;
                }
                let (mut d_squared, method) = matrix::mahalanobis(&cov, &diff, n);

                let scanners = self.scanners();
                let mut pairs_used = 0;
                for a in 0..n {
                    for b in (a + 1)..n {
                        let (ia, ib) = (overlap[a].0, overlap[b].0);
                        let delta = match profile.pair_delta(&scanners[ia], &scanners[ib], auto_weight_cap) {
                            Some(delta) => delta,
                            None => continue,
                        };
                        let observed = self.mean_at(ia) - self.mean_at(ib);
                        let state_var =
                            self.covariance_at(ia, ia) + self.covariance_at(ib, ib) - 2.0 * self.covariance_at(ia, ib);
                        let variance = (delta.variance + state_var.max(0.0)).max(MIN_VARIANCE);
                        let residual = observed - delta.mean;
                        d_squared += residual * residual / variance;
                        pairs_used += 1;
                    }
                }

                let dof = (n + pairs_used) as f64;
                let score = libm::exp(-0.5 * d_squared / dof);
                if !score.is_finite() {
                    return None;
                }
                Some(FingerprintMatch {
                    area_id: area_id.clone(),
                    d_squared,
                    score,
                    scanners_used: n,
                    pairs_used,
                    method,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.area_id.cmp(&b.area_id))
        });
        matches
    }
}

/// `(best - second) / best`; 1.0 with a single candidate
pub fn decision_margin(matches: &[FingerprintMatch]) -> Option<f64> {
    let best = matches.first()?;
    if best.score <= 0.0 {
        return Some(0.0);
    }
    Some(match matches.get(1) {
        Some(second) => (best.score - second.score) / best.score,
        None => 1.0,
    })
}

/// Apply the margin rules to a ranked match list
///
/// - margin ≥ `decision_margin`: accept the best at `min_match_score`
/// - margin below it and the current room in the top two: hold
/// - margin below it otherwise: accept the best only at `uncertain_threshold`
pub fn evaluate_matches(
    matches: &[FingerprintMatch],
    current: Option<&AreaId>,
    config: &DecisionConfig,
) -> FingerprintVerdict {
    let (best, margin) = match (matches.first(), decision_margin(matches)) {
        (Some(best), Some(margin)) => (best, margin),
        _ => return FingerprintVerdict::NoMatch,
    };

    let threshold = if margin < config.decision_margin {
        let current_in_top_two = current
            .map(|area| matches.iter().take(2).any(|m| &m.area_id == area))
            .unwrap_or(false);
        if current_in_top_two {
            return FingerprintVerdict::Hold;
        }
        config.uncertain_threshold
    } else {
        config.min_match_score
    };

    if best.score >= threshold {
        FingerprintVerdict::Accept {
            area_id: best.area_id.clone(),
            score: best.score,
        }
    } else {
        FingerprintVerdict::NoMatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{correlation::AreaProfile, fusion::UkfObservation, model::ScannerId};
    use std::collections::BTreeMap;

    fn trained(area: &str, readings: &[(&str, f64)]) -> AreaProfile {
        let map: BTreeMap<ScannerId, f64> = readings.iter().map(|(s, r)| (ScannerId::from(*s), *r)).collect();
        let mut profile = AreaProfile::new(area.into());
        for _ in 0..10 {
            profile.update_trained(&map);
        }
        profile
    }

    fn settled_ukf(readings: &[(&str, f64)]) -> RssiUkf {
        let mut ukf = RssiUkf::new();
        for i in 0..20 {
            let obs: Vec<UkfObservation> = readings
                .iter()
                .map(|(s, r)| UkfObservation {
                    scanner_id: (*s).into(),
                    rssi: *r,
                    noise: 4.0,
                    timestamp: i * 1_000,
                })
                .collect();
            ukf.update(&obs, i * 1_000).unwrap();
        }
        ukf
    }

    fn profiles() -> AreaProfileMap {
        let mut map = AreaProfileMap::new();
        map.insert("kitchen".into(), trained("kitchen", &[("a", -55.0), ("b", -75.0), ("c", -85.0)]));
        map.insert("lounge".into(), trained("lounge", &[("a", -80.0), ("b", -58.0), ("c", -70.0)]));
        map
    }

    fn fm(area: &str, score: f64) -> FingerprintMatch {
        FingerprintMatch {
            area_id: area.into(),
            d_squared: 0.0,
            score,
            scanners_used: 2,
            pairs_used: 1,
            method: MahalanobisMethod::Cholesky,
        }
    }

    #[test]
    fn best_room_ranks_first() {
        let ukf = settled_ukf(&[("a", -56.0), ("b", -74.0), ("c", -84.0)]);
        let matches = ukf.match_fingerprints(&profiles(), 0.3);

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].area_id.as_str(), "kitchen");
        assert!(matches[0].score > 0.5);
        assert!(matches[1].score < 0.01);
        assert_eq!(matches[0].scanners_used, 3);
        assert_eq!(matches[0].pairs_used, 3);
    }

    #[test]
    fn repeated_matching_is_identical() {
        let ukf = settled_ukf(&[("a", -60.0), ("b", -70.0)]);
        let first = ukf.match_fingerprints(&profiles(), 0.3);
        let second = ukf.match_fingerprints(&profiles(), 0.3);
        assert_eq!(first, second);
    }

    #[test]
    fn single_overlap_is_skipped() {
        let ukf = settled_ukf(&[("a", -56.0), ("z", -60.0)]);
        assert!(ukf.match_fingerprints(&profiles(), 0.3).is_empty());
    }

    #[test]
    fn margin_rules() {
        let config = DecisionConfig::default();
        let kitchen: AreaId = "kitchen".into();
        let hall: AreaId = "hall".into();

        // clear winner
        let clear = [fm("kitchen", 0.8), fm("lounge", 0.2)];
        assert!(matches!(evaluate_matches(&clear, None, &config), FingerprintVerdict::Accept { .. }));

        // ambiguous with current in top two
        let close = [fm("kitchen", 0.40), fm("lounge", 0.38)];
        assert_eq!(evaluate_matches(&close, Some(&kitchen), &config), FingerprintVerdict::Hold);

        // ambiguous, current elsewhere, below the elevated threshold
        assert_eq!(evaluate_matches(&close, Some(&hall), &config), FingerprintVerdict::NoMatch);

        // ambiguous but above the elevated threshold
        let strong = [fm("kitchen", 0.60), fm("lounge", 0.58)];
        assert!(matches!(
            evaluate_matches(&strong, Some(&hall), &config),
            FingerprintVerdict::Accept { ref area_id, .. } if area_id.as_str() == "kitchen"
        ));

        assert_eq!(evaluate_matches(&[], None, &config), FingerprintVerdict::NoMatch);
    }

    #[test]
    fn lone_candidate_has_full_margin() {
        assert_eq!(decision_margin(&[fm("kitchen", 0.4)]), Some(1.0));
        assert_eq!(decision_margin(&[]), None);
    }
}
