//! Identifiers, samples and scanner topology
//!
//! Identifiers are stable strings supplied by collaborators. Device ids are
//! already resolved from rotating addresses before they reach the core, and
//! areas are keyed by room id, never by an address.

use core::fmt;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from anything string-like
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Stable identity of a tracked device
    DeviceId
);
string_id!(
    /// Fixed receiver identity
    ScannerId
);
string_id!(
    /// Room identity
    AreaId
);
string_id!(
    /// Floor identity (a group of rooms)
    FloorId
);

/// One RSSI observation of a device by a scanner
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Tracked device
    pub device_id: DeviceId,
    /// Reporting scanner
    pub scanner_id: ScannerId,
    /// Received signal strength in dBm
    pub rssi: f64,
    /// Reception time
    pub timestamp: Timestamp,
}

impl Sample {
    /// Build a sample
    pub fn new(
        device_id: impl Into<DeviceId>,
        scanner_id: impl Into<ScannerId>,
        rssi: f64,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            scanner_id: scanner_id.into(),
            rssi,
            timestamp,
        }
    }
}

/// Placement and health of one scanner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerInfo {
    /// Room the scanner is installed in
    pub area_id: AreaId,
    /// Floor of that room
    pub floor_id: FloorId,
    /// Whether the scanner is currently reporting
    pub online: bool,
}

/// Static information about a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaInfo {
    /// Floor the room belongs to
    pub floor_id: FloorId,
}

/// Scanner and room catalogue, refreshed by the host every tick
///
/// Rooms that appear in the catalogue without any scanner are "scannerless"
/// and can only be reached through fingerprint matching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    scanners: BTreeMap<ScannerId, ScannerInfo>,
    areas: BTreeMap<AreaId, AreaInfo>,
}

impl Topology {
    /// Empty topology
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an online scanner; its room is registered on the same floor
    pub fn add_scanner(
        &mut self,
        scanner: impl Into<ScannerId>,
        area: impl Into<AreaId>,
        floor: impl Into<FloorId>,
    ) {
        let area = area.into();
        let floor = floor.into();
        self.areas
            .entry(area.clone())
            .or_insert_with(|| AreaInfo { floor_id: floor.clone() });
        self.scanners.insert(
            scanner.into(),
            ScannerInfo {
                area_id: area,
                floor_id: floor,
                online: true,
            },
        );
    }

    /// Register a room, with or without scanners
    pub fn add_area(&mut self, area: impl Into<AreaId>, floor: impl Into<FloorId>) {
        self.areas.insert(area.into(), AreaInfo { floor_id: floor.into() });
    }

    /// Mark a scanner online/offline; unknown scanners are ignored
    pub fn set_online(&mut self, scanner: &ScannerId, online: bool) {
        if let Some(info) = self.scanners.get_mut(scanner) {
            info.online = online;
        }
    }

    /// Look up a scanner
    pub fn scanner(&self, scanner: &ScannerId) -> Option<&ScannerInfo> {
        self.scanners.get(scanner)
    }

    /// Whether a scanner is known and online
    pub fn is_online(&self, scanner: &ScannerId) -> bool {
        self.scanners.get(scanner).map(|s| s.online).unwrap_or(false)
    }

    /// All scanners in id order
    pub fn scanners(&self) -> impl Iterator<Item = (&ScannerId, &ScannerInfo)> {
        self.scanners.iter()
    }

    /// All rooms in id order
    pub fn areas(&self) -> impl Iterator<Item = (&AreaId, &AreaInfo)> {
        self.areas.iter()
    }

    /// Floor of a room
    pub fn area_floor(&self, area: &AreaId) -> Option<&FloorId> {
        self.areas.get(area).map(|a| &a.floor_id)
    }

    /// Scanners installed in a room
    pub fn scanners_in_area<'a>(&'a self, area: &'a AreaId) -> impl Iterator<Item = &'a ScannerId> + 'a {
        self.scanners
            .iter()
            .filter(move |(_, info)| &info.area_id == area)
            .map(|(id, _)| id)
    }

    /// Known room with no physical scanner
    pub fn is_scannerless(&self, area: &AreaId) -> bool {
        self.areas.contains_key(area) && self.scanners_in_area(area).next().is_none()
    }

    /// Scanners whose readings describe `area`
    ///
    /// A room's own scanners, or every scanner on its floor when the room has
    /// none of its own.
    pub fn scanners_serving<'a>(&'a self, area: &'a AreaId) -> impl Iterator<Item = &'a ScannerId> + 'a {
        let floor = if self.is_scannerless(area) { self.area_floor(area) } else { None };
        self.scanners
            .iter()
            .filter(move |(_, info)| match floor {
                Some(floor) => &info.floor_id == floor,
                None => &info.area_id == area,
            })
            .map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanner_registers_its_area() {
        let mut topo = Topology::new();
        topo.add_scanner("s1", "kitchen", "ground");

        let kitchen = AreaId::from("kitchen");
        assert_eq!(topo.area_floor(&kitchen), Some(&FloorId::from("ground")));
        assert!(!topo.is_scannerless(&kitchen));
        assert!(topo.is_online(&ScannerId::from("s1")));
    }

    #[test]
    fn scannerless_rooms() {
        let mut topo = Topology::new();
        topo.add_scanner("s1", "kitchen", "ground");
        topo.add_area("pantry", "ground");

        assert!(topo.is_scannerless(&AreaId::from("pantry")));
        assert!(!topo.is_scannerless(&AreaId::from("unknown")));
    }

    #[test]
    fn scannerless_room_is_served_by_its_floor() {
        let mut topo = Topology::new();
        topo.add_scanner("k1", "kitchen", "ground");
        topo.add_scanner("l1", "lounge", "ground");
        topo.add_scanner("b1", "bedroom", "upstairs");
        topo.add_area("pantry", "ground");

        let kitchen = AreaId::from("kitchen");
        let pantry = AreaId::from("pantry");
        let own: Vec<&str> = topo.scanners_serving(&kitchen).map(|s| s.as_str()).collect();
        assert_eq!(own, vec!["k1"]);
        let floor: Vec<&str> = topo.scanners_serving(&pantry).map(|s| s.as_str()).collect();
        assert_eq!(floor, vec!["k1", "l1"]);
    }

    #[test]
    fn offline_scanner() {
        let mut topo = Topology::new();
        topo.add_scanner("s1", "kitchen", "ground");
        topo.set_online(&ScannerId::from("s1"), false);

        assert!(!topo.is_online(&ScannerId::from("s1")));
        assert!(!topo.is_online(&ScannerId::from("missing")));
    }
}
