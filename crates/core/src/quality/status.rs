use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Unknown,
    Unaired,
    Snatched,
    Wanted,
    Downloaded,
    Skipped,
    Archived,
    Ignored,
    SnatchedProper,
    Failed,
    /// Snatched at a best quality with upgrade-once set; nothing left to search for.
    SnatchedBest,
}

impl Status {
    /// Stable numeric code stored in the low two decimal digits of a packed status.
    pub fn code(self) -> i32 {
        match self {
            Status::Unknown => 0,
            Status::Unaired => 1,
            Status::Snatched => 2,
            Status::Wanted => 3,
            Status::Downloaded => 4,
            Status::Skipped => 5,
            Status::Archived => 6,
            Status::Ignored => 7,
            Status::SnatchedProper => 9,
            Status::Failed => 11,
            Status::SnatchedBest => 12,
        }
    }

    /// Decode a status code. Codes that no status uses decode to `Unknown`.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Status::Unaired,
            2 => Status::Snatched,
            3 => Status::Wanted,
            4 => Status::Downloaded,
            5 => Status::Skipped,
            6 => Status::Archived,
            7 => Status::Ignored,
            9 => Status::SnatchedProper,
            11 => Status::Failed,
            12 => Status::SnatchedBest,
            _ => Status::Unknown,
        }
    }

    pub fn is_snatched(self) -> bool {
        matches!(
            self,
            Status::Snatched | Status::SnatchedProper | Status::SnatchedBest
        )
    }

    /// True when a copy of the episode is held (or on its way).
    pub fn is_held(self) -> bool {
        self.is_snatched() || matches!(self, Status::Downloaded | Status::Archived)
    }

    pub const ALL: [Status; 11] = [
        Status::Unknown,
        Status::Unaired,
        Status::Snatched,
        Status::Wanted,
        Status::Downloaded,
        Status::Skipped,
        Status::Archived,
        Status::Ignored,
        Status::SnatchedProper,
        Status::Failed,
        Status::SnatchedBest,
    ];
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Unknown => "Unknown",
            Status::Unaired => "Unaired",
            Status::Snatched => "Snatched",
            Status::Wanted => "Wanted",
            Status::Downloaded => "Downloaded",
            Status::Skipped => "Skipped",
            Status::Archived => "Archived",
            Status::Ignored => "Ignored",
            Status::SnatchedProper => "Snatched (Proper)",
            Status::Failed => "Failed",
            Status::SnatchedBest => "Snatched (Best)",
        };
        f.write_str(s)
    }
}

/// Release quality.
///
/// Variants are declared in ascending order of preference, so the derived
/// ordering is the ranking used everywhere. `Unknown` sorts below every real
/// quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Unknown,
    None,
    Sdtv,
    Sddvd,
    Hdtv,
    HdWebDl,
    FullHdTv,
    FullHdWebDl,
    HdBluray,
    FullHdBluray,
    Uhd4kWeb,
    Uhd4kBluray,
}

impl Quality {
    /// Bit value stored above the status code in a packed status.
    pub fn bits(self) -> i32 {
        match self {
            Quality::None => 0,
            Quality::Sdtv => 1,
            Quality::Sddvd => 1 << 1,
            Quality::Hdtv => 1 << 2,
            Quality::HdWebDl => 1 << 3,
            Quality::FullHdTv => 1 << 4,
            Quality::FullHdWebDl => 1 << 5,
            Quality::HdBluray => 1 << 6,
            Quality::FullHdBluray => 1 << 7,
            Quality::Uhd4kWeb => 1 << 8,
            Quality::Uhd4kBluray => 1 << 9,
            Quality::Unknown => 1 << 15,
        }
    }

    /// Decode quality bits. Any value that is not exactly one known bit is `Unknown`.
    pub fn from_bits(bits: i32) -> Self {
        Quality::ALL
            .iter()
            .copied()
            .find(|q| q.bits() == bits)
            .unwrap_or(Quality::Unknown)
    }

    pub const ALL: [Quality; 12] = [
        Quality::Unknown,
        Quality::None,
        Quality::Sdtv,
        Quality::Sddvd,
        Quality::Hdtv,
        Quality::HdWebDl,
        Quality::FullHdTv,
        Quality::FullHdWebDl,
        Quality::HdBluray,
        Quality::FullHdBluray,
        Quality::Uhd4kWeb,
        Quality::Uhd4kBluray,
    ];
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Quality::Unknown => "Unknown",
            Quality::None => "N/A",
            Quality::Sdtv => "SD TV",
            Quality::Sddvd => "SD DVD",
            Quality::Hdtv => "HD TV",
            Quality::HdWebDl => "720p WEB-DL",
            Quality::FullHdTv => "1080p HD TV",
            Quality::FullHdWebDl => "1080p WEB-DL",
            Quality::HdBluray => "720p BluRay",
            Quality::FullHdBluray => "1080p BluRay",
            Quality::Uhd4kWeb => "2160p UHD 4K WEB",
            Quality::Uhd4kBluray => "2160p UHD 4K BluRay",
        };
        f.write_str(s)
    }
}

/// Status and quality packed into one integer: `quality_bits * 100 + status_code`.
///
/// Only values built with [`PackedStatus::compose`] are meaningful. Any other
/// integer still splits into some `(Status, Quality)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackedStatus(i32);

impl PackedStatus {
    pub fn compose(status: Status, quality: Quality) -> Self {
        Self(quality.bits() * 100 + status.code())
    }

    pub fn split(self) -> (Status, Quality) {
        (
            Status::from_code(self.0.rem_euclid(100)),
            Quality::from_bits(self.0.div_euclid(100)),
        )
    }

    pub fn status(self) -> Status {
        self.split().0
    }

    pub fn quality(self) -> Quality {
        self.split().1
    }

    /// Wrap a value read back from storage.
    pub fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for PackedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (status, quality) = self.split();
        write!(f, "{} [{}]", status, quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_split_compose_roundtrip_every_pair() {
        for status in Status::ALL {
            for quality in Quality::ALL {
                let packed = PackedStatus::compose(status, quality);
                assert_eq!(packed.split(), (status, quality), "{:?}", packed);
            }
        }
    }

    #[test]
    fn test_compose_is_injective() {
        let mut seen = HashSet::new();
        for status in Status::ALL {
            for quality in Quality::ALL {
                assert!(seen.insert(PackedStatus::compose(status, quality).raw()));
            }
        }
    }

    #[test]
    fn test_split_is_total() {
        for raw in [-1, -250, 8, 10, 99, 301, 1_234_567, i32::MAX, i32::MIN] {
            let (status, quality) = PackedStatus::from_raw(raw).split();
            assert!(Status::ALL.contains(&status));
            assert!(Quality::ALL.contains(&quality));
        }
        assert_eq!(PackedStatus::from_raw(8).status(), Status::Unknown);
        assert_eq!(PackedStatus::from_raw(300 + 3).quality(), Quality::Unknown);
    }

    #[test]
    fn test_quality_ordering() {
        assert!(Quality::Sdtv < Quality::Sddvd);
        assert!(Quality::Hdtv < Quality::HdWebDl);
        assert!(Quality::FullHdWebDl < Quality::HdBluray);
        assert!(Quality::Uhd4kWeb < Quality::Uhd4kBluray);
        assert!(Quality::Unknown < Quality::Sdtv);
    }

    #[test]
    fn test_status_groups() {
        assert!(Status::SnatchedBest.is_snatched());
        assert!(Status::Downloaded.is_held());
        assert!(!Status::Wanted.is_held());
        assert!(!Status::Failed.is_snatched());
    }

    #[test]
    fn test_packed_serializes_as_integer() {
        let packed = PackedStatus::compose(Status::Downloaded, Quality::Hdtv);
        assert_eq!(serde_json::to_string(&packed).unwrap(), "404");
    }
}
