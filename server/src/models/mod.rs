//! Model types shared by every record kind: identifiers, opaque version
//! numbers, vertiport zones, and the time-period algebra used for
//! free-period and capacity arithmetic.

pub mod constraint;
pub mod operational_intent;
pub mod subscription;
pub mod vertiport;

use crate::errors::Error;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::ops::Sub;
use url::Url;
use uuid::Uuid;

/// Value for OVN that is returned for entities not owned by the client
pub const NO_OVN_PHRASE: &str = "Available from USS";

/// Valid OVNs are between these lengths, inclusive
const OVN_MIN_LENGTH: usize = 16;
const OVN_MAX_LENGTH: usize = 128;

/// Identity that owns a record; only the owner may mutate it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Manager(String);

impl Manager {
    /// Wraps the authenticated client identity
    pub fn new(name: impl Into<String>) -> Self {
        Manager(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Manager {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Manager {
    fn from(name: &str) -> Self {
        Manager(name.to_owned())
    }
}

/// An opaque version number.
///
/// Recomputed from the record id and the committing transaction's
/// timestamp on every write, so a stale OVN always fails the version gate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Ovn(String);

impl Ovn {
    pub fn new(value: impl Into<String>) -> Self {
        Ovn(value.into())
    }

    /// Encodes an update timestamp as an OVN, salted with the record id
    pub fn from_time(updated_at: &DateTime<Utc>, salt: &str) -> Self {
        let stamp = updated_at.to_rfc3339_opts(SecondsFormat::Nanos, true);
        let digest = Sha256::digest(format!("{}{}", salt, stamp).as_bytes());
        Ovn(URL_SAFE.encode(digest))
    }

    /// True if the OVN indicates an empty opaque version number
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if the OVN has a valid length
    pub fn is_valid(&self) -> bool {
        (OVN_MIN_LENGTH..=OVN_MAX_LENGTH).contains(&self.0.len())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Ovn {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

/// The version of an entity, used as a fencing token in data mutations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionNumber(pub i32);

impl VersionNumber {
    /// True if the value indicates an empty version
    pub fn is_empty(self) -> bool {
        self.0 <= 0
    }

    /// True if this version matches `other`
    pub fn matches(self, other: VersionNumber) -> bool {
        self == other
    }

    /// The version the next successful write will carry
    pub fn next(self) -> VersionNumber {
        VersionNumber(self.0 + 1)
    }
}

impl Display for VersionNumber {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

/// The two logical zones of a vertiport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Zone {
    /// Final-Approach/Take-Off area, capacity 1
    Fato = 0,

    /// Parking stand area of finite capacity
    ParkingStand = 1,
}

impl TryFrom<i32> for Zone {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Zone::Fato),
            1 => Ok(Zone::ParkingStand),
            _ => Err(Error::BadRequest(format!(
                "Invalid vertiport zone: `{}`",
                value
            ))),
        }
    }
}

impl Display for Zone {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Zone::Fato => write!(f, "FATO"),
            Zone::ParkingStand => write!(f, "ParkingStand"),
        }
    }
}

/// The spatial and temporal extent of a record, also used as the search
/// filter for reservation queries. `None` bounds are unbounded.
#[derive(Debug, Clone, PartialEq)]
pub struct VertiportReservation {
    pub vertiport_id: Uuid,
    pub zone: Zone,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// A half-open time period `[from, to)`
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TimePeriod {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimePeriod {
    /// True if the two periods share any instant
    pub fn intersects(&self, other: &TimePeriod) -> bool {
        self.from < other.to && other.from < self.to
    }
}

impl Sub for TimePeriod {
    type Output = Vec<TimePeriod>;

    fn sub(self, other: Self) -> Self::Output {
        // Busy period ends before the free period starts
        //  or busy period starts after the free period ends
        if self.to <= other.from || self.from >= other.to {
            return vec![self];
        }

        // Busy period covers the whole free period
        // |            BUSY             |
        //               +
        //      |   free   |
        //               =
        //       (nothing left free)
        if other.from <= self.from && other.to >= self.to {
            return vec![];
        }

        // Busy period sits in the middle, so the free period splits in two
        //       |  busy  |
        //            +
        // |        free         |
        //            =
        // | free |        | free |
        if self.from < other.from && self.to > other.to {
            return vec![
                TimePeriod {
                    from: self.from,
                    to: other.from,
                },
                TimePeriod {
                    from: other.to,
                    to: self.to,
                },
            ];
        }

        //         | busy |
        //        +
        // |  free   |
        //        =
        // | free |
        if self.from < other.from && self.to <= other.to {
            return vec![TimePeriod {
                from: self.from,
                to: other.from,
            }];
        }

        // |  busy   |
        //          +
        //     |   free    |
        //          =
        //           | free |
        if self.from >= other.from && self.to > other.to {
            return vec![TimePeriod {
                from: other.to,
                to: self.to,
            }];
        }

        models_warn!("(time_period_sub) Unhandled case: {:?} {:?}", self, other);

        vec![]
    }
}

/// Computes the free sub-periods of `[from, to)` left over once every busy
/// period has been cut out. The result is disjoint and ascending.
pub fn free_periods(busy: &[TimePeriod], from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<TimePeriod> {
    let mut free = vec![TimePeriod { from, to }];

    for period in busy {
        free = free
            .into_iter()
            .flat_map(|candidate| candidate - *period)
            .collect();
    }

    free
}

/// Counts the busy periods intersecting `[from, to)`; each intersecting
/// record occupies one parking stand for the whole query window.
pub fn used_count(busy: &[TimePeriod], from: DateTime<Utc>, to: DateTime<Utc>) -> usize {
    let window = TimePeriod { from, to };
    busy.iter().filter(|period| period.intersects(&window)).count()
}

/// Ensures a USS base URL is parseable and uses TLS
pub fn validate_uss_base_url(s: &str) -> Result<(), Error> {
    let url =
        Url::parse(s).map_err(|e| Error::BadRequest(format!("Error parsing USS base URL: {}", e)))?;

    match url.scheme() {
        "https" => Ok(()),
        "http" => Err(Error::BadRequest("uss_base_url must use TLS".to_string())),
        _ => Err(Error::BadRequest(
            "uss_base_url must support https scheme".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn hour(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 10, 20, h, 0, 0).unwrap()
    }

    fn period(from: u32, to: u32) -> TimePeriod {
        TimePeriod {
            from: hour(from),
            to: hour(to),
        }
    }

    #[test]
    fn test_intersects_half_open() {
        assert!(period(10, 12).intersects(&period(11, 13)));
        assert!(period(10, 12).intersects(&period(10, 12)));

        // Touching endpoints do not intersect
        assert!(!period(10, 12).intersects(&period(12, 14)));
        assert!(!period(12, 14).intersects(&period(10, 12)));
    }

    #[test]
    fn test_sub_no_overlap() {
        assert_eq!(period(10, 12) - period(13, 14), vec![period(10, 12)]);
        assert_eq!(period(10, 12) - period(12, 14), vec![period(10, 12)]);
    }

    #[test]
    fn test_sub_covered() {
        assert_eq!(period(10, 12) - period(9, 13), vec![]);
        assert_eq!(period(10, 12) - period(10, 12), vec![]);
    }

    #[test]
    fn test_sub_interior_splits() {
        assert_eq!(
            period(8, 14) - period(10, 12),
            vec![period(8, 10), period(12, 14)]
        );
    }

    #[test]
    fn test_sub_covers_start() {
        assert_eq!(period(10, 14) - period(9, 12), vec![period(12, 14)]);
        assert_eq!(period(10, 14) - period(10, 12), vec![period(12, 14)]);
    }

    #[test]
    fn test_sub_covers_end() {
        assert_eq!(period(10, 14) - period(12, 15), vec![period(10, 12)]);
        assert_eq!(period(10, 14) - period(12, 14), vec![period(10, 12)]);
    }

    #[test]
    fn test_free_periods_partition() {
        let busy = vec![period(10, 11), period(13, 14), period(9, 10)];
        let free = free_periods(&busy, hour(8), hour(16));

        assert_eq!(free, vec![period(8, 9), period(11, 13), period(14, 16)]);

        // Pairwise disjoint and ascending
        for pair in free.windows(2) {
            assert!(pair[0].to <= pair[1].from);
        }
    }

    #[test]
    fn test_free_periods_no_busy() {
        assert_eq!(free_periods(&[], hour(8), hour(9)), vec![period(8, 9)]);
    }

    #[test]
    fn test_free_periods_fully_busy() {
        assert_eq!(free_periods(&[period(7, 18)], hour(8), hour(9)), vec![]);
    }

    #[test]
    fn test_used_count() {
        let busy = vec![period(12, 13), period(12, 13), period(14, 15)];
        assert_eq!(used_count(&busy, hour(12), hour(13)), 2);

        // A record ending exactly at the window start does not occupy it
        assert_eq!(used_count(&[period(10, 12)], hour(12), hour(13)), 0);
    }

    #[test]
    fn test_ovn_from_time() {
        let id = Uuid::new_v4().to_string();
        let at = hour(10);
        let ovn = Ovn::from_time(&at, &id);

        assert!(ovn.is_valid());
        assert!(!ovn.is_empty());

        // Deterministic for the same inputs, distinct otherwise
        assert_eq!(ovn, Ovn::from_time(&at, &id));
        assert_ne!(ovn, Ovn::from_time(&(at + Duration::microseconds(1)), &id));
        assert_ne!(ovn, Ovn::from_time(&at, &Uuid::new_v4().to_string()));
    }

    #[test]
    fn test_ovn_validity_bounds() {
        assert!(!Ovn::new("").is_valid());
        assert!(!Ovn::new("short").is_valid());
        assert!(Ovn::new("a".repeat(16)).is_valid());
        assert!(Ovn::new("a".repeat(128)).is_valid());
        assert!(!Ovn::new("a".repeat(129)).is_valid());
    }

    #[test]
    fn test_version_number() {
        assert!(VersionNumber(0).is_empty());
        assert!(!VersionNumber(1).is_empty());
        assert_eq!(VersionNumber(0).next(), VersionNumber(1));
        assert!(VersionNumber(3).matches(VersionNumber(3)));
        assert!(!VersionNumber(3).matches(VersionNumber(4)));
    }

    #[test]
    fn test_zone_from_i32() {
        assert_eq!(Zone::try_from(0).unwrap(), Zone::Fato);
        assert_eq!(Zone::try_from(1).unwrap(), Zone::ParkingStand);
        assert!(Zone::try_from(2).is_err());
    }

    #[test]
    fn test_validate_uss_base_url() {
        assert!(validate_uss_base_url("https://uss.example.com/usp/v1").is_ok());
        assert!(validate_uss_base_url("http://uss.example.com").is_err());
        assert!(validate_uss_base_url("ftp://uss.example.com").is_err());
        assert!(validate_uss_base_url("not a url").is_err());
    }
}
