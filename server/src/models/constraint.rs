//! Constraint records: administrative reservations blocking a vertiport
//! zone for a time window.

use super::{Manager, Ovn, TimePeriod, VersionNumber, VertiportReservation, Zone, NO_OVN_PHRASE};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// An administrative reservation against a (vertiport, zone) pair
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub id: Uuid,
    pub manager: Manager,
    pub version: VersionNumber,
    pub ovn: Ovn,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub uss_base_url: String,
    pub vertiport_id: Uuid,
    pub zone: Zone,
}

impl Constraint {
    /// The record's time window as a half-open period
    pub fn time_period(&self) -> TimePeriod {
        TimePeriod {
            from: self.start_time,
            to: self.end_time,
        }
    }

    /// The record's full extent, usable as a search filter
    pub fn extent(&self) -> VertiportReservation {
        VertiportReservation {
            vertiport_id: self.vertiport_id,
            zone: self.zone,
            start_time: Some(self.start_time),
            end_time: Some(self.end_time),
        }
    }

    /// Replaces the OVN with the redaction sentinel when the record is not
    /// owned by `manager`
    pub fn redact_for(mut self, manager: &Manager) -> Self {
        if &self.manager != manager {
            self.ovn = Ovn::new(NO_OVN_PHRASE);
        }
        self
    }
}
