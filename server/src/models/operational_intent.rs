//! Operational intent records: declared flight operations consuming a
//! vertiport zone for a time window.

use super::{Manager, Ovn, TimePeriod, VersionNumber, VertiportReservation, Zone, NO_OVN_PHRASE};
use crate::errors::Error;
use chrono::{DateTime, Utc};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// The state of an operational intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationalIntentState {
    Accepted,
    Activated,
    Nonconforming,
    Contingent,
}

impl OperationalIntentState {
    /// Whether transitioning an operational intent to this state requires a
    /// valid strategic-deconfliction key. The two off-nominal states do
    /// not; a USS must be able to declare them without a complete view.
    pub fn requires_key(&self) -> bool {
        !matches!(
            self,
            OperationalIntentState::Nonconforming | OperationalIntentState::Contingent
        )
    }
}

impl FromStr for OperationalIntentState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Accepted" => Ok(OperationalIntentState::Accepted),
            "Activated" => Ok(OperationalIntentState::Activated),
            "Nonconforming" => Ok(OperationalIntentState::Nonconforming),
            "Contingent" => Ok(OperationalIntentState::Contingent),
            _ => Err(Error::BadRequest(format!(
                "Invalid OperationalIntent state: `{}`",
                s
            ))),
        }
    }
}

impl Display for OperationalIntentState {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            OperationalIntentState::Accepted => write!(f, "Accepted"),
            OperationalIntentState::Activated => write!(f, "Activated"),
            OperationalIntentState::Nonconforming => write!(f, "Nonconforming"),
            OperationalIntentState::Contingent => write!(f, "Contingent"),
        }
    }
}

/// A declared flight operation against a (vertiport, zone) pair
#[derive(Debug, Clone, PartialEq)]
pub struct OperationalIntent {
    pub id: Uuid,
    pub manager: Manager,
    pub version: VersionNumber,
    pub state: OperationalIntentState,
    pub ovn: Ovn,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub uss_base_url: String,

    /// The supporting subscription, either caller-supplied or implicit
    pub subscription_id: Uuid,

    pub vertiport_id: Uuid,
    pub zone: Zone,
}

impl OperationalIntent {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_requires_key() {
        assert!(OperationalIntentState::Accepted.requires_key());
        assert!(OperationalIntentState::Activated.requires_key());
        assert!(!OperationalIntentState::Nonconforming.requires_key());
        assert!(!OperationalIntentState::Contingent.requires_key());
    }

    #[test]
    fn test_state_from_str() {
        assert_eq!(
            "Accepted".parse::<OperationalIntentState>().unwrap(),
            OperationalIntentState::Accepted
        );
        assert_eq!(
            "Contingent".parse::<OperationalIntentState>().unwrap(),
            OperationalIntentState::Contingent
        );
        assert!("Landed".parse::<OperationalIntentState>().is_err());
        assert!("".parse::<OperationalIntentState>().is_err());
    }
}
