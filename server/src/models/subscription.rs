//! Subscription records: interest registrations that receive a
//! notification index bump whenever an overlapping operational intent or
//! constraint changes.

use super::{Manager, Ovn, VertiportReservation, Zone};
use crate::errors::Error;
use crate::models::operational_intent::OperationalIntent;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// The largest allowed interval between start and end time
const MAX_SUBSCRIPTION_DURATION_HOURS: i64 = 24;

/// The largest allowed interval between the start time of a new
/// subscription and the server's idea of the current time
const MAX_CLOCK_SKEW_MINUTES: i64 = 5;

/// A notification interest registration against a (vertiport, zone) pair
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub id: Uuid,

    /// An OVN-like string derived from the committing transaction's
    /// timestamp; unspecified when creating a new subscription.
    pub version: Ovn,

    /// Strictly monotonic counter observed by the subscriber
    pub notification_index: i32,

    pub manager: Manager,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub uss_base_url: String,
    pub notify_for_operational_intents: bool,
    pub notify_for_constraints: bool,

    /// True when minted automatically for an operational intent; implicit
    /// subscriptions widen with their intents and are removed with the
    /// last dependent.
    pub implicit: bool,

    pub vertiport_id: Uuid,
    pub zone: Zone,
}

impl Subscription {
    /// The subscription's extent, usable as a search filter
    pub fn extent(&self) -> VertiportReservation {
        VertiportReservation {
            vertiport_id: self.vertiport_id,
            zone: self.zone,
            start_time: Some(self.start_time),
            end_time: Some(self.end_time),
        }
    }

    /// Resolves the requested time range against the clock and any
    /// previous version of the subscription.
    ///
    /// An omitted start defaults to `now` on creation and is carried over
    /// on update; an explicit start may not lie more than the allowed
    /// clock skew in the past. An omitted end is carried over on update
    /// and otherwise defaults to the maximum window after the start.
    pub fn adjust_time_range(
        now: DateTime<Utc>,
        requested_start: Option<DateTime<Utc>>,
        requested_end: Option<DateTime<Utc>>,
        old: Option<&Subscription>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), Error> {
        let start_time = match requested_start {
            None => match old {
                None => now,
                Some(old) => old.start_time,
            },
            Some(start_time) => {
                if now - start_time > Duration::minutes(MAX_CLOCK_SKEW_MINUTES) {
                    return Err(Error::BadRequest(
                        "Subscription time_start must not be in the past".to_string(),
                    ));
                }
                start_time
            }
        };

        let end_time = match (requested_end, old) {
            (Some(end_time), _) => end_time,
            (None, Some(old)) => old.end_time,
            (None, None) => start_time + Duration::hours(MAX_SUBSCRIPTION_DURATION_HOURS),
        };

        if end_time < start_time {
            return Err(Error::BadRequest(
                "Subscription time_end must be after time_start".to_string(),
            ));
        }

        if end_time - start_time > Duration::hours(MAX_SUBSCRIPTION_DURATION_HOURS) {
            return Err(Error::BadRequest(
                "Subscription window exceeds 24 hours".to_string(),
            ));
        }

        Ok((start_time, end_time))
    }

    /// Validates the subscription against all dependent operational intents
    pub fn validate_dependent_ops(
        &self,
        operational_intents: &[OperationalIntent],
    ) -> Result<(), Error> {
        for intent in operational_intents {
            self.validate_dependent_op(intent)?;
        }
        Ok(())
    }

    /// Validates the subscription against a single dependent operational
    /// intent: same vertiport, same zone, start no more than the allowed
    /// latency after the intent starts, end no earlier than the intent ends.
    fn validate_dependent_op(&self, intent: &OperationalIntent) -> Result<(), Error> {
        if self.vertiport_id != intent.vertiport_id {
            return Err(Error::BadRequest(format!(
                "Subscription does not cover the vertiport of dependent OperationalIntent {}",
                intent.id
            )));
        }

        if self.zone != intent.zone {
            return Err(Error::BadRequest(format!(
                "Subscription covers a different vertiport zone than dependent OperationalIntent {}",
                intent.id
            )));
        }

        if self.start_time - intent.start_time > Duration::minutes(MAX_CLOCK_SKEW_MINUTES) {
            return Err(Error::BadRequest(format!(
                "Subscription start time does not cover dependent OperationalIntent {}",
                intent.id
            )));
        }

        if intent.end_time > self.end_time {
            return Err(Error::BadRequest(format!(
                "Subscription does not cover the end time of dependent OperationalIntent {}",
                intent.id
            )));
        }

        Ok(())
    }
}
