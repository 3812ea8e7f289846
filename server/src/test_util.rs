//! test utilities. Provides builders for servers, call contexts and
//! request parameters.

use crate::api::constraints::PutConstraintParams;
use crate::api::operational_intents::{NewSubscriptionParams, PutOperationalIntentParams};
use crate::api::subscriptions::PutSubscriptionParams;
use crate::api::Server;
use crate::auth::{CallContext, VERTIPORT_MANAGEMENT_SCOPE};
use crate::models::{Manager, VertiportReservation, Zone};
use crate::store::Store;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// A server over a fresh store, with TLS enforcement on
pub fn test_server() -> Server {
    Server::new(Store::new(), false)
}

/// A call context for `manager` holding the blanket management scope
pub fn ctx(manager: &str) -> CallContext {
    CallContext::new(Manager::from(manager), [VERTIPORT_MANAGEMENT_SCOPE])
}

/// The current time shifted by `offset` minutes
pub fn now_minutes(offset: i64) -> DateTime<Utc> {
    Utc::now() + Duration::minutes(offset)
}

/// A reservation between two explicit instants
pub fn reservation_between(
    vertiport_id: Uuid,
    zone: Zone,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> VertiportReservation {
    VertiportReservation {
        vertiport_id,
        zone,
        start_time: Some(from),
        end_time: Some(to),
    }
}

/// A reservation spanning `[now + from_min, now + to_min]`
pub fn reservation_minutes(
    vertiport_id: Uuid,
    zone: Zone,
    from_min: i64,
    to_min: i64,
) -> VertiportReservation {
    let now = Utc::now();
    reservation_between(
        vertiport_id,
        zone,
        now + Duration::minutes(from_min),
        now + Duration::minutes(to_min),
    )
}

/// Put-operational-intent parameters for an Accepted intent with an empty
/// key and a fresh implicit subscription
pub fn intent_params(reservation: &VertiportReservation) -> PutOperationalIntentParams {
    PutOperationalIntentParams {
        uss_base_url: "https://uss.example.com/usp".to_string(),
        state: "Accepted".to_string(),
        reservation: reservation.clone(),
        subscription_id: None,
        new_subscription: Some(NewSubscriptionParams {
            uss_base_url: "https://uss.example.com/usp".to_string(),
            notify_for_constraints: false,
        }),
        key: vec![],
    }
}

/// Put-subscription parameters watching operational intents only
pub fn subscription_params(reservation: &VertiportReservation) -> PutSubscriptionParams {
    PutSubscriptionParams {
        uss_base_url: "https://uss.example.com/usp".to_string(),
        reservation: reservation.clone(),
        notify_for_operational_intents: true,
        notify_for_constraints: false,
    }
}

/// Put-constraint parameters
pub fn constraint_params(reservation: &VertiportReservation) -> PutConstraintParams {
    PutConstraintParams {
        uss_base_url: "https://uss.example.com/usp".to_string(),
        reservation: reservation.clone(),
    }
}
