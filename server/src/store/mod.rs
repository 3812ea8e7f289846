//! Transactional store for the coordination state.
//!
//! [`Store::transact`] runs an engine action against a serializable
//! snapshot of the four entity tables. The action works on a scratch copy;
//! a successful return commits the copy atomically, any error rolls it
//! back, and retryable conflicts re-run the whole action up to the
//! configured bound.

use crate::errors::Error;
use crate::models::constraint::Constraint;
use crate::models::operational_intent::OperationalIntent;
use crate::models::subscription::Subscription;
use crate::models::vertiport::Vertiport;
use crate::models::{Ovn, VertiportReservation, Zone};
use crate::repos::{ConstraintRepo, OperationalIntentRepo, SubscriptionRepo, VertiportRepo};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Default bound for re-running actions on retryable conflicts
pub const DEFAULT_TRANSACTION_RETRIES: u32 = 3;

/// The four entity tables plus the last issued commit timestamp
#[derive(Debug, Clone, Default)]
struct State {
    vertiports: HashMap<Uuid, Vertiport>,
    operational_intents: HashMap<Uuid, OperationalIntent>,
    constraints: HashMap<Uuid, Constraint>,
    subscriptions: HashMap<Uuid, Subscription>,
    last_commit: Option<DateTime<Utc>>,
}

/// Serializable transactional store over the coordination state
#[derive(Debug, Clone)]
pub struct Store {
    state: Arc<RwLock<State>>,
    max_retries: u32,
}

impl Store {
    /// Creates an empty store with the default retry bound
    pub fn new() -> Self {
        Self::with_retries(DEFAULT_TRANSACTION_RETRIES)
    }

    /// Creates an empty store with an explicit retry bound
    pub fn with_retries(max_retries: u32) -> Self {
        Store {
            state: Arc::new(RwLock::new(State::default())),
            max_retries,
        }
    }

    /// Runs `action` inside a serializable transaction.
    ///
    /// The action receives a repository handle scoped to the transaction;
    /// everything it reads and writes through the handle is one atomic,
    /// isolated unit. Errors abort the transaction and propagate
    /// unchanged, except retryable conflicts which re-run the action.
    pub async fn transact<T, F>(&self, action: F) -> Result<T, Error>
    where
        T: Send,
        F: for<'a> Fn(&'a mut Transaction) -> BoxFuture<'a, Result<T, Error>> + Send + Sync,
    {
        let mut attempts: u32 = 0;

        loop {
            let mut state = self.state.write().await;
            let timestamp = next_commit_timestamp(state.last_commit);
            let mut txn = Transaction {
                scratch: state.clone(),
                timestamp,
            };

            match action(&mut txn).await {
                Ok(value) => {
                    txn.scratch.last_commit = Some(timestamp);
                    *state = txn.scratch;
                    return Ok(value);
                }
                Err(e) if e.retryable() => {
                    drop(state);
                    attempts += 1;
                    if attempts > self.max_retries {
                        store_error!(
                            "(transact) giving up after {} retryable conflicts.",
                            attempts
                        );
                        return Err(Error::Internal(
                            "Transaction retry limit exceeded".to_string(),
                        ));
                    }
                    store_debug!("(transact) {}, attempt {}.", e, attempts);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Commit timestamps are strictly monotonic so OVNs derived from them
/// never collide, even for commits within the same clock tick.
fn next_commit_timestamp(last: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match last {
        Some(last) if now <= last => last + Duration::microseconds(1),
        _ => now,
    }
}

/// Repository handle scoped to one transaction.
///
/// Mutations are applied to a scratch copy of the state; the store commits
/// or discards the copy when the action returns.
pub struct Transaction {
    scratch: State,
    timestamp: DateTime<Utc>,
}

impl Transaction {
    /// The commit timestamp rows written in this transaction will carry
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// The reservation search predicate shared by all three record searches:
/// matching place, intersecting time window with inclusive bounds, and
/// unbounded on any side the filter leaves open.
fn matches_reservation(
    reservation: &VertiportReservation,
    vertiport_id: Uuid,
    zone: Zone,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> bool {
    vertiport_id == reservation.vertiport_id
        && zone == reservation.zone
        && reservation.end_time.map_or(true, |end| start_time <= end)
        && reservation.start_time.map_or(true, |start| end_time >= start)
}

#[async_trait]
impl OperationalIntentRepo for Transaction {
    async fn get_operational_intent(
        &self,
        id: Uuid,
    ) -> Result<Option<OperationalIntent>, Error> {
        Ok(self.scratch.operational_intents.get(&id).cloned())
    }

    async fn upsert_operational_intent(
        &mut self,
        mut intent: OperationalIntent,
    ) -> Result<OperationalIntent, Error> {
        intent.ovn = Ovn::from_time(&self.timestamp, &intent.id.to_string());
        self.scratch
            .operational_intents
            .insert(intent.id, intent.clone());
        Ok(intent)
    }

    async fn delete_operational_intent(&mut self, id: Uuid) -> Result<(), Error> {
        self.scratch
            .operational_intents
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| {
                Error::NotFound("Attempted to delete non-existent OperationalIntent".to_string())
            })
    }

    async fn search_operational_intents(
        &self,
        reservation: &VertiportReservation,
    ) -> Result<Vec<OperationalIntent>, Error> {
        let mut intents: Vec<OperationalIntent> = self
            .scratch
            .operational_intents
            .values()
            .filter(|intent| {
                matches_reservation(
                    reservation,
                    intent.vertiport_id,
                    intent.zone,
                    intent.start_time,
                    intent.end_time,
                )
            })
            .cloned()
            .collect();

        intents.sort_by_key(|intent| (intent.start_time, intent.id));
        Ok(intents)
    }

    async fn get_dependent_operational_intents(
        &self,
        subscription_id: Uuid,
    ) -> Result<Vec<Uuid>, Error> {
        let mut ids: Vec<Uuid> = self
            .scratch
            .operational_intents
            .values()
            .filter(|intent| intent.subscription_id == subscription_id)
            .map(|intent| intent.id)
            .collect();

        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl SubscriptionRepo for Transaction {
    async fn get_subscription(&self, id: Uuid) -> Result<Option<Subscription>, Error> {
        Ok(self.scratch.subscriptions.get(&id).cloned())
    }

    async fn upsert_subscription(&mut self, mut sub: Subscription) -> Result<Subscription, Error> {
        sub.version = Ovn::from_time(&self.timestamp, &sub.id.to_string());
        self.scratch.subscriptions.insert(sub.id, sub.clone());
        Ok(sub)
    }

    async fn delete_subscription(&mut self, id: Uuid) -> Result<(), Error> {
        self.scratch
            .subscriptions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| {
                Error::NotFound("Attempted to delete non-existent Subscription".to_string())
            })
    }

    async fn search_subscriptions(
        &self,
        reservation: &VertiportReservation,
    ) -> Result<Vec<Subscription>, Error> {
        let mut subs: Vec<Subscription> = self
            .scratch
            .subscriptions
            .values()
            .filter(|sub| {
                matches_reservation(
                    reservation,
                    sub.vertiport_id,
                    sub.zone,
                    sub.start_time,
                    sub.end_time,
                )
            })
            .cloned()
            .collect();

        subs.sort_by_key(|sub| (sub.start_time, sub.id));
        Ok(subs)
    }

    async fn increment_notification_indices(
        &mut self,
        subscription_ids: &[Uuid],
    ) -> Result<Vec<i32>, Error> {
        let mut indices = Vec::with_capacity(subscription_ids.len());

        for id in subscription_ids {
            let Some(sub) = self.scratch.subscriptions.get_mut(id) else {
                return Err(Error::Internal(format!(
                    "Expected {} notification_index results when incrementing but Subscription {} is missing",
                    subscription_ids.len(),
                    id
                )));
            };

            sub.notification_index += 1;
            indices.push(sub.notification_index);
        }

        Ok(indices)
    }
}

#[async_trait]
impl ConstraintRepo for Transaction {
    async fn get_constraint(&self, id: Uuid) -> Result<Option<Constraint>, Error> {
        Ok(self.scratch.constraints.get(&id).cloned())
    }

    async fn upsert_constraint(&mut self, mut constraint: Constraint) -> Result<Constraint, Error> {
        constraint.ovn = Ovn::from_time(&self.timestamp, &constraint.id.to_string());
        self.scratch
            .constraints
            .insert(constraint.id, constraint.clone());
        Ok(constraint)
    }

    async fn delete_constraint(&mut self, id: Uuid) -> Result<(), Error> {
        self.scratch
            .constraints
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| {
                Error::NotFound("Attempted to delete non-existent Constraint".to_string())
            })
    }

    async fn search_constraints(
        &self,
        reservation: &VertiportReservation,
    ) -> Result<Vec<Constraint>, Error> {
        let mut constraints: Vec<Constraint> = self
            .scratch
            .constraints
            .values()
            .filter(|constraint| {
                matches_reservation(
                    reservation,
                    constraint.vertiport_id,
                    constraint.zone,
                    constraint.start_time,
                    constraint.end_time,
                )
            })
            .cloned()
            .collect();

        constraints.sort_by_key(|constraint| (constraint.start_time, constraint.id));
        Ok(constraints)
    }
}

#[async_trait]
impl VertiportRepo for Transaction {
    async fn get_vertiport(&self, id: Uuid) -> Result<Option<Vertiport>, Error> {
        Ok(self.scratch.vertiports.get(&id).cloned())
    }

    async fn upsert_vertiport(&mut self, vertiport: Vertiport) -> Result<Vertiport, Error> {
        self.scratch
            .vertiports
            .insert(vertiport.id, vertiport.clone());
        Ok(vertiport)
    }

    async fn delete_vertiport(&mut self, id: Uuid) -> Result<(), Error> {
        self.scratch
            .vertiports
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| {
                Error::NotFound("Attempted to delete non-existent Vertiport".to_string())
            })
    }
}
