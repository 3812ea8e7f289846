//! Repository contracts abstracting entity-specific interactions with the
//! backing store. The engine only ever talks to these traits; the
//! transactional store supplies the concrete handle.

use crate::errors::Error;
use crate::models::constraint::Constraint;
use crate::models::operational_intent::OperationalIntent;
use crate::models::subscription::Subscription;
use crate::models::vertiport::Vertiport;
use crate::models::VertiportReservation;
use async_trait::async_trait;
use uuid::Uuid;

/// Operational intent-specific interactions with the backing repository
#[async_trait]
pub trait OperationalIntentRepo {
    /// Returns the operational intent identified by `id`, if present
    async fn get_operational_intent(&self, id: Uuid)
        -> Result<Option<OperationalIntent>, Error>;

    /// Inserts or updates an operational intent and returns the stored
    /// record with its recomputed OVN
    async fn upsert_operational_intent(
        &mut self,
        intent: OperationalIntent,
    ) -> Result<OperationalIntent, Error>;

    /// Deletes the operational intent identified by `id`
    async fn delete_operational_intent(&mut self, id: Uuid) -> Result<(), Error>;

    /// Returns all operational intents whose place matches the reservation
    /// and whose time window intersects it
    async fn search_operational_intents(
        &self,
        reservation: &VertiportReservation,
    ) -> Result<Vec<OperationalIntent>, Error>;

    /// Returns ids of all operational intents supported by the
    /// subscription identified by `subscription_id`
    async fn get_dependent_operational_intents(
        &self,
        subscription_id: Uuid,
    ) -> Result<Vec<Uuid>, Error>;
}

/// Subscription-specific interactions with the backing repository
#[async_trait]
pub trait SubscriptionRepo {
    /// Returns the subscription identified by `id`, if present
    async fn get_subscription(&self, id: Uuid) -> Result<Option<Subscription>, Error>;

    /// Inserts or updates a subscription and returns the stored record
    /// with its recomputed version
    async fn upsert_subscription(&mut self, sub: Subscription) -> Result<Subscription, Error>;

    /// Deletes the subscription identified by `id`
    async fn delete_subscription(&mut self, id: Uuid) -> Result<(), Error>;

    /// Returns all subscriptions whose place matches the reservation and
    /// whose time window intersects it
    async fn search_subscriptions(
        &self,
        reservation: &VertiportReservation,
    ) -> Result<Vec<Subscription>, Error>;

    /// Increments the notification index of each listed subscription and
    /// returns the fresh indices, in the same order as the input ids
    async fn increment_notification_indices(
        &mut self,
        subscription_ids: &[Uuid],
    ) -> Result<Vec<i32>, Error>;
}

/// Constraint-specific interactions with the backing repository
#[async_trait]
pub trait ConstraintRepo {
    /// Returns the constraint identified by `id`, if present
    async fn get_constraint(&self, id: Uuid) -> Result<Option<Constraint>, Error>;

    /// Inserts or updates a constraint and returns the stored record with
    /// its recomputed OVN
    async fn upsert_constraint(&mut self, constraint: Constraint) -> Result<Constraint, Error>;

    /// Deletes the constraint identified by `id`
    async fn delete_constraint(&mut self, id: Uuid) -> Result<(), Error>;

    /// Returns all constraints whose place matches the reservation and
    /// whose time window intersects it
    async fn search_constraints(
        &self,
        reservation: &VertiportReservation,
    ) -> Result<Vec<Constraint>, Error>;
}

/// Vertiport-specific interactions with the backing repository
#[async_trait]
pub trait VertiportRepo {
    /// Returns the vertiport identified by `id`, if present
    async fn get_vertiport(&self, id: Uuid) -> Result<Option<Vertiport>, Error>;

    /// Inserts or updates a vertiport and returns the stored record
    async fn upsert_vertiport(&mut self, vertiport: Vertiport) -> Result<Vertiport, Error>;

    /// Deletes the vertiport identified by `id`
    async fn delete_vertiport(&mut self, id: Uuid) -> Result<(), Error>;
}

/// Aggregates the entity-specific repository contracts
pub trait Repository:
    OperationalIntentRepo + SubscriptionRepo + ConstraintRepo + VertiportRepo + Send
{
}

impl<R> Repository for R where
    R: OperationalIntentRepo + SubscriptionRepo + ConstraintRepo + VertiportRepo + Send
{
}

/// Enables batch operations on a list of subscriptions
#[derive(Debug, Default)]
pub struct Subscriptions(pub Vec<Subscription>);

impl Subscriptions {
    /// Increments the notification index of every listed subscription and
    /// writes the fresh indices back into the list
    pub async fn increment_notification_indices<R: Repository>(
        &mut self,
        repo: &mut R,
    ) -> Result<(), Error> {
        let ids: Vec<Uuid> = self.0.iter().map(|sub| sub.id).collect();
        let new_indices = repo.increment_notification_indices(&ids).await?;

        for (sub, new_index) in self.0.iter_mut().zip(new_indices) {
            sub.notification_index = new_index;
        }

        Ok(())
    }
}
