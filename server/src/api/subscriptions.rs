//! Put, get, delete and query entry points for subscriptions.

use super::Server;
use crate::auth::{CallContext, Operation};
use crate::errors::Error;
use crate::models::constraint::Constraint;
use crate::models::operational_intent::OperationalIntent;
use crate::models::subscription::Subscription;
use crate::models::{validate_uss_base_url, Manager, Ovn, VertiportReservation};
use crate::repos::{ConstraintRepo, OperationalIntentRepo, Repository, SubscriptionRepo};
use uuid::Uuid;

/// Parameters of a put-subscription request
#[derive(Debug, Clone, PartialEq)]
pub struct PutSubscriptionParams {
    pub uss_base_url: String,

    /// Requested extent; omitted times are resolved against the clock and
    /// any previous version
    pub reservation: VertiportReservation,

    pub notify_for_operational_intents: bool,
    pub notify_for_constraints: bool,
}

/// A subscription together with the intents that depend on it
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionResponse {
    pub subscription: Subscription,
    pub dependent_operational_intents: Vec<Uuid>,
}

/// Response to a put-subscription request: the stored record plus the
/// records already in its extent the subscriber would otherwise miss
#[derive(Debug, Clone, PartialEq)]
pub struct PutSubscriptionResponse {
    pub subscription: Subscription,
    pub dependent_operational_intents: Vec<Uuid>,
    pub operational_intents: Vec<OperationalIntent>,
    pub constraints: Vec<Constraint>,
}

impl Server {
    /// Creates a subscription
    pub async fn create_subscription(
        &self,
        context: &CallContext,
        subscription_id: Uuid,
        params: PutSubscriptionParams,
    ) -> Result<PutSubscriptionResponse, Error> {
        let manager = context.authorize(Operation::CreateSubscription)?.clone();
        self.put_subscription(manager, subscription_id, Ovn::default(), params)
            .await
    }

    /// Updates the subscription stored at `version`
    pub async fn update_subscription(
        &self,
        context: &CallContext,
        subscription_id: Uuid,
        version: &str,
        params: PutSubscriptionParams,
    ) -> Result<PutSubscriptionResponse, Error> {
        let manager = context.authorize(Operation::UpdateSubscription)?.clone();
        self.put_subscription(manager, subscription_id, Ovn::new(version), params)
            .await
    }

    /// Inserts or updates a subscription. An empty `version` requests
    /// creation.
    async fn put_subscription(
        &self,
        manager: Manager,
        subscription_id: Uuid,
        version: Ovn,
        params: PutSubscriptionParams,
    ) -> Result<PutSubscriptionResponse, Error> {
        api_debug!("(put_subscription) entry for {}.", subscription_id);

        if !params.notify_for_operational_intents && !params.notify_for_constraints {
            return Err(Error::BadRequest(
                "No notification triggers requested for Subscription".to_string(),
            ));
        }
        if !self.enable_http {
            validate_uss_base_url(&params.uss_base_url)?;
        }

        let clock = self.clock.clone();
        let response = self
            .store
            .transact(|txn| {
                let manager = manager.clone();
                let version = version.clone();
                let params = params.clone();
                let clock = clock.clone();
                Box::pin(async move {
                    let old = txn.get_subscription(subscription_id).await?;

                    // Validate and perhaps correct the requested window
                    let (start_time, end_time) = Subscription::adjust_time_range(
                        clock.now(),
                        params.reservation.start_time,
                        params.reservation.end_time,
                        old.as_ref(),
                    )?;

                    let mut notification_index = 0;
                    let mut dependent_ids = Vec::new();

                    match &old {
                        None => {
                            if !version.is_empty() {
                                // An update was requested but there is
                                // nothing to update
                                return Err(Error::NotFound(format!(
                                    "Subscription {} not found",
                                    subscription_id
                                )));
                            }
                        }
                        Some(old) => {
                            if version.is_empty() {
                                return Err(Error::AlreadyExists(format!(
                                    "Subscription {} already exists",
                                    subscription_id
                                )));
                            }
                            if version != old.version {
                                return Err(Error::VersionMismatch(format!(
                                    "Current version is {} but client specified version {}",
                                    old.version, version
                                )));
                            }
                            if old.manager != manager {
                                return Err(Error::PermissionDenied(format!(
                                    "Subscription owned by {}, but {} attempted to modify",
                                    old.manager, manager
                                )));
                            }

                            notification_index = old.notification_index;
                            dependent_ids =
                                txn.get_dependent_operational_intents(subscription_id).await?;
                        }
                    }

                    let subreq = Subscription {
                        id: subscription_id,
                        version: Ovn::default(),
                        notification_index,
                        manager: manager.clone(),
                        start_time,
                        end_time,
                        uss_base_url: params.uss_base_url.clone(),
                        notify_for_operational_intents: params.notify_for_operational_intents,
                        notify_for_constraints: params.notify_for_constraints,
                        implicit: false,
                        vertiport_id: params.reservation.vertiport_id,
                        zone: params.reservation.zone,
                    };

                    if !dependent_ids.is_empty() {
                        // The new shape must still cover every dependent intent
                        let dependents =
                            get_operational_intents(txn, &dependent_ids).await?;
                        subreq.validate_dependent_ops(&dependents)?;
                    }

                    let sub = txn.upsert_subscription(subreq).await?;

                    let mut operational_intents = Vec::new();
                    if sub.notify_for_operational_intents {
                        operational_intents = txn
                            .search_operational_intents(&sub.extent())
                            .await?
                            .into_iter()
                            .map(|intent| intent.redact_for(&manager))
                            .collect();
                    }

                    let mut constraints = Vec::new();
                    if sub.notify_for_constraints {
                        constraints = txn
                            .search_constraints(&sub.extent())
                            .await?
                            .into_iter()
                            .map(|constraint| constraint.redact_for(&manager))
                            .collect();
                    }

                    Ok(PutSubscriptionResponse {
                        subscription: sub,
                        dependent_operational_intents: dependent_ids,
                        operational_intents,
                        constraints,
                    })
                })
            })
            .await?;

        api_info!("(put_subscription) {} stored.", subscription_id);

        Ok(response)
    }

    /// Returns a single subscription; only the owner may view it
    pub async fn get_subscription(
        &self,
        context: &CallContext,
        subscription_id: Uuid,
    ) -> Result<SubscriptionResponse, Error> {
        let manager = context.authorize(Operation::GetSubscription)?.clone();

        self.store
            .transact(|txn| {
                let manager = manager.clone();
                Box::pin(async move {
                    let Some(sub) = txn.get_subscription(subscription_id).await? else {
                        return Err(Error::NotFound(format!(
                            "Subscription {} not found",
                            subscription_id
                        )));
                    };
                    if sub.manager != manager {
                        return Err(Error::PermissionDenied(format!(
                            "Subscription owned by {}, but {} attempted to view",
                            sub.manager, manager
                        )));
                    }

                    let dependent_operational_intents =
                        txn.get_dependent_operational_intents(subscription_id).await?;

                    Ok(SubscriptionResponse {
                        subscription: sub,
                        dependent_operational_intents,
                    })
                })
            })
            .await
    }

    /// Queries the caller's subscriptions matching a reservation filter
    pub async fn query_subscriptions(
        &self,
        context: &CallContext,
        reservation: VertiportReservation,
    ) -> Result<Vec<SubscriptionResponse>, Error> {
        let manager = context.authorize(Operation::QuerySubscriptions)?.clone();

        self.store
            .transact(|txn| {
                let manager = manager.clone();
                let reservation = reservation.clone();
                Box::pin(async move {
                    let subs = txn.search_subscriptions(&reservation).await?;

                    let mut responses = Vec::new();
                    for sub in subs {
                        // Subscriptions are private to their manager
                        if sub.manager != manager {
                            continue;
                        }
                        let dependent_operational_intents =
                            txn.get_dependent_operational_intents(sub.id).await?;
                        responses.push(SubscriptionResponse {
                            subscription: sub,
                            dependent_operational_intents,
                        });
                    }

                    Ok(responses)
                })
            })
            .await
    }

    /// Deletes a subscription with no remaining dependent intents
    pub async fn delete_subscription(
        &self,
        context: &CallContext,
        subscription_id: Uuid,
    ) -> Result<SubscriptionResponse, Error> {
        let manager = context.authorize(Operation::DeleteSubscription)?.clone();

        let response = self
            .store
            .transact(|txn| {
                let manager = manager.clone();
                Box::pin(async move {
                    let Some(old) = txn.get_subscription(subscription_id).await? else {
                        return Err(Error::NotFound(format!(
                            "Subscription {} not found",
                            subscription_id
                        )));
                    };
                    if old.manager != manager {
                        return Err(Error::PermissionDenied(format!(
                            "Subscription owned by {}, but {} attempted to delete",
                            old.manager, manager
                        )));
                    }

                    let dependent =
                        txn.get_dependent_operational_intents(subscription_id).await?;
                    if !dependent.is_empty() {
                        // Operators must retire their intents first
                        return Err(Error::BadRequest(format!(
                            "Subscription had {} dependent OperationalIntents",
                            dependent.len()
                        )));
                    }

                    txn.delete_subscription(subscription_id).await?;

                    Ok(SubscriptionResponse {
                        subscription: old,
                        dependent_operational_intents: dependent,
                    })
                })
            })
            .await?;

        api_info!("(delete_subscription) {} deleted.", subscription_id);

        Ok(response)
    }
}

/// Fetches operational intents by id, failing if any is missing
async fn get_operational_intents<R: Repository>(
    repo: &mut R,
    ids: &[Uuid],
) -> Result<Vec<OperationalIntent>, Error> {
    let mut intents = Vec::with_capacity(ids.len());
    for id in ids {
        let Some(intent) = repo.get_operational_intent(*id).await? else {
            return Err(Error::Internal(format!(
                "Could not retrieve dependent OperationalIntent {}",
                id
            )));
        };
        intents.push(intent);
    }
    Ok(intents)
}
