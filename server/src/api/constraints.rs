//! Put, get, delete and query entry points for constraints. Constraints
//! are administrative reservations: no supporting subscription and no key
//! protocol, but they fan out to subscriptions interested in them.

use super::{subscribers_to_notify, Server, SubscriberToNotify};
use crate::auth::{CallContext, Operation};
use crate::errors::Error;
use crate::models::constraint::Constraint;
use crate::models::{validate_uss_base_url, Manager, Ovn, VersionNumber, VertiportReservation};
use crate::repos::{ConstraintRepo, SubscriptionRepo, Subscriptions};
use uuid::Uuid;

/// Parameters of a put-constraint request
#[derive(Debug, Clone, PartialEq)]
pub struct PutConstraintParams {
    pub uss_base_url: String,
    pub reservation: VertiportReservation,
}

/// The changed record plus the subscribers owed a notification
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeConstraintResponse {
    pub constraint: Constraint,
    pub subscribers: Vec<SubscriberToNotify>,
}

impl Server {
    /// Creates a constraint reference
    pub async fn create_constraint(
        &self,
        context: &CallContext,
        entity_id: Uuid,
        params: PutConstraintParams,
    ) -> Result<ChangeConstraintResponse, Error> {
        let manager = context.authorize(Operation::CreateConstraint)?.clone();
        self.put_constraint(manager, entity_id, Ovn::default(), params)
            .await
    }

    /// Updates the constraint reference stored at version `ovn`
    pub async fn update_constraint(
        &self,
        context: &CallContext,
        entity_id: Uuid,
        ovn: &str,
        params: PutConstraintParams,
    ) -> Result<ChangeConstraintResponse, Error> {
        let manager = context.authorize(Operation::UpdateConstraint)?.clone();
        self.put_constraint(manager, entity_id, Ovn::new(ovn), params)
            .await
    }

    /// Inserts or updates a constraint. An empty `ovn` requests creation.
    async fn put_constraint(
        &self,
        manager: Manager,
        entity_id: Uuid,
        ovn: Ovn,
        params: PutConstraintParams,
    ) -> Result<ChangeConstraintResponse, Error> {
        api_debug!("(put_constraint) entry for {}.", entity_id);

        if params.uss_base_url.is_empty() {
            return Err(Error::BadRequest(
                "Missing required uss_base_url".to_string(),
            ));
        }
        if !self.enable_http {
            validate_uss_base_url(&params.uss_base_url)?;
        }

        let Some(start_time) = params.reservation.start_time else {
            return Err(Error::BadRequest(
                "Missing time_start from reservation".to_string(),
            ));
        };
        let Some(end_time) = params.reservation.end_time else {
            return Err(Error::BadRequest(
                "Missing time_end from reservation".to_string(),
            ));
        };

        if self.clock.now() > end_time {
            return Err(Error::BadRequest(
                "Constraints may not end in the past".to_string(),
            ));
        }
        if end_time < start_time {
            return Err(Error::BadRequest(
                "End time is past the start time".to_string(),
            ));
        }

        let response = self
            .store
            .transact(|txn| {
                let manager = manager.clone();
                let ovn = ovn.clone();
                let params = params.clone();
                Box::pin(async move {
                    // Get the existing constraint, if any, and gate the version
                    let old = txn.get_constraint(entity_id).await?;
                    let version = match &old {
                        Some(old) => {
                            if old.manager != manager {
                                return Err(Error::PermissionDenied(format!(
                                    "Constraint owned by {}, but {} attempted to modify",
                                    old.manager, manager
                                )));
                            }
                            if old.ovn != ovn {
                                return Err(Error::VersionMismatch(format!(
                                    "Current version is {} but client specified version {}",
                                    old.ovn, ovn
                                )));
                            }
                            old.version
                        }
                        None => {
                            if !ovn.is_empty() {
                                return Err(Error::NotFound(format!(
                                    "Constraint does not exist and therefore is not version {}",
                                    ovn
                                )));
                            }
                            VersionNumber::default()
                        }
                    };

                    let constraint = txn
                        .upsert_constraint(Constraint {
                            id: entity_id,
                            manager: manager.clone(),
                            version: version.next(),
                            ovn: Ovn::default(),
                            start_time,
                            end_time,
                            uss_base_url: params.uss_base_url.clone(),
                            vertiport_id: params.reservation.vertiport_id,
                            zone: params.reservation.zone,
                        })
                        .await?;

                    // Fan out to subscriptions interested in constraints
                    let all_subs = txn.search_subscriptions(&params.reservation).await?;
                    let mut subs = Subscriptions(
                        all_subs
                            .into_iter()
                            .filter(|s| s.notify_for_constraints)
                            .collect(),
                    );
                    subs.increment_notification_indices(txn).await?;

                    Ok(ChangeConstraintResponse {
                        constraint,
                        subscribers: subscribers_to_notify(&subs.0),
                    })
                })
            })
            .await?;

        api_info!(
            "(put_constraint) {} stored at version {}.",
            entity_id,
            response.constraint.version
        );

        Ok(response)
    }

    /// Deletes a constraint reference
    pub async fn delete_constraint(
        &self,
        context: &CallContext,
        entity_id: Uuid,
    ) -> Result<ChangeConstraintResponse, Error> {
        let manager = context.authorize(Operation::DeleteConstraint)?.clone();

        let response = self
            .store
            .transact(|txn| {
                let manager = manager.clone();
                Box::pin(async move {
                    let Some(old) = txn.get_constraint(entity_id).await? else {
                        return Err(Error::NotFound(format!(
                            "Constraint {} not found",
                            entity_id
                        )));
                    };
                    if old.manager != manager {
                        return Err(Error::PermissionDenied(format!(
                            "Constraint owned by {}, but {} attempted to delete",
                            old.manager, manager
                        )));
                    }

                    let all_subs = txn.search_subscriptions(&old.extent()).await?;
                    let mut subs = Subscriptions(
                        all_subs
                            .into_iter()
                            .filter(|s| s.notify_for_constraints)
                            .collect(),
                    );

                    txn.delete_constraint(entity_id).await?;

                    subs.increment_notification_indices(txn).await?;

                    Ok(ChangeConstraintResponse {
                        constraint: old,
                        subscribers: subscribers_to_notify(&subs.0),
                    })
                })
            })
            .await?;

        api_info!("(delete_constraint) {} deleted.", entity_id);

        Ok(response)
    }

    /// Returns a single constraint reference. Foreign records carry the
    /// redaction sentinel instead of their OVN.
    pub async fn get_constraint(
        &self,
        context: &CallContext,
        entity_id: Uuid,
    ) -> Result<Constraint, Error> {
        let manager = context.authorize(Operation::GetConstraint)?.clone();

        self.store
            .transact(|txn| {
                let manager = manager.clone();
                Box::pin(async move {
                    let Some(constraint) = txn.get_constraint(entity_id).await? else {
                        return Err(Error::NotFound(format!(
                            "Constraint {} not found",
                            entity_id
                        )));
                    };
                    Ok(constraint.redact_for(&manager))
                })
            })
            .await
    }

    /// Queries constraint references matching a reservation filter
    pub async fn query_constraints(
        &self,
        context: &CallContext,
        reservation: VertiportReservation,
    ) -> Result<Vec<Constraint>, Error> {
        let manager = context.authorize(Operation::QueryConstraints)?.clone();

        self.store
            .transact(|txn| {
                let manager = manager.clone();
                let reservation = reservation.clone();
                Box::pin(async move {
                    let constraints = txn.search_constraints(&reservation).await?;
                    Ok(constraints
                        .into_iter()
                        .map(|constraint| constraint.redact_for(&manager))
                        .collect())
                })
            })
            .await
    }
}
