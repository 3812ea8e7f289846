//! Put, get, delete and query entry points for operational intents,
//! including the strategic-deconfliction key protocol and the implicit
//! subscription lifecycle.

use super::{subscribers_to_notify, Server, SubscriberToNotify};
use crate::auth::{CallContext, Operation};
use crate::errors::Error;
use crate::models::operational_intent::{OperationalIntent, OperationalIntentState};
use crate::models::subscription::Subscription;
use crate::models::{validate_uss_base_url, Manager, Ovn, VersionNumber, VertiportReservation};
use crate::repos::{ConstraintRepo, OperationalIntentRepo, SubscriptionRepo, Subscriptions};
use std::collections::HashSet;
use uuid::Uuid;

/// Requested parameters of an implicit subscription minted alongside an
/// operational intent
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubscriptionParams {
    pub uss_base_url: String,
    pub notify_for_constraints: bool,
}

/// Parameters of a put-operational-intent request
#[derive(Debug, Clone, PartialEq)]
pub struct PutOperationalIntentParams {
    pub uss_base_url: String,
    pub state: String,
    pub reservation: VertiportReservation,

    /// Existing subscription to bind; omitted to mint an implicit one
    pub subscription_id: Option<Uuid>,

    /// Shape of the implicit subscription when `subscription_id` is omitted
    pub new_subscription: Option<NewSubscriptionParams>,

    /// OVNs of every conflicting record the caller claims to have observed
    pub key: Vec<String>,
}

/// The changed record plus the subscribers owed a notification
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeOperationalIntentResponse {
    pub operational_intent: OperationalIntent,
    pub subscribers: Vec<SubscriberToNotify>,
}

impl Server {
    /// Creates an operational intent reference
    pub async fn create_operational_intent(
        &self,
        context: &CallContext,
        entity_id: Uuid,
        params: PutOperationalIntentParams,
    ) -> Result<ChangeOperationalIntentResponse, Error> {
        let manager = context.authorize(Operation::CreateOperationalIntent)?.clone();
        self.put_operational_intent(manager, entity_id, Ovn::default(), params)
            .await
    }

    /// Updates the operational intent reference stored at version `ovn`
    pub async fn update_operational_intent(
        &self,
        context: &CallContext,
        entity_id: Uuid,
        ovn: &str,
        params: PutOperationalIntentParams,
    ) -> Result<ChangeOperationalIntentResponse, Error> {
        let manager = context.authorize(Operation::UpdateOperationalIntent)?.clone();
        self.put_operational_intent(manager, entity_id, Ovn::new(ovn), params)
            .await
    }

    /// Inserts or updates an operational intent. An empty `ovn` requests
    /// creation.
    async fn put_operational_intent(
        &self,
        manager: Manager,
        entity_id: Uuid,
        ovn: Ovn,
        params: PutOperationalIntentParams,
    ) -> Result<ChangeOperationalIntentResponse, Error> {
        api_debug!("(put_operational_intent) entry for {}.", entity_id);

        if params.uss_base_url.is_empty() {
            return Err(Error::BadRequest(
                "Missing required uss_base_url".to_string(),
            ));
        }
        if !self.enable_http {
            validate_uss_base_url(&params.uss_base_url)?;
        }

        let state: OperationalIntentState = params.state.parse()?;

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
                "OperationalIntents may not end in the past".to_string(),
            ));
        }
        if end_time < start_time {
            return Err(Error::BadRequest(
                "End time is past the start time".to_string(),
            ));
        }
        if ovn.is_empty() && state != OperationalIntentState::Accepted {
            return Err(Error::BadRequest(format!(
                "Invalid state for initial version: `{}`",
                params.state
            )));
        }

        let enable_http = self.enable_http;
        let response = self
            .store
            .transact(|txn| {
                let manager = manager.clone();
                let ovn = ovn.clone();
                let params = params.clone();
                Box::pin(async move {
                    // Get the existing intent, if any, and gate the version
                    let old = txn.get_operational_intent(entity_id).await?;
                    let version = match &old {
                        Some(old) => {
                            if old.manager != manager {
                                return Err(Error::PermissionDenied(format!(
                                    "OperationalIntent owned by {}, but {} attempted to modify",
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
                                    "OperationalIntent does not exist and therefore is not version {}",
                                    ovn
                                )));
                            }
                            VersionNumber::default()
                        }
                    };

                    // Bind the supporting subscription
                    let sub = match params.subscription_id {
                        None => {
                            // Mint an implicit subscription shaped like the intent
                            let sub_base_url = params
                                .new_subscription
                                .as_ref()
                                .map(|s| s.uss_base_url.clone())
                                .unwrap_or_default();
                            if sub_base_url.is_empty() {
                                return Err(Error::BadRequest(
                                    "Missing uss_base_url in new_subscription".to_string(),
                                ));
                            }
                            if !enable_http {
                                validate_uss_base_url(&sub_base_url)?;
                            }

                            txn.upsert_subscription(Subscription {
                                id: Uuid::new_v4(),
                                version: Ovn::default(),
                                notification_index: 0,
                                manager: manager.clone(),
                                start_time,
                                end_time,
                                uss_base_url: sub_base_url,
                                notify_for_operational_intents: true,
                                notify_for_constraints: params
                                    .new_subscription
                                    .as_ref()
                                    .map(|s| s.notify_for_constraints)
                                    .unwrap_or(false),
                                implicit: true,
                                vertiport_id: params.reservation.vertiport_id,
                                zone: params.reservation.zone,
                            })
                            .await?
                        }
                        Some(subscription_id) => {
                            // Use the named subscription, widening it in
                            // place when implicit
                            let Some(mut sub) = txn.get_subscription(subscription_id).await? else {
                                return Err(Error::BadRequest(format!(
                                    "Specified Subscription {} does not exist",
                                    subscription_id
                                )));
                            };
                            if sub.manager != manager {
                                return Err(Error::PermissionDenied(format!(
                                    "Subscription {} owned by {}, but {} attempted to use it for an OperationalIntent",
                                    subscription_id, sub.manager, manager
                                )));
                            }

                            let mut update_sub = false;
                            if sub.start_time > start_time {
                                if !sub.implicit {
                                    return Err(Error::BadRequest(
                                        "Subscription does not begin until after the OperationalIntent starts".to_string(),
                                    ));
                                }
                                sub.start_time = start_time;
                                update_sub = true;
                            }
                            if sub.end_time < end_time {
                                if !sub.implicit {
                                    return Err(Error::BadRequest(
                                        "Subscription ends before the OperationalIntent ends".to_string(),
                                    ));
                                }
                                sub.end_time = end_time;
                                update_sub = true;
                            }
                            if sub.vertiport_id != params.reservation.vertiport_id {
                                if !sub.implicit {
                                    return Err(Error::BadRequest(
                                        "Subscription does not cover the same vertiport as the OperationalIntent".to_string(),
                                    ));
                                }
                                sub.vertiport_id = params.reservation.vertiport_id;
                                update_sub = true;
                            }
                            if sub.zone != params.reservation.zone {
                                if !sub.implicit {
                                    return Err(Error::BadRequest(
                                        "Subscription does not cover the same vertiport zone as the OperationalIntent".to_string(),
                                    ));
                                }
                                sub.zone = params.reservation.zone;
                                update_sub = true;
                            }

                            if update_sub {
                                sub = txn.upsert_subscription(sub).await?;
                            }
                            sub
                        }
                    };

                    // Off-nominal states may be declared without a complete
                    // view; everything else must present the key
                    if state.requires_key() {
                        let key: HashSet<&str> =
                            params.key.iter().map(String::as_str).collect();

                        let mut missing_intents = Vec::new();
                        for relevant in
                            txn.search_operational_intents(&params.reservation).await?
                        {
                            if !key.contains(relevant.ovn.as_str()) {
                                missing_intents.push(relevant.redact_for(&manager));
                            }
                        }

                        let mut missing_constraints = Vec::new();
                        if sub.notify_for_constraints {
                            for relevant in
                                txn.search_constraints(&params.reservation).await?
                            {
                                if !key.contains(relevant.ovn.as_str()) {
                                    missing_constraints.push(relevant.redact_for(&manager));
                                }
                            }
                        }

                        if !missing_intents.is_empty() || !missing_constraints.is_empty() {
                            return Err(Error::MissingOvns {
                                operational_intents: missing_intents,
                                constraints: missing_constraints,
                            });
                        }
                    }

                    // Upsert the intent; the store derives the fresh OVN
                    // from its commit timestamp
                    let intent = txn
                        .upsert_operational_intent(OperationalIntent {
                            id: entity_id,
                            manager: manager.clone(),
                            version: version.next(),
                            state,
                            ovn: Ovn::default(),
                            start_time,
                            end_time,
                            uss_base_url: params.uss_base_url.clone(),
                            subscription_id: sub.id,
                            vertiport_id: params.reservation.vertiport_id,
                            zone: params.reservation.zone,
                        })
                        .await?;

                    // Fan out to subscriptions interested in operational intents
                    let all_subs = txn.search_subscriptions(&params.reservation).await?;
                    let mut subs = Subscriptions(
                        all_subs
                            .into_iter()
                            .filter(|s| s.notify_for_operational_intents)
                            .collect(),
                    );
                    subs.increment_notification_indices(txn).await?;

                    Ok(ChangeOperationalIntentResponse {
                        operational_intent: intent,
                        subscribers: subscribers_to_notify(&subs.0),
                    })
                })
            })
            .await?;

        api_info!(
            "(put_operational_intent) {} stored at version {}.",
            entity_id,
            response.operational_intent.version
        );

        Ok(response)
    }

    /// Deletes an operational intent reference, removing its implicit
    /// subscription when this was the last dependent intent
    pub async fn delete_operational_intent(
        &self,
        context: &CallContext,
        entity_id: Uuid,
    ) -> Result<ChangeOperationalIntentResponse, Error> {
        let manager = context.authorize(Operation::DeleteOperationalIntent)?.clone();

        let response = self
            .store
            .transact(|txn| {
                let manager = manager.clone();
                Box::pin(async move {
                    let Some(old) = txn.get_operational_intent(entity_id).await? else {
                        return Err(Error::NotFound(format!(
                            "OperationalIntent {} not found",
                            entity_id
                        )));
                    };
                    if old.manager != manager {
                        return Err(Error::PermissionDenied(format!(
                            "OperationalIntent owned by {}, but {} attempted to delete",
                            old.manager, manager
                        )));
                    }

                    let Some(sub) = txn.get_subscription(old.subscription_id).await? else {
                        return Err(Error::Internal(
                            "OperationalIntent's Subscription missing from repo".to_string(),
                        ));
                    };

                    // Read the dependent set before deleting anything
                    let mut remove_implicit_subscription = false;
                    if sub.implicit {
                        let dependent =
                            txn.get_dependent_operational_intents(sub.id).await?;
                        if dependent.is_empty() {
                            return Err(Error::Internal(
                                "An implicit Subscription had no dependent OperationalIntents"
                                    .to_string(),
                            ));
                        }
                        remove_implicit_subscription = dependent.len() == 1;
                    }

                    let all_subs = txn.search_subscriptions(&old.extent()).await?;
                    let mut subs = Subscriptions(
                        all_subs
                            .into_iter()
                            .filter(|s| s.notify_for_operational_intents)
                            .collect(),
                    );
                    subs.increment_notification_indices(txn).await?;

                    txn.delete_operational_intent(entity_id).await?;

                    if remove_implicit_subscription {
                        // The last dependent is gone; the implicit
                        // subscription goes with it
                        txn.delete_subscription(sub.id).await?;
                    }

                    Ok(ChangeOperationalIntentResponse {
                        operational_intent: old,
                        subscribers: subscribers_to_notify(&subs.0),
                    })
                })
            })
            .await?;

        api_info!("(delete_operational_intent) {} deleted.", entity_id);

        Ok(response)
    }

    /// Returns a single operational intent reference. Foreign records
    /// carry the redaction sentinel instead of their OVN.
    pub async fn get_operational_intent(
        &self,
        context: &CallContext,
        entity_id: Uuid,
    ) -> Result<OperationalIntent, Error> {
        let manager = context.authorize(Operation::GetOperationalIntent)?.clone();

        self.store
            .transact(|txn| {
                let manager = manager.clone();
                Box::pin(async move {
                    let Some(intent) = txn.get_operational_intent(entity_id).await? else {
                        return Err(Error::NotFound(format!(
                            "OperationalIntent {} not found",
                            entity_id
                        )));
                    };
                    Ok(intent.redact_for(&manager))
                })
            })
            .await
    }

    /// Queries operational intent references matching a reservation filter
    pub async fn query_operational_intents(
        &self,
        context: &CallContext,
        reservation: VertiportReservation,
    ) -> Result<Vec<OperationalIntent>, Error> {
        let manager = context.authorize(Operation::QueryOperationalIntents)?.clone();

        self.store
            .transact(|txn| {
                let manager = manager.clone();
                let reservation = reservation.clone();
                Box::pin(async move {
                    let intents = txn.search_operational_intents(&reservation).await?;
                    Ok(intents
                        .into_iter()
                        .map(|intent| intent.redact_for(&manager))
                        .collect())
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Zone, NO_OVN_PHRASE};
    use crate::test_util::*;

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let server = test_server();
        let uss1 = ctx("uss1");
        let vertiport_id = Uuid::new_v4();
        let reservation = reservation_minutes(vertiport_id, Zone::Fato, 10, 40);
        let intent_id = Uuid::new_v4();

        let created = server
            .create_operational_intent(&uss1, intent_id, intent_params(&reservation))
            .await
            .unwrap();
        let created = created.operational_intent;

        assert_eq!(created.version, VersionNumber(1));
        assert!(created.ovn.is_valid());

        let fetched = server
            .get_operational_intent(&uss1, intent_id)
            .await
            .unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_key_protocol_rejects_unobserved_conflicts() {
        let server = test_server();
        let uss_a = ctx("uss_a");
        let uss_b = ctx("uss_b");
        let vertiport_id = Uuid::new_v4();
        let reservation = reservation_minutes(vertiport_id, Zone::Fato, 10, 40);

        // Manager A claims the slot first
        let i1 = Uuid::new_v4();
        let created = server
            .create_operational_intent(&uss_a, i1, intent_params(&reservation))
            .await
            .unwrap();
        let o1 = created.operational_intent.ovn.clone();

        // Manager B has not observed A's record
        let i2 = Uuid::new_v4();
        let denied = server
            .create_operational_intent(&uss_b, i2, intent_params(&reservation))
            .await;
        let Err(Error::MissingOvns {
            operational_intents,
            constraints,
        }) = denied
        else {
            panic!("expected MissingOvns");
        };
        assert_eq!(operational_intents.len(), 1);
        assert_eq!(operational_intents[0].id, i1);
        assert_eq!(operational_intents[0].ovn.as_str(), NO_OVN_PHRASE);
        assert!(constraints.is_empty());

        // The redaction sentinel is not a usable key
        let mut params = intent_params(&reservation);
        params.key = vec![NO_OVN_PHRASE.to_string()];
        let denied = server.create_operational_intent(&uss_b, i2, params).await;
        assert!(matches!(denied, Err(Error::MissingOvns { .. })));

        // With the true OVN the write goes through
        let mut params = intent_params(&reservation);
        params.key = vec![o1.to_string()];
        let accepted = server.create_operational_intent(&uss_b, i2, params).await;
        assert!(accepted.is_ok());
    }

    #[tokio::test]
    async fn test_version_gating_detects_stale_ovn() {
        let server = test_server();
        let uss1 = ctx("uss1");
        let vertiport_id = Uuid::new_v4();
        let reservation = reservation_minutes(vertiport_id, Zone::Fato, 10, 40);
        let intent_id = Uuid::new_v4();

        let created = server
            .create_operational_intent(&uss1, intent_id, intent_params(&reservation))
            .await
            .unwrap();
        let o1 = created.operational_intent.ovn.clone();

        // Update against the current version; the key must cover the
        // caller's own conflicting record too
        let mut params = intent_params(&reservation);
        params.key = vec![o1.to_string()];
        let updated = server
            .update_operational_intent(&uss1, intent_id, o1.as_str(), params)
            .await
            .unwrap();
        let o2 = updated.operational_intent.ovn.clone();
        assert_ne!(o1, o2);
        assert_eq!(updated.operational_intent.version, VersionNumber(2));

        // Replaying the stale OVN fails the gate
        let mut params = intent_params(&reservation);
        params.key = vec![o1.to_string(), o2.to_string()];
        let stale = server
            .update_operational_intent(&uss1, intent_id, o1.as_str(), params)
            .await;
        assert!(matches!(stale, Err(Error::VersionMismatch(_))));
    }

    #[tokio::test]
    async fn test_update_of_missing_intent_is_not_found() {
        let server = test_server();
        let uss1 = ctx("uss1");
        let reservation = reservation_minutes(Uuid::new_v4(), Zone::Fato, 10, 40);

        let result = server
            .update_operational_intent(
                &uss1,
                Uuid::new_v4(),
                "some-previously-seen-ovn",
                intent_params(&reservation),
            )
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_implicit_subscription_lifecycle() {
        let server = test_server();
        let uss1 = ctx("uss1");
        let vertiport_id = Uuid::new_v4();
        let reservation = reservation_minutes(vertiport_id, Zone::Fato, 10, 40);
        let intent_id = Uuid::new_v4();

        let created = server
            .create_operational_intent(&uss1, intent_id, intent_params(&reservation))
            .await
            .unwrap();
        let subscription_id = created.operational_intent.subscription_id;

        let sub = server
            .get_subscription(&uss1, subscription_id)
            .await
            .unwrap();
        assert!(sub.subscription.implicit);
        assert_eq!(sub.dependent_operational_intents, vec![intent_id]);

        // Deleting the last dependent intent removes the subscription
        server
            .delete_operational_intent(&uss1, intent_id)
            .await
            .unwrap();
        let gone = server.get_subscription(&uss1, subscription_id).await;
        assert!(matches!(gone, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_implicit_subscription_survives_other_dependents() {
        let server = test_server();
        let uss1 = ctx("uss1");
        let vertiport_id = Uuid::new_v4();
        let reservation = reservation_minutes(vertiport_id, Zone::Fato, 10, 40);

        let first = Uuid::new_v4();
        let created = server
            .create_operational_intent(&uss1, first, intent_params(&reservation))
            .await
            .unwrap();
        let subscription_id = created.operational_intent.subscription_id;
        let o1 = created.operational_intent.ovn.clone();

        // A second intent bound to the same implicit subscription
        let second = Uuid::new_v4();
        let mut params = intent_params(&reservation);
        params.subscription_id = Some(subscription_id);
        params.key = vec![o1.to_string()];
        server
            .create_operational_intent(&uss1, second, params)
            .await
            .unwrap();

        server
            .delete_operational_intent(&uss1, first)
            .await
            .unwrap();

        // Still one dependent left; the subscription stays
        let sub = server
            .get_subscription(&uss1, subscription_id)
            .await
            .unwrap();
        assert_eq!(sub.dependent_operational_intents, vec![second]);
    }

    #[tokio::test]
    async fn test_initial_state_must_be_accepted() {
        let server = test_server();
        let uss1 = ctx("uss1");
        let reservation = reservation_minutes(Uuid::new_v4(), Zone::Fato, 10, 40);

        let mut params = intent_params(&reservation);
        params.state = "Activated".to_string();
        let result = server
            .create_operational_intent(&uss1, Uuid::new_v4(), params)
            .await;
        assert!(matches!(result, Err(Error::BadRequest(_))));

        let mut params = intent_params(&reservation);
        params.state = "Landed".to_string();
        let result = server
            .create_operational_intent(&uss1, Uuid::new_v4(), params)
            .await;
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_off_nominal_states_skip_key_protocol() {
        let server = test_server();
        let uss_a = ctx("uss_a");
        let uss_b = ctx("uss_b");
        let vertiport_id = Uuid::new_v4();
        let conflicted = reservation_minutes(vertiport_id, Zone::Fato, 10, 40);
        let clear = reservation_minutes(vertiport_id, Zone::Fato, 60, 90);

        server
            .create_operational_intent(&uss_a, Uuid::new_v4(), intent_params(&conflicted))
            .await
            .unwrap();

        // B holds a non-conflicting intent
        let i2 = Uuid::new_v4();
        let created = server
            .create_operational_intent(&uss_b, i2, intent_params(&clear))
            .await
            .unwrap();
        let ovn = created.operational_intent.ovn.clone();

        // Moving into A's window while Nonconforming needs no key
        let mut params = intent_params(&conflicted);
        params.state = "Nonconforming".to_string();
        let moved = server
            .update_operational_intent(&uss_b, i2, ovn.as_str(), params)
            .await
            .unwrap();
        let ovn = moved.operational_intent.ovn.clone();

        // Contingent transitions are also exempt
        let mut params = intent_params(&conflicted);
        params.state = "Contingent".to_string();
        let moved = server
            .update_operational_intent(&uss_b, i2, ovn.as_str(), params)
            .await
            .unwrap();
        let ovn = moved.operational_intent.ovn.clone();

        // Returning to Activated requires the full key again
        let mut params = intent_params(&conflicted);
        params.state = "Activated".to_string();
        let denied = server
            .update_operational_intent(&uss_b, i2, ovn.as_str(), params)
            .await;
        assert!(matches!(denied, Err(Error::MissingOvns { .. })));
    }

    #[tokio::test]
    async fn test_foreign_records_are_redacted() {
        let server = test_server();
        let uss_a = ctx("uss_a");
        let uss_b = ctx("uss_b");
        let vertiport_id = Uuid::new_v4();
        let reservation = reservation_minutes(vertiport_id, Zone::Fato, 10, 40);
        let intent_id = Uuid::new_v4();

        server
            .create_operational_intent(&uss_a, intent_id, intent_params(&reservation))
            .await
            .unwrap();

        let fetched = server
            .get_operational_intent(&uss_b, intent_id)
            .await
            .unwrap();
        assert_eq!(fetched.ovn.as_str(), NO_OVN_PHRASE);

        let queried = server
            .query_operational_intents(&uss_b, reservation.clone())
            .await
            .unwrap();
        assert_eq!(queried.len(), 1);
        assert_eq!(queried[0].ovn.as_str(), NO_OVN_PHRASE);

        // The owner sees the real OVN
        let queried = server
            .query_operational_intents(&uss_a, reservation)
            .await
            .unwrap();
        assert!(queried[0].ovn.is_valid());
    }

    #[tokio::test]
    async fn test_ownership_guards_mutations() {
        let server = test_server();
        let uss_a = ctx("uss_a");
        let uss_b = ctx("uss_b");
        let reservation = reservation_minutes(Uuid::new_v4(), Zone::Fato, 10, 40);
        let intent_id = Uuid::new_v4();

        let created = server
            .create_operational_intent(&uss_a, intent_id, intent_params(&reservation))
            .await
            .unwrap();
        let ovn = created.operational_intent.ovn.clone();

        let denied = server
            .update_operational_intent(&uss_b, intent_id, ovn.as_str(), intent_params(&reservation))
            .await;
        assert!(matches!(denied, Err(Error::PermissionDenied(_))));

        let denied = server.delete_operational_intent(&uss_b, intent_id).await;
        assert!(matches!(denied, Err(Error::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_binding_foreign_subscription_is_denied() {
        let server = test_server();
        let uss_a = ctx("uss_a");
        let uss_b = ctx("uss_b");
        let vertiport_id = Uuid::new_v4();
        let reservation = reservation_minutes(vertiport_id, Zone::Fato, 10, 40);

        // A's intent mints an implicit subscription
        let created = server
            .create_operational_intent(&uss_a, Uuid::new_v4(), intent_params(&reservation))
            .await
            .unwrap();
        let o1 = created.operational_intent.ovn.clone();

        let mut params = intent_params(&reservation);
        params.subscription_id = Some(created.operational_intent.subscription_id);
        params.key = vec![o1.to_string()];
        let denied = server
            .create_operational_intent(&uss_b, Uuid::new_v4(), params)
            .await;
        assert!(matches!(denied, Err(Error::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_explicit_subscription_must_cover_intent() {
        let server = test_server();
        let uss1 = ctx("uss1");
        let vertiport_id = Uuid::new_v4();

        // An explicit subscription over a short window
        let subscription_id = Uuid::new_v4();
        let sub_reservation = reservation_minutes(vertiport_id, Zone::Fato, 10, 30);
        server
            .create_subscription(&uss1, subscription_id, subscription_params(&sub_reservation))
            .await
            .unwrap();

        // An intent running past the subscription's end is rejected
        let intent_reservation = reservation_minutes(vertiport_id, Zone::Fato, 10, 60);
        let mut params = intent_params(&intent_reservation);
        params.subscription_id = Some(subscription_id);
        let denied = server
            .create_operational_intent(&uss1, Uuid::new_v4(), params)
            .await;
        assert!(matches!(denied, Err(Error::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_fan_out_bumps_subscriber_indices() {
        let server = test_server();
        let uss_a = ctx("uss_a");
        let uss_b = ctx("uss_b");
        let vertiport_id = Uuid::new_v4();
        let reservation = reservation_minutes(vertiport_id, Zone::Fato, 10, 40);

        // B watches the slot
        let watcher_id = Uuid::new_v4();
        let mut sub_params = subscription_params(&reservation);
        sub_params.uss_base_url = "https://uss-b.example.com/usp".to_string();
        server
            .create_subscription(&uss_b, watcher_id, sub_params)
            .await
            .unwrap();

        let created = server
            .create_operational_intent(&uss_a, Uuid::new_v4(), intent_params(&reservation))
            .await
            .unwrap();

        let watcher = created
            .subscribers
            .iter()
            .find(|s| s.uss_base_url == "https://uss-b.example.com/usp")
            .expect("subscriber missing from notify set");
        assert_eq!(watcher.subscriptions.len(), 1);
        assert_eq!(watcher.subscriptions[0].subscription_id, watcher_id);
        assert_eq!(watcher.subscriptions[0].notification_index, 1);

        // A second write bumps the index again; indices are strictly monotonic
        let o1 = created.operational_intent.ovn.clone();
        let mut params = intent_params(&reservation);
        params.key = vec![o1.to_string()];
        let second = server
            .create_operational_intent(&uss_a, Uuid::new_v4(), params)
            .await
            .unwrap();
        let watcher = second
            .subscribers
            .iter()
            .find(|s| s.uss_base_url == "https://uss-b.example.com/usp")
            .unwrap();
        assert_eq!(watcher.subscriptions[0].notification_index, 2);
    }

    #[tokio::test]
    async fn test_http_mode_relaxes_url_scheme() {
        let server = Server::new(crate::store::Store::new(), true);
        let uss1 = ctx("uss1");
        let reservation = reservation_minutes(Uuid::new_v4(), Zone::Fato, 10, 40);

        let mut params = intent_params(&reservation);
        params.uss_base_url = "http://localhost:8080".to_string();
        params.new_subscription = Some(NewSubscriptionParams {
            uss_base_url: "http://localhost:8080".to_string(),
            notify_for_constraints: false,
        });
        let result = server
            .create_operational_intent(&uss1, Uuid::new_v4(), params)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_put_validations() {
        let server = test_server();
        let uss1 = ctx("uss1");
        let vertiport_id = Uuid::new_v4();

        // Missing base URL
        let reservation = reservation_minutes(vertiport_id, Zone::Fato, 10, 40);
        let mut params = intent_params(&reservation);
        params.uss_base_url = String::new();
        let result = server
            .create_operational_intent(&uss1, Uuid::new_v4(), params)
            .await;
        assert!(matches!(result, Err(Error::BadRequest(_))));

        // Plain-http base URL with TLS enforcement on
        let mut params = intent_params(&reservation);
        params.uss_base_url = "http://uss.example.com".to_string();
        let result = server
            .create_operational_intent(&uss1, Uuid::new_v4(), params)
            .await;
        assert!(matches!(result, Err(Error::BadRequest(_))));

        // Window ending in the past
        let stale = reservation_minutes(vertiport_id, Zone::Fato, -120, -60);
        let result = server
            .create_operational_intent(&uss1, Uuid::new_v4(), intent_params(&stale))
            .await;
        assert!(matches!(result, Err(Error::BadRequest(_))));

        // Inverted window
        let inverted = reservation_minutes(vertiport_id, Zone::Fato, 40, 10);
        let result = server
            .create_operational_intent(&uss1, Uuid::new_v4(), intent_params(&inverted))
            .await;
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }
}
