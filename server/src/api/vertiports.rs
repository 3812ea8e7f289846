//! Vertiport administration plus the FATO free-time and parking capacity
//! queries.

use super::Server;
use crate::auth::{CallContext, Operation};
use crate::errors::Error;
use crate::models::vertiport::Vertiport;
use crate::models::{free_periods, used_count, TimePeriod, VertiportReservation, Zone};
use crate::repos::{ConstraintRepo, OperationalIntentRepo, SubscriptionRepo, VertiportRepo};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Parameters of a put-vertiport request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PutVertiportParams {
    pub parking_capacity: i32,
}

/// Parking stand occupancy over a query window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParkingPlaceCount {
    pub used: i32,
    pub available: i32,
    pub capacity: i32,
}

impl Server {
    /// Administrative upsert of a vertiport
    pub async fn put_vertiport(
        &self,
        context: &CallContext,
        vertiport_id: Uuid,
        params: PutVertiportParams,
    ) -> Result<Vertiport, Error> {
        context.authorize(Operation::PutVertiport)?;

        if params.parking_capacity < 0 {
            return Err(Error::BadRequest(
                "Vertiport parking capacity must not be negative".to_string(),
            ));
        }

        let vertiport = self
            .store
            .transact(|txn| {
                Box::pin(async move {
                    txn.upsert_vertiport(Vertiport {
                        id: vertiport_id,
                        parking_capacity: params.parking_capacity,
                    })
                    .await
                })
            })
            .await?;

        api_info!("(put_vertiport) {} stored.", vertiport_id);

        Ok(vertiport)
    }

    /// Returns a single vertiport
    pub async fn get_vertiport(
        &self,
        context: &CallContext,
        vertiport_id: Uuid,
    ) -> Result<Vertiport, Error> {
        context.authorize(Operation::GetVertiport)?;

        self.store
            .transact(|txn| {
                Box::pin(async move {
                    let Some(vertiport) = txn.get_vertiport(vertiport_id).await? else {
                        return Err(Error::NotFound(format!(
                            "Vertiport {} not found",
                            vertiport_id
                        )));
                    };
                    Ok(vertiport)
                })
            })
            .await
    }

    /// Deletes a vertiport with no records referencing it
    pub async fn delete_vertiport(
        &self,
        context: &CallContext,
        vertiport_id: Uuid,
    ) -> Result<Vertiport, Error> {
        context.authorize(Operation::DeleteVertiport)?;

        let vertiport = self
            .store
            .transact(|txn| {
                Box::pin(async move {
                    let Some(old) = txn.get_vertiport(vertiport_id).await? else {
                        return Err(Error::NotFound(format!(
                            "Vertiport {} not found",
                            vertiport_id
                        )));
                    };

                    // Orphaned records would keep pointing at the deleted id
                    for zone in [Zone::Fato, Zone::ParkingStand] {
                        let filter = VertiportReservation {
                            vertiport_id,
                            zone,
                            start_time: None,
                            end_time: None,
                        };

                        if !txn.search_operational_intents(&filter).await?.is_empty() {
                            return Err(Error::BadRequest(format!(
                                "Vertiport {} still has OperationalIntents",
                                vertiport_id
                            )));
                        }
                        if !txn.search_constraints(&filter).await?.is_empty() {
                            return Err(Error::BadRequest(format!(
                                "Vertiport {} still has Constraints",
                                vertiport_id
                            )));
                        }
                        if !txn.search_subscriptions(&filter).await?.is_empty() {
                            return Err(Error::BadRequest(format!(
                                "Vertiport {} still has Subscriptions",
                                vertiport_id
                            )));
                        }
                    }

                    txn.delete_vertiport(vertiport_id).await?;

                    Ok(old)
                })
            })
            .await?;

        api_info!("(delete_vertiport) {} deleted.", vertiport_id);

        Ok(vertiport)
    }

    /// Returns the free periods of a vertiport's FATO within the window:
    /// the complement of every constraint and operational intent on the
    /// zone
    pub async fn get_fato_available_times(
        &self,
        context: &CallContext,
        vertiport_id: Uuid,
        time_start: DateTime<Utc>,
        time_end: DateTime<Utc>,
    ) -> Result<Vec<TimePeriod>, Error> {
        context.authorize(Operation::GetFatoAvailableTimes)?;

        self.store
            .transact(|txn| {
                Box::pin(async move {
                    if txn.get_vertiport(vertiport_id).await?.is_none() {
                        return Err(Error::NotFound(format!(
                            "Vertiport {} not found",
                            vertiport_id
                        )));
                    }

                    let filter = VertiportReservation {
                        vertiport_id,
                        zone: Zone::Fato,
                        start_time: Some(time_start),
                        end_time: Some(time_end),
                    };

                    let mut busy: Vec<TimePeriod> = Vec::new();
                    for constraint in txn.search_constraints(&filter).await? {
                        busy.push(constraint.time_period());
                    }
                    for intent in txn.search_operational_intents(&filter).await? {
                        busy.push(intent.time_period());
                    }

                    Ok(free_periods(&busy, time_start, time_end))
                })
            })
            .await
    }

    /// Counts parking stands consumed within the window. Capacity is
    /// reported, not enforced; the available count is advisory.
    pub async fn get_number_of_used_parking_places(
        &self,
        context: &CallContext,
        vertiport_id: Uuid,
        time_start: DateTime<Utc>,
        time_end: DateTime<Utc>,
    ) -> Result<ParkingPlaceCount, Error> {
        context.authorize(Operation::GetNumberOfUsedParkingPlaces)?;

        self.store
            .transact(|txn| {
                Box::pin(async move {
                    let Some(vertiport) = txn.get_vertiport(vertiport_id).await? else {
                        return Err(Error::NotFound(format!(
                            "Vertiport {} not found",
                            vertiport_id
                        )));
                    };

                    let filter = VertiportReservation {
                        vertiport_id,
                        zone: Zone::ParkingStand,
                        start_time: Some(time_start),
                        end_time: Some(time_end),
                    };

                    let mut busy: Vec<TimePeriod> = Vec::new();
                    for constraint in txn.search_constraints(&filter).await? {
                        busy.push(constraint.time_period());
                    }
                    for intent in txn.search_operational_intents(&filter).await? {
                        busy.push(intent.time_period());
                    }

                    let used = used_count(&busy, time_start, time_end) as i32;
                    let available = vertiport.parking_capacity - used;
                    if available < 0 {
                        return Err(Error::Internal(format!(
                            "Vertiport {} reports {} used parking places over a capacity of {}",
                            vertiport_id, used, vertiport.parking_capacity
                        )));
                    }

                    Ok(ParkingPlaceCount {
                        used,
                        available,
                        capacity: vertiport.parking_capacity,
                    })
                })
            })
            .await
    }
}
