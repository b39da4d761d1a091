use chrono::NaiveDate;
use uuid::Uuid;

use super::messages::{
    ParkingSpotReservationFailed, ParkingSpotReservationRemoved, ParkingSpotReserved,
    RemoveReservation, ReserveResource, ResourceReservationFailed, ResourceReserved,
};
use super::{SagaStatus, SagaStore};
use crate::config::ModuleSettings;
use crate::error::HandlerError;
use crate::messaging::{HandlerContext, MessageBroker};
use crate::module::{Module, ModuleError, Pipeline, Services};

/// What the reservation saga remembers between events.
#[derive(Clone, Debug, PartialEq)]
pub struct ReservationSagaData {
    pub reservation_id: Uuid,
    pub parking_spot_id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub failure: Option<ReservationFailure>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReservationFailure {
    pub reason: String,
    pub code: String,
}

/// Reserves the availability resource behind a parking spot reservation, and
/// removes the reservation again when availability refuses it.
///
/// ```text
/// parking_spot_reserved ──► ReserveResource ──► resource_reserved ──► Completed
///                                         └──► resource_reservation_failed
///                                                 │
///                                        RemoveReservation (Compensating)
///                                                 │
///                              parking_spot_reservation_removed ──► Compensated
/// ```
#[derive(Clone)]
pub struct ReservationSaga {
    broker: MessageBroker,
    store: SagaStore<ReservationSagaData>,
}

impl ReservationSaga {
    pub fn new(broker: MessageBroker, store: SagaStore<ReservationSagaData>) -> Self {
        Self { broker, store }
    }

    pub fn store(&self) -> &SagaStore<ReservationSagaData> {
        &self.store
    }

    pub async fn on_parking_spot_reserved(
        &self,
        event: ParkingSpotReserved,
        ctx: HandlerContext,
    ) -> Result<(), HandlerError> {
        let data = ReservationSagaData {
            reservation_id: event.reservation_id,
            parking_spot_id: event.parking_spot_id,
            user_id: event.user_id,
            date: event.date,
            failure: None,
        };
        if !self
            .store
            .start(event.reservation_id, data)
            .map_err(HandlerError::other)?
        {
            tracing::debug!(reservation_id = %event.reservation_id, "reservation saga already started");
            return Ok(());
        }
        tracing::info!(
            reservation_id = %event.reservation_id,
            parking_spot_id = %event.parking_spot_id,
            correlation_id = %ctx.correlation_id(),
            "reservation saga started"
        );

        let command = ReserveResource {
            resource_id: event.parking_spot_id,
            reservation_id: event.reservation_id,
            capacity: event.capacity,
            date: event.date,
            priority: event.priority,
        };
        let published = self
            .broker
            .publish_with(command, ctx.context().clone(), ctx.cancel())
            .await;
        if let Err(err) = published {
            // Forget the instance so a redelivered event starts it again.
            self.store
                .discard(event.reservation_id, SagaStatus::Pending)
                .map_err(HandlerError::other)?;
            tracing::warn!(
                reservation_id = %event.reservation_id,
                error = %err,
                "reserve_resource not issued, reservation saga discarded"
            );
            return Err(err.into());
        }
        Ok(())
    }

    pub async fn on_resource_reserved(
        &self,
        event: ResourceReserved,
        _ctx: HandlerContext,
    ) -> Result<(), HandlerError> {
        let advanced = self
            .store
            .transition(
                event.reservation_id,
                SagaStatus::Pending,
                SagaStatus::Completed,
                |_| {},
            )
            .map_err(HandlerError::other)?;

        match advanced {
            Some(_) => tracing::info!(reservation_id = %event.reservation_id, "reservation saga completed"),
            None => tracing::debug!(reservation_id = %event.reservation_id, "no pending reservation saga"),
        }
        Ok(())
    }

    pub async fn on_resource_reservation_failed(
        &self,
        event: ResourceReservationFailed,
        ctx: HandlerContext,
    ) -> Result<(), HandlerError> {
        // The latest pending saga for the resource and day is the one that failed.
        let candidates = self
            .store
            .find(|instance| {
                instance.status == SagaStatus::Pending
                    && instance.data.parking_spot_id == event.resource_id
                    && instance.data.date == event.date
            })
            .map_err(HandlerError::other)?;
        let Some(pending) = candidates.into_iter().last() else {
            tracing::warn!(
                resource_id = %event.resource_id,
                date = %event.date,
                code = %event.code,
                "no pending reservation saga for failed resource reservation"
            );
            return Ok(());
        };

        let failure = ReservationFailure {
            reason: event.reason.clone(),
            code: event.code.clone(),
        };
        let advanced = self
            .store
            .transition(
                pending.correlation_id,
                SagaStatus::Pending,
                SagaStatus::Compensating,
                |data| data.failure = Some(failure),
            )
            .map_err(HandlerError::other)?;
        let Some(instance) = advanced else {
            return Ok(());
        };

        tracing::info!(
            reservation_id = %instance.correlation_id,
            code = %event.code,
            "resource reservation failed, compensating"
        );
        let command = RemoveReservation {
            reservation_id: instance.data.reservation_id,
            user_id: instance.data.user_id,
        };
        let published = self
            .broker
            .publish_with(command, ctx.context().clone(), ctx.cancel())
            .await;
        if let Err(err) = published {
            self.store
                .revert(&pending, SagaStatus::Compensating)
                .map_err(HandlerError::other)?;
            tracing::warn!(
                reservation_id = %instance.correlation_id,
                error = %err,
                "remove_reservation not issued, reservation saga back to pending"
            );
            return Err(err.into());
        }
        Ok(())
    }

    pub async fn on_reservation_removed(
        &self,
        event: ParkingSpotReservationRemoved,
        ctx: HandlerContext,
    ) -> Result<(), HandlerError> {
        let compensating = self.store.get(event.reservation_id).map_err(HandlerError::other)?;
        let advanced = self
            .store
            .transition(
                event.reservation_id,
                SagaStatus::Compensating,
                SagaStatus::Compensated,
                |_| {},
            )
            .map_err(HandlerError::other)?;
        let Some(instance) = advanced else {
            tracing::debug!(reservation_id = %event.reservation_id, "no compensating reservation saga");
            return Ok(());
        };

        tracing::info!(reservation_id = %event.reservation_id, "reservation saga compensated");
        let failure = instance.data.failure.unwrap_or(ReservationFailure {
            reason: "reservation removed".to_string(),
            code: "reservation_failed".to_string(),
        });
        let notification = ParkingSpotReservationFailed {
            parking_spot_id: instance.data.parking_spot_id,
            user_id: instance.data.user_id,
            date: instance.data.date,
            reason: failure.reason,
            code: failure.code,
        };
        let published = self
            .broker
            .publish_with(notification, ctx.context().clone(), ctx.cancel())
            .await;
        if let Err(err) = published {
            if let Some(previous) = &compensating {
                self.store
                    .revert(previous, SagaStatus::Compensated)
                    .map_err(HandlerError::other)?;
            }
            tracing::warn!(
                reservation_id = %event.reservation_id,
                error = %err,
                "parking_spot_reservation_failed not issued, reservation saga back to compensating"
            );
            return Err(err.into());
        }
        Ok(())
    }
}

/// Hosts the [`ReservationSaga`] as the `saga` module.
///
/// The saga store is registered as a singleton so callers can inspect saga
/// state through the host's services.
#[derive(Default)]
pub struct ReservationSagaModule {
    store: SagaStore<ReservationSagaData>,
}

impl ReservationSagaModule {
    pub fn store(&self) -> &SagaStore<ReservationSagaData> {
        &self.store
    }
}

impl Module for ReservationSagaModule {
    fn name(&self) -> &str {
        "saga"
    }

    fn register(&self, services: &mut Services, _settings: &ModuleSettings) -> Result<(), ModuleError> {
        services.add_singleton(self.store.clone());
        Ok(())
    }

    fn activate(&self, pipeline: &mut Pipeline<'_>) -> Result<(), ModuleError> {
        let saga = ReservationSaga::new(pipeline.broker(), self.store.clone());

        let s = saga.clone();
        pipeline.subscribe(move |event: ParkingSpotReserved, ctx| {
            let saga = s.clone();
            async move { saga.on_parking_spot_reserved(event, ctx).await }
        });
        let s = saga.clone();
        pipeline.subscribe(move |event: ResourceReserved, ctx| {
            let saga = s.clone();
            async move { saga.on_resource_reserved(event, ctx).await }
        });
        let s = saga.clone();
        pipeline.subscribe(move |event: ResourceReservationFailed, ctx| {
            let saga = s.clone();
            async move { saga.on_resource_reservation_failed(event, ctx).await }
        });
        let s = saga;
        pipeline.subscribe(move |event: ParkingSpotReservationRemoved, ctx| {
            let saga = s.clone();
            async move { saga.on_reservation_removed(event, ctx).await }
        });

        pipeline
            .register_message::<ReserveResource>()
            .register_message::<RemoveReservation>()
            .register_message::<ParkingSpotReservationFailed>();
        Ok(())
    }
}
