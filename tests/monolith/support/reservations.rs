//! Reservations module: keeps the weekly reservations and removes them when
//! the saga compensates.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use modular_rust::{
    Command, Event, HandlerContext, HandlerError, MessageBroker, Module, ModuleError,
    ModuleSettings, Pipeline, Services,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Event)]
#[message(module = "reservations")]
pub struct ParkingSpotReserved {
    pub reservation_id: Uuid,
    pub parking_spot_id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Command)]
#[message(module = "reservations")]
pub struct RemoveReservation {
    pub reservation_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Event)]
#[message(module = "reservations")]
pub struct ParkingSpotReservationRemoved {
    pub reservation_id: Uuid,
    pub parking_spot_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WeeklyReservation {
    pub id: Uuid,
    pub parking_spot_id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Clone, Default)]
pub struct ReservationsRepository {
    reservations: Arc<Mutex<HashMap<Uuid, WeeklyReservation>>>,
}

impl ReservationsRepository {
    pub fn add(&self, reservation: WeeklyReservation) {
        self.reservations
            .lock()
            .unwrap()
            .insert(reservation.id, reservation);
    }

    pub fn get(&self, id: Uuid) -> Option<WeeklyReservation> {
        self.reservations.lock().unwrap().get(&id).cloned()
    }

    pub fn remove(&self, id: Uuid) -> Option<WeeklyReservation> {
        self.reservations.lock().unwrap().remove(&id)
    }
}

async fn on_parking_spot_reserved(
    event: ParkingSpotReserved,
    ctx: HandlerContext,
) -> Result<(), HandlerError> {
    let repository = ctx.scope().require::<ReservationsRepository>()?;
    repository.add(WeeklyReservation {
        id: event.reservation_id,
        parking_spot_id: event.parking_spot_id,
        user_id: event.user_id,
        date: event.date,
    });
    Ok(())
}

async fn remove_reservation(
    broker: MessageBroker,
    command: RemoveReservation,
    ctx: HandlerContext,
) -> Result<(), HandlerError> {
    let repository = ctx.scope().require::<ReservationsRepository>()?;
    let reservation = repository
        .remove(command.reservation_id)
        .ok_or_else(|| HandlerError::not_found(format!("reservation {}", command.reservation_id)))?;

    let event = ParkingSpotReservationRemoved {
        reservation_id: reservation.id,
        parking_spot_id: reservation.parking_spot_id,
        date: reservation.date,
    };
    broker
        .publish_with(event, ctx.context().clone(), ctx.cancel())
        .await?;
    Ok(())
}

#[derive(Default)]
pub struct ReservationsModule;

impl Module for ReservationsModule {
    fn name(&self) -> &str {
        "reservations"
    }

    fn register(&self, services: &mut Services, _settings: &ModuleSettings) -> Result<(), ModuleError> {
        services.add_singleton(ReservationsRepository::default());
        Ok(())
    }

    fn activate(&self, pipeline: &mut Pipeline<'_>) -> Result<(), ModuleError> {
        pipeline.subscribe(on_parking_spot_reserved);
        let broker = pipeline.broker();
        pipeline.subscribe(move |command: RemoveReservation, ctx: HandlerContext| {
            remove_reservation(broker.clone(), command, ctx)
        });
        Ok(())
    }
}
