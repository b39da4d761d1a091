//! The saga's own declarations of the shapes it exchanges with the parking
//! spot, availability and reservation modules.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Command, Event};

/// Start event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Event)]
#[message(module = "saga")]
pub struct ParkingSpotReserved {
    pub reservation_id: Uuid,
    pub parking_spot_id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub capacity: u32,
    pub priority: u32,
}

/// Primary command, handled by availability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Command)]
#[message(module = "saga")]
pub struct ReserveResource {
    pub resource_id: Uuid,
    pub reservation_id: Uuid,
    pub capacity: u32,
    pub date: NaiveDate,
    pub priority: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Event)]
#[message(module = "saga")]
pub struct ResourceReserved {
    pub resource_id: Uuid,
    pub reservation_id: Uuid,
    pub date: NaiveDate,
}

/// Carries no reservation id; correlated by resource and date.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Event)]
#[message(module = "saga")]
pub struct ResourceReservationFailed {
    pub resource_id: Uuid,
    pub date: NaiveDate,
    pub reason: String,
    pub code: String,
}

/// Compensating command, handled by reservations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Command)]
#[message(module = "saga")]
pub struct RemoveReservation {
    pub reservation_id: Uuid,
    pub user_id: Uuid,
}

/// Compensation confirmation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Event)]
#[message(module = "saga")]
pub struct ParkingSpotReservationRemoved {
    pub reservation_id: Uuid,
    pub parking_spot_id: Uuid,
    pub date: NaiveDate,
}

/// Published once a failed reservation has been compensated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Event)]
#[message(module = "saga")]
pub struct ParkingSpotReservationFailed {
    pub parking_spot_id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub reason: String,
    pub code: String,
}
