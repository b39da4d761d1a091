//! Saga orchestration with compensation.
//!
//! A saga instance is keyed by the business id that started it and only ever
//! moves forward:
//!
//! ```text
//! (idle) ──start──► Pending ──success──► Completed
//!                      │
//!                   failure
//!                      ▼
//!                Compensating ──confirmed──► Compensated
//! ```
//!
//! The primary command's handler must always answer with either the success or
//! the failure event. If it fails without publishing either, the instance stays
//! `Pending`.

pub mod messages;
mod reservation;
mod state;
mod store;

pub use reservation::{ReservationFailure, ReservationSaga, ReservationSagaData, ReservationSagaModule};
pub use state::{SagaInstance, SagaStatus};
pub use store::{SagaError, SagaStore};
