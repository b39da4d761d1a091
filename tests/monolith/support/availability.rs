//! Availability module: resources with capacity and prioritized reservations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use modular_rust::{
    Command, Event, HandlerContext, HandlerError, MessageBroker, Module, ModuleError,
    ModuleSettings, Pipeline, Scope, Services,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const ADD_RESOURCE_PATH: &str = "availability/resources/add";
pub const RESERVATION_FAILED: &str = "reservation_failed";
pub const PARKING_SPOT_CAPACITY: u32 = 2;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Command)]
#[message(module = "availability")]
pub struct AddResource {
    pub resource_id: Uuid,
    pub capacity: u32,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Command)]
#[message(module = "availability")]
pub struct ReserveResource {
    pub resource_id: Uuid,
    pub reservation_id: Uuid,
    pub capacity: u32,
    pub date: NaiveDate,
    pub priority: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Event)]
#[message(module = "availability")]
pub struct ResourceReserved {
    pub resource_id: Uuid,
    pub reservation_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Event)]
#[message(module = "availability")]
pub struct ResourceReservationFailed {
    pub resource_id: Uuid,
    pub date: NaiveDate,
    pub reason: String,
    pub code: String,
}

/// Availability's own view of the parking spots event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Event)]
#[message(module = "availability")]
pub struct ParkingSpotCreated {
    pub parking_spot_id: Uuid,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reservation {
    pub id: Uuid,
    pub capacity: u32,
    pub date: NaiveDate,
    pub priority: u32,
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("reservation capacity {requested} exceeds resource capacity {capacity}")]
    CapacityExceeded { capacity: u32, requested: u32 },
    #[error("cannot expropriate reservation for resource {resource_id} on {date}")]
    CannotExpropriate { resource_id: Uuid, date: NaiveDate },
}

#[derive(Clone, Debug)]
pub struct Resource {
    pub id: Uuid,
    pub capacity: u32,
    pub tags: Vec<String>,
    reservations: Vec<Reservation>,
}

impl Resource {
    pub fn new(id: Uuid, capacity: u32, tags: Vec<String>) -> Self {
        Self {
            id,
            capacity,
            tags,
            reservations: Vec::new(),
        }
    }

    pub fn reservations(&self) -> &[Reservation] {
        &self.reservations
    }

    /// Add `reservation`, displacing a lower-priority one on the same day.
    /// Returns the displaced reservation.
    pub fn add_reservation(&mut self, reservation: Reservation) -> Result<Option<Reservation>, ResourceError> {
        if reservation.capacity > self.capacity {
            return Err(ResourceError::CapacityExceeded {
                capacity: self.capacity,
                requested: reservation.capacity,
            });
        }

        let colliding = self
            .reservations
            .iter()
            .position(|existing| existing.date == reservation.date);
        let expropriated = match colliding {
            Some(index) if self.reservations[index].priority >= reservation.priority => {
                return Err(ResourceError::CannotExpropriate {
                    resource_id: self.id,
                    date: reservation.date,
                });
            }
            Some(index) => Some(self.reservations.remove(index)),
            None => None,
        };

        self.reservations.push(reservation);
        Ok(expropriated)
    }
}

#[derive(Clone, Default)]
pub struct ResourcesRepository {
    resources: Arc<Mutex<HashMap<Uuid, Resource>>>,
}

impl ResourcesRepository {
    pub fn add(&self, resource: Resource) -> Result<(), HandlerError> {
        let mut resources = self.resources.lock().unwrap();
        if resources.contains_key(&resource.id) {
            return Err(HandlerError::rejected(format!(
                "resource {} already exists",
                resource.id
            )));
        }
        resources.insert(resource.id, resource);
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<Resource> {
        self.resources.lock().unwrap().get(&id).cloned()
    }

    pub fn update(&self, resource: Resource) {
        self.resources.lock().unwrap().insert(resource.id, resource);
    }

    pub fn len(&self) -> usize {
        self.resources.lock().unwrap().len()
    }
}

/// Anti-corruption layer: parking spot events become availability commands.
pub fn map_parking_spot_created(event: ParkingSpotCreated) -> AddResource {
    AddResource {
        resource_id: event.parking_spot_id,
        capacity: PARKING_SPOT_CAPACITY,
        tags: vec!["parking_spot".to_string()],
    }
}

async fn add_resource(
    command: AddResource,
    scope: Scope,
    _cancel: CancellationToken,
) -> Result<(), HandlerError> {
    let repository = scope.require::<ResourcesRepository>()?;
    repository.add(Resource::new(command.resource_id, command.capacity, command.tags))
}

async fn on_parking_spot_created(
    broker: MessageBroker,
    event: ParkingSpotCreated,
    ctx: HandlerContext,
) -> Result<(), HandlerError> {
    broker
        .publish_with(map_parking_spot_created(event), ctx.context().clone(), ctx.cancel())
        .await?;
    Ok(())
}

/// Always answers with `ResourceReserved` or `ResourceReservationFailed`.
async fn reserve_resource(
    broker: MessageBroker,
    command: ReserveResource,
    ctx: HandlerContext,
) -> Result<(), HandlerError> {
    let repository = ctx.scope().require::<ResourcesRepository>()?;
    let reservation = Reservation {
        id: command.reservation_id,
        capacity: command.capacity,
        date: command.date,
        priority: command.priority,
    };

    let outcome = match repository.get(command.resource_id) {
        Some(mut resource) => resource
            .add_reservation(reservation)
            .map(|_| resource)
            .map_err(|err| err.to_string()),
        None => Err(format!("resource {} not found", command.resource_id)),
    };

    match outcome {
        Ok(resource) => {
            repository.update(resource);
            let event = ResourceReserved {
                resource_id: command.resource_id,
                reservation_id: command.reservation_id,
                date: command.date,
            };
            broker
                .publish_with(event, ctx.context().clone(), ctx.cancel())
                .await?;
        }
        Err(reason) => {
            let event = ResourceReservationFailed {
                resource_id: command.resource_id,
                date: command.date,
                reason,
                code: RESERVATION_FAILED.to_string(),
            };
            broker
                .publish_with(event, ctx.context().clone(), ctx.cancel())
                .await?;
        }
    }
    Ok(())
}

async fn on_add_resource(command: AddResource, ctx: HandlerContext) -> Result<(), HandlerError> {
    let repository = ctx.scope().require::<ResourcesRepository>()?;
    repository.add(Resource::new(command.resource_id, command.capacity, command.tags))
}

#[derive(Default)]
pub struct AvailabilityModule;

impl Module for AvailabilityModule {
    fn name(&self) -> &str {
        "availability"
    }

    fn register(&self, services: &mut Services, _settings: &ModuleSettings) -> Result<(), ModuleError> {
        services.add_singleton(ResourcesRepository::default());
        Ok(())
    }

    fn activate(&self, pipeline: &mut Pipeline<'_>) -> Result<(), ModuleError> {
        pipeline.route(ADD_RESOURCE_PATH, add_resource)?;

        let broker = pipeline.broker();
        pipeline.subscribe(move |event: ParkingSpotCreated, ctx: HandlerContext| {
            on_parking_spot_created(broker.clone(), event, ctx)
        });
        pipeline.subscribe(on_add_resource);
        let broker = pipeline.broker();
        pipeline.subscribe(move |command: ReserveResource, ctx: HandlerContext| {
            reserve_resource(broker.clone(), command, ctx)
        });
        Ok(())
    }
}
