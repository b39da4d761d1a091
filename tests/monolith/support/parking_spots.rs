//! Parking spots module. Tells availability about new spots either through the
//! local contract or with an event, depending on the `integration` option.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::NaiveDate;
use modular_rust::http::{context_from_headers, error_response};
use modular_rust::{
    BrokerError, Event, HandlerContext, HandlerError, MessageBroker, MessageContext, Module,
    ModuleClient, ModuleError, ModuleSettings, Pipeline, Scope, Services,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::availability::{ADD_RESOURCE_PATH, PARKING_SPOT_CAPACITY};

pub const CREATE_PATH: &str = "parking_spots/spots/create";
pub const RESERVE_PATH: &str = "parking_spots/spots/reserve";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Event)]
#[message(module = "parking_spots")]
pub struct ParkingSpotCreated {
    pub parking_spot_id: Uuid,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Event)]
#[message(module = "parking_spots")]
pub struct ParkingSpotReserved {
    pub reservation_id: Uuid,
    pub parking_spot_id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub capacity: u32,
    pub priority: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Event)]
#[message(module = "parking_spots")]
pub struct ParkingSpotReservationFailed {
    pub parking_spot_id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub reason: String,
    pub code: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParkingSpot {
    pub id: Uuid,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CreateParkingSpot {
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReserveParkingSpot {
    pub parking_spot_id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub capacity: u32,
    pub priority: u32,
}

/// How availability learns about new parking spots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Integration {
    LocalContract,
    #[default]
    Events,
}

#[derive(Debug, Error)]
pub enum ParkingSpotsError {
    #[error("cannot add resource for parking spot {0}")]
    CannotAddResource(Uuid),
    #[error("parking spot {0} not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Publish(#[from] BrokerError),
}

impl ParkingSpotsError {
    pub fn status_code(&self) -> u16 {
        match self {
            ParkingSpotsError::CannotAddResource(_) => 422,
            ParkingSpotsError::NotFound(_) => 404,
            ParkingSpotsError::Publish(_) => 500,
        }
    }
}

impl From<ParkingSpotsError> for HandlerError {
    fn from(err: ParkingSpotsError) -> Self {
        match err {
            ParkingSpotsError::NotFound(id) => HandlerError::not_found(format!("parking spot {id}")),
            other => HandlerError::rejected(other.to_string()),
        }
    }
}

/// The sender's side of availability's local contract.
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AddResourceRequest {
    resource_id: Uuid,
    capacity: u32,
    tags: Vec<String>,
}

/// Calls availability through the local router and keeps its errors out of
/// this module.
#[derive(Clone)]
pub struct AvailabilityApiClient {
    client: ModuleClient,
}

impl AvailabilityApiClient {
    pub fn new(client: ModuleClient) -> Self {
        Self { client }
    }

    pub async fn add_resource(
        &self,
        resource_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<(), ParkingSpotsError> {
        let request = AddResourceRequest {
            resource_id,
            capacity: PARKING_SPOT_CAPACITY,
            tags: vec!["parking_spot".to_string()],
        };
        self.client
            .send(ADD_RESOURCE_PATH, &request, cancel)
            .await
            .map_err(|err| {
                tracing::warn!(%resource_id, error = %err, "availability refused resource");
                ParkingSpotsError::CannotAddResource(resource_id)
            })
    }
}

#[derive(Clone, Default)]
pub struct ParkingSpotsRepository {
    spots: Arc<Mutex<HashMap<Uuid, ParkingSpot>>>,
    failures: Arc<Mutex<Vec<ParkingSpotReservationFailed>>>,
}

impl ParkingSpotsRepository {
    pub fn add(&self, spot: ParkingSpot) {
        self.spots.lock().unwrap().insert(spot.id, spot);
    }

    pub fn get(&self, id: Uuid) -> Option<ParkingSpot> {
        self.spots.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.spots.lock().unwrap().len()
    }

    pub fn record_failure(&self, failure: ParkingSpotReservationFailed) {
        self.failures.lock().unwrap().push(failure);
    }

    pub fn failures(&self) -> Vec<ParkingSpotReservationFailed> {
        self.failures.lock().unwrap().clone()
    }
}

#[derive(Clone)]
pub struct ParkingSpotsApi {
    repository: ParkingSpotsRepository,
    broker: MessageBroker,
    availability: AvailabilityApiClient,
    integration: Integration,
}

impl ParkingSpotsApi {
    pub async fn create(
        &self,
        name: String,
        context: MessageContext,
        cancel: &CancellationToken,
    ) -> Result<ParkingSpot, ParkingSpotsError> {
        let spot = ParkingSpot {
            id: Uuid::new_v4(),
            name,
        };

        match self.integration {
            Integration::LocalContract => {
                self.availability.add_resource(spot.id, cancel).await?;
                self.repository.add(spot.clone());
            }
            Integration::Events => {
                self.repository.add(spot.clone());
                let event = ParkingSpotCreated {
                    parking_spot_id: spot.id,
                };
                self.broker.publish_with(event, context, cancel).await?;
            }
        }
        Ok(spot)
    }

    /// Starts the reservation saga. Returns the new reservation id.
    pub async fn reserve(
        &self,
        request: ReserveParkingSpot,
        context: MessageContext,
        cancel: &CancellationToken,
    ) -> Result<Uuid, ParkingSpotsError> {
        if self.repository.get(request.parking_spot_id).is_none() {
            return Err(ParkingSpotsError::NotFound(request.parking_spot_id));
        }

        let reservation_id = Uuid::new_v4();
        let event = ParkingSpotReserved {
            reservation_id,
            parking_spot_id: request.parking_spot_id,
            user_id: request.user_id,
            date: request.date,
            capacity: request.capacity,
            priority: request.priority,
        };
        self.broker.publish_with(event, context, cancel).await?;
        Ok(reservation_id)
    }
}

async fn create_route(
    api: ParkingSpotsApi,
    request: CreateParkingSpot,
    cancel: CancellationToken,
) -> Result<ParkingSpot, HandlerError> {
    Ok(api.create(request.name, MessageContext::new(), &cancel).await?)
}

async fn reserve_route(
    api: ParkingSpotsApi,
    request: ReserveParkingSpot,
    cancel: CancellationToken,
) -> Result<Uuid, HandlerError> {
    Ok(api.reserve(request, MessageContext::new(), &cancel).await?)
}

async fn create_endpoint(
    State(api): State<ParkingSpotsApi>,
    headers: HeaderMap,
    Json(request): Json<CreateParkingSpot>,
) -> Response {
    let context = context_from_headers(&headers);
    match api.create(request.name, context, &CancellationToken::new()).await {
        Ok(spot) => (StatusCode::CREATED, Json(spot)).into_response(),
        Err(err) => error_response(err.status_code(), err),
    }
}

async fn reserve_endpoint(
    State(api): State<ParkingSpotsApi>,
    headers: HeaderMap,
    Json(request): Json<ReserveParkingSpot>,
) -> Response {
    let context = context_from_headers(&headers);
    match api.reserve(request, context, &CancellationToken::new()).await {
        Ok(reservation_id) => {
            (StatusCode::ACCEPTED, Json(serde_json::json!({ "reservationId": reservation_id })))
                .into_response()
        }
        Err(err) => error_response(err.status_code(), err),
    }
}

#[derive(Default)]
pub struct ParkingSpotsModule {
    repository: ParkingSpotsRepository,
    integration: OnceLock<Integration>,
    api: OnceLock<ParkingSpotsApi>,
}

impl Module for ParkingSpotsModule {
    fn name(&self) -> &str {
        "parking_spots"
    }

    fn policies(&self) -> Vec<String> {
        vec!["parking_spots".to_string()]
    }

    fn register(&self, services: &mut Services, settings: &ModuleSettings) -> Result<(), ModuleError> {
        let integration = settings
            .option::<Integration>("integration")?
            .unwrap_or_default();
        self.integration
            .set(integration)
            .map_err(|_| ModuleError::invalid("parking_spots registered twice"))?;
        services.add_singleton(self.repository.clone());
        Ok(())
    }

    fn activate(&self, pipeline: &mut Pipeline<'_>) -> Result<(), ModuleError> {
        let api = ParkingSpotsApi {
            repository: self.repository.clone(),
            broker: pipeline.broker(),
            availability: AvailabilityApiClient::new(pipeline.client()),
            integration: self.integration.get().copied().unwrap_or_default(),
        };

        let create = api.clone();
        pipeline.route(
            CREATE_PATH,
            move |request: CreateParkingSpot, _scope: Scope, cancel: CancellationToken| {
                create_route(create.clone(), request, cancel)
            },
        )?;
        let reserve = api.clone();
        pipeline.route(
            RESERVE_PATH,
            move |request: ReserveParkingSpot, _scope: Scope, cancel: CancellationToken| {
                reserve_route(reserve.clone(), request, cancel)
            },
        )?;

        let repository = self.repository.clone();
        pipeline.subscribe(move |event: ParkingSpotReservationFailed, _ctx: HandlerContext| {
            repository.record_failure(event);
            std::future::ready(Ok::<(), HandlerError>(()))
        });
        pipeline
            .register_message::<ParkingSpotCreated>()
            .register_message::<ParkingSpotReserved>();

        self.api
            .set(api)
            .map_err(|_| ModuleError::invalid("parking_spots activated twice"))?;
        Ok(())
    }

    fn expose(&self, router: Router) -> Router {
        let Some(api) = self.api.get() else {
            return router;
        };
        router.merge(
            Router::new()
                .route("/parking-spots", post(create_endpoint))
                .route("/parking-spots/reservations", post(reserve_endpoint))
                .with_state(api.clone()),
        )
    }
}
