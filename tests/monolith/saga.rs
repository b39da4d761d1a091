use modular_rust::saga::{ReservationSagaData, SagaStatus, SagaStore};
use modular_rust::{Host, MonolithConfig};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::support::availability::{ResourceReservationFailed, ResourcesRepository, RESERVATION_FAILED};
use crate::support::parking_spots::{
    ParkingSpot, ParkingSpotsRepository, ReserveParkingSpot, CREATE_PATH, RESERVE_PATH,
};
use crate::support::probe::Probe;
use crate::support::reservations::{RemoveReservation, ReservationsRepository};
use crate::support::{date, eventually, observed, parking_system};

fn watch_saga(probe: &Probe, pipeline: &mut modular_rust::Pipeline<'_>) {
    probe.watch::<ResourceReservationFailed>(pipeline, "failed");
    probe.watch::<RemoveReservation>(pipeline, "remove");
}

async fn create_spot(host: &Host) -> Uuid {
    let spot: ParkingSpot = host
        .client()
        .request(CREATE_PATH, &json!({ "name": "A1" }), &CancellationToken::new())
        .await
        .unwrap();
    spot.id
}

async fn reserve(host: &Host, spot: Uuid, user: Uuid, capacity: u32, priority: u32) -> Uuid {
    let request = ReserveParkingSpot {
        parking_spot_id: spot,
        user_id: user,
        date: date(),
        capacity,
        priority,
    };
    host.client()
        .request(RESERVE_PATH, &request, &CancellationToken::new())
        .await
        .unwrap()
}

fn sagas(host: &Host) -> SagaStore<ReservationSagaData> {
    host.services().get::<SagaStore<ReservationSagaData>>().unwrap()
}

fn status(host: &Host, reservation: Uuid) -> Option<SagaStatus> {
    sagas(host).status(reservation).unwrap()
}

#[tokio::test]
async fn reservation_within_capacity_completes() {
    let (builder, probe) = observed(MonolithConfig::default(), watch_saga);
    let host = builder.build().unwrap();
    let spot = create_spot(&host).await;

    let reservation = reserve(&host, spot, Uuid::new_v4(), 1, 1).await;

    assert_eq!(status(&host, reservation), Some(SagaStatus::Completed));
    assert!(probe.seen().is_empty());
    let resource = host
        .services()
        .get::<ResourcesRepository>()
        .unwrap()
        .get(spot)
        .unwrap();
    assert_eq!(resource.reservations().len(), 1);
    assert_eq!(resource.reservations()[0].id, reservation);
    let reservations = host.services().get::<ReservationsRepository>().unwrap();
    assert!(reservations.get(reservation).is_some());
}

#[tokio::test]
async fn refused_reservation_is_compensated_once() {
    let (builder, probe) = observed(MonolithConfig::default(), watch_saga);
    let host = builder.build().unwrap();
    let spot = create_spot(&host).await;

    let first = reserve(&host, spot, Uuid::new_v4(), 1, 10).await;
    let user = Uuid::new_v4();
    let second = reserve(&host, spot, user, 1, 1).await;

    let failures = probe.messages::<ResourceReservationFailed>();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].resource_id, spot);
    assert_eq!(failures[0].code, RESERVATION_FAILED);
    assert_eq!(
        probe.messages::<RemoveReservation>(),
        vec![RemoveReservation {
            reservation_id: second,
            user_id: user,
        }]
    );

    assert_eq!(status(&host, first), Some(SagaStatus::Completed));
    assert_eq!(status(&host, second), Some(SagaStatus::Compensated));
    let failure = sagas(&host).get(second).unwrap().unwrap().data.failure.unwrap();
    assert_eq!(failure.code, RESERVATION_FAILED);

    let reservations = host.services().get::<ReservationsRepository>().unwrap();
    assert!(reservations.get(first).is_some());
    assert!(reservations.get(second).is_none());

    let notified = host.services().get::<ParkingSpotsRepository>().unwrap().failures();
    assert_eq!(notified.len(), 1);
    assert_eq!(notified[0].parking_spot_id, spot);
    assert_eq!(notified[0].user_id, user);
    assert_eq!(notified[0].date, date());
    assert_eq!(notified[0].code, RESERVATION_FAILED);
}

#[tokio::test]
async fn higher_priority_reservation_displaces_the_existing_one() {
    let host = parking_system(MonolithConfig::default()).build().unwrap();
    let spot = create_spot(&host).await;

    let first = reserve(&host, spot, Uuid::new_v4(), 1, 1).await;
    let second = reserve(&host, spot, Uuid::new_v4(), 1, 10).await;

    assert_eq!(status(&host, first), Some(SagaStatus::Completed));
    assert_eq!(status(&host, second), Some(SagaStatus::Completed));
    let resource = host
        .services()
        .get::<ResourcesRepository>()
        .unwrap()
        .get(spot)
        .unwrap();
    let kept: Vec<Uuid> = resource.reservations().iter().map(|r| r.id).collect();
    assert_eq!(kept, vec![second]);
}

#[tokio::test]
async fn capacity_beyond_the_resource_is_refused() {
    let (builder, probe) = observed(MonolithConfig::default(), watch_saga);
    let host = builder.build().unwrap();
    let spot = create_spot(&host).await;

    let reservation = reserve(&host, spot, Uuid::new_v4(), 3, 1).await;

    assert_eq!(status(&host, reservation), Some(SagaStatus::Compensated));
    let failures = probe.messages::<ResourceReservationFailed>();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].reason.contains("capacity"), "{}", failures[0].reason);
}

#[tokio::test]
async fn unknown_spot_is_rejected_before_the_saga_starts() {
    let host = parking_system(MonolithConfig::default()).build().unwrap();
    let request = ReserveParkingSpot {
        parking_spot_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        date: date(),
        capacity: 1,
        priority: 1,
    };

    let result = host
        .client()
        .request::<_, Uuid>(RESERVE_PATH, &request, &CancellationToken::new())
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert!(sagas(&host).is_empty());
}

#[tokio::test]
async fn deferred_saga_compensates_in_the_background() {
    let config = MonolithConfig::default().with_async_dispatcher(true);
    let mut host = parking_system(config).build().unwrap();
    host.start();

    let spot = create_spot(&host).await;
    let resources = host.services().get::<ResourcesRepository>().unwrap();
    assert!(eventually(|| resources.get(spot).is_some()).await);

    let first = reserve(&host, spot, Uuid::new_v4(), 1, 10).await;
    assert!(eventually(|| status(&host, first) == Some(SagaStatus::Completed)).await);
    let second = reserve(&host, spot, Uuid::new_v4(), 1, 1).await;
    assert!(eventually(|| status(&host, second) == Some(SagaStatus::Compensated)).await);

    let parking_spots = host.services().get::<ParkingSpotsRepository>().unwrap();
    assert!(eventually(|| parking_spots.failures().len() == 1).await);

    let dispatcher = host.shutdown().await.dispatcher.unwrap();
    assert_eq!(dispatcher.messages_failed, 0);
}

#[tokio::test]
async fn outbox_saga_runs_through_relay_passes() {
    let mut config = MonolithConfig::default().with_outbox(true);
    config.outbox.interval_milliseconds = 10;
    let mut host = parking_system(config).build().unwrap();
    host.start();

    let spot = create_spot(&host).await;
    let resources = host.services().get::<ResourcesRepository>().unwrap();
    assert!(eventually(|| resources.get(spot).is_some()).await);

    let first = reserve(&host, spot, Uuid::new_v4(), 1, 10).await;
    assert!(eventually(|| status(&host, first) == Some(SagaStatus::Completed)).await);
    let second = reserve(&host, spot, Uuid::new_v4(), 1, 1).await;
    assert!(eventually(|| status(&host, second) == Some(SagaStatus::Compensated)).await);

    let parking_spots = host.services().get::<ParkingSpotsRepository>().unwrap();
    assert!(eventually(|| parking_spots.failures().len() == 1).await);

    let outbox = host.shutdown().await.outbox.unwrap();
    assert_eq!(outbox.messages_failed, 0);
}
