//! Test modules modelled on a parking spot reservation system.

#![allow(dead_code)]

pub mod availability;
pub mod parking_spots;
pub mod reservations;

use std::time::Duration;

use chrono::NaiveDate;
use modular_rust::saga::ReservationSagaModule;
use modular_rust::{Host, HostBuilder, MonolithConfig};
use tracing_subscriber::EnvFilter;

use availability::AvailabilityModule;
use parking_spots::ParkingSpotsModule;
use probe::{Probe, ProbeModule};
use reservations::ReservationsModule;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Every module of the parking system.
pub fn parking_system(config: MonolithConfig) -> HostBuilder {
    init_tracing();
    Host::builder(config)
        .module(AvailabilityModule::default)
        .module(ParkingSpotsModule::default)
        .module(ReservationsModule::default)
        .module(ReservationSagaModule::default)
}

/// The parking system plus a probe module subscribed by `watch`.
pub fn observed(
    config: MonolithConfig,
    watch: fn(&Probe, &mut modular_rust::Pipeline<'_>),
) -> (HostBuilder, Probe) {
    let probe = Probe::default();
    let shared = probe.clone();
    let builder = parking_system(config).module(move || ProbeModule::new(shared.clone(), watch));
    (builder, probe)
}

pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
