//! Booking wizard demo binary
//!
//! Walks one booking through all four steps and prints the navigation bar at
//! each one. Uses the in-memory catalogue by default; pass `--http` to talk
//! to the service configured through `BOOKING_API_URL`.
//!
//! Requires the `demo` feature: `cargo run -p booking-wizard --features demo`.

use anyhow::{Context, bail};
use booking_client::{BookingService, HttpBookingService, PaymentMethod};
use booking_core::environment::{Clock, ConnectivitySignal, SystemClock};
use booking_testing::{fixtures, test_clock};
use booking_wizard::{BookingFlow, WizardConfig, WizardEnvironment, WizardState};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "booking_wizard=debug,booking_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WizardConfig::from_env()?;
    let use_http = std::env::args().any(|arg| arg == "--http");

    // The in-memory catalogue is dated, so its clock is pinned to match
    let (service, clock): (Arc<dyn BookingService>, Arc<dyn Clock>) = if use_http {
        println!("=== Booking Wizard ({}) ===\n", config.client.base_url);
        (
            Arc::new(HttpBookingService::new(config.client.clone())?),
            Arc::new(SystemClock),
        )
    } else {
        println!("=== Booking Wizard (in-memory catalogue) ===\n");
        (
            Arc::new(fixtures::standard_service().with_latency(Duration::from_millis(150))),
            Arc::new(test_clock()),
        )
    };

    let flow = BookingFlow::new(WizardEnvironment::new(
        service,
        clock,
        Arc::new(ConnectivitySignal::new(true)),
        config,
    ));

    // Step 1
    flow.start().await?.wait().await;
    let state = flow.snapshot().await;
    check(&state)?;
    let service = state
        .resources
        .services
        .data()
        .and_then(|services| services.first().cloned())
        .context("no services offered")?;
    println!(">>> Service: {} ({}, {} min)", service.name, service.price, service.duration_minutes);
    flow.select_service(service.id.clone()).await?;
    print_navigation(&flow).await;
    flow.go_next().await?.wait().await;

    // Step 2
    let state = flow.snapshot().await;
    check(&state)?;
    let date = state
        .resources
        .dates
        .data()
        .and_then(|dates| dates.iter().find(|d| d.has_availability))
        .map(|d| d.date)
        .context("no dates available")?;
    println!(">>> Date: {date}");
    flow.select_date(date).await?.wait().await;

    let state = flow.snapshot().await;
    check(&state)?;
    let slot = state
        .slots_for_selection()
        .iter()
        .find(|slot| slot.is_available)
        .cloned()
        .context("no open time slots")?;
    println!(">>> Time: {} to {}", slot.start_time, slot.end_time);
    flow.select_time_slot(slot.id).await?;
    print_navigation(&flow).await;
    flow.go_next().await?;

    // Step 3
    let client = fixtures::john_doe();
    println!(">>> Client: {} <{}> {}", client.full_name, client.email, client.phone);
    flow.update_client_info(client).await?;
    print_navigation(&flow).await;
    flow.go_next().await?;

    // Step 4
    println!(">>> Payment: {}", PaymentMethod::PayAtAppointment);
    flow.choose_payment_method(PaymentMethod::PayAtAppointment)
        .await?;
    flow.acknowledge_cancellation_policy(true).await?;
    print_navigation(&flow).await;
    flow.submit().await?.wait().await;

    let state = flow.snapshot().await;
    check(&state)?;
    let Some(confirmation) = &state.confirmation else {
        bail!("booking was not confirmed: {:?}", state.field_errors);
    };
    print_navigation(&flow).await;
    println!(
        "\nBooking {} confirmed, code {}",
        confirmation.id, confirmation.confirmation_code
    );

    flow.shutdown(Some(SETTLE_TIMEOUT)).await?;
    Ok(())
}

/// Fail on the first remote error banner
fn check(state: &WizardState) -> anyhow::Result<()> {
    if let Some((kind, message)) = state.error_banner() {
        bail!("{kind} request failed: {message}");
    }
    Ok(())
}

async fn print_navigation(flow: &BookingFlow) {
    let nav = flow.navigation().await;
    println!(
        "    [{}/{}] {} | back: {} | next: \"{}\"{}",
        nav.step_number,
        nav.total_steps,
        nav.current_step,
        if nav.can_go_back { "yes" } else { "no" },
        nav.next_label,
        if nav.next_disabled { " (disabled)" } else { "" },
    );
}
