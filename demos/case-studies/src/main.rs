//! Case studies binary
//!
//! Runs each case study against a real-time tokio scheduler and prints the
//! state as effects feed back into the store.

use anyhow::Context;
use case_studies::animations::{AnimationsAction, AnimationsEnvironment, AnimationsReducer, AnimationsState};
use case_studies::effects_basics::{
    EffectsBasicsAction, EffectsBasicsEnvironment, EffectsBasicsReducer, EffectsBasicsState, FactClient,
};
use case_studies::web_socket::{
    WebSocketAction, WebSocketClient, WebSocketEnvironment, WebSocketReducer, WebSocketState,
};
use reflux_core::AnyScheduler;
use reflux_runtime::{Store, TokioScheduler};
use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "case_studies=debug,reflux_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    reflux_runtime::metrics::describe_metrics();

    let main_queue = TokioScheduler::current()
        .context("case studies need a tokio runtime")?
        .with_name("main_queue")
        .shared();

    println!("=== Reflux Case Studies ===\n");

    effects_basics(&main_queue).await?;
    animations(&main_queue).await?;
    web_socket(&main_queue).await?;

    println!("\n=== Case Studies Complete ===");
    Ok(())
}

async fn effects_basics(main_queue: &AnyScheduler) -> anyhow::Result<()> {
    println!("--- Effects basics ---");
    let store = Store::new(
        EffectsBasicsState::default(),
        EffectsBasicsReducer,
        EffectsBasicsEnvironment::new(FactClient::offline(), main_queue.clone()),
    );

    println!(">>> Sending: DecrementButtonTapped");
    store.send(EffectsBasicsAction::DecrementButtonTapped)?;
    println!("Count: {}", store.state(|s| s.count));

    sleep(Duration::from_millis(1_200)).await;
    println!("Count after the delayed response: {}", store.state(|s| s.count));

    println!(">>> Sending: IncrementButtonTapped, NumberFactButtonTapped");
    store.send(EffectsBasicsAction::IncrementButtonTapped)?;
    store.send(EffectsBasicsAction::NumberFactButtonTapped)?;
    sleep(Duration::from_millis(50)).await;
    let fact = store.state(|s| s.number_fact.clone());
    println!("Number fact: {}", fact.as_deref().unwrap_or("<none>"));

    store.shutdown();
    Ok(())
}

async fn animations(main_queue: &AnyScheduler) -> anyhow::Result<()> {
    println!("\n--- Animations ---");
    let store = Store::new(
        AnimationsState::default(),
        AnimationsReducer,
        AnimationsEnvironment::new(main_queue.clone()),
    );

    println!(">>> Sending: RainbowButtonTapped");
    store.send(AnimationsAction::RainbowButtonTapped)?;
    for _ in 0..3 {
        println!("Circle colour: {:?}", store.state(|s| s.circle_color));
        sleep(Duration::from_millis(1_000)).await;
    }

    println!(">>> Sending: ResetButtonTapped, ResetConfirmationButtonTapped");
    store.send(AnimationsAction::ResetButtonTapped)?;
    if let Some(alert) = store.state(|s| s.alert.clone()) {
        println!("Alert: {}", alert.title);
    }
    store.send(AnimationsAction::ResetConfirmationButtonTapped)?;
    println!(
        "Circle colour after reset: {:?} (rainbow running: {})",
        store.state(|s| s.circle_color),
        !store.in_flight_effects().is_empty()
    );

    store.shutdown();
    Ok(())
}

async fn web_socket(main_queue: &AnyScheduler) -> anyhow::Result<()> {
    println!("\n--- Web socket ---");
    let store = Store::new(
        WebSocketState::default(),
        WebSocketReducer,
        WebSocketEnvironment::new(main_queue.clone(), WebSocketClient::echo(main_queue.clone())),
    );

    println!(">>> Sending: ConnectButtonTapped");
    store.send(WebSocketAction::ConnectButtonTapped)?;
    sleep(Duration::from_millis(50)).await;
    println!("Connectivity: {:?}", store.state(|s| s.connectivity_state));

    for message in ["Hello", "from", "Reflux"] {
        println!(">>> Sending: {message}");
        store.send(WebSocketAction::MessageToSendChanged(message.to_owned()))?;
        store.send(WebSocketAction::SendButtonTapped)?;
        sleep(Duration::from_millis(50)).await;
    }
    println!("Received: {:?}", store.state(|s| s.received_messages.clone()));
    println!("Effects in flight: {}", store.in_flight_effects().len());

    println!(">>> Sending: ConnectButtonTapped");
    store.send(WebSocketAction::ConnectButtonTapped)?;
    println!(
        "Connectivity: {:?}, effects in flight: {}",
        store.state(|s| s.connectivity_state),
        store.in_flight_effects().len()
    );

    store.shutdown();
    Ok(())
}
