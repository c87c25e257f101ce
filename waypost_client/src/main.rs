use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use waypost_client::permission::{PermissionState, WatchPermissionSource};
use waypost_client::position::{PositionSource, SimulatedPositionSource, SubscribeOptions};
use waypost_client::prefs::{JsonPreferenceStore, PreferenceStore};
use waypost_client::report::HttpReporter;
use waypost_client::{Command, TrackerEvent, TrackingController};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=debug", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting waypost demo...");

    let store = Arc::new(JsonPreferenceStore::new("waypost_prefs.json"));
    // Demo cadence: the configured interval, capped so the walk shows quickly.
    let interval = store.load()?.poll_interval_secs.min(2);
    let source = Arc::new(SimulatedPositionSource::new(
        37.422,
        -122.084,
        Duration::from_secs(interval),
    ));

    let initial = source.current_position(SubscribeOptions::default()).await?;
    tracing::info!("One-shot position: {}", initial.summary());

    let mut controller =
        TrackingController::new(source, Arc::new(HttpReporter::new()), store);

    let permissions = WatchPermissionSource::new(PermissionState::Granted);
    controller.observe_permissions(&permissions);

    // Stand-in display sink: print events as they arrive.
    let mut events = controller.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                TrackerEvent::Fix(fix) => println!("fix     {}", fix.summary()),
                TrackerEvent::Log(entry) => println!("log     [{:?}] {}", entry.kind, entry.message),
                TrackerEvent::Status { message, .. } => println!("status  {message}"),
                TrackerEvent::StateChanged(state) => println!("state   {state:?}"),
                _ => {}
            }
        }
    });

    let (commands_tx, commands_rx) = mpsc::channel(8);
    let driver = tokio::spawn(async move {
        controller.drive(commands_rx).await;
        controller
    });

    commands_tx.send(Command::StartTracking).await?;
    tokio::time::sleep(Duration::from_secs(12)).await;
    commands_tx.send(Command::StopTracking).await?;
    drop(commands_tx);

    let controller = driver.await?;
    let snapshot = controller.snapshot();
    println!(
        "session {} ended with {} fixes (permission {}, device {})",
        snapshot.session_count, snapshot.location_count, snapshot.permission, snapshot.device_info
    );

    Ok(())
}
