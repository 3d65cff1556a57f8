use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use fleet_warden::assignment::REASON_SHUTDOWN;
use fleet_warden::container::{Container, TaskType};
use fleet_warden::health::{
    FleetSnapshot, FleetSnapshotSource, HealthSupervisor, NavStatus, ShipSnapshot,
    spawn_health_monitor,
};
use fleet_warden::{Clock, ShipAssignmentManager, SupervisorConfig, SupervisorError, SystemClock};

/// Demo repository: a fixed in-memory fleet.
struct DemoFleet {
    snapshot: FleetSnapshot,
}

#[async_trait]
impl FleetSnapshotSource for DemoFleet {
    async fn snapshot(&self) -> Result<FleetSnapshot, SupervisorError> {
        Ok(self.snapshot.clone())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = SupervisorConfig::from_env().context("loading supervisor config")?;
    let tick_ms: u64 = std::env::var("FLEET_TICK_MS")
        .unwrap_or_else(|_| "1000".to_string())
        .parse()
        .unwrap_or(1000);

    eprintln!("Fleet Warden v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Check interval: {}s", config.check_interval.as_secs());
    eprintln!("   Recovery timeout: {}s", config.recovery_timeout.as_secs());
    eprintln!("   Max recovery attempts: {}", config.max_recovery_attempts);
    eprintln!("   Press Ctrl-C to stop.\n");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let manager = Arc::new(ShipAssignmentManager::new(Arc::clone(&clock)));
    let supervisor = Arc::new(HealthSupervisor::new(
        Arc::clone(&manager),
        Arc::clone(&clock),
        config,
    ));

    // ── Demo fleet ──────────────────────────────────────────────────────
    let mut snapshot = FleetSnapshot::new();
    let ships = [
        ("DEMO-1", TaskType::Navigate, NavStatus::InTransit, true),
        ("DEMO-2", TaskType::Mining, NavStatus::InOrbit, false),
        ("DEMO-3", TaskType::ScoutMarkets, NavStatus::InTransit, false),
    ];
    for (i, (ship_id, task_type, nav_status, has_route)) in ships.into_iter().enumerate() {
        let task_id = format!("demo-task-{}", i + 1);
        let mut task = Container::new(&task_id, task_type, 1, 100, clock.as_ref())?;
        task.start(clock.as_ref())?;
        manager.assign(ship_id, 1, &task_id).await?;

        snapshot = snapshot.with_task(task).with_ship(
            ShipSnapshot::new(ship_id, 1, nav_status, clock.now()).with_task(&task_id),
        );
        if has_route {
            snapshot = snapshot.with_route(ship_id);
        }
    }
    let source = Arc::new(DemoFleet { snapshot });

    let cancel = CancellationToken::new();
    let monitor = spawn_health_monitor(
        Arc::clone(&supervisor),
        source,
        Duration::from_millis(tick_ms),
        cancel.clone(),
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    cancel.cancel();
    monitor.await.context("joining health monitor")?;

    let released = manager
        .release_all(REASON_SHUTDOWN, &CancellationToken::new())
        .await;
    eprintln!("Released {released} assignments on shutdown");

    let metrics = supervisor.metrics().await;
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}
