use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use parking_lot::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use drone_arena_sim::config::SimConfig;
use drone_arena_sim::game::entity::Team;
use drone_arena_sim::game::world::{DroneSpawn, ObjectSpawn, World};

/// Seconds between stats log lines
const STATS_INTERVAL_SECS: u64 = 5;

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Fill the arena with two AI teams and some neutral objects
fn populate(world: &mut World) -> anyhow::Result<()> {
    let drones = env_usize("DEMO_DRONES", 16);
    let objects = env_usize("DEMO_OBJECTS", 24);

    for i in 0..drones {
        let team = if i % 2 == 0 { Team::Red } else { Team::Blue };
        let position = world.random_position(5.0);
        world
            .spawn_drone(DroneSpawn::ai(position, team))
            .context("spawning demo drone")?;
    }
    for _ in 0..objects {
        let position = world.random_position(2.0);
        world
            .spawn_object(ObjectSpawn {
                position,
                ..ObjectSpawn::default()
            })
            .context("spawning demo object")?;
    }

    info!(drones, objects, "Arena populated");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Drone Arena Sim v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = SimConfig::load_or_default();
    config.validate().context("invalid configuration")?;
    info!(
        "Configuration loaded: tick_rate={}, arena_radius={}, max_entities={}",
        config.tick_rate, config.arena_radius, config.max_entities
    );

    let dt = config.dt();
    let tick_period = Duration::from_secs_f32(dt);

    let mut world = World::new(config)?;
    populate(&mut world)?;
    let world = Arc::new(Mutex::new(world));

    // Fixed-rate tick driver
    let tick_world = world.clone();
    let ticker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let mut world = tick_world.lock();
            world.update(dt);
            if world.monitor().status().should_shed_load() {
                warn!("Tick over budget: {}", world.monitor().status_message());
            }
        }
    });

    // Periodic stats
    let stats_world = world.clone();
    let reporter = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(STATS_INTERVAL_SECS));
        interval.tick().await;
        loop {
            interval.tick().await;
            let (stats, status) = {
                let world = stats_world.lock();
                (world.stats(), world.monitor().status_message())
            };
            match serde_json::to_string(&stats) {
                Ok(json) => info!("{} | {}", json, status),
                Err(e) => warn!("Failed to encode stats: {}", e),
            }
        }
    });

    // Shutdown signal handler
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    tokio::select! {
        result = ticker => {
            if let Err(e) = result {
                warn!("Tick task ended: {}", e);
            }
        }
        _ = shutdown => {
            info!("Shutting down...");
        }
    }
    reporter.abort();

    let world = world.lock();
    info!(tick = world.tick(), entities = world.len(), "Simulation stopped");

    Ok(())
}
