mod net;
mod spawn;
mod state;

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{interval, Duration};
use tracing::{info, warn};

use aven_wheel::config::VesselConfig;
use aven_wheel::physics::PhysicsWorld;

use crate::net::{start_websocket_server, Server};
use crate::spawn::SpawnGrid;
use crate::state::SharedGameState;

const ROVER: &str = include_str!("../configs/rover.json");
const DT: f32 = 1.0 / 60.0;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    info!("starting wheel server");

    let rover = VesselConfig::from_json(ROVER)?;
    let server = Arc::new(Server {
        state: Arc::new(Mutex::new(SharedGameState::new())),
        physics: Arc::new(Mutex::new(PhysicsWorld::new())),
        spawns: Arc::new(Mutex::new(SpawnGrid::new(4, 8.0))),
        rover: Arc::new(rover),
    });

    let addr = std::env::var("WHEEL_SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:9001".to_string());
    let net_server = Arc::clone(&server);
    tokio::spawn(async move {
        if let Err(err) = start_websocket_server(addr, net_server).await {
            warn!(%err, "websocket server stopped");
        }
    });

    // Fixed timestep: ~60 Hz
    let mut ticker = interval(Duration::from_millis(16));

    loop {
        ticker.tick().await;

        let mut phys = server.physics.lock().await;
        let mut game = server.state.lock().await;

        for client in game.clients.values() {
            if let Err(err) = phys.apply_drive_input(&client.id, client.input) {
                warn!(client = %client.id, %err, "input for unknown vessel");
            }
        }

        phys.step(DT);
        phys.frame_update(DT);

        game.tick += 1;
        game.broadcast_snapshot(&phys);
    }
}
