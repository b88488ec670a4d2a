use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use aven_wheel::physics::{DriveInput, PhysicsWorld};
use aven_wheel::telemetry::VesselTelemetry;

pub struct Client {
    pub id: String,
    pub tx: UnboundedSender<String>,
    pub input: DriveInput,
}

#[derive(Serialize)]
pub struct Snapshot<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub tick: u64,
    pub vessels: &'a [VesselTelemetry],
}

pub struct SharedGameState {
    pub tick: u64,
    pub clients: HashMap<String, Client>,
}

impl SharedGameState {
    pub fn new() -> Self {
        Self {
            tick: 0,
            clients: HashMap::new(),
        }
    }

    pub fn register_client(&mut self, id: String, tx: UnboundedSender<String>) {
        self.clients.insert(
            id.clone(),
            Client {
                id,
                tx,
                input: DriveInput::default(),
            },
        );
    }

    pub fn remove_client(&mut self, id: &str) {
        self.clients.remove(id);
    }

    pub fn update_input(&mut self, id: &str, input: DriveInput) {
        if let Some(client) = self.clients.get_mut(id) {
            client.input = input;
        }
    }

    /// Build and send a snapshot of every client's vessel to all clients.
    pub fn broadcast_snapshot(&self, physics: &PhysicsWorld) {
        let vessels: Vec<VesselTelemetry> = self.clients.keys().filter_map(|id| physics.telemetry(id)).collect();

        let json = match serde_json::to_string(&Snapshot {
            kind: "snapshot",
            tick: self.tick,
            vessels: &vessels,
        }) {
            Ok(json) => json,
            Err(err) => {
                warn!(%err, "snapshot serialization failed");
                return;
            }
        };

        for client in self.clients.values() {
            let _ = client.tx.send(json.clone());
        }
    }
}
