use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};
use uuid::Uuid;

use aven_wheel::config::VesselConfig;
use aven_wheel::physics::{DriveInput, PhysicsWorld};

use crate::spawn::SpawnGrid;
use crate::state::SharedGameState;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientMessage {
    Ping,
    Input(DriveInput),
    Deploy,
    Repair,
}

pub struct Server {
    pub state: Arc<Mutex<SharedGameState>>,
    pub physics: Arc<Mutex<PhysicsWorld>>,
    pub spawns: Arc<Mutex<SpawnGrid>>,
    pub rover: Arc<VesselConfig>,
}

pub async fn start_websocket_server(addr: String, server: Arc<Server>) -> std::io::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!("websocket listening on ws://{addr}");

    loop {
        let (raw, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(%err, "accept failed");
                continue;
            }
        };
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            debug!(%peer, "tcp connection");
            handle_client(raw, server).await;
        });
    }
}

async fn handle_client(raw: TcpStream, server: Arc<Server>) {
    let ws = match accept_async(raw).await {
        Ok(ws) => ws,
        Err(err) => {
            warn!(%err, "websocket handshake failed");
            return;
        }
    };
    let (mut write, mut read) = ws.split();

    // -------------------------------
    // 1) Outgoing message channel
    // -------------------------------
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if write.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // -------------------------------
    // 2) Register client + spawn rover
    // -------------------------------
    let player_id = Uuid::new_v4().to_string();
    {
        let position = server.spawns.lock().await.assign(&player_id);
        let mut phys = server.physics.lock().await;
        let mut game = server.state.lock().await;
        phys.spawn_vessel(player_id.clone(), &server.rover, position);
        game.register_client(player_id.clone(), tx.clone());
    }
    info!(player = %player_id, "player connected");

    let _ = tx.send(json!({ "type": "welcome", "player_id": player_id }).to_string());

    // -------------------------------
    // 3) Receive loop
    // -------------------------------
    while let Some(msg) = read.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        let parsed = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!(player = %player_id, %err, "ignoring malformed message");
                continue;
            }
        };

        match parsed {
            ClientMessage::Ping => {
                let _ = tx.send(json!({ "type": "pong" }).to_string());
            }
            ClientMessage::Input(input) => {
                server.state.lock().await.update_input(&player_id, input);
            }
            ClientMessage::Deploy => {
                let mut phys = server.physics.lock().await;
                let reply = match phys.toggle_deploy(&player_id) {
                    Ok(outcomes) => json!({ "type": "deploy", "outcomes": format!("{outcomes:?}") }),
                    Err(err) => json!({ "type": "error", "message": err.to_string() }),
                };
                let _ = tx.send(reply.to_string());
            }
            ClientMessage::Repair => {
                let mut phys = server.physics.lock().await;
                let reply = match phys.repair(&player_id) {
                    Ok(count) => json!({ "type": "repair", "repaired": count }),
                    Err(err) => json!({ "type": "error", "message": err.to_string() }),
                };
                let _ = tx.send(reply.to_string());
            }
        }
    }

    info!(player = %player_id, "player disconnected");
    let mut phys = server.physics.lock().await;
    let mut game = server.state.lock().await;
    game.remove_client(&player_id);
    phys.despawn_vessel(&player_id);
    server.spawns.lock().await.release(&player_id);
}
