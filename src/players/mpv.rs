use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::oneshot;

use crate::player::{EndedEvents, PlayerError, PlayerInterface};

const IPC_TIMEOUT: Duration = Duration::from_secs(2);

/// Player backend driving an mpv process over its JSON IPC socket
/// (`mpv --input-ipc-server=...`). End of media is taken from the `end-file`
/// event emitted by mpv's event feed.
pub struct MpvPlayer {
    ipc: Arc<MpvIpc>,
    ended_rx: Mutex<Option<EndedEvents>>,
}

struct MpvIpc {
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    pending: Mutex<HashMap<u64, oneshot::Sender<Value>>>,
    next_request_id: AtomicU64,
}

impl MpvPlayer {
    pub async fn connect(socket_path: impl AsRef<Path>) -> Result<Self, PlayerError> {
        let stream = UnixStream::connect(socket_path.as_ref())
            .await
            .map_err(|e| PlayerError::Transport(format!("cannot connect to mpv socket: {e}")))?;
        let (read_half, write_half) = stream.into_split();
        let ipc = Arc::new(MpvIpc {
            writer: tokio::sync::Mutex::new(write_half),
            pending: Mutex::new(HashMap::new()),
            next_request_id: AtomicU64::new(1),
        });
        let (ended_tx, ended_rx) = futures::channel::mpsc::channel(8);
        tokio::spawn(read_loop(read_half, ipc.clone(), ended_tx));
        Ok(Self { ipc, ended_rx: Mutex::new(Some(ended_rx)) })
    }

    async fn command(&self, command: Value) -> Result<Value, PlayerError> {
        let request_id = self.ipc.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.ipc.pending.lock().unwrap().insert(request_id, tx);

        let line = json!({ "command": command, "request_id": request_id }).to_string() + "\n";
        {
            let mut writer = self.ipc.writer.lock().await;
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                self.ipc.pending.lock().unwrap().remove(&request_id);
                return Err(PlayerError::Transport(format!("mpv write failed: {e}")));
            }
        }

        let response = match tokio::time::timeout(IPC_TIMEOUT, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(PlayerError::Transport("mpv connection lost".into()));
            }
            Err(_) => {
                self.ipc.pending.lock().unwrap().remove(&request_id);
                return Err(PlayerError::Transport("mpv request timed out".into()));
            }
        };
        match response["error"].as_str() {
            Some("success") => Ok(response["data"].clone()),
            Some("property unavailable") => Err(PlayerError::NotLoaded),
            Some(other) => Err(PlayerError::Transport(format!("mpv error: {other}"))),
            None => Err(PlayerError::Transport("malformed mpv response".into())),
        }
    }

    async fn get_property(&self, name: &str) -> Result<Value, PlayerError> {
        self.command(json!(["get_property", name])).await
    }

    async fn set_property(&self, name: &str, value: Value) -> Result<(), PlayerError> {
        self.command(json!(["set_property", name, value])).await?;
        Ok(())
    }

    async fn get_f64(&self, name: &str) -> Result<f64, PlayerError> {
        self.get_property(name)
            .await?
            .as_f64()
            .ok_or_else(|| PlayerError::Transport(format!("mpv property {name} is not a number")))
    }
}

async fn read_loop(
    read_half: OwnedReadHalf,
    ipc: Arc<MpvIpc>,
    mut ended_tx: futures::channel::mpsc::Sender<()>,
) {
    let mut lines = BufReader::new(read_half).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let Ok(message) = serde_json::from_str::<Value>(&line) else {
            debug!("Ignoring unparseable mpv message: {line}");
            continue;
        };
        if let Some(event) = message["event"].as_str() {
            // Natural completion only; replacing the file mid-play reports a
            // different end-file reason and must not trigger an advance.
            if event == "end-file" && message["reason"].as_str() == Some("eof") {
                let _ = ended_tx.try_send(());
            }
            continue;
        }
        if let Some(request_id) = message["request_id"].as_u64() {
            let sender = ipc.pending.lock().unwrap().remove(&request_id);
            if let Some(sender) = sender {
                let _ = sender.send(message);
            }
        }
    }
    info!("mpv IPC connection closed");
}

#[async_trait]
impl PlayerInterface for MpvPlayer {
    async fn load(&self, url: &str) -> Result<(), PlayerError> {
        self.command(json!(["loadfile", url, "replace"])).await?;
        Ok(())
    }

    async fn play(&self) -> Result<(), PlayerError> {
        self.set_property("pause", json!(false)).await
    }

    async fn pause(&self) -> Result<(), PlayerError> {
        self.set_property("pause", json!(true)).await
    }

    async fn stop(&self) -> Result<(), PlayerError> {
        self.command(json!(["stop"])).await?;
        Ok(())
    }

    async fn is_playing(&self) -> Result<bool, PlayerError> {
        let idle = self
            .get_property("idle-active")
            .await?
            .as_bool()
            .unwrap_or(true);
        if idle {
            return Ok(false);
        }
        let paused = self.get_property("pause").await?.as_bool().unwrap_or(false);
        Ok(!paused)
    }

    async fn volume(&self) -> Result<i64, PlayerError> {
        Ok(self.get_f64("volume").await?.round() as i64)
    }

    async fn set_volume(&self, volume: i64) -> Result<(), PlayerError> {
        self.set_property("volume", json!(volume)).await
    }

    async fn mute(&self) -> Result<(), PlayerError> {
        self.set_property("mute", json!(true)).await
    }

    async fn unmute(&self) -> Result<(), PlayerError> {
        self.set_property("mute", json!(false)).await
    }

    async fn position(&self) -> Result<Duration, PlayerError> {
        Ok(Duration::from_secs_f64(self.get_f64("time-pos").await?.max(0.0)))
    }

    async fn duration(&self) -> Result<Duration, PlayerError> {
        Ok(Duration::from_secs_f64(self.get_f64("duration").await?.max(0.0)))
    }

    async fn seek(&self, position: Duration) -> Result<(), PlayerError> {
        self.command(json!(["seek", position.as_secs_f64(), "absolute"]))
            .await?;
        Ok(())
    }

    async fn is_seekable(&self) -> Result<bool, PlayerError> {
        Ok(self
            .get_property("seekable")
            .await?
            .as_bool()
            .unwrap_or(false))
    }

    async fn ended_events(&self) -> Result<EndedEvents, PlayerError> {
        self.ended_rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| PlayerError::Transport("end-of-media events already claimed".into()))
    }
}
