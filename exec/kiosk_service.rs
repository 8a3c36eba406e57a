use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use kiosk_player::firebase::{FirestoreClient, StorageBucket};
use kiosk_player::{
    run_service, KioskPlayerFactory, Notification, NotificationDeduplicator, PlayerBackend,
};

struct Config {
    project_id: String,
    storage_bucket: String,
    room_id: String,
    push_token: String,
    backend: PlayerBackend,
    seen_notifications_path: PathBuf,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn load_config() -> anyhow::Result<Config> {
    let project_id = std::env::var("KIOSK_FIREBASE_PROJECT")
        .context("KIOSK_FIREBASE_PROJECT must name the Firebase project")?;
    let storage_bucket = env_or(
        "KIOSK_STORAGE_BUCKET",
        &format!("{project_id}.appspot.com"),
    );
    let room_id = std::env::var("KIOSK_ROOM_ID")
        .or_else(|_| std::env::var("HOSTNAME"))
        .context("KIOSK_ROOM_ID (or HOSTNAME) must identify this kiosk")?;
    let push_token = std::env::var("KIOSK_PUSH_TOKEN")
        .context("KIOSK_PUSH_TOKEN must carry the push registration token")?;

    let backend = match env_or("KIOSK_PLAYER", "mpv").as_str() {
        "mpv" => PlayerBackend::Mpv {
            socket_path: env_or("KIOSK_MPV_SOCKET", "/tmp/mpv-socket").into(),
        },
        "volumio" => PlayerBackend::Volumio {
            base_url: env_or("KIOSK_VOLUMIO_URL", "http://localhost:3000/"),
        },
        other => anyhow::bail!("unsupported KIOSK_PLAYER {other:?} (use mpv or volumio)"),
    };

    Ok(Config {
        project_id,
        storage_bucket,
        room_id,
        push_token,
        backend,
        seen_notifications_path: env_or("KIOSK_SEEN_NOTIFICATIONS", "persistent_ids.txt").into(),
    })
}

/// Forward push notifications piped onto stdin as JSON lines. The push
/// connection itself is maintained by an external client process.
fn forward_stdin_notifications(notifications_tx: mpsc::Sender<Notification>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Notification>(line) {
                Ok(notification) => {
                    if notifications_tx.send(notification).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Ignoring malformed notification line: {e}"),
            }
        }
        info!("Notification input closed");
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = load_config()?;

    let firestore = FirestoreClient::new(&config.project_id);
    let status_path = firestore
        .get_or_create_room(&config.room_id, &config.push_token)
        .await
        .with_context(|| format!("cannot bootstrap room {}", config.room_id))?;
    info!("Publishing playback status to {status_path}");

    let dedup = NotificationDeduplicator::open(&config.seen_notifications_path)
        .with_context(|| {
            format!(
                "cannot open notification log {}",
                config.seen_notifications_path.display()
            )
        })?;

    let (notifications_tx, notifications_rx) = mpsc::channel(64);
    forward_stdin_notifications(notifications_tx);

    let services = run_service(
        Arc::new(KioskPlayerFactory::new(config.backend)),
        Arc::new(StorageBucket::new(config.storage_bucket)),
        Arc::new(firestore.status_writer(status_path)),
        Arc::new(firestore),
        notifications_rx,
        dedup,
    );

    tokio::signal::ctrl_c()
        .await
        .context("cannot listen for shutdown signal")?;
    info!("Shutting down");
    services
        .shutdown()
        .await
        .context("service task failed during shutdown")?;
    Ok(())
}
