use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::controller::ControllerEvent;
use crate::definitions::{Catalog, CATALOG_POLL_INTERVAL};
use crate::firebase::RemoteError;
use crate::service::{spawn_service, ServiceHandle};

/// Source of catalog snapshots.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_catalog(&self) -> Result<Catalog, RemoteError>;
}

/// Keep the controller fed with catalog snapshots: fetch at startup, then
/// poll, forwarding only snapshots that differ from the last one forwarded.
/// Fetch failures are logged and retried on the next tick.
pub fn run_catalog_watch(
    source: Arc<dyn CatalogSource>,
    events_tx: mpsc::UnboundedSender<ControllerEvent>,
) -> ServiceHandle {
    run_catalog_watch_with_interval(source, events_tx, CATALOG_POLL_INTERVAL)
}

pub fn run_catalog_watch_with_interval(
    source: Arc<dyn CatalogSource>,
    events_tx: mpsc::UnboundedSender<ControllerEvent>,
    poll_interval: Duration,
) -> ServiceHandle {
    spawn_service(move |mut stop| async move {
        let mut last_forwarded: Option<Catalog> = None;
        loop {
            match source.fetch_catalog().await {
                Ok(catalog) => {
                    if last_forwarded.as_ref() != Some(&catalog) {
                        info!("Catalog snapshot changed ({} videos)", catalog.len());
                        last_forwarded = Some(catalog.clone());
                        if events_tx
                            .send(ControllerEvent::CatalogChanged(catalog))
                            .is_err()
                        {
                            break;
                        }
                    }
                }
                Err(e) => warn!("Failed to fetch video catalog: {e}"),
            }
            select! {
                biased;
                _ = stop.signaled() => break,
                _ = sleep(poll_interval) => {}
            }
        }
    })
}
