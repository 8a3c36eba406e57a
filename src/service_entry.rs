use std::sync::Arc;

use tokio::sync::mpsc;

use crate::catalog_watch::{run_catalog_watch, CatalogSource};
use crate::controller::{MediaUrlResolver, PlaybackController, StatusPublisher};
use crate::dedup::NotificationDeduplicator;
use crate::definitions::Notification;
use crate::dispatch::{run_command_dispatch, CommandDispatcher};
use crate::player::PlayerFactory;
use crate::service::MultiServiceHandle;

/// Wire up and start the full service: the playback controller plus the
/// catalog watch and command dispatch loops that feed its event queue.
/// The end-of-media watch is attached by the controller itself once a
/// player exists.
pub fn run_service(
    factory: Arc<dyn PlayerFactory>,
    resolver: Arc<dyn MediaUrlResolver>,
    status: Arc<dyn StatusPublisher>,
    catalog: Arc<dyn CatalogSource>,
    notifications: mpsc::Receiver<Notification>,
    dedup: NotificationDeduplicator,
) -> MultiServiceHandle {
    let (handle, controller) = PlaybackController::new(factory, resolver, status);
    let events_tx = handle.sender();

    let mut services = MultiServiceHandle::default();
    services.add(controller.run());
    services.add(run_catalog_watch(catalog, events_tx.clone()));
    services.add(run_command_dispatch(
        notifications,
        CommandDispatcher::new(dedup, events_tx),
    ));
    services
}
