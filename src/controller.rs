use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::select;
use tokio::sync::mpsc;

use crate::definitions::{
    clamp_volume, Action, Catalog, PlaybackStatus, VideoRecord, DEFAULT_VOLUME, SKIP_STEP,
    VOLUME_STEP,
};
use crate::end_watch;
use crate::firebase::RemoteError;
use crate::player::{Player, PlayerError, PlayerFactory, PlayerInterface};
use crate::service::{spawn_service, ServiceHandle};

/// Resolves a catalog entry to a playable media URL.
#[async_trait]
pub trait MediaUrlResolver: Send + Sync {
    async fn resolve_url(&self, record: &VideoRecord) -> Result<String, RemoteError>;
}

/// Sink for the externally visible playback status document.
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish(&self, status: &PlaybackStatus) -> Result<(), RemoteError>;
}

/// The three update sources feeding the controller. Everything goes through
/// one queue so controller state transitions are serialized: at most one
/// load is ever in flight, and a trigger arriving mid-load is queued behind
/// it rather than interleaved.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    CatalogChanged(Catalog),
    Command(Action),
    MediaEnded,
}

/// Handle to feed events into the controller loop.
#[derive(Clone)]
pub struct ControllerHandle {
    events_tx: mpsc::UnboundedSender<ControllerEvent>,
}

impl ControllerHandle {
    pub fn catalog_changed(&self, catalog: Catalog) {
        let _ = self.events_tx.send(ControllerEvent::CatalogChanged(catalog));
    }

    pub fn command(&self, action: Action) {
        let _ = self.events_tx.send(ControllerEvent::Command(action));
    }

    pub fn media_ended(&self) {
        let _ = self.events_tx.send(ControllerEvent::MediaEnded);
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<ControllerEvent> {
        self.events_tx.clone()
    }
}

/// Owns the single active player resource and translates commands and
/// lifecycle events into player operations and status updates.
pub struct PlaybackController {
    catalog: Catalog,
    player: Option<Player>,
    end_watch: Option<ServiceHandle>,
    carried_volume: i64,
    last_status: PlaybackStatus,
    factory: Arc<dyn PlayerFactory>,
    resolver: Arc<dyn MediaUrlResolver>,
    status: Arc<dyn StatusPublisher>,
    events_tx: mpsc::UnboundedSender<ControllerEvent>,
    events_rx: mpsc::UnboundedReceiver<ControllerEvent>,
}

impl PlaybackController {
    pub fn new(
        factory: Arc<dyn PlayerFactory>,
        resolver: Arc<dyn MediaUrlResolver>,
        status: Arc<dyn StatusPublisher>,
    ) -> (ControllerHandle, PlaybackController) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handle = ControllerHandle { events_tx: events_tx.clone() };
        let controller = PlaybackController {
            catalog: Catalog::default(),
            player: None,
            end_watch: None,
            carried_volume: DEFAULT_VOLUME,
            last_status: PlaybackStatus::loading(),
            factory,
            resolver,
            status,
            events_tx,
            events_rx,
        };
        (handle, controller)
    }

    /// Run the controller event loop in the background.
    pub fn run(mut self) -> ServiceHandle {
        spawn_service(move |mut stop| async move {
            debug!("Playback controller loop started");
            loop {
                select! {
                    biased;
                    _ = stop.signaled() => {
                        info!("Playback controller shutdown requested");
                        break;
                    }
                    event = self.events_rx.recv() => {
                        match event {
                            Some(event) => self.on_event(event).await,
                            None => {
                                info!("Controller event channel closed, stopping");
                                break;
                            }
                        }
                    }
                }
            }
            if let Some(watch) = self.end_watch.take() {
                let _ = watch.shutdown().await;
            }
            if let Some(player) = self.player.take() {
                if let Err(e) = player.stop().await {
                    debug!("Could not stop playback on shutdown: {e}");
                }
            }
            debug!("Playback controller loop terminated");
        })
    }

    pub async fn on_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::CatalogChanged(catalog) => self.on_catalog_changed(catalog).await,
            ControllerEvent::Command(action) => self.execute(action).await,
            ControllerEvent::MediaEnded => self.on_media_ended().await,
        }
    }

    /// A catalog update while idle should produce content; a catalog update
    /// while something is actively playing must not interrupt it.
    pub async fn on_catalog_changed(&mut self, catalog: Catalog) {
        debug!("Catalog snapshot replaced ({} videos)", catalog.len());
        self.catalog = catalog;
        let idle = match &self.player {
            None => true,
            Some(player) => !player.is_playing().await.unwrap_or(false),
        };
        if idle {
            self.start_playback().await;
        }
    }

    /// Pick a random catalog entry, resolve its URL and play it. Fails soft:
    /// on resolution failure the published status stays "loading" rather
    /// than pointing at a broken reference.
    pub async fn start_playback(&mut self) {
        if self.catalog.is_empty() {
            info!("Catalog is empty, nothing to play");
            return;
        }
        let (video_id, record) = match self.catalog.random_pick() {
            Some((id, record)) => (id.to_string(), record.clone()),
            None => return,
        };
        let url = match self.resolver.resolve_url(&record).await {
            Ok(url) => url,
            Err(e) => {
                error!("Failed to resolve media URL for {video_id}: {e}");
                return;
            }
        };
        self.load_and_play(&video_id, &record, &url).await;
    }

    pub async fn load_and_play(&mut self, video_id: &str, record: &VideoRecord, url: &str) {
        let player = match self.ensure_player().await {
            Ok(player) => player,
            Err(e) => {
                error!("Failed to create player resource: {e}");
                return;
            }
        };
        info!("Loading {video_id} ({})", record.file_path);
        if let Err(e) = player.load(url).await {
            error!("Failed to load media for {video_id}: {e}");
            return;
        }
        if let Err(e) = player.set_volume(self.carried_volume).await {
            warn!("Could not apply carried volume: {e}");
        }
        if let Err(e) = player.play().await {
            error!("Failed to start playback of {video_id}: {e}");
            return;
        }
        self.publish(PlaybackStatus::playing(video_id, record)).await;
    }

    /// Dispatch a remote command. With no player resource only refresh is
    /// meaningful; everything else is silently ignored so controls never
    /// fail on an absent resource.
    pub async fn execute(&mut self, action: Action) {
        info!("Command received: {}", action.as_str());
        let Some(player) = self.player.clone() else {
            if action == Action::Refresh {
                self.next().await;
            } else {
                debug!("No active player, ignoring {}", action.as_str());
            }
            return;
        };

        let outcome = match action {
            Action::Refresh => {
                self.next().await;
                return;
            }
            Action::Pause => match player.pause().await {
                Ok(()) => {
                    self.publish_paused(true).await;
                    Ok(())
                }
                Err(e) => Err(e),
            },
            Action::Play => match player.play().await {
                Ok(()) => {
                    self.publish_paused(false).await;
                    Ok(())
                }
                Err(e) => Err(e),
            },
            Action::Mute => self.toggle_mute(&player).await,
            Action::VolUp => self.adjust_volume(&player, VOLUME_STEP).await,
            Action::VolDown => self.adjust_volume(&player, -VOLUME_STEP).await,
            Action::SkipBackward => self.skip_backward(&player).await,
            Action::SkipForward => self.skip_forward(&player).await,
        };
        if let Err(e) = outcome {
            // Transport rejections are no-ops, never failures.
            warn!("Player rejected {}: {e}", action.as_str());
        }
    }

    /// Advance to a new random pick. The transient loading status is
    /// published first so observers never see a stale video reference, even
    /// if the subsequent load fails.
    pub async fn next(&mut self) {
        self.publish(PlaybackStatus::loading()).await;
        if let Some(player) = &self.player {
            match player.volume().await {
                Ok(volume) => self.carried_volume = volume,
                Err(e) => debug!("Could not capture volume before advancing: {e}"),
            }
        }
        self.start_playback().await;
    }

    pub async fn on_media_ended(&mut self) {
        info!("End of media reached, advancing");
        self.next().await;
    }

    async fn ensure_player(&mut self) -> Result<Player, PlayerError> {
        if let Some(player) = &self.player {
            return Ok(player.clone());
        }
        info!("Starting player...");
        let player = self.factory.create().await?;
        self.end_watch = Some(end_watch::run_end_of_media_watch(
            player.clone(),
            self.events_tx.clone(),
        ));
        self.player = Some(player.clone());
        Ok(player)
    }

    async fn toggle_mute(&self, player: &Player) -> Result<(), PlayerError> {
        if player.volume().await? > 0 {
            player.mute().await
        } else {
            player.unmute().await
        }
    }

    async fn adjust_volume(&self, player: &Player, step: i64) -> Result<(), PlayerError> {
        let target = clamp_volume(player.volume().await? + step);
        player.set_volume(target).await
    }

    async fn skip_backward(&self, player: &Player) -> Result<(), PlayerError> {
        if !player.is_seekable().await? {
            debug!("Stream is not seekable");
            return Ok(());
        }
        let position = player.position().await?;
        player.seek(position.saturating_sub(SKIP_STEP)).await
    }

    async fn skip_forward(&self, player: &Player) -> Result<(), PlayerError> {
        if !player.is_seekable().await? {
            debug!("Stream is not seekable");
            return Ok(());
        }
        let target = player.position().await? + SKIP_STEP;
        if target > player.duration().await? {
            debug!("Cannot seek past end of media");
            return Ok(());
        }
        player.seek(target).await
    }

    async fn publish(&mut self, status: PlaybackStatus) {
        self.last_status = status.clone();
        if let Err(e) = self.status.publish(&status).await {
            error!("Failed to publish playback status: {e}");
        }
    }

    async fn publish_paused(&mut self, paused: bool) {
        let status = PlaybackStatus { is_paused: paused, ..self.last_status.clone() };
        self.publish(status).await;
    }
}
