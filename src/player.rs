use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("feature not supported")]
    FeatureNotSupported,

    #[error("no media loaded")]
    NotLoaded,

    #[error("player transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// One signal per end-of-media occurrence, emitted by backends that can
/// observe playback completion from their own event source.
pub type EndedEvents = futures::channel::mpsc::Receiver<()>;

/// Capability interface of the opaque player resource. Backends implement
/// what they can; the defaults report FeatureNotSupported so callers can
/// fall back (see the end-of-media watch) or treat the call as a no-op.
#[async_trait]
pub trait PlayerInterface: Send + Sync {
    async fn load(&self, _url: &str) -> Result<(), PlayerError> {
        Err(PlayerError::FeatureNotSupported)
    }
    async fn play(&self) -> Result<(), PlayerError> {
        Err(PlayerError::FeatureNotSupported)
    }
    async fn pause(&self) -> Result<(), PlayerError> {
        Err(PlayerError::FeatureNotSupported)
    }
    async fn stop(&self) -> Result<(), PlayerError> {
        Err(PlayerError::FeatureNotSupported)
    }
    async fn is_playing(&self) -> Result<bool, PlayerError> {
        Err(PlayerError::FeatureNotSupported)
    }
    async fn volume(&self) -> Result<i64, PlayerError> {
        Err(PlayerError::FeatureNotSupported)
    }
    async fn set_volume(&self, _volume: i64) -> Result<(), PlayerError> {
        Err(PlayerError::FeatureNotSupported)
    }
    async fn mute(&self) -> Result<(), PlayerError> {
        Err(PlayerError::FeatureNotSupported)
    }
    async fn unmute(&self) -> Result<(), PlayerError> {
        Err(PlayerError::FeatureNotSupported)
    }
    async fn position(&self) -> Result<Duration, PlayerError> {
        Err(PlayerError::FeatureNotSupported)
    }
    async fn duration(&self) -> Result<Duration, PlayerError> {
        Err(PlayerError::FeatureNotSupported)
    }
    async fn seek(&self, _position: Duration) -> Result<(), PlayerError> {
        Err(PlayerError::FeatureNotSupported)
    }
    async fn is_seekable(&self) -> Result<bool, PlayerError> {
        Err(PlayerError::FeatureNotSupported)
    }

    /// Claim the backend's end-of-media event stream. Can be claimed once.
    async fn ended_events(&self) -> Result<EndedEvents, PlayerError> {
        Err(PlayerError::FeatureNotSupported)
    }

    /// Consume-once ended flag for backends without an event stream. Returns
    /// true at most once per end-of-media occurrence.
    async fn take_ended(&self) -> Result<bool, PlayerError> {
        Err(PlayerError::FeatureNotSupported)
    }
}

/// Cloneable handle to the single live player resource.
#[derive(Clone)]
pub struct Player {
    player_impl: Arc<dyn PlayerInterface>,
}

impl Player {
    pub fn new(player_impl: impl PlayerInterface + 'static) -> Self {
        Self { player_impl: Arc::new(player_impl) }
    }
}

#[async_trait]
impl PlayerInterface for Player {
    async fn load(&self, url: &str) -> Result<(), PlayerError> {
        self.player_impl.load(url).await
    }
    async fn play(&self) -> Result<(), PlayerError> {
        self.player_impl.play().await
    }
    async fn pause(&self) -> Result<(), PlayerError> {
        self.player_impl.pause().await
    }
    async fn stop(&self) -> Result<(), PlayerError> {
        self.player_impl.stop().await
    }
    async fn is_playing(&self) -> Result<bool, PlayerError> {
        self.player_impl.is_playing().await
    }
    async fn volume(&self) -> Result<i64, PlayerError> {
        self.player_impl.volume().await
    }
    async fn set_volume(&self, volume: i64) -> Result<(), PlayerError> {
        self.player_impl.set_volume(volume).await
    }
    async fn mute(&self) -> Result<(), PlayerError> {
        self.player_impl.mute().await
    }
    async fn unmute(&self) -> Result<(), PlayerError> {
        self.player_impl.unmute().await
    }
    async fn position(&self) -> Result<Duration, PlayerError> {
        self.player_impl.position().await
    }
    async fn duration(&self) -> Result<Duration, PlayerError> {
        self.player_impl.duration().await
    }
    async fn seek(&self, position: Duration) -> Result<(), PlayerError> {
        self.player_impl.seek(position).await
    }
    async fn is_seekable(&self) -> Result<bool, PlayerError> {
        self.player_impl.is_seekable().await
    }
    async fn ended_events(&self) -> Result<EndedEvents, PlayerError> {
        self.player_impl.ended_events().await
    }
    async fn take_ended(&self) -> Result<bool, PlayerError> {
        self.player_impl.take_ended().await
    }
}

/// Lazy construction seam for the player resource. The controller creates
/// the resource on first need; which backend the factory builds is selected
/// at startup.
#[async_trait]
pub trait PlayerFactory: Send + Sync {
    async fn create(&self) -> Result<Player, PlayerError>;
}
