pub mod mpv;
pub mod volumio;

use std::path::PathBuf;

use async_trait::async_trait;
use log::info;

use crate::player::{Player, PlayerError, PlayerFactory};
use crate::players::mpv::MpvPlayer;
use crate::players::volumio::RestApiPlayer;

/// Which playback engine the service drives, selected at startup.
#[derive(Debug, Clone)]
pub enum PlayerBackend {
    Mpv { socket_path: PathBuf },
    Volumio { base_url: String },
}

pub struct KioskPlayerFactory {
    backend: PlayerBackend,
}

impl KioskPlayerFactory {
    pub fn new(backend: PlayerBackend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl PlayerFactory for KioskPlayerFactory {
    async fn create(&self) -> Result<Player, PlayerError> {
        match &self.backend {
            PlayerBackend::Mpv { socket_path } => {
                info!("Connecting to mpv at {}", socket_path.display());
                Ok(Player::new(MpvPlayer::connect(socket_path).await?))
            }
            PlayerBackend::Volumio { base_url } => {
                info!("Using REST player at {base_url}");
                Ok(Player::new(RestApiPlayer::new(base_url)?))
            }
        }
    }
}
