use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::player::{PlayerError, PlayerInterface};

/// Player backend speaking the Volumio-style REST control API. End of media
/// has no event feed here; it is inferred from the playing-to-stopped state
/// transition observed by `take_ended`, so this backend relies on the
/// polling watch.
pub struct RestApiPlayer {
    client: reqwest::Client,
    base_url: reqwest::Url,
    was_playing: AtomicBool,
}

impl RestApiPlayer {
    pub fn new(base_url: &str) -> Result<Self, PlayerError> {
        let base_url = reqwest::Url::parse(base_url)
            .map_err(|e| PlayerError::Transport(format!("invalid player URL {base_url:?}: {e}")))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            was_playing: AtomicBool::new(false),
        })
    }

    fn api_url(&self, path: &str) -> Result<reqwest::Url, PlayerError> {
        self.base_url
            .join(path)
            .map_err(|e| PlayerError::Transport(format!("invalid API path {path:?}: {e}")))
    }

    async fn get_state(&self) -> Result<Value, PlayerError> {
        let url = self.api_url("api/v1/getState")?;
        let state = self
            .client
            .get(url)
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?
            .json::<Value>()
            .await
            .map_err(transport)?;
        Ok(state)
    }

    async fn send_command(&self, query: &str) -> Result<(), PlayerError> {
        let url = self.api_url(&format!("api/v1/commands/?{query}"))?;
        self.client
            .get(url)
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?;
        Ok(())
    }

    async fn state_f64(&self, field: &str) -> Result<f64, PlayerError> {
        self.get_state().await?[field]
            .as_f64()
            .ok_or(PlayerError::NotLoaded)
    }
}

fn transport(e: reqwest::Error) -> PlayerError {
    PlayerError::Transport(e.to_string())
}

fn status_is_playing(state: &Value) -> bool {
    state["status"].as_str() == Some("play")
}

#[async_trait]
impl PlayerInterface for RestApiPlayer {
    async fn load(&self, url: &str) -> Result<(), PlayerError> {
        let endpoint = self.api_url("api/v1/replaceAndPlay")?;
        self.client
            .post(endpoint)
            .json(&json!({ "item": { "uri": url } }))
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?;
        Ok(())
    }

    async fn play(&self) -> Result<(), PlayerError> {
        self.send_command("cmd=play").await
    }

    async fn pause(&self) -> Result<(), PlayerError> {
        self.send_command("cmd=pause").await
    }

    async fn stop(&self) -> Result<(), PlayerError> {
        self.send_command("cmd=stop").await
    }

    async fn is_playing(&self) -> Result<bool, PlayerError> {
        Ok(status_is_playing(&self.get_state().await?))
    }

    async fn volume(&self) -> Result<i64, PlayerError> {
        self.get_state().await?["volume"]
            .as_i64()
            .ok_or_else(|| PlayerError::Transport("state carries no volume".into()))
    }

    async fn set_volume(&self, volume: i64) -> Result<(), PlayerError> {
        self.send_command(&format!("cmd=volume&volume={volume}")).await
    }

    async fn mute(&self) -> Result<(), PlayerError> {
        self.send_command("cmd=volume&volume=mute").await
    }

    async fn unmute(&self) -> Result<(), PlayerError> {
        self.send_command("cmd=volume&volume=unmute").await
    }

    async fn position(&self) -> Result<Duration, PlayerError> {
        // Playback position is reported in milliseconds.
        let millis = self.state_f64("seek").await?.max(0.0);
        Ok(Duration::from_millis(millis as u64))
    }

    async fn duration(&self) -> Result<Duration, PlayerError> {
        let secs = self.state_f64("duration").await?.max(0.0);
        Ok(Duration::from_secs_f64(secs))
    }

    async fn seek(&self, position: Duration) -> Result<(), PlayerError> {
        self.send_command(&format!("cmd=seek&position={}", position.as_secs()))
            .await
    }

    async fn is_seekable(&self) -> Result<bool, PlayerError> {
        // Streams report a zero duration and cannot be seeked.
        Ok(self.state_f64("duration").await.unwrap_or(0.0) > 0.0)
    }

    async fn take_ended(&self) -> Result<bool, PlayerError> {
        let state = self.get_state().await?;
        if status_is_playing(&state) {
            self.was_playing.store(true, Ordering::Release);
            return Ok(false);
        }
        match state["status"].as_str() {
            // A pause keeps the flag armed; the track has not finished.
            Some("pause") => Ok(false),
            _ => Ok(self.was_playing.swap(false, Ordering::AcqRel)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_playing_state() {
        assert!(status_is_playing(&json!({ "status": "play" })));
        assert!(!status_is_playing(&json!({ "status": "stop" })));
        assert!(!status_is_playing(&json!({ "status": "pause" })));
        assert!(!status_is_playing(&json!({})));
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(RestApiPlayer::new("not a url").is_err());
        assert!(RestApiPlayer::new("http://localhost:3000/").is_ok());
    }

    #[test]
    fn api_urls_resolve_against_the_base() {
        let player = RestApiPlayer::new("http://localhost:3000/").unwrap();
        assert_eq!(
            player.api_url("api/v1/getState").unwrap().as_str(),
            "http://localhost:3000/api/v1/getState"
        );
        assert_eq!(
            player.api_url("api/v1/commands/?cmd=play").unwrap().as_str(),
            "http://localhost:3000/api/v1/commands/?cmd=play"
        );
    }
}
