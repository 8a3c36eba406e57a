//! Shared vocabulary of the service: tuning constants, the video catalog,
//! the published playback status and the remote command set.

use std::collections::HashMap;
use std::time::Duration;

use rand::seq::IteratorRandom;
use serde::{Deserialize, Serialize};

pub const MAX_VOLUME: i64 = 100;
pub const VOLUME_STEP: i64 = 10;
pub const DEFAULT_VOLUME: i64 = MAX_VOLUME;
pub const SKIP_STEP: Duration = Duration::from_secs(5);
pub const END_POLL_INTERVAL: Duration = Duration::from_millis(200);
pub const CATALOG_POLL_INTERVAL: Duration = Duration::from_secs(15);

pub fn clamp_volume(volume: i64) -> i64 {
    volume.clamp(0, MAX_VOLUME)
}

/// One playable catalog entry. Paths are object paths within the media
/// bucket, not URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRecord {
    pub file_path: String,
    pub thumbnail_path: Option<String>,
}

/// Snapshot of the remote video catalog, keyed by document id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Catalog(HashMap<String, VideoRecord>);

impl Catalog {
    pub fn new(videos: HashMap<String, VideoRecord>) -> Self {
        Self(videos)
    }

    pub fn get(&self, id: &str) -> Option<&VideoRecord> {
        self.0.get(id)
    }

    /// Uniformly random entry. Successive picks are independent, so an
    /// immediate repeat is possible.
    pub fn random_pick(&self) -> Option<(&String, &VideoRecord)> {
        self.0.iter().choose(&mut rand::rng())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, VideoRecord)> for Catalog {
    fn from_iter<I: IntoIterator<Item = (String, VideoRecord)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Externally visible playback state, published as a whole on every
/// transition. Field names here are the wire names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStatus {
    /// Document reference of the video being played, `videos/{id}`.
    pub playing_ref: Option<String>,
    pub file_name: Option<String>,
    pub thumbnail_link: Option<String>,
    pub is_loading: bool,
    pub is_paused: bool,
}

impl PlaybackStatus {
    /// Transient state shown between one video and the next.
    pub fn loading() -> Self {
        Self {
            playing_ref: None,
            file_name: None,
            thumbnail_link: None,
            is_loading: true,
            is_paused: false,
        }
    }

    pub fn playing(video_id: &str, record: &VideoRecord) -> Self {
        Self {
            playing_ref: Some(format!("videos/{video_id}")),
            file_name: Some(record.file_path.clone()),
            thumbnail_link: record.thumbnail_path.clone(),
            is_loading: false,
            is_paused: false,
        }
    }
}

/// The remote control command vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Refresh,
    Play,
    Pause,
    Mute,
    VolUp,
    VolDown,
    SkipBackward,
    SkipForward,
}

impl Action {
    pub fn parse(command: &str) -> Option<Self> {
        match command {
            "refresh" => Some(Self::Refresh),
            "play" => Some(Self::Play),
            "pause" => Some(Self::Pause),
            "mute" => Some(Self::Mute),
            "vol_up" => Some(Self::VolUp),
            "vol_down" => Some(Self::VolDown),
            "skip_backward" => Some(Self::SkipBackward),
            "skip_forward" => Some(Self::SkipForward),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Refresh => "refresh",
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Mute => "mute",
            Self::VolUp => "vol_up",
            Self::VolDown => "vol_down",
            Self::SkipBackward => "skip_backward",
            Self::SkipForward => "skip_forward",
        }
    }
}

/// One decoded push notification. The persistent id survives redelivery and
/// is what deduplication keys on.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub persistent_id: String,
    #[serde(default)]
    pub data: NotificationData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationData {
    #[serde(default)]
    pub command: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_vocabulary_round_trips() {
        for action in [
            Action::Refresh,
            Action::Play,
            Action::Pause,
            Action::Mute,
            Action::VolUp,
            Action::VolDown,
            Action::SkipBackward,
            Action::SkipForward,
        ] {
            assert_eq!(Action::parse(action.as_str()), Some(action));
        }
    }

    #[test]
    fn unknown_commands_do_not_parse() {
        assert_eq!(Action::parse("selfdestruct"), None);
        assert_eq!(Action::parse(""), None);
        assert_eq!(Action::parse("Pause"), None);
    }

    #[test]
    fn volume_stepping_saturates_at_the_bounds() {
        assert_eq!(clamp_volume(MAX_VOLUME + VOLUME_STEP), MAX_VOLUME);
        assert_eq!(clamp_volume(-VOLUME_STEP), 0);
        // Repeated steps from any in-range level stay in range and clamping
        // an already clamped value changes nothing.
        for v in [0, 5, 50, 95, 100] {
            for k in [-20, -1, 0, 1, 20] {
                let stepped = clamp_volume(v + k * VOLUME_STEP);
                assert!((0..=MAX_VOLUME).contains(&stepped));
                assert_eq!(clamp_volume(stepped), stepped);
            }
        }
    }

    #[test]
    fn status_serializes_with_camel_case_wire_names() {
        let record = VideoRecord {
            file_path: "clips/a.mp4".into(),
            thumbnail_path: Some("thumbs/a.png".into()),
        };
        let value = serde_json::to_value(PlaybackStatus::playing("v1", &record)).unwrap();
        assert_eq!(value["playingRef"], "videos/v1");
        assert_eq!(value["fileName"], "clips/a.mp4");
        assert_eq!(value["thumbnailLink"], "thumbs/a.png");
        assert_eq!(value["isLoading"], false);
        assert_eq!(value["isPaused"], false);
    }

    #[test]
    fn loading_status_carries_no_video_reference() {
        let status = PlaybackStatus::loading();
        assert!(status.is_loading);
        assert!(!status.is_paused);
        assert_eq!(status.playing_ref, None);
        assert_eq!(status.file_name, None);
    }

    #[test]
    fn random_pick_returns_a_catalog_entry() {
        let catalog: Catalog = [(
            "v1".to_string(),
            VideoRecord { file_path: "clips/a.mp4".into(), thumbnail_path: None },
        )]
        .into_iter()
        .collect();
        let (id, record) = catalog.random_pick().unwrap();
        assert_eq!(id, "v1");
        assert_eq!(record.file_path, "clips/a.mp4");
        assert!(Catalog::default().random_pick().is_none());
    }

    #[test]
    fn notification_deserializes_from_push_payload() {
        let notification: Notification = serde_json::from_str(
            r#"{ "persistentId": "p1", "data": { "command": "vol_up" } }"#,
        )
        .unwrap();
        assert_eq!(notification.persistent_id, "p1");
        assert_eq!(notification.data.command.as_deref(), Some("vol_up"));

        let bare: Notification =
            serde_json::from_str(r#"{ "persistentId": "p2" }"#).unwrap();
        assert_eq!(bare.data.command, None);
    }
}
