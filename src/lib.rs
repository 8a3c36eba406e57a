pub mod catalog_watch;
pub mod controller;
pub mod dedup;
pub mod definitions;
pub mod dispatch;
pub mod end_watch;
pub mod firebase;
pub mod player;
pub mod players;
pub mod service;
mod service_entry;

pub use catalog_watch::{run_catalog_watch, CatalogSource};
pub use controller::{ControllerHandle, MediaUrlResolver, PlaybackController, StatusPublisher};
pub use dedup::NotificationDeduplicator;
pub use definitions::{Action, Catalog, Notification, PlaybackStatus, VideoRecord};
pub use dispatch::{run_command_dispatch, CommandDispatcher};
pub use end_watch::run_end_of_media_watch;
pub use player::{Player, PlayerError, PlayerFactory, PlayerInterface};
pub use players::{KioskPlayerFactory, PlayerBackend};
pub use service::{MultiServiceHandle, ServiceHandle};
pub use service_entry::run_service;
