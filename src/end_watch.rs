use futures::StreamExt;
use log::{debug, error, info, warn};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::controller::ControllerEvent;
use crate::definitions::END_POLL_INTERVAL;
use crate::player::{EndedEvents, Player, PlayerError, PlayerInterface};
use crate::service::{spawn_service, ServiceHandle, StopHandle};

/// Watch the player for end-of-media and forward one MediaEnded event per
/// occurrence into the controller queue.
///
/// Backends with their own event source hand us a stream; for the rest we
/// poll a consume-once ended flag, so detection latency is bounded by the
/// poll interval and a signal raised from a non-reentrant callback context
/// never drives a media load directly.
pub fn run_end_of_media_watch(
    player: Player,
    events_tx: mpsc::UnboundedSender<ControllerEvent>,
) -> ServiceHandle {
    spawn_service(move |mut stop| async move {
        match player.ended_events().await {
            Ok(events) => run_event_watch(events, events_tx, stop).await,
            Err(PlayerError::FeatureNotSupported) => {
                run_polling_watch(player, events_tx, stop).await
            }
            Err(e) => {
                error!("Cannot watch for end of media: {e}");
                stop.signaled().await;
            }
        }
    })
}

async fn run_event_watch(
    mut events: EndedEvents,
    events_tx: mpsc::UnboundedSender<ControllerEvent>,
    mut stop: StopHandle,
) {
    loop {
        select! {
            biased;
            _ = stop.signaled() => break,
            event = events.next() => {
                match event {
                    Some(()) => {
                        debug!("End of media signaled");
                        if events_tx.send(ControllerEvent::MediaEnded).is_err() {
                            break;
                        }
                    }
                    None => {
                        info!("End-of-media event stream closed");
                        break;
                    }
                }
            }
        }
    }
}

async fn run_polling_watch(
    player: Player,
    events_tx: mpsc::UnboundedSender<ControllerEvent>,
    mut stop: StopHandle,
) {
    loop {
        select! {
            biased;
            _ = stop.signaled() => break,
            _ = sleep(END_POLL_INTERVAL) => {
                match player.take_ended().await {
                    Ok(true) => {
                        debug!("End of media detected by poll");
                        if events_tx.send(ControllerEvent::MediaEnded).is_err() {
                            break;
                        }
                    }
                    Ok(false) => {}
                    Err(PlayerError::FeatureNotSupported) => {
                        warn!("Player reports neither ended events nor an ended flag");
                        stop.signaled().await;
                        break;
                    }
                    Err(e) => debug!("End-of-media poll failed: {e}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::SinkExt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct EventedPlayer {
        ended_rx: Mutex<Option<EndedEvents>>,
    }

    #[async_trait]
    impl PlayerInterface for EventedPlayer {
        async fn ended_events(&self) -> Result<EndedEvents, PlayerError> {
            self.ended_rx
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| PlayerError::Transport("ended events already claimed".into()))
        }
    }

    struct PollingPlayer {
        ended: Arc<AtomicBool>,
    }

    #[async_trait]
    impl PlayerInterface for PollingPlayer {
        async fn take_ended(&self) -> Result<bool, PlayerError> {
            Ok(self.ended.swap(false, Ordering::AcqRel))
        }
    }

    #[tokio::test]
    async fn forwards_each_stream_event_once() {
        let (mut ended_tx, ended_rx) = futures::channel::mpsc::channel(4);
        let player = Player::new(EventedPlayer { ended_rx: Mutex::new(Some(ended_rx)) });
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let watch = run_end_of_media_watch(player, events_tx);
        ended_tx.send(()).await.unwrap();
        ended_tx.send(()).await.unwrap();

        for _ in 0..2 {
            let event = tokio::time::timeout(Duration::from_secs(1), events_rx.recv())
                .await
                .unwrap();
            assert!(matches!(event, Some(ControllerEvent::MediaEnded)));
        }
        assert!(events_rx.try_recv().is_err());
        watch.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn polling_consumes_the_ended_flag_exactly_once() {
        let ended = Arc::new(AtomicBool::new(true));
        let player = Player::new(PollingPlayer { ended: ended.clone() });
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let watch = run_end_of_media_watch(player, events_tx);
        let event = tokio::time::timeout(Duration::from_secs(1), events_rx.recv())
            .await
            .unwrap();
        assert!(matches!(event, Some(ControllerEvent::MediaEnded)));

        // Flag was consumed; further polls stay quiet.
        tokio::time::sleep(END_POLL_INTERVAL * 3).await;
        assert!(events_rx.try_recv().is_err());
        watch.shutdown().await.unwrap();
    }
}
