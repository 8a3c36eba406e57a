use log::{debug, error, info};
use tokio::select;
use tokio::sync::mpsc;

use crate::controller::ControllerEvent;
use crate::dedup::NotificationDeduplicator;
use crate::definitions::{Action, Notification};
use crate::service::{spawn_service, ServiceHandle};

/// Turns inbound push notifications into controller commands, filtering out
/// redeliveries through the persisted deduplicator.
pub struct CommandDispatcher {
    dedup: NotificationDeduplicator,
    events_tx: mpsc::UnboundedSender<ControllerEvent>,
}

impl CommandDispatcher {
    pub fn new(
        dedup: NotificationDeduplicator,
        events_tx: mpsc::UnboundedSender<ControllerEvent>,
    ) -> Self {
        Self { dedup, events_tx }
    }

    /// Handle one decoded notification. Redeliveries and unknown commands
    /// return without side effects; nothing here ever raises back into the
    /// delivery context.
    pub fn handle(&mut self, notification: &Notification) {
        match self.dedup.admit(&notification.persistent_id) {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    "Notification {} already processed, skipping",
                    notification.persistent_id
                );
                return;
            }
            Err(e) => {
                // Fail closed: without a durable record we cannot rule out a
                // second admission, so drop and let redelivery retry later.
                error!(
                    "Deduplication log failure for {}: {e}; dropping notification",
                    notification.persistent_id
                );
                return;
            }
        }

        let Some(raw) = notification.data.command.as_deref() else {
            debug!("Notification {} carries no command", notification.persistent_id);
            return;
        };
        let Some(action) = Action::parse(raw) else {
            debug!("Unknown command {raw:?} ignored");
            return;
        };
        let _ = self.events_tx.send(ControllerEvent::Command(action));
    }
}

/// Drain decoded notifications from the push transport. A failure handling
/// one notification never tears the loop down.
pub fn run_command_dispatch(
    mut notifications: mpsc::Receiver<Notification>,
    mut dispatcher: CommandDispatcher,
) -> ServiceHandle {
    spawn_service(move |mut stop| async move {
        loop {
            select! {
                biased;
                _ = stop.signaled() => break,
                notification = notifications.recv() => {
                    match notification {
                        Some(notification) => dispatcher.handle(&notification),
                        None => {
                            info!("Notification channel closed, stopping dispatch");
                            break;
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::NotificationData;

    fn notification(id: &str, command: Option<&str>) -> Notification {
        Notification {
            persistent_id: id.to_string(),
            data: NotificationData { command: command.map(str::to_string) },
        }
    }

    fn dispatcher() -> (
        CommandDispatcher,
        mpsc::UnboundedReceiver<ControllerEvent>,
        tempfile::TempDir,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let dedup = NotificationDeduplicator::open(dir.path().join("ids.txt")).unwrap();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (CommandDispatcher::new(dedup, events_tx), events_rx, dir)
    }

    #[test]
    fn duplicate_persistent_id_dispatches_at_most_once() {
        let (mut dispatcher, mut events_rx, _dir) = dispatcher();

        dispatcher.handle(&notification("abc", Some("pause")));
        dispatcher.handle(&notification("abc", Some("pause")));

        assert!(matches!(
            events_rx.try_recv(),
            Ok(ControllerEvent::Command(Action::Pause))
        ));
        assert!(events_rx.try_recv().is_err());
    }

    #[test]
    fn distinct_ids_dispatch_independently() {
        let (mut dispatcher, mut events_rx, _dir) = dispatcher();

        dispatcher.handle(&notification("n1", Some("vol_up")));
        dispatcher.handle(&notification("n2", Some("refresh")));

        assert!(matches!(
            events_rx.try_recv(),
            Ok(ControllerEvent::Command(Action::VolUp))
        ));
        assert!(matches!(
            events_rx.try_recv(),
            Ok(ControllerEvent::Command(Action::Refresh))
        ));
    }

    #[test]
    fn unknown_and_missing_commands_are_ignored() {
        let (mut dispatcher, mut events_rx, _dir) = dispatcher();

        dispatcher.handle(&notification("n1", Some("self_destruct")));
        dispatcher.handle(&notification("n2", None));

        assert!(events_rx.try_recv().is_err());
    }

    #[test]
    fn ignored_command_still_consumes_the_id() {
        let (mut dispatcher, mut events_rx, _dir) = dispatcher();

        dispatcher.handle(&notification("n1", Some("bogus")));
        // Redelivery of the same id with a now-valid command is still a
        // redelivery and must not dispatch.
        dispatcher.handle(&notification("n1", Some("pause")));

        assert!(events_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dispatch_loop_drains_the_transport_channel() {
        let dir = tempfile::tempdir().unwrap();
        let dedup = NotificationDeduplicator::open(dir.path().join("ids.txt")).unwrap();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (notifications_tx, notifications_rx) = mpsc::channel(8);

        let service =
            run_command_dispatch(notifications_rx, CommandDispatcher::new(dedup, events_tx));

        notifications_tx
            .send(notification("n1", Some("skip_forward")))
            .await
            .unwrap();
        let event = tokio::time::timeout(std::time::Duration::from_secs(1), events_rx.recv())
            .await
            .unwrap();
        assert!(matches!(
            event,
            Some(ControllerEvent::Command(Action::SkipForward))
        ));
        service.shutdown().await.unwrap();
    }
}
