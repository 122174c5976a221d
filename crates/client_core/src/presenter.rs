use tokio::sync::broadcast;

use crate::types::{ImageBlob, Notification, SessionEvent, SlotVisual, UploadProgress};

/// Rendering seam driven by the upload session.
pub trait SessionPresenter: Send + Sync {
    fn render_slot(&self, character: char, visual: SlotVisual);
    fn show_preview(&self, character: char, image: &ImageBlob);
    fn update_progress(&self, progress: UploadProgress);
    fn notify(&self, notification: Notification);
}

pub struct NullPresenter;

impl SessionPresenter for NullPresenter {
    fn render_slot(&self, _character: char, _visual: SlotVisual) {}

    fn show_preview(&self, _character: char, _image: &ImageBlob) {}

    fn update_progress(&self, _progress: UploadProgress) {}

    fn notify(&self, _notification: Notification) {}
}

/// Forwards every presentation call as a [`SessionEvent`] to broadcast subscribers.
pub struct EventPresenter {
    events: broadcast::Sender<SessionEvent>,
}

impl EventPresenter {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self { events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // Fails only when nobody is subscribed.
        let _ = self.events.send(event);
    }
}

impl SessionPresenter for EventPresenter {
    fn render_slot(&self, character: char, visual: SlotVisual) {
        self.emit(SessionEvent::SlotRendered { character, visual });
    }

    fn show_preview(&self, character: char, image: &ImageBlob) {
        self.emit(SessionEvent::PreviewReady {
            character,
            file_name: image.file_name.clone(),
        });
    }

    fn update_progress(&self, progress: UploadProgress) {
        self.emit(SessionEvent::ProgressUpdated(progress));
    }

    fn notify(&self, notification: Notification) {
        self.emit(SessionEvent::Notified(notification));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    #[test]
    fn event_presenter_forwards_to_subscribers() {
        let presenter = EventPresenter::new(8);
        let mut rx = presenter.subscribe();

        presenter.render_slot('A', SlotVisual::Uploading);
        presenter.notify(Notification::new(Severity::Info, "hello"));

        assert_eq!(
            rx.try_recv().expect("slot event"),
            SessionEvent::SlotRendered {
                character: 'A',
                visual: SlotVisual::Uploading
            }
        );
        match rx.try_recv().expect("notification event") {
            SessionEvent::Notified(notification) => assert_eq!(notification.message, "hello"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn event_presenter_without_subscribers_is_silent() {
        let presenter = EventPresenter::new(1);
        presenter.update_progress(UploadProgress::default());
    }
}
