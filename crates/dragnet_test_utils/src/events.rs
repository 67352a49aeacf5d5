//! Helpers for receiving presentation events in tests.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use dragnet_protocol::UiEvent;

/// Upper bound on any single event wait in tests.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Receive the next presentation event, panicking if none arrives in time.
pub async fn recv_event(rx: &mut mpsc::UnboundedReceiver<UiEvent>) -> UiEvent {
    timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for a presentation event")
        .expect("presentation event channel closed")
}

/// Collect events until one matches `pred`. The matching event is last in
/// the returned list.
pub async fn recv_until(
    rx: &mut mpsc::UnboundedReceiver<UiEvent>,
    mut pred: impl FnMut(&UiEvent) -> bool,
) -> Vec<UiEvent> {
    let mut events = Vec::new();
    loop {
        let event = recv_event(rx).await;
        let done = pred(&event);
        events.push(event);
        if done {
            return events;
        }
    }
}

/// Pop every event already queued, without waiting for more.
pub fn drain_now(rx: &mut mpsc::UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
