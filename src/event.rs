use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Inputs that drive one display cycle.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Key(KeyEvent),
    /// Time to pull a fresh snapshot from the store.
    Tick,
    Resize,
}

/// Keeps key presses and resizes. Key releases and repeats (reported on
/// some terminals) and mouse or focus events are dropped.
pub fn translate(evt: CrosstermEvent) -> Option<Event> {
    match evt {
        CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Some(Event::Key(key)),
        CrosstermEvent::Resize(_, _) => Some(Event::Resize),
        _ => None,
    }
}

/// Merges terminal input with the display tick on one channel.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    task: JoinHandle<()>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<Event>();

        let task = tokio::spawn(async move {
            let mut reader = event::EventStream::new();
            let mut ticks = tokio::time::interval(tick_rate);
            // a slow draw should delay the next refresh, not queue a burst
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                let next = tokio::select! {
                    maybe_event = reader.next() => match maybe_event {
                        Some(Ok(evt)) => translate(evt),
                        Some(Err(err)) => {
                            tracing::warn!(error = %err, "terminal input failed");
                            break;
                        }
                        None => break,
                    },
                    _ = ticks.tick() => Some(Event::Tick),
                };
                if let Some(e) = next
                    && tx.send(e).is_err()
                {
                    break;
                }
            }
        });

        Self { rx, task }
    }

    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        self.task.abort();
    }
}
