//! Event handling for TUI.
//!
//! A separate thread polls the terminal; timeouts become ticks so the app
//! can pump live changes even while no key is pressed.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};

/// Application events.
#[derive(Debug)]
pub enum Event {
    /// Timer tick for pumping live changes and expiring toasts.
    Tick,
    /// Keyboard input.
    Key(KeyEvent),
    /// Terminal resize (width, height).
    Resize(u16, u16),
}

/// Event handler that polls for terminal events in a separate thread.
pub struct EventHandler {
    rx: Receiver<Event>,
    /// Kept alive to prevent channel closure.
    _tx: Sender<Event>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let event_tx = tx.clone();

        thread::Builder::new()
            .name("rowdeck-input".into())
            .spawn(move || {
                loop {
                    let event = if event::poll(tick_rate).unwrap_or(false) {
                        match event::read() {
                            Ok(CrosstermEvent::Key(key)) => Event::Key(key),
                            Ok(CrosstermEvent::Resize(w, h)) => Event::Resize(w, h),
                            Ok(_) => continue,
                            Err(e) => {
                                tracing::warn!(error = %e, "terminal read failed");
                                continue;
                            }
                        }
                    } else {
                        Event::Tick
                    };
                    if event_tx.send(event).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self { rx, _tx: tx })
    }

    /// Receives the next event, blocking until one is available.
    pub fn next(&self) -> Result<Event, mpsc::RecvError> {
        self.rx.recv()
    }
}
