use std::io::BufRead;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::connectivity::ConnectivityStatus;

/// Application events
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
  /// One line typed at the prompt
  Line(String),
  /// Standard input was closed
  Eof,
  /// Periodic tick for polling background work
  Tick,
  /// Connectivity changed
  Connectivity(ConnectivityStatus),
}

/// Event handler that merges stdin, a tick timer and the connectivity signal
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Tick
    let tick_tx = tx.clone();
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(tick_rate);
      loop {
        interval.tick().await;
        if tick_tx.send(Event::Tick).is_err() {
          break;
        }
      }
    });

    Self { tx, rx }
  }

  /// Read stdin lines on a plain thread. A pending read would otherwise keep
  /// the runtime from shutting down.
  pub fn read_stdin(&self) {
    let tx = self.tx.clone();
    std::thread::spawn(move || {
      for line in std::io::stdin().lock().lines() {
        let event = match line {
          Ok(line) => Event::Line(line),
          Err(_) => break,
        };
        if tx.send(event).is_err() {
          return;
        }
      }
      let _ = tx.send(Event::Eof);
    });
  }

  /// Forward every connectivity change as an event
  pub fn watch_connectivity(&self, mut status: watch::Receiver<ConnectivityStatus>) {
    let tx = self.tx.clone();
    tokio::spawn(async move {
      while status.changed().await.is_ok() {
        let current = *status.borrow_and_update();
        if tx.send(Event::Connectivity(current)).is_err() {
          break;
        }
      }
    });
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
