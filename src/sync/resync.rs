//! Background cache refresh when connectivity comes back.
//!
//! Connectivity transitions are turned into [`ConnectivityEvent`] messages;
//! the [`ResyncWorker`] consumes them and brings the local cache up to date.
//! Nothing here touches what a screen is currently showing.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheStorage;
use crate::connectivity::{Connectivity, ConnectivityStatus};
use crate::pokeapi::RemoteSource;

use super::Synchronizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
  Lost,
  Regained,
}

/// Forward connectivity transitions from a status stream as events.
///
/// The task ends when either side of the pipe goes away.
pub fn forward_transitions(
  mut status: watch::Receiver<ConnectivityStatus>,
  events: mpsc::UnboundedSender<ConnectivityEvent>,
) -> JoinHandle<()> {
  let mut last = *status.borrow_and_update();
  tokio::spawn(async move {
    while status.changed().await.is_ok() {
      let current = *status.borrow_and_update();
      let event = match (last, current) {
        (ConnectivityStatus::Unavailable, ConnectivityStatus::Available) => {
          Some(ConnectivityEvent::Regained)
        }
        (ConnectivityStatus::Available, ConnectivityStatus::Unavailable) => {
          Some(ConnectivityEvent::Lost)
        }
        _ => None,
      };
      last = current;

      if let Some(event) = event {
        if events.send(event).is_err() {
          break;
        }
      }
    }
  })
}

/// Refreshes the cached pages once per regained connection.
pub struct ResyncWorker<R, S, C> {
  sync: Synchronizer<R, S, C>,
  page_size: u32,
  events: mpsc::UnboundedReceiver<ConnectivityEvent>,
}

impl<R: RemoteSource, S: CacheStorage, C: Connectivity> ResyncWorker<R, S, C> {
  pub fn new(
    sync: Synchronizer<R, S, C>,
    page_size: u32,
    events: mpsc::UnboundedReceiver<ConnectivityEvent>,
  ) -> Self {
    Self {
      sync,
      page_size,
      events,
    }
  }

  /// Wire the worker to the synchronizer's own connectivity signal and run it.
  pub fn spawn(sync: Synchronizer<R, S, C>, page_size: u32) -> JoinHandle<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    forward_transitions(sync.connectivity().subscribe(), tx);
    let worker = Self::new(sync, page_size, rx);
    tokio::spawn(worker.run())
  }

  /// Process events until every sender is gone.
  pub async fn run(mut self) {
    while let Some(event) = self.events.recv().await {
      match event {
        ConnectivityEvent::Regained => {
          info!("Connectivity regained; refreshing cache");
          match self.sync.refresh_cached(self.page_size).await {
            Ok(count) => info!(count, "Cache refreshed"),
            Err(e) => warn!(error = %e, "Cache refresh failed"),
          }
        }
        ConnectivityEvent::Lost => debug!("Connectivity lost"),
      }
    }
  }
}
