//! Network reachability signal.
//!
//! Consumers either ask for the point-in-time status or subscribe to a
//! `watch` channel that always holds the latest status.

use std::sync::Arc;
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityStatus {
  Available,
  Unavailable,
}

impl ConnectivityStatus {
  pub fn is_available(self) -> bool {
    matches!(self, ConnectivityStatus::Available)
  }
}

pub trait Connectivity: Send + Sync + 'static {
  /// Instantaneous check
  fn status(&self) -> ConnectivityStatus;

  /// Live status stream
  fn subscribe(&self) -> watch::Receiver<ConnectivityStatus>;
}

/// Connectivity that only changes when told to.
///
/// Backs `--offline` and tests.
pub struct ManualConnectivity {
  tx: watch::Sender<ConnectivityStatus>,
}

impl ManualConnectivity {
  pub fn new(initial: ConnectivityStatus) -> Self {
    let (tx, _rx) = watch::channel(initial);
    Self { tx }
  }

  pub fn set(&self, status: ConnectivityStatus) {
    self.tx.send_replace(status);
  }
}

impl Connectivity for ManualConnectivity {
  fn status(&self) -> ConnectivityStatus {
    *self.tx.borrow()
  }

  fn subscribe(&self) -> watch::Receiver<ConnectivityStatus> {
    self.tx.subscribe()
  }
}

/// Periodically probes the API host with a TCP connect and publishes
/// status transitions.
pub struct ConnectivityMonitor {
  tx: Arc<watch::Sender<ConnectivityStatus>>,
  task: JoinHandle<()>,
}

impl ConnectivityMonitor {
  pub fn spawn(target: &Url, interval: Duration, timeout: Duration) -> Result<Self> {
    let host = target
      .host_str()
      .ok_or_else(|| eyre!("API url has no host: {}", target))?
      .to_string();
    let port = target
      .port_or_known_default()
      .ok_or_else(|| eyre!("API url has no port: {}", target))?;

    // Optimistic until the first probe says otherwise
    let (tx, _rx) = watch::channel(ConnectivityStatus::Available);
    let tx = Arc::new(tx);

    let probe_tx = Arc::clone(&tx);
    let task = tokio::spawn(async move {
      loop {
        let status = probe(&host, port, timeout).await;
        probe_tx.send_if_modified(|current| {
          if *current == status {
            return false;
          }
          info!(?status, host = %host, "Connectivity changed");
          *current = status;
          true
        });
        tokio::time::sleep(interval).await;
      }
    });

    Ok(Self { tx, task })
  }
}

impl Connectivity for ConnectivityMonitor {
  fn status(&self) -> ConnectivityStatus {
    *self.tx.borrow()
  }

  fn subscribe(&self) -> watch::Receiver<ConnectivityStatus> {
    self.tx.subscribe()
  }
}

impl Drop for ConnectivityMonitor {
  fn drop(&mut self) {
    self.task.abort();
  }
}

async fn probe(host: &str, port: u16, timeout: Duration) -> ConnectivityStatus {
  match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
    Ok(Ok(_)) => ConnectivityStatus::Available,
    Ok(Err(e)) => {
      debug!(host, port, error = %e, "Connectivity probe failed");
      ConnectivityStatus::Unavailable
    }
    Err(_) => {
      debug!(host, port, "Connectivity probe timed out");
      ConnectivityStatus::Unavailable
    }
  }
}
