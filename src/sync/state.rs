use crate::pokeapi::FetchError;

/// Where a successful value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
  /// Provisional value read from the local cache
  Cache,
  /// Fresh value from the API; supersedes any cached one
  Remote,
}

/// Failures surfaced to callers of the synchronizer. All are retryable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
  #[error("no connectivity and no cached data")]
  NoConnectivityNoCache,
  #[error("server error (HTTP {status})")]
  Remote { status: u16 },
  #[error("Pokémon not found")]
  NotFound,
  #[error("malformed response: {0}")]
  Deserialization(String),
  #[error("{0}")]
  Unknown(String),
}

impl SyncError {
  pub fn is_not_found(&self) -> bool {
    matches!(self, SyncError::NotFound)
  }
}

impl From<FetchError> for SyncError {
  fn from(err: FetchError) -> Self {
    match err {
      FetchError::NotFound => SyncError::NotFound,
      FetchError::Status(status) => SyncError::Remote { status },
      FetchError::Decode(msg) => SyncError::Deserialization(msg),
      FetchError::Transport(msg) => SyncError::Unknown(msg),
    }
  }
}

/// One emission of a synchronizer operation.
///
/// An operation emits `Loading` first, then at most a cached `Success`
/// followed by a remote `Success`, or a single `Error`/`Empty`. A later
/// `Success` replaces an earlier one.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncState<T> {
  Loading,
  Success { data: T, source: DataSource },
  Error(SyncError),
  /// A list operation found nothing in cache or remote
  Empty,
}

impl<T> SyncState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, SyncState::Loading)
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      SyncState::Success { data, .. } => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&SyncError> {
    match self {
      SyncState::Error(e) => Some(e),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_fetch_errors_map_to_taxonomy() {
    assert_eq!(SyncError::from(FetchError::NotFound), SyncError::NotFound);
    assert_eq!(
      SyncError::from(FetchError::Status(503)),
      SyncError::Remote { status: 503 }
    );
    assert!(matches!(
      SyncError::from(FetchError::Decode("eof".into())),
      SyncError::Deserialization(_)
    ));
    assert!(matches!(
      SyncError::from(FetchError::Transport("reset".into())),
      SyncError::Unknown(_)
    ));
  }

  #[test]
  fn test_error_messages() {
    assert_eq!(
      SyncError::NoConnectivityNoCache.to_string(),
      "no connectivity and no cached data"
    );
    assert_eq!(
      SyncError::Remote { status: 500 }.to_string(),
      "server error (HTTP 500)"
    );
  }
}
