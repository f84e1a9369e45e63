//! PokéAPI access: wire types, domain records and the HTTP client.

pub mod api_types;
mod cache;
pub mod client;
pub mod types;

use std::future::Future;

pub use client::PokeApiClient;
pub use types::{Pokemon, PokemonStat};

/// Failure of a single remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
  #[error("not found")]
  NotFound,
  #[error("server returned HTTP {0}")]
  Status(u16),
  #[error("request failed: {0}")]
  Transport(String),
  #[error("malformed response: {0}")]
  Decode(String),
}

/// Source of Pokémon records that live somewhere other than the local cache.
pub trait RemoteSource: Send + Sync + 'static {
  /// Fetch one list page, resolved to full records in listing order.
  fn fetch_page(
    &self,
    limit: u32,
    offset: u32,
  ) -> impl Future<Output = Result<Vec<Pokemon>, FetchError>> + Send;

  fn fetch_by_id(&self, id: u32) -> impl Future<Output = Result<Pokemon, FetchError>> + Send;

  /// `name` is expected to be normalized already (trimmed, lower-cased)
  fn fetch_by_name(&self, name: &str)
    -> impl Future<Output = Result<Pokemon, FetchError>> + Send;
}
