use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use futures::{stream, StreamExt};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::config::ApiConfig;

use super::api_types::{ApiListResponse, ApiPokemon};
use super::types::Pokemon;
use super::{FetchError, RemoteSource};

/// PokéAPI HTTP client
#[derive(Clone)]
pub struct PokeApiClient {
  http: reqwest::Client,
  base_url: Url,
  detail_concurrency: usize,
}

impl PokeApiClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let base_url = normalize_base_url(&config.base_url)?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(concat!("pokedex/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      detail_concurrency: config.detail_concurrency.max(1),
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
    self
      .base_url
      .join(path)
      .map_err(|e| FetchError::Transport(format!("invalid endpoint {}: {}", path, e)))
  }

  fn list_url(&self, limit: u32, offset: u32) -> Result<Url, FetchError> {
    let mut url = self.endpoint("pokemon")?;
    url
      .query_pairs_mut()
      .append_pair("limit", &limit.to_string())
      .append_pair("offset", &offset.to_string());
    Ok(url)
  }

  async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
    debug!(%url, "GET");

    let response = self
      .http
      .get(url)
      .send()
      .await
      .map_err(|e| FetchError::Transport(e.to_string()))?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
      return Err(FetchError::NotFound);
    }
    if !status.is_success() {
      return Err(FetchError::Status(status.as_u16()));
    }

    let body = response
      .bytes()
      .await
      .map_err(|e| FetchError::Transport(e.to_string()))?;

    serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
  }

  /// Raw listing page (names and resource urls only)
  pub async fn list(&self, limit: u32, offset: u32) -> Result<ApiListResponse, FetchError> {
    let url = self.list_url(limit, offset)?;
    self.get_json(url).await
  }

  async fn detail(&self, key: &str) -> Result<Pokemon, FetchError> {
    let url = self.endpoint(&format!("pokemon/{}", key))?;
    let api: ApiPokemon = self.get_json(url).await?;
    Ok(api.into_domain())
  }
}

impl RemoteSource for PokeApiClient {
  async fn fetch_page(&self, limit: u32, offset: u32) -> Result<Vec<Pokemon>, FetchError> {
    let listing = self.list(limit, offset).await?;
    let ids: Vec<u32> = listing.results.iter().filter_map(|item| item.id()).collect();

    // Detail lookups run concurrently but `buffered` keeps listing order
    let results: Vec<(u32, Result<Pokemon, FetchError>)> = stream::iter(ids)
      .map(|id| async move { (id, self.fetch_by_id(id).await) })
      .buffered(self.detail_concurrency)
      .collect()
      .await;

    collect_details(results)
  }

  async fn fetch_by_id(&self, id: u32) -> Result<Pokemon, FetchError> {
    self.detail(&id.to_string()).await
  }

  async fn fetch_by_name(&self, name: &str) -> Result<Pokemon, FetchError> {
    self.detail(&name.trim().to_lowercase()).await
  }
}

/// Keep the lookups that succeeded. A page whose every lookup failed is an
/// error rather than an empty page, so it never reads as the end of the list.
fn collect_details(
  results: Vec<(u32, Result<Pokemon, FetchError>)>,
) -> Result<Vec<Pokemon>, FetchError> {
  let mut records = Vec::with_capacity(results.len());
  let mut first_error = None;
  for (id, result) in results {
    match result {
      Ok(pokemon) => records.push(pokemon),
      Err(e) => {
        warn!(id, error = %e, "Dropping list entry whose detail lookup failed");
        first_error.get_or_insert(e);
      }
    }
  }

  match first_error {
    Some(e) if records.is_empty() => Err(e),
    _ => Ok(records),
  }
}

/// Parse the configured base url, making sure relative joins land under it.
fn normalize_base_url(raw: &str) -> Result<Url> {
  let mut url = Url::parse(raw).map_err(|e| eyre!("Invalid API url '{}': {}", raw, e))?;
  if !url.path().ends_with('/') {
    let path = format!("{}/", url.path());
    url.set_path(&path);
  }
  Ok(url)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sync::testing::pokemon;

  fn client(base_url: &str) -> PokeApiClient {
    PokeApiClient::new(&ApiConfig {
      base_url: base_url.to_string(),
      ..ApiConfig::default()
    })
    .unwrap()
  }

  #[test]
  fn test_page_keeps_successful_lookups() {
    let results = vec![
      (1, Ok(pokemon(1, "bulbasaur"))),
      (2, Err(FetchError::Status(500))),
      (3, Ok(pokemon(3, "venusaur"))),
    ];
    let records = collect_details(results).unwrap();
    assert_eq!(records.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 3]);
  }

  #[test]
  fn test_page_with_every_lookup_failed_is_an_error() {
    let results = vec![
      (1, Err(FetchError::Status(503))),
      (2, Err(FetchError::NotFound)),
    ];
    assert!(matches!(
      collect_details(results),
      Err(FetchError::Status(503))
    ));
  }

  #[test]
  fn test_empty_listing_is_an_empty_page() {
    assert!(collect_details(Vec::new()).unwrap().is_empty());
  }

  #[test]
  fn test_base_url_gets_trailing_slash() {
    let client = client("https://pokeapi.co/api/v2");
    assert_eq!(client.base_url().as_str(), "https://pokeapi.co/api/v2/");
  }

  #[test]
  fn test_list_url_carries_paging() {
    let client = client("https://pokeapi.co/api/v2/");
    let url = client.list_url(20, 40).unwrap();
    assert_eq!(
      url.as_str(),
      "https://pokeapi.co/api/v2/pokemon?limit=20&offset=40"
    );
  }

  #[test]
  fn test_detail_endpoint() {
    let client = client("https://pokeapi.co/api/v2/");
    let url = client.endpoint("pokemon/pikachu").unwrap();
    assert_eq!(url.as_str(), "https://pokeapi.co/api/v2/pokemon/pikachu");
  }

  #[test]
  fn test_invalid_base_url_is_rejected() {
    let result = PokeApiClient::new(&ApiConfig {
      base_url: "not a url".to_string(),
      ..ApiConfig::default()
    });
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_unreachable_host_is_transport_error() {
    // Port 9 on loopback is closed in any sane test environment
    let client = client("http://127.0.0.1:9/api/v2/");
    let err = client.fetch_by_id(1).await.unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));
  }
}
