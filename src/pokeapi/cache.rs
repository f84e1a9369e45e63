//! Caching implementations for PokéAPI types.

use crate::cache::Cacheable;

use super::types::Pokemon;

impl Cacheable for Pokemon {
  fn cache_id(&self) -> i64 {
    i64::from(self.id)
  }

  fn lookup_name(&self) -> String {
    self.name.to_lowercase()
  }

  fn entity_type() -> &'static str {
    "pokemon"
  }
}
