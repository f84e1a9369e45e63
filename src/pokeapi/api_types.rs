//! Serde-deserializable types matching PokéAPI responses.
//!
//! These stay separate from the domain types so unit conversion and
//! fallbacks happen in exactly one place.

use serde::Deserialize;

use super::types::{artwork_url, Pokemon, PokemonStat, STAT_MAX};

// ============================================================================
// List endpoint: GET pokemon?limit=&offset=
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiListResponse {
  #[serde(default)]
  pub count: u64,
  pub next: Option<String>,
  pub previous: Option<String>,
  #[serde(default)]
  pub results: Vec<ApiListItem>,
}

#[derive(Debug, Deserialize)]
pub struct ApiListItem {
  pub name: String,
  pub url: String,
}

impl ApiListItem {
  /// Numeric id taken from the trailing path segment of the resource url
  pub fn id(&self) -> Option<u32> {
    self.url.trim_end_matches('/').rsplit('/').next()?.parse().ok()
  }
}

// ============================================================================
// Detail endpoint: GET pokemon/{id or name}
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiNamed {
  pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiTypeSlot {
  #[serde(default)]
  pub slot: u32,
  #[serde(rename = "type")]
  pub type_info: ApiNamed,
}

#[derive(Debug, Deserialize)]
pub struct ApiStat {
  pub base_stat: u32,
  pub stat: ApiNamed,
}

#[derive(Debug, Deserialize)]
pub struct ApiArtwork {
  pub front_default: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiOtherSprites {
  #[serde(rename = "official-artwork")]
  pub official_artwork: Option<ApiArtwork>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiSprites {
  pub other: Option<ApiOtherSprites>,
}

#[derive(Debug, Deserialize)]
pub struct ApiPokemon {
  pub id: u32,
  pub name: String,
  /// Decimeters
  #[serde(default)]
  pub height: u32,
  /// Hectograms
  #[serde(default)]
  pub weight: u32,
  #[serde(default)]
  pub types: Vec<ApiTypeSlot>,
  #[serde(default)]
  pub stats: Vec<ApiStat>,
  #[serde(default)]
  pub sprites: ApiSprites,
}

impl ApiPokemon {
  pub fn into_domain(self) -> Pokemon {
    let image_url = self
      .sprites
      .other
      .and_then(|other| other.official_artwork)
      .and_then(|artwork| artwork.front_default)
      .unwrap_or_else(|| artwork_url(self.id));

    Pokemon {
      id: self.id,
      name: self.name,
      types: self.types.into_iter().map(|t| t.type_info.name).collect(),
      weight: self.weight as f32 / 10.0,
      height: self.height as f32 / 10.0,
      stats: self
        .stats
        .into_iter()
        .map(|s| PokemonStat {
          name: stat_display_name(&s.stat.name),
          value: s.base_stat,
          max: STAT_MAX,
        })
        .collect(),
      image_url,
    }
  }
}

/// "special-attack" -> "Special attack"
fn stat_display_name(raw: &str) -> String {
  let spaced = raw.replace('-', " ");
  let mut chars = spaced.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const PIKACHU: &str = r#"{
    "id": 25,
    "name": "pikachu",
    "height": 4,
    "weight": 60,
    "base_experience": 112,
    "types": [{"slot": 1, "type": {"name": "electric", "url": "https://pokeapi.co/api/v2/type/13/"}}],
    "stats": [
      {"base_stat": 35, "effort": 0, "stat": {"name": "hp"}},
      {"base_stat": 50, "effort": 0, "stat": {"name": "special-attack"}}
    ],
    "sprites": {
      "front_default": "https://example.test/front/25.png",
      "other": {"official-artwork": {"front_default": "https://example.test/artwork/25.png"}}
    }
  }"#;

  #[test]
  fn test_detail_converts_units_and_names() {
    let api: ApiPokemon = serde_json::from_str(PIKACHU).unwrap();
    let pokemon = api.into_domain();

    assert_eq!(pokemon.id, 25);
    assert_eq!(pokemon.name, "pikachu");
    assert_eq!(pokemon.types, vec!["electric".to_string()]);
    assert!((pokemon.height - 0.4).abs() < f32::EPSILON);
    assert!((pokemon.weight - 6.0).abs() < f32::EPSILON);
    assert_eq!(pokemon.image_url, "https://example.test/artwork/25.png");
    assert_eq!(
      pokemon.stats,
      vec![
        PokemonStat {
          name: "Hp".to_string(),
          value: 35,
          max: 200
        },
        PokemonStat {
          name: "Special attack".to_string(),
          value: 50,
          max: 200
        },
      ]
    );
  }

  #[test]
  fn test_missing_artwork_falls_back_to_cdn() {
    let json = r#"{"id": 132, "name": "ditto", "height": 3, "weight": 40,
      "types": [], "stats": [], "sprites": {"other": {"official-artwork": {"front_default": null}}}}"#;
    let pokemon = serde_json::from_str::<ApiPokemon>(json).unwrap().into_domain();
    assert_eq!(pokemon.image_url, artwork_url(132));

    let json = r#"{"id": 7, "name": "squirtle", "height": 5, "weight": 90}"#;
    let pokemon = serde_json::from_str::<ApiPokemon>(json).unwrap().into_domain();
    assert_eq!(pokemon.image_url, artwork_url(7));
  }

  #[test]
  fn test_list_item_id_from_url() {
    let item = ApiListItem {
      name: "bulbasaur".to_string(),
      url: "https://pokeapi.co/api/v2/pokemon/1/".to_string(),
    };
    assert_eq!(item.id(), Some(1));

    let item = ApiListItem {
      name: "odd".to_string(),
      url: "https://pokeapi.co/api/v2/pokemon/not-a-number/".to_string(),
    };
    assert_eq!(item.id(), None);
  }

  #[test]
  fn test_list_response_parses() {
    let json = r#"{"count": 1302, "next": "https://pokeapi.co/api/v2/pokemon?offset=20&limit=20",
      "previous": null, "results": [{"name": "bulbasaur", "url": "https://pokeapi.co/api/v2/pokemon/1/"}]}"#;
    let list: ApiListResponse = serde_json::from_str(json).unwrap();
    assert_eq!(list.count, 1302);
    assert!(list.previous.is_none());
    assert_eq!(list.results.len(), 1);
    assert_eq!(list.results[0].name, "bulbasaur");
  }

  #[test]
  fn test_stat_display_name() {
    assert_eq!(stat_display_name("special-defense"), "Special defense");
    assert_eq!(stat_display_name("speed"), "Speed");
    assert_eq!(stat_display_name(""), "");
  }
}
