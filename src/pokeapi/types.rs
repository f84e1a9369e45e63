use serde::{Deserialize, Serialize};

/// Upper bound used when drawing stat bars, whatever the stat kind
pub const STAT_MAX: u32 = 200;

const ARTWORK_BASE: &str =
  "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites/pokemon/other/official-artwork";

/// A base stat with its display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokemonStat {
  pub name: String,
  pub value: u32,
  pub max: u32,
}

/// Pokédex entry, already converted to display units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pokemon {
  pub id: u32,
  pub name: String,
  /// Type tags in slot order
  pub types: Vec<String>,
  /// Kilograms
  pub weight: f32,
  /// Meters
  pub height: f32,
  pub stats: Vec<PokemonStat>,
  pub image_url: String,
}

/// Official artwork location for an id, used when the API omits it
pub fn artwork_url(id: u32) -> String {
  format!("{}/{}.png", ARTWORK_BASE, id)
}
