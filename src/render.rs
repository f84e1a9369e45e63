//! Plain-text rendering of list and detail states.

use crate::aggregator::ListState;
use crate::commands::COMMANDS;
use crate::detail::DetailState;
use crate::pokeapi::{Pokemon, PokemonStat};

const NAME_WIDTH: usize = 16;
const BAR_WIDTH: usize = 20;

/// Truncate a string to a maximum length in characters, adding "..." if
/// truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// "mr-mime" -> "Mr-mime"
pub fn display_name(name: &str) -> String {
  let mut chars = name.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

pub fn format_id(id: u32) -> String {
  format!("#{:03}", id)
}

/// Filled/empty bar proportional to `value / max`
pub fn stat_bar(value: u32, max: u32, width: usize) -> String {
  let filled = if max == 0 {
    0
  } else {
    ((value.min(max) as usize) * width + (max as usize) / 2) / max as usize
  };
  format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

pub fn pokemon_row(pokemon: &Pokemon) -> String {
  format!(
    "{:<5} {:<width$} {}",
    format_id(pokemon.id),
    truncate(&display_name(&pokemon.name), NAME_WIDTH),
    pokemon.types.join("/"),
    width = NAME_WIDTH,
  )
}

pub fn list_lines(state: &ListState) -> Vec<String> {
  match state {
    ListState::Loading => vec!["Loading...".to_string()],
    ListState::Empty => vec!["No Pokémon found.".to_string()],
    ListState::Error(message) => vec![
      format!("Error: {}", message),
      "Type 'retry' to try again.".to_string(),
    ],
    ListState::Success {
      items,
      is_search_result,
      error_message,
    } => {
      let mut lines: Vec<String> = items.iter().map(pokemon_row).collect();
      if *is_search_result {
        lines.push("(search result; 'clear' to go back)".to_string());
      } else {
        lines.push(format!("{} shown; 'more' for the next page", items.len()));
      }
      if let Some(message) = error_message {
        lines.push(format!("! {}", message));
      }
      lines
    }
    ListState::LoadingMore(items) => {
      let mut lines: Vec<String> = items.iter().map(pokemon_row).collect();
      lines.push("Loading more...".to_string());
      lines
    }
  }
}

fn stat_line(stat: &PokemonStat) -> String {
  format!(
    "  {:<16} {:>3} {}",
    stat.name,
    stat.value,
    stat_bar(stat.value, stat.max, BAR_WIDTH)
  )
}

pub fn detail_lines(pokemon: &Pokemon) -> Vec<String> {
  let mut lines = vec![
    format!("{} {}", format_id(pokemon.id), display_name(&pokemon.name)),
    format!("  Types:  {}", pokemon.types.join(", ")),
    format!("  Height: {:.1} m", pokemon.height),
    format!("  Weight: {:.1} kg", pokemon.weight),
  ];
  if !pokemon.stats.is_empty() {
    lines.push("  Stats:".to_string());
    lines.extend(pokemon.stats.iter().map(stat_line));
  }
  lines.push(format!("  Image:  {}", pokemon.image_url));
  lines
}

pub fn detail_state_lines(state: &DetailState) -> Vec<String> {
  match state {
    DetailState::Loading => vec!["Loading...".to_string()],
    DetailState::Success(pokemon) => detail_lines(pokemon),
    DetailState::Error(message) => vec![format!("Error: {}", message)],
  }
}

pub fn help_lines() -> Vec<String> {
  COMMANDS
    .iter()
    .map(|cmd| {
      format!(
        "  {:<28} {} (aliases: {})",
        cmd.usage,
        cmd.description,
        cmd.aliases.join(", ")
      )
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pikachu() -> Pokemon {
    Pokemon {
      id: 25,
      name: "pikachu".to_string(),
      types: vec!["electric".to_string()],
      weight: 6.0,
      height: 0.4,
      stats: vec![PokemonStat {
        name: "Hp".to_string(),
        value: 35,
        max: 200,
      }],
      image_url: "https://example.com/25.png".to_string(),
    }
  }

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("flabébé-blue", 8), "flabé...");
  }

  #[test]
  fn test_stat_bar() {
    assert_eq!(stat_bar(0, 200, 4), "░░░░");
    assert_eq!(stat_bar(100, 200, 4), "██░░");
    assert_eq!(stat_bar(250, 200, 4), "████");
    assert_eq!(stat_bar(5, 0, 2), "░░");
  }

  #[test]
  fn test_pokemon_row() {
    assert_eq!(pokemon_row(&pikachu()), "#025  Pikachu          electric");
  }

  #[test]
  fn test_list_lines_with_load_more_error() {
    let lines = list_lines(&ListState::Success {
      items: vec![pikachu()],
      is_search_result: false,
      error_message: Some("Failed to load more: boom".to_string()),
    });
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2], "! Failed to load more: boom");
  }

  #[test]
  fn test_detail_lines() {
    let lines = detail_lines(&pikachu());
    assert_eq!(lines[0], "#025 Pikachu");
    assert!(lines.contains(&"  Height: 0.4 m".to_string()));
    assert!(lines.contains(&"  Weight: 6.0 kg".to_string()));
    assert!(lines.iter().any(|l| l.starts_with("  Hp") && l.contains("35")));
  }

  #[test]
  fn test_detail_error() {
    let lines = detail_state_lines(&DetailState::Error("Pokémon not found".to_string()));
    assert_eq!(lines, vec!["Error: Pokémon not found".to_string()]);
  }

  #[test]
  fn test_help_lists_every_command() {
    assert_eq!(help_lines().len(), COMMANDS.len());
  }
}
