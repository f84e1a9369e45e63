//! Browser commands, autocomplete and argument parsing

use color_eyre::{eyre::eyre, Result};

use crate::preferences::{SortField, SortPreference};

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub usage: &'static str,
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "more",
    aliases: &["m", "next", "n"],
    usage: "more",
    description: "Load the next page",
  },
  Command {
    name: "search",
    aliases: &["s", "find", "/"],
    usage: "search <name>",
    description: "Look up a Pokémon by name",
  },
  Command {
    name: "clear",
    aliases: &["c", "reset"],
    usage: "clear",
    description: "Leave search and show the list",
  },
  Command {
    name: "sort",
    aliases: &["o", "order"],
    usage: "sort <id|name> [asc|desc]",
    description: "Change the list order",
  },
  Command {
    name: "show",
    aliases: &["d", "detail", "info"],
    usage: "show <id>",
    description: "Show one Pokémon in detail",
  },
  Command {
    name: "retry",
    aliases: &["r", "reload"],
    usage: "retry",
    description: "Retry after an error",
  },
  Command {
    name: "status",
    aliases: &["st", "stats"],
    usage: "status",
    description: "Connectivity and cache status",
  },
  Command {
    name: "help",
    aliases: &["h", "?"],
    usage: "help",
    description: "List commands",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    usage: "quit",
    description: "Exit pokedex",
  },
];

/// A parsed command line
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
  More,
  Search(String),
  Clear,
  Sort(SortPreference),
  Show(u32),
  Retry,
  Status,
  Help,
  Quit,
}

/// How a typed word matched a command, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Match {
  Name,
  Alias,
  NamePrefix,
  AliasPrefix,
  /// Found inside the name or an alias; carries the earliest offset
  Infix(usize),
}

impl Match {
  fn is_exact(self) -> bool {
    matches!(self, Match::Name | Match::Alias)
  }
}

fn match_word(cmd: &Command, word: &str) -> Option<Match> {
  if cmd.name == word {
    Some(Match::Name)
  } else if cmd.aliases.contains(&word) {
    Some(Match::Alias)
  } else if cmd.name.starts_with(word) {
    Some(Match::NamePrefix)
  } else if cmd.aliases.iter().any(|a| a.starts_with(word)) {
    Some(Match::AliasPrefix)
  } else {
    std::iter::once(cmd.name)
      .chain(cmd.aliases.iter().copied())
      .filter_map(|candidate| candidate.find(word))
      .min()
      .map(Match::Infix)
  }
}

/// Commands matching `word`, best match first. Equal matches prefer the
/// shorter name, then table order.
fn ranked(word: &str) -> Vec<(&'static Command, Match)> {
  let word = word.to_lowercase();
  let mut found: Vec<_> = COMMANDS
    .iter()
    .filter_map(|cmd| match_word(cmd, &word).map(|m| (cmd, m)))
    .collect();
  found.sort_by_key(|(cmd, m)| (*m, cmd.name.len()));
  found
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  if input.is_empty() {
    return COMMANDS.iter().collect();
  }
  ranked(input).into_iter().map(|(cmd, _)| cmd).collect()
}

/// Parse one input line. A line that is not a command is a search.
pub fn parse(line: &str) -> Result<Action> {
  let line = line.trim();
  let (word, rest) = match line.split_once(char::is_whitespace) {
    Some((word, rest)) => (word, rest.trim()),
    None => (line, ""),
  };

  if word.is_empty() {
    return Err(eyre!("Empty command"));
  }

  // Only exact names, aliases and unambiguous name prefixes count as
  // commands, so a Pokémon name is never swallowed by one
  let command = match ranked(word).as_slice() {
    [(cmd, m), ..] if m.is_exact() => *cmd,
    [(cmd, Match::NamePrefix)] => *cmd,
    _ => return Ok(Action::Search(line.to_string())),
  };

  match command.name {
    "more" => Ok(Action::More),
    "search" => {
      if rest.is_empty() {
        Err(eyre!("Usage: {}", command.usage))
      } else {
        Ok(Action::Search(rest.to_string()))
      }
    }
    "clear" => Ok(Action::Clear),
    "sort" => parse_sort(rest).map(Action::Sort),
    "show" => rest
      .parse::<u32>()
      .map(Action::Show)
      .map_err(|_| eyre!("Usage: {}", command.usage)),
    "retry" => Ok(Action::Retry),
    "status" => Ok(Action::Status),
    "help" => Ok(Action::Help),
    "quit" => Ok(Action::Quit),
    other => Err(eyre!("Unhandled command '{}'", other)),
  }
}

fn parse_sort(args: &str) -> Result<SortPreference> {
  let mut parts = args.split_whitespace();
  let field: SortField = parts
    .next()
    .ok_or_else(|| eyre!("Usage: sort <id|name> [asc|desc]"))?
    .parse()?;

  let ascending = match parts.next().map(str::to_lowercase).as_deref() {
    None | Some("asc") | Some("ascending") => true,
    Some("desc") | Some("descending") => false,
    Some(other) => return Err(eyre!("Unknown sort direction '{}'", other)),
  };

  Ok(SortPreference { field, ascending })
}
