/// Commands of the interactive browser and how typed input resolves to them

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub usage: &'static str,
  pub description: &'static str,
  /// Also matched by prefix or substring. Destructive commands are not.
  pub fuzzy: bool,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "popular",
    aliases: &["p", "pop"],
    usage: "popular",
    description: "Browse popular movies",
    fuzzy: true,
  },
  Command {
    name: "top-rated",
    aliases: &["t", "top"],
    usage: "top-rated",
    description: "Browse top rated movies",
    fuzzy: true,
  },
  Command {
    name: "upcoming",
    aliases: &["u", "soon"],
    usage: "upcoming",
    description: "Browse upcoming releases",
    fuzzy: true,
  },
  Command {
    name: "now-playing",
    aliases: &["n", "now"],
    usage: "now-playing",
    description: "Browse movies in theaters",
    fuzzy: true,
  },
  Command {
    name: "search",
    aliases: &["s", "find"],
    usage: "search <title>",
    description: "Search movies by title",
    fuzzy: true,
  },
  Command {
    name: "more",
    aliases: &["m", "next"],
    usage: "more",
    description: "Load the next page of the current list",
    fuzzy: true,
  },
  Command {
    name: "refetch",
    aliases: &["r", "reload", "retry"],
    usage: "refetch",
    description: "Reload the current view from page 1",
    fuzzy: true,
  },
  Command {
    name: "movie",
    aliases: &["d", "details", "info"],
    usage: "movie <id>",
    description: "Show movie details",
    fuzzy: true,
  },
  Command {
    name: "back",
    aliases: &["b"],
    usage: "back",
    description: "Return to the previous view",
    fuzzy: true,
  },
  Command {
    name: "fav",
    aliases: &["f", "favorite", "toggle"],
    usage: "fav <id>",
    description: "Add or remove a movie from favorites",
    fuzzy: true,
  },
  Command {
    name: "favorites",
    aliases: &["favs"],
    usage: "favorites",
    description: "Show favorites",
    fuzzy: true,
  },
  Command {
    name: "sort",
    aliases: &["o", "order"],
    usage: "sort <mode>",
    description: "Sort favorites (title|rating|date)-(asc|desc)",
    fuzzy: true,
  },
  Command {
    name: "clear-favorites",
    aliases: &["clear"],
    usage: "clear-favorites",
    description: "Remove all favorites",
    fuzzy: false,
  },
  Command {
    name: "view",
    aliases: &["v", "mode"],
    usage: "view [simple|advanced]",
    description: "Toggle or set the list detail level",
    fuzzy: true,
  },
  Command {
    name: "theme",
    aliases: &[],
    usage: "theme [light|dark]",
    description: "Toggle or set the color theme",
    fuzzy: true,
  },
  Command {
    name: "help",
    aliases: &["h", "?"],
    usage: "help",
    description: "List commands",
    fuzzy: true,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    usage: "quit",
    description: "Exit marquee",
    fuzzy: true,
  },
];

/// How well `input` (lower-cased) names `cmd`; lower is better.
fn rank(cmd: &Command, input: &str) -> Option<u32> {
  if cmd.name == input {
    Some(0)
  } else if cmd.aliases.contains(&input) {
    Some(1)
  } else if !cmd.fuzzy {
    None
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if cmd.aliases.iter().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else if cmd.aliases.iter().any(|a| a.contains(input)) {
    Some(5)
  } else {
    None
  }
}

/// Commands matching `input`, best first.
///
/// Exact names beat aliases, which beat prefixes, which beat substrings.
/// Commands that are not `fuzzy` only match exactly.
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.to_lowercase();
  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&'static Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| rank(cmd, &input).map(|r| (cmd, r)))
    .collect();
  // Stable, so declaration order breaks ties
  matches.sort_by_key(|(_, r)| *r);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Split an input line into the best matching command and its argument text.
pub fn parse(line: &str) -> Option<(&'static Command, &str)> {
  let line = line.trim();
  let (word, rest) = match line.split_once(char::is_whitespace) {
    Some((word, rest)) => (word, rest.trim()),
    None => (line, ""),
  };
  if word.is_empty() {
    return None;
  }
  get_suggestions(word).first().map(|cmd| (*cmd, rest))
}
