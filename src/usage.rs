//! Usage pattern matching
//!
//! Command usage text is a list of lines such as
//! ``"`{prefix}prune server <days>` - Prunes the server"``. Given the arguments a
//! user actually typed, [`match_usage`] picks out the lines they were aiming
//! for so the help shown after a bad invocation stays relevant.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Placeholder substituted with the guild's command prefix
pub const PREFIX_PLACEHOLDER: &str = "{prefix}";

static SINGLE_SUB_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]+$").expect("valid regex"));
static MULTIPLE_SUB_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-z]+(\|+[A-z]+)+$").expect("valid regex"));
static REQUIRED_ARG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<.+>$").expect("valid regex"));
static OPTIONAL_ARG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[.+\]$").expect("valid regex"));
static ARGUMENT_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("valid regex"));

/// Classification of one token in a usage pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageSymbol {
    /// A literal subcommand, e.g. `server`
    SingleSubCommand,
    /// Pipe-separated subcommand alternatives, e.g. `add|remove`
    MultipleSubCommand,
    /// `<name>`
    RequiredArg,
    /// `[name]`
    OptionalArg,
}

impl UsageSymbol {
    /// Declaration order. Later symbols win when more than one matches.
    pub const ALL: [Self; 4] = [
        Self::SingleSubCommand,
        Self::MultipleSubCommand,
        Self::RequiredArg,
        Self::OptionalArg,
    ];

    fn regex(self) -> &'static Regex {
        match self {
            Self::SingleSubCommand => &SINGLE_SUB_COMMAND,
            Self::MultipleSubCommand => &MULTIPLE_SUB_COMMAND,
            Self::RequiredArg => &REQUIRED_ARG,
            Self::OptionalArg => &OPTIONAL_ARG,
        }
    }

    #[must_use]
    pub fn matches(self, token: &str) -> bool {
        self.regex().is_match(token)
    }

    /// Whether `arg` satisfies this symbol's `literal`
    fn accepts(self, literal: &str, arg: Option<&str>) -> bool {
        match self {
            Self::SingleSubCommand => arg.is_some_and(|arg| arg.eq_ignore_ascii_case(literal)),
            // Only the first alternative is compared
            Self::MultipleSubCommand => arg.is_some_and(|arg| {
                literal
                    .split('|')
                    .next()
                    .is_some_and(|first| arg.eq_ignore_ascii_case(first))
            }),
            Self::RequiredArg | Self::OptionalArg => true,
        }
    }
}

/// Classify each whitespace-separated token of `pattern` by position.
///
/// Tokens matching no symbol leave a gap in the positions.
#[must_use]
pub fn classify(pattern: &str) -> BTreeMap<usize, (UsageSymbol, &str)> {
    let mut symbols = BTreeMap::new();
    for (position, token) in pattern.split_whitespace().enumerate() {
        for symbol in UsageSymbol::ALL {
            if symbol.matches(token) {
                symbols.insert(position, (symbol, token));
            }
        }
    }
    symbols
}

/// The usage lines of `command` that `args` fit, in their original order.
///
/// With no arguments every line is returned.
pub fn match_usage<'a, S: AsRef<str>>(
    usage: &'a str,
    command: &str,
    args: &[S],
) -> Vec<&'a str> {
    if args.is_empty() {
        return usage.lines().collect();
    }

    let invocation = format!("{PREFIX_PLACEHOLDER}{command}");
    usage
        .lines()
        .filter(|line| {
            let stripped = line.replace(&invocation, "");
            let span = ARGUMENT_SPAN
                .captures(stripped.trim())
                .and_then(|caps| caps.get(1));
            let Some(span) = span else {
                return false;
            };
            line_applies(span.as_str().trim(), args)
        })
        .collect()
}

fn line_applies<S: AsRef<str>>(pattern: &str, args: &[S]) -> bool {
    let symbols = classify(pattern);
    if args.len() > symbols.len() {
        return false;
    }
    symbols.iter().all(|(&position, &(symbol, literal))| {
        symbol.accepts(literal, args.get(position).map(AsRef::as_ref))
    })
}

/// Replace the prefix placeholder for display
#[must_use]
pub fn format_usage(line: &str, prefix: &str) -> String {
    line.replace(PREFIX_PLACEHOLDER, prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRUNE_USAGE: &str = "`{prefix}prune server <days>` - Prunes the entire server\n\
                               `{prefix}prune confirm` - Confirms a user's actions";

    #[test]
    fn test_classify() {
        let symbols = classify("add|remove <user> [reason] list");
        assert_eq!(symbols[&0], (UsageSymbol::MultipleSubCommand, "add|remove"));
        assert_eq!(symbols[&1], (UsageSymbol::RequiredArg, "<user>"));
        assert_eq!(symbols[&2], (UsageSymbol::OptionalArg, "[reason]"));
        assert_eq!(symbols[&3], (UsageSymbol::SingleSubCommand, "list"));
    }

    #[test]
    fn test_later_symbol_wins_on_overlap() {
        // `[` falls inside `A-z`, so this also fits the alternatives pattern
        assert!(UsageSymbol::MultipleSubCommand.matches("[a|b]"));
        let symbols = classify("[a|b]");
        assert_eq!(symbols[&0], (UsageSymbol::OptionalArg, "[a|b]"));
    }

    #[test]
    fn test_unclassified_tokens_leave_gaps() {
        let symbols = classify("<user> 123 [reason]");
        assert_eq!(symbols.len(), 2);
        assert!(!symbols.contains_key(&1));
    }

    #[test]
    fn test_no_args_returns_every_line() {
        let usage = "`{prefix}tag <name>`\nplain description\n`{prefix}tag list`";
        let none: [&str; 0] = [];
        assert_eq!(match_usage(usage, "tag", &none), usage.lines().collect::<Vec<_>>());
    }

    #[test]
    fn test_required_arg_matches_anything() {
        let usage = "`{prefix}warnings <user>` - Lists warnings";
        assert_eq!(match_usage(usage, "warnings", &["someone"]), vec![usage]);
    }

    #[test]
    fn test_multiple_sub_command_checks_first_alternative_only() {
        let usage = "`{prefix}role a|b`";
        assert_eq!(match_usage(usage, "role", &["A"]).len(), 1);
        assert_eq!(match_usage(usage, "role", &["a"]).len(), 1);
        assert!(match_usage(usage, "role", &["b"]).is_empty());
    }

    #[test]
    fn test_too_many_args_rejects_line() {
        let usage = "`{prefix}kick <user>`";
        assert!(match_usage(usage, "kick", &["a", "b"]).is_empty());
    }

    #[test]
    fn test_lines_without_span_are_skipped() {
        let usage = "No backticks here\n`{prefix}ban <user> [reason]`";
        assert_eq!(match_usage(usage, "ban", &["x"]), vec!["`{prefix}ban <user> [reason]`"]);
    }

    #[test]
    fn test_prune_usage() {
        let lines: Vec<&str> = PRUNE_USAGE.lines().collect();
        assert_eq!(match_usage(PRUNE_USAGE, "prune", &["server", "5"]), vec![lines[0]]);
        assert_eq!(match_usage(PRUNE_USAGE, "prune", &["CONFIRM"]), vec![lines[1]]);
        assert!(match_usage(PRUNE_USAGE, "prune", &["nonsense"]).is_empty());
    }

    #[test]
    fn test_missing_sub_command_arg_disqualifies() {
        let usage = "`{prefix}tag <name> edit`";
        assert!(match_usage(usage, "tag", &["foo"]).is_empty());
        assert_eq!(match_usage(usage, "tag", &["foo", "EDIT"]).len(), 1);
    }

    #[test]
    fn test_format_usage() {
        assert_eq!(format_usage("`{prefix}prune confirm`", "!"), "`!prune confirm`");
    }
}
