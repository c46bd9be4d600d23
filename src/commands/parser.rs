use std::collections::{BTreeSet, HashMap};

use regex::Regex;

use super::types::{Command, CommandKind, Modifiers};
use crate::config::BotConfig;
use crate::error::SmyklotError;

const CI_PHRASES: &str = r"after\s+ci|when\s+green|once\s+ci\s+passes|when\s+checks\s+pass";

/// Compiled command grammar for one configuration.
#[derive(Debug, Clone)]
pub struct Grammar {
    prefix: Regex,
    required_suffix: Regex,
    mention: Option<Regex>,
    ci_phrase: Regex,
    bare_enabled: bool,
    unapprove_enabled: bool,
    aliases: HashMap<String, String>,
    allowed: Vec<String>,
}

impl Grammar {
    pub fn new(config: &BotConfig) -> Result<Self, SmyklotError> {
        if config.command_prefix.is_empty() {
            return Err(SmyklotError::invalid(
                "command_prefix",
                "prefix must not be empty",
            ));
        }
        let prefix = regex::escape(&config.command_prefix);
        let compile = |pattern: String| {
            Regex::new(&pattern).map_err(|e| SmyklotError::invalid("command_prefix", e.to_string()))
        };

        let mention = if config.disable_mentions {
            None
        } else {
            Some(compile(format!(
                r"(?i)@{}\s+(\w+)",
                regex::escape(config.mention_name())
            ))?)
        };

        Ok(Self {
            prefix: compile(format!(r"(?i){prefix}(\w+)"))?,
            required_suffix: compile(format!(r"(?i){prefix}\w+:required\b"))?,
            mention,
            ci_phrase: compile(format!(r"(?i)(?:\b(required)\s+)?\b(?:{CI_PHRASES})\b"))?,
            bare_enabled: !config.disable_bare_commands,
            unapprove_enabled: !config.disable_unapprove,
            aliases: config
                .command_aliases
                .iter()
                .map(|(alias, target)| (alias.to_lowercase(), target.to_lowercase()))
                .collect(),
            allowed: config
                .allowed_commands
                .iter()
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
        })
    }

    pub fn interpret(&self, body: &str) -> Command {
        if body.trim().is_empty() {
            return Command::empty(body);
        }

        // Passes run in priority order, so first-seen order is priority order.
        let mut found: Vec<CommandKind> = Vec::new();
        let mut record = |kind: Option<CommandKind>| {
            if let Some(kind) = kind {
                if !found.contains(&kind) {
                    found.push(kind);
                }
            }
        };

        for captures in self.prefix.captures_iter(body) {
            record(self.resolve(&captures[1]));
        }
        if let Some(mention) = &self.mention {
            for captures in mention.captures_iter(body) {
                record(self.resolve(&captures[1]));
            }
        }
        if self.bare_enabled {
            for token in body.split_whitespace() {
                record(self.resolve(token));
            }
        }

        Command {
            kinds: canonical_kinds(&found),
            primary: found.first().copied(),
            modifiers: self.modifiers(body),
            raw: body.to_string(),
        }
    }

    fn resolve(&self, token: &str) -> Option<CommandKind> {
        let word = token.to_lowercase();
        let resolved = self.aliases.get(&word).cloned().unwrap_or(word);
        let kind = CommandKind::from_word(&resolved)?;

        if kind == CommandKind::Unapprove && !self.unapprove_enabled {
            return None;
        }
        if !self.allowed.is_empty()
            && !self.allowed.iter().any(|a| a == &resolved || a == kind.name())
        {
            return None;
        }
        Some(kind)
    }

    fn modifiers(&self, body: &str) -> Modifiers {
        let mut modifiers = Modifiers::default();
        let mut required_phrase = false;
        for captures in self.ci_phrase.captures_iter(body) {
            modifiers.wait_for_ci = true;
            required_phrase |= captures.get(1).is_some();
        }
        modifiers.required_checks_only =
            modifiers.wait_for_ci && (required_phrase || self.required_suffix.is_match(body));
        modifiers
    }
}

/// `help` answers alone; several merge methods collapse to the highest-priority one.
fn canonical_kinds(found: &[CommandKind]) -> Vec<CommandKind> {
    if found.contains(&CommandKind::Help) {
        return vec![CommandKind::Help];
    }

    let merge = found.iter().copied().find(CommandKind::is_merge_family);
    let kinds: BTreeSet<CommandKind> = found
        .iter()
        .copied()
        .filter(|k| !k.is_merge_family() || Some(*k) == merge)
        .collect();
    kinds.into_iter().collect()
}
