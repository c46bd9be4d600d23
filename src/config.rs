use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::SmyklotError;

pub const ENV_PREFIX: &str = "SMYKLOT";
pub const CONFIG_JSON_VAR: &str = "SMYKLOT_CONFIG";

/// Bot behaviour switches. Built once per invocation and passed by reference.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BotConfig {
    /// Suppress comment bodies on success (reactions only)
    pub quiet_success: bool,
    /// Suppress comment bodies for reaction-triggered outcomes
    pub quiet_reactions: bool,
    /// Suppress the "waiting for CI" comment
    pub quiet_pending: bool,
    /// Commands that may be used; empty allows all
    pub allowed_commands: Vec<String>,
    /// Alias -> command word
    pub command_aliases: HashMap<String, String>,
    pub command_prefix: String,
    pub disable_mentions: bool,
    pub disable_bare_commands: bool,
    pub disable_unapprove: bool,
    pub disable_reactions: bool,
    pub disable_deleted_comments: bool,
    pub allow_self_approval: bool,
    /// Login the bot acts as, used to recognise its own reviews, comments and reactions
    pub bot_username: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            quiet_success: false,
            quiet_reactions: false,
            quiet_pending: false,
            allowed_commands: Vec::new(),
            command_aliases: HashMap::new(),
            command_prefix: "/".to_string(),
            disable_mentions: false,
            disable_bare_commands: false,
            disable_unapprove: false,
            disable_reactions: false,
            disable_deleted_comments: false,
            allow_self_approval: false,
            bot_username: "smyklot[bot]".to_string(),
        }
    }
}

/// Values given explicitly on the command line. They win over every other source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub quiet_success: Option<bool>,
    pub quiet_reactions: Option<bool>,
    pub quiet_pending: Option<bool>,
    pub allowed_commands: Option<Vec<String>>,
    pub command_aliases: Option<HashMap<String, String>>,
    pub command_prefix: Option<String>,
    pub disable_mentions: Option<bool>,
    pub disable_bare_commands: Option<bool>,
    pub disable_unapprove: Option<bool>,
    pub disable_reactions: Option<bool>,
    pub disable_deleted_comments: Option<bool>,
    pub allow_self_approval: Option<bool>,
}

impl BotConfig {
    /// Load with precedence (lowest first): defaults, `SMYKLOT_CONFIG` JSON,
    /// `SMYKLOT_<KEY>` variables, then `overrides`.
    pub fn load(overrides: &ConfigOverrides) -> Result<Self, SmyklotError> {
        let json = std::env::var(CONFIG_JSON_VAR).ok();
        Self::load_from(json.as_deref(), None, overrides)
    }

    /// Like [`load`](Self::load) with explicit sources. `env` replaces the process
    /// environment when given.
    pub fn load_from(
        json: Option<&str>,
        env: Option<HashMap<String, String>>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, SmyklotError> {
        let mut builder = Config::builder();

        if let Some(json) = json.filter(|j| !j.trim().is_empty()) {
            builder = builder.add_source(File::from_str(json, FileFormat::Json));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("allowed_commands")
                .ignore_empty(true)
                .source(env),
        );

        let mut config: BotConfig = builder.build()?.try_deserialize()?;
        config.apply(overrides);
        if config.command_prefix.is_empty() {
            return Err(SmyklotError::invalid(
                "command_prefix",
                "prefix must not be empty",
            ));
        }
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        let set = |target: &mut bool, value: Option<bool>| {
            if let Some(value) = value {
                *target = value;
            }
        };
        set(&mut self.quiet_success, overrides.quiet_success);
        set(&mut self.quiet_reactions, overrides.quiet_reactions);
        set(&mut self.quiet_pending, overrides.quiet_pending);
        set(&mut self.disable_mentions, overrides.disable_mentions);
        set(&mut self.disable_bare_commands, overrides.disable_bare_commands);
        set(&mut self.disable_unapprove, overrides.disable_unapprove);
        set(&mut self.disable_reactions, overrides.disable_reactions);
        set(&mut self.disable_deleted_comments, overrides.disable_deleted_comments);
        set(&mut self.allow_self_approval, overrides.allow_self_approval);

        if let Some(allowed) = &overrides.allowed_commands {
            self.allowed_commands = allowed.clone();
        }
        if let Some(aliases) = &overrides.command_aliases {
            self.command_aliases = aliases.clone();
        }
        if let Some(prefix) = &overrides.command_prefix {
            self.command_prefix = prefix.clone();
        }
    }

    /// Name used in `@name command` mentions: the bot login without its `[bot]` suffix.
    pub fn mention_name(&self) -> &str {
        self.bot_username.trim_end_matches("[bot]")
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<(), SmyklotError> {
        if Path::new(".env").exists() {
            dotenvy::dotenv().map_err(|e| SmyklotError::invalid(".env", e.to_string()))?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}
