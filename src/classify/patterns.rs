//! Operator-configurable matching patterns

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Envelope used when no server prefix is configured
pub const FALLBACK_SERVER_PREFIX: &str = r"\[Server thread/INFO\]:";

/// `/me` lines: a 1-16 character player name followed by free text
const ACTION_PATTERN: &str = r"^\* ([A-Za-z0-9_]{1,16}) (.*)$";

/// Errors raised while compiling a [`PatternSet`]
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    /// A pattern is not a valid regular expression
    #[error("Invalid {name} pattern: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: regex::Error,
    },

    /// The chat pattern must capture a name and a message
    #[error("Chat pattern must have at least 2 capture groups, found {0}")]
    ChatGroups(usize),

    /// The server display name is used as a username and cannot be empty
    #[error("Server name must not be empty")]
    EmptyServerName,
}

/// Raw pattern configuration as written by the operator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Console envelope to strip. Without a capture group, ` (.*)` is appended.
    /// Empty means [`FALLBACK_SERVER_PREFIX`].
    #[serde(default)]
    pub server_prefix: String,
    /// Chat matcher applied to the stripped line: group 1 = name, group 2 = text
    #[serde(default = "default_chat")]
    pub chat: String,
    /// Forward `/me` action lines
    #[serde(default)]
    pub show_player_me: bool,
    /// Server lines to forward, matched against the full raw line. Empty matches every line.
    #[serde(default = "default_whitelisted_console")]
    pub whitelisted_console: String,
    /// Username used for forwarded server lines
    #[serde(default = "default_server_name")]
    pub server_name: String,
}

fn default_chat() -> String {
    "^<([^>]*)> (.*)".to_string()
}

fn default_whitelisted_console() -> String {
    r": [A-Za-z0-9_]{1,16} (?:joined|left) the game$".to_string()
}

fn default_server_name() -> String {
    "Server".to_string()
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            server_prefix: String::new(),
            chat: default_chat(),
            show_player_me: false,
            whitelisted_console: default_whitelisted_console(),
            server_name: default_server_name(),
        }
    }
}

/// Compiled, read-only matchers used by the classifier
#[derive(Debug, Clone)]
pub struct PatternSet {
    pub(crate) server_prefix: Regex,
    pub(crate) chat: Regex,
    pub(crate) action: Regex,
    pub(crate) show_player_me: bool,
    pub(crate) whitelist: Regex,
    pub(crate) server_name: String,
    pub(crate) verbose: bool,
}

impl PatternSet {
    /// Compile every configured pattern
    pub fn compile(config: &PatternConfig) -> Result<Self, PatternError> {
        let prefix_source = if config.server_prefix.is_empty() {
            FALLBACK_SERVER_PREFIX
        } else {
            config.server_prefix.as_str()
        };
        let mut server_prefix = compile("server_prefix", prefix_source)?;
        if server_prefix.captures_len() < 2 {
            server_prefix = compile("server_prefix", &format!("{} (.*)", prefix_source))?;
        }

        let chat = compile("chat", &config.chat)?;
        let groups = chat.captures_len() - 1;
        if groups < 2 {
            return Err(PatternError::ChatGroups(groups));
        }

        let whitelist = compile("whitelisted_console", &config.whitelisted_console)?;

        if config.server_name.trim().is_empty() {
            return Err(PatternError::EmptyServerName);
        }

        Ok(Self {
            server_prefix,
            chat,
            action: compile("action", ACTION_PATTERN)?,
            show_player_me: config.show_player_me,
            whitelist,
            server_name: config.server_name.clone(),
            verbose: false,
        })
    }

    /// Enable decision tracing
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn server_prefix(&self) -> &str {
        self.server_prefix.as_str()
    }

    pub fn show_player_me(&self) -> bool {
        self.show_player_me
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

fn compile(name: &'static str, pattern: &str) -> Result<Regex, PatternError> {
    Regex::new(pattern).map_err(|source| PatternError::Invalid { name, source })
}
