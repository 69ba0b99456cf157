//! Line classifier
//!
//! Decision order for a raw console line:
//! 1. strip the server envelope (no match: ignored)
//! 2. `<name> text` chat lines
//! 3. `* name text` action lines, when enabled
//! 4. whitelisted server lines, reported under the server name

use tracing::{debug, error};

use super::patterns::PatternSet;
use super::record::ClassifiedRecord;
use super::username::canonicalize;

/// Classifies raw console lines with a fixed [`PatternSet`]
///
/// Holds no mutable state, so one instance can be shared across tasks.
#[derive(Debug, Clone)]
pub struct LineClassifier {
    patterns: PatternSet,
}

impl LineClassifier {
    pub fn new(patterns: PatternSet) -> Self {
        Self { patterns }
    }

    /// Classify one raw line
    pub fn classify(&self, raw_line: &str) -> Option<ClassifiedRecord> {
        classify(raw_line, &self.patterns)
    }
}

/// Classify one raw line against `patterns`
pub fn classify(raw_line: &str, patterns: &PatternSet) -> Option<ClassifiedRecord> {
    let verbose = patterns.verbose;
    if verbose {
        debug!("Received {}", raw_line);
    }

    let remainder = match patterns
        .server_prefix
        .captures(raw_line)
        .and_then(|caps| caps.get(1))
    {
        Some(m) => m.as_str(),
        None => {
            if verbose {
                debug!(
                    "Line does not match server prefix {:?}: {:?}",
                    patterns.server_prefix.as_str(),
                    raw_line
                );
            }
            return None;
        }
    };

    if remainder.starts_with('<') {
        classify_chat(remainder, patterns)
    } else if remainder.starts_with("* ") {
        classify_action(remainder, patterns)
    } else {
        classify_server(raw_line, remainder, patterns)
    }
}

fn classify_chat(remainder: &str, patterns: &PatternSet) -> Option<ClassifiedRecord> {
    if patterns.verbose {
        debug!("A player sent a chat message");
    }

    let parsed = patterns.chat.captures(remainder).and_then(|caps| {
        let name = caps.get(1)?.as_str();
        let text = caps.get(2)?.as_str();
        Some((name, text))
    });

    let Some((name, text)) = parsed else {
        error!("Could not parse message: {}", remainder);
        return None;
    };

    // Ranks and team tags come before the name, separated by whitespace
    let username = canonicalize(name.split_whitespace().last().unwrap_or(""));
    if username.is_empty() {
        error!("Chat message has no username: {}", remainder);
        return None;
    }

    if patterns.verbose {
        debug!("Username: {}", name);
        debug!("Text: {}", text);
    }

    Some(ClassifiedRecord::new(username, text))
}

fn classify_action(remainder: &str, patterns: &PatternSet) -> Option<ClassifiedRecord> {
    if !patterns.show_player_me {
        if patterns.verbose {
            debug!("Ignoring /me message (show_player_me disabled)");
        }
        return None;
    }

    let caps = patterns.action.captures(remainder)?;
    let username = caps.get(1)?.as_str();
    let action = caps.get(2)?.as_str();

    if patterns.verbose {
        debug!("A player used /me: {} {}", username, action);
    }

    Some(ClassifiedRecord::new(username, format!("*{}*", action)))
}

fn classify_server(
    raw_line: &str,
    remainder: &str,
    patterns: &PatternSet,
) -> Option<ClassifiedRecord> {
    if !patterns.whitelist.is_match(raw_line) {
        return None;
    }

    if patterns.verbose {
        debug!("A server message was sent: {}", raw_line);
    }

    Some(ClassifiedRecord::new(patterns.server_name.as_str(), remainder))
}
