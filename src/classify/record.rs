//! Classified record produced from a console line

use serde::Serialize;

/// A chat or server event extracted from a single console line
///
/// Fields are fixed at construction; consumers read them through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedRecord {
    username: String,
    message: String,
}

impl ClassifiedRecord {
    pub fn new(username: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            message: message.into(),
        }
    }

    /// Speaker name, or the configured server name for system lines
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Message text without the console envelope
    pub fn message(&self) -> &str {
        &self.message
    }
}
