//! Console line classification
//!
//! Turns one raw Minecraft console line into a chat/event record, or nothing.
//! All matching rules come from operator-supplied regular expressions compiled
//! once at startup into a [`PatternSet`].

pub mod classifier;
pub mod patterns;
pub mod record;
pub mod username;

pub use classifier::{classify, LineClassifier};
pub use patterns::{PatternConfig, PatternError, PatternSet};
pub use record::ClassifiedRecord;
pub use username::canonicalize;
