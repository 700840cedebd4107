//! Log entries: a logger reference plus accumulated fields.

use std::sync::{Arc, OnceLock};

use tracing::Level;

use super::Logger;
use super::field::{Fields, Value};

/// A structured log entry bound to a [`Logger`].
///
/// Entries are values: `with_field` and `with_fields` consume the entry and
/// return an enriched one. Clone an entry to derive two independent copies.
///
/// ```rust
/// use std::sync::Arc;
/// use tsu_reqlog::log::{Entry, Logger};
///
/// let entry = Entry::new(Arc::new(Logger::discard()))
///     .with_field("user", "alice")
///     .with_field("attempt", 3);
/// entry.info("signed in");
/// ```
#[derive(Clone)]
pub struct Entry {
    logger: Arc<Logger>,
    fields: Fields,
}

impl Entry {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self { logger, fields: Fields::new() }
    }

    /// An entry whose records go nowhere.
    ///
    /// All discard entries share one logger.
    pub fn discard() -> Self {
        static DISCARD: OnceLock<Arc<Logger>> = OnceLock::new();
        let logger = DISCARD.get_or_init(|| Arc::new(Logger::discard()));
        Self::new(Arc::clone(logger))
    }

    pub fn logger(&self) -> &Arc<Logger> { &self.logger }
    pub fn fields(&self) -> &Fields { &self.fields }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Merges `fields` into this entry. Existing keys are overwritten.
    pub fn with_fields<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.fields.extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Emits one event at `level` through the entry's logger. Whether it is
    /// recorded is up to the subscriber.
    pub fn log(&self, level: Level, message: &str) {
        self.logger.emit(level, message, &self.fields);
    }

    pub fn error(&self, message: &str) { self.log(Level::ERROR, message) }
    pub fn warn(&self, message: &str)  { self.log(Level::WARN, message) }
    pub fn info(&self, message: &str)  { self.log(Level::INFO, message) }
    pub fn debug(&self, message: &str) { self.log(Level::DEBUG, message) }
    pub fn trace(&self, message: &str) { self.log(Level::TRACE, message) }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry").field("fields", &self.fields).finish_non_exhaustive()
    }
}
