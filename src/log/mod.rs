//! Structured access logging on top of `tracing`.
//!
//! An [`Entry`] carries a field set and emits `tracing` events with target
//! [`ACCESS_TARGET`]. Each event has the entry's message plus one `fields`
//! value holding the whole field set as a JSON object. Filtering, formatting
//! and output are left to `tracing-subscriber`.
//!
//! A [`Logger`] decides which subscriber receives an entry's events: the
//! application's current one, a dedicated `fmt` subscriber, or nothing.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tracing::Level;
//! use tsu_reqlog::config::Format;
//! use tsu_reqlog::log::{Entry, Logger};
//!
//! let logger = Logger::new(Level::DEBUG, Format::Json);
//! Entry::new(Arc::new(logger)).with_field("job", "reindex").debug("starting");
//! // {"timestamp":"…","level":"DEBUG","fields":{"message":"starting","fields":"{\"job\":\"reindex\"}"},"target":"tsu::access"}
//! ```

mod entry;
mod field;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::field::{Field, Visit};
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt as tsfmt};

use crate::config::{Config, Format};
use crate::error::Error;

pub use entry::Entry;
pub use field::{Fields, Value};

use field::FieldsJson;

/// Target of every event emitted through an [`Entry`].
pub const ACCESS_TARGET: &str = "tsu::access";

/// Installs the process-wide subscriber described by `config`.
///
/// `RUST_LOG` directives are honoured on top of `config.level`.
///
/// # Errors
///
/// [`Error::LoggingInit`] if a global subscriber is already installed.
pub fn init_logging(config: &Config) -> Result<(), Error> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.level).into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry();
    match config.format {
        Format::Text => registry.with(tsfmt::layer().with_filter(filter)).try_init(),
        Format::Json => registry.with(tsfmt::layer().json().with_filter(filter)).try_init(),
    }
    .map_err(|e| Error::LoggingInit(e.to_string()))
}

/// Where an entry's events are dispatched.
#[derive(Clone, Debug, Default)]
pub struct Logger {
    dispatch: Option<Dispatch>,
}

impl Logger {
    /// A dedicated `fmt` subscriber writing to stderr, independent of any
    /// global subscriber.
    pub fn new(level: Level, format: Format) -> Self {
        let builder = tsfmt().with_max_level(level).with_writer(std::io::stderr);
        let dispatch = match format {
            Format::Text => Dispatch::new(builder.finish()),
            Format::Json => Dispatch::new(builder.json().finish()),
        };
        Self::from_dispatch(dispatch)
    }

    /// Events go to whatever subscriber is current where the entry is
    /// emitted.
    pub fn current() -> Self {
        Self { dispatch: None }
    }

    /// Events go to `dispatch`.
    pub fn from_dispatch(dispatch: impl Into<Dispatch>) -> Self {
        Self { dispatch: Some(dispatch.into()) }
    }

    /// A logger that drops everything.
    pub fn discard() -> Self {
        Self::from_dispatch(Dispatch::none())
    }

    pub(crate) fn emit(&self, level: Level, message: &str, fields: &Fields) {
        match &self.dispatch {
            Some(dispatch) => {
                tracing::dispatcher::with_default(dispatch, || event(level, message, fields))
            }
            None => event(level, message, fields),
        }
    }
}

fn event(level: Level, message: &str, fields: &Fields) {
    let fields = FieldsJson(fields);
    match level {
        Level::ERROR => tracing::error!(target: ACCESS_TARGET, fields = %fields, "{message}"),
        Level::WARN  => tracing::warn!(target: ACCESS_TARGET, fields = %fields, "{message}"),
        Level::INFO  => tracing::info!(target: ACCESS_TARGET, fields = %fields, "{message}"),
        Level::DEBUG => tracing::debug!(target: ACCESS_TARGET, fields = %fields, "{message}"),
        _            => tracing::trace!(target: ACCESS_TARGET, fields = %fields, "{message}"),
    }
}

/// One access-log event as seen by a subscriber.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub level: Level,
    pub message: String,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// A [`Layer`] that keeps every access-log event in memory. Clones share the
/// same buffer.
///
/// ```rust
/// use std::sync::Arc;
/// use tracing_subscriber::layer::SubscriberExt;
/// use tsu_reqlog::log::{Capture, Entry, Logger};
///
/// let capture = Capture::default();
/// let logger = Logger::from_dispatch(tracing_subscriber::registry().with(capture.clone()));
/// Entry::new(Arc::new(logger)).with_field("status", 200u16).info("done");
///
/// assert_eq!(capture.records()[0].fields["status"], 200);
/// ```
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<Record>>>);

impl Capture {
    pub fn records(&self) -> Vec<Record> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl<S: Subscriber> Layer<S> for Capture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().target() != ACCESS_TARGET {
            return;
        }
        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);
        let record = Record {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        };
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(record);
    }
}

#[derive(Default)]
struct RecordVisitor {
    message: String,
    fields: serde_json::Map<String, serde_json::Value>,
}

impl Visit for RecordVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            "fields" => {
                if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(&format!("{value:?}")) {
                    self.fields = map;
                }
            }
            _ => {}
        }
    }
}
