//! Request-scoped log entries.
//!
//! [`RequestLogger`](crate::middleware::RequestLogger) stores the entry it
//! builds for each request in the request's [`Extensions`]. Anything further
//! down the chain can pull it back out with [`extract`] and log with the
//! request's fields already attached:
//!
//! ```rust
//! use tsu_reqlog::{Request, Response, context};
//!
//! async fn get_user(req: Request) -> Response {
//!     let log = context::extract(req.extensions());
//!     log.with_field("user_id", "42").info("loading user");
//!     Response::text("alice")
//! }
//! ```
//!
//! Entries are values, so enriching the result of `extract` does not change
//! what the middleware sees. Fields that must reach the completion log go
//! through [`add_fields`]:
//!
//! ```rust
//! use tsu_reqlog::{Request, Response, context};
//!
//! async fn checkout(req: Request) -> Response {
//!     context::add_fields(req.extensions(), [("cart_items", 3)]);
//!     Response::text("ok")
//! }
//! ```
//!
//! [`Extensions`] is keyed by type. The carrier lives under a private type,
//! so nothing outside this module can read or clobber it by accident.

use std::sync::{Arc, Mutex, PoisonError};

use http::Extensions;

use crate::log::{Entry, Fields, Value};

/// Shared handle on the carrier installed by [`to_context`].
///
/// The stored entry is fixed when the carrier is created. Fields added
/// afterwards accumulate beside it and are merged back on every
/// [`extract`](LogContext::extract).
#[derive(Clone)]
pub struct LogContext(Arc<Carrier>);

struct Carrier {
    entry: Entry,
    fields: Mutex<Fields>,
}

#[derive(Clone)]
struct CarrierKey(LogContext);

impl LogContext {
    /// Returns a fresh entry: the stored one plus every accumulated field.
    pub fn extract(&self) -> Entry {
        let fields = self.0.fields.lock().unwrap_or_else(PoisonError::into_inner).clone();
        self.0.entry.clone().with_fields(fields)
    }

    /// Adds fields to every later extraction. Existing keys are overwritten.
    pub fn add_fields<I, K, V>(&self, fields: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut acc = self.0.fields.lock().unwrap_or_else(PoisonError::into_inner);
        acc.extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
    }
}

/// Installs `entry` in `extensions`, replacing any earlier carrier.
pub fn to_context(extensions: &mut Extensions, entry: Entry) -> LogContext {
    let ctx = LogContext(Arc::new(Carrier { entry, fields: Mutex::new(Fields::new()) }));
    extensions.insert(CarrierKey(ctx.clone()));
    ctx
}

/// The request's entry, or a discarding one when no carrier was installed.
///
/// Never fails: callers do not need to know whether the logging middleware
/// ran.
pub fn extract(extensions: &Extensions) -> Entry {
    match extensions.get::<CarrierKey>() {
        Some(CarrierKey(ctx)) => ctx.extract(),
        None => Entry::discard(),
    }
}

/// Adds fields to the request's carrier. Does nothing without one.
pub fn add_fields<I, K, V>(extensions: &Extensions, fields: I)
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    if let Some(CarrierKey(ctx)) = extensions.get::<CarrierKey>() {
        ctx.add_fields(fields);
    }
}

/// The carrier handle itself, if one was installed.
pub fn log_context(extensions: &Extensions) -> Option<LogContext> {
    extensions.get::<CarrierKey>().map(|CarrierKey(ctx)| ctx.clone())
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::layer::SubscriberExt;

    use super::*;
    use crate::log::{Capture, Logger};

    fn entry() -> (Entry, Capture) {
        let capture = Capture::default();
        let logger = Logger::from_dispatch(tracing_subscriber::registry().with(capture.clone()));
        (Entry::new(Arc::new(logger)).with_field("method", "GET"), capture)
    }

    #[test]
    fn test_extract_without_carrier_is_noop() {
        let capture = Capture::default();
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(capture.clone()));

        let ext = Extensions::new();
        let log = extract(&ext);
        assert!(log.fields().is_empty());
        log.error("goes nowhere");
        assert!(capture.is_empty());
    }

    #[test]
    fn test_extract_returns_same_fields() {
        let (entry, _) = entry();
        let mut ext = Extensions::new();
        to_context(&mut ext, entry.clone());

        assert_eq!(extract(&ext).fields(), entry.fields());
    }

    #[test]
    fn test_extract_uses_stored_logger() {
        let (entry, capture) = entry();
        let mut ext = Extensions::new();
        to_context(&mut ext, entry);

        extract(&ext).info("hello");
        assert_eq!(capture.len(), 1);
    }

    #[test]
    fn test_enriching_extracted_entry_does_not_touch_carrier() {
        let (entry, _) = entry();
        let mut ext = Extensions::new();
        to_context(&mut ext, entry);

        let _ = extract(&ext).with_field("local", true);
        assert!(!extract(&ext).fields().contains_key("local"));
    }

    #[test]
    fn test_add_fields_visible_to_later_extracts() {
        let (entry, _) = entry();
        let mut ext = Extensions::new();
        let ctx = to_context(&mut ext, entry);

        add_fields(&ext, [("user_id", "42")]);

        assert_eq!(extract(&ext).fields()["user_id"], Value::from("42"));
        assert_eq!(ctx.extract().fields()["user_id"], Value::from("42"));
    }

    #[test]
    fn test_add_fields_last_write_wins() {
        let (entry, _) = entry();
        let mut ext = Extensions::new();
        to_context(&mut ext, entry);

        add_fields(&ext, [("method", "POST")]);
        assert_eq!(extract(&ext).fields()["method"], Value::from("POST"));
    }

    #[test]
    fn test_add_fields_without_carrier_is_noop() {
        let ext = Extensions::new();
        add_fields(&ext, [("ignored", 1)]);
        assert!(log_context(&ext).is_none());
    }

    #[test]
    fn test_to_context_replaces_previous_carrier() {
        let (first, _) = entry();
        let mut ext = Extensions::new();
        to_context(&mut ext, first);
        to_context(&mut ext, Entry::discard().with_field("second", 2));

        let fields = extract(&ext).fields().clone();
        assert!(fields.contains_key("second"));
        assert!(!fields.contains_key("method"));
    }

    #[test]
    fn test_carrier_survives_extension_clone() {
        let (entry, _) = entry();
        let mut ext = Extensions::new();
        let ctx = to_context(&mut ext, entry);

        let copy = ext.clone();
        add_fields(&copy, [("from_copy", true)]);
        assert!(ctx.extract().fields().contains_key("from_copy"));
    }
}
