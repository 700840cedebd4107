//! Request logging middleware.
//!
//! [`RequestLogger`] logs every request twice: once on the way in
//! (`started handling request`, optional) and once after the chain has
//! written its response (`completed handling request`). Between the two it
//! stores the request's [`Entry`] in the request's extensions, where handlers
//! reach it through [`context::extract`](crate::context::extract).
//!
//! | Event | Fields |
//! |---|---|
//! | start | `request_id`*, `request`, `method`, `remote` |
//! | completion | start fields, `status`, `text_status`, `took`, `measure#<name>.latency` |
//!
//! \* only when the request carries `X-Request-Id`.
//!
//! The completion record needs the response status, read through
//! [`ResponseWriter::status_writer`](crate::writer::ResponseWriter::status_writer). If a middleware between the server and
//! this one wrapped the writer opaquely, the writer parked by
//! [`PreserveWriter`](super::PreserveWriter) is used instead. With neither,
//! the completion record is skipped.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::Level;
use url::Url;

use super::{Middleware, Next};
use crate::config::{Config, Format};
use crate::context::to_context;
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::log::{Entry, Logger};
use crate::request::Request;
use crate::writer::{StatusWriter, Writer, extract_writer};

const REAL_IP_HEADER: &str = "x-real-ip";
const REQUEST_ID_HEADER: &str = "x-request-id";

// Relative excluded paths are resolved against this to validate them.
const EXCLUDE_BASE: &str = "http://localhost/";

/// Hook run before the request is passed on. Returns the entry used from
/// then on.
///
/// Any `Fn(Entry, &Request, &str) -> Entry` qualifies; the `&str` is the
/// effective remote address.
pub trait Before: Send + Sync + 'static {
    fn before(&self, entry: Entry, req: &Request, remote_addr: &str) -> Entry;
}

impl<F> Before for F
where
    F: Fn(Entry, &Request, &str) -> Entry + Send + Sync + 'static,
{
    fn before(&self, entry: Entry, req: &Request, remote_addr: &str) -> Entry {
        self(entry, req, remote_addr)
    }
}

/// Hook run after the chain has written its response. Returns the entry the
/// completion record is emitted from.
///
/// Any `Fn(Entry, &dyn StatusWriter, Duration, &str) -> Entry` qualifies; the
/// `&str` is the middleware's name.
pub trait After: Send + Sync + 'static {
    fn after(&self, entry: Entry, res: &dyn StatusWriter, latency: Duration, name: &str) -> Entry;
}

impl<F> After for F
where
    F: Fn(Entry, &dyn StatusWriter, Duration, &str) -> Entry + Send + Sync + 'static,
{
    fn after(&self, entry: Entry, res: &dyn StatusWriter, latency: Duration, name: &str) -> Entry {
        self(entry, res, latency, name)
    }
}

/// Used whenever no [`Before`] hook is set: adds `request`, `method` and
/// `remote`.
pub fn default_before(entry: Entry, req: &Request, remote_addr: &str) -> Entry {
    entry
        .with_field("request", req.target())
        .with_field("method", req.method().as_str())
        .with_field("remote", remote_addr)
}

/// Used whenever no [`After`] hook is set: adds `status`, `text_status`,
/// `took` and `measure#<name>.latency` (nanoseconds).
pub fn default_after(entry: Entry, res: &dyn StatusWriter, latency: Duration, name: &str) -> Entry {
    let status = res.status();
    let nanos = i64::try_from(latency.as_nanos()).unwrap_or(i64::MAX);
    entry
        .with_field("status", status.as_u16())
        .with_field("text_status", status.canonical_reason().unwrap_or(""))
        .with_field("took", latency)
        .with_field(format!("measure#{name}.latency"), nanos)
}

/// Time source for latency measurement.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
    fn since(&self, start: Instant) -> Duration;
}

/// The real clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant { Instant::now() }
    fn since(&self, start: Instant) -> Duration { start.elapsed() }
}

/// Middleware that logs requests as they go in and responses as they go out.
///
/// Configure it before adding it to a [`Chain`](super::Chain); once inside,
/// it is shared by every in-flight request and can no longer change.
pub struct RequestLogger {
    logger: Arc<Logger>,
    name: String,
    before: Option<Box<dyn Before>>,
    after: Option<Box<dyn After>>,
    log_starting: bool,
    clock: Box<dyn Clock>,
    excluded: Vec<String>,
}

impl RequestLogger {
    /// `INFO` level, text output on stderr, name `web`.
    pub fn new() -> Self {
        Self::custom(Level::INFO, Format::Text, "web")
    }

    /// Logs through a dedicated stderr subscriber with the given level and
    /// format. See [`Logger::new`].
    pub fn custom(level: Level, format: Format, name: &str) -> Self {
        Self::from_logger(Arc::new(Logger::new(level, format)), name)
    }

    /// Logs through a caller-supplied logger, e.g. [`Logger::current`] to
    /// share the application's subscriber.
    pub fn from_logger(logger: Arc<Logger>, name: &str) -> Self {
        Self {
            logger,
            name: name.to_owned(),
            before: None,
            after: None,
            log_starting: true,
            clock: Box::new(SystemClock),
            excluded: Vec::new(),
        }
    }

    /// Builds a stderr logger from `config` and registers its excluded paths.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidUrl`] for the first excluded path that does not parse.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let mut logger = Self::custom(config.level, config.format, &config.name);
        logger.set_log_starting(config.log_starting);
        for url in &config.exclude {
            logger.exclude_url(url)?;
        }
        Ok(logger)
    }

    pub fn logger(&self) -> &Arc<Logger> { &self.logger }
    pub fn name(&self) -> &str { &self.name }
    pub fn log_starting(&self) -> bool { self.log_starting }

    /// Whether to emit `started handling request` before passing the request
    /// on. On by default.
    pub fn set_log_starting(&mut self, enabled: bool) {
        self.log_starting = enabled;
    }

    /// Stops logging requests whose path is exactly `url`.
    ///
    /// `url` must parse as a URL reference (relative paths are fine); only its
    /// literal text is kept. It is compared against the percent-decoded
    /// request path, so give it in decoded form: `/a b`, not `/a%20b`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidUrl`] when `url` does not parse. Nothing is registered.
    pub fn exclude_url(&mut self, url: &str) -> Result<(), Error> {
        Url::parse(EXCLUDE_BASE)
            .and_then(|base| base.join(url))
            .map_err(|source| Error::InvalidUrl { url: url.to_owned(), source })?;
        self.excluded.push(url.to_owned());
        Ok(())
    }

    pub fn excluded_urls(&self) -> &[String] { &self.excluded }

    pub fn set_before(&mut self, hook: impl Before) {
        self.before = Some(Box::new(hook));
    }

    pub fn set_after(&mut self, hook: impl After) {
        self.after = Some(Box::new(hook));
    }

    /// Drops both hooks, falling back to [`default_before`] and
    /// [`default_after`].
    pub fn reset_hooks(&mut self) {
        self.before = None;
        self.after = None;
    }

    /// Replaces the clock used to measure latency.
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Box::new(clock);
        self
    }

    fn is_excluded(&self, path: &str) -> bool {
        if self.excluded.is_empty() {
            return false;
        }
        // Undecodable paths are compared raw.
        let path = urlencoding::decode(path).unwrap_or(Cow::Borrowed(path));
        self.excluded.iter().any(|u| *u == path)
    }

    async fn serve(&self, rw: Writer, mut req: Request, next: Next<'_>) {
        if self.is_excluded(req.path()) {
            return next.run(rw, req).await;
        }

        let start = self.clock.now();

        let remote_addr = match raw_header(&req, REAL_IP_HEADER) {
            Some(ip) if !ip.is_empty() => ip,
            _ => req.remote_addr().map(|a| a.to_string()).unwrap_or_default(),
        };

        let mut entry = Entry::new(Arc::clone(&self.logger));
        if let Some(id) = raw_header(&req, REQUEST_ID_HEADER).filter(|id| !id.is_empty()) {
            entry = entry.with_field("request_id", id);
        }

        entry = match &self.before {
            Some(hook) => hook.before(entry, &req, &remote_addr),
            None => default_before(entry, &req, &remote_addr),
        };

        if self.log_starting {
            entry.info("started handling request");
        }

        // Whatever an outer PreserveWriter parked, read before `req` moves on.
        let parked = extract_writer(req.extensions());
        let log_ctx = to_context(req.extensions_mut(), entry);

        next.run(Arc::clone(&rw), req).await;

        let latency = self.clock.since(start);

        let res = rw
            .status_writer()
            .or_else(|| parked.as_deref().and_then(|w| w.status_writer()));
        let Some(res) = res else {
            return;
        };

        // Re-extract: handlers may have added fields to the carrier.
        let entry = log_ctx.extract();
        let entry = match &self.after {
            Some(hook) => hook.after(entry, res, latency, &self.name),
            None => default_after(entry, res, latency, &self.name),
        };
        entry.info("completed handling request");
    }
}

/// Header value as logged: non-UTF-8 bytes are replaced, never dropped.
fn raw_header(req: &Request, name: &str) -> Option<String> {
    let value = req.headers().get(name)?;
    Some(String::from_utf8_lossy(value.as_bytes()).into_owned())
}

impl Default for RequestLogger {
    fn default() -> Self { Self::new() }
}

impl Middleware for RequestLogger {
    fn handle<'a>(&'a self, rw: Writer, req: Request, next: Next<'a>) -> BoxFuture<'a> {
        Box::pin(self.serve(rw, req, next))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::StatusCode;

    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    use crate::log::{Capture, Value};
    use crate::writer::{Recorder, ResponseWriter};

    fn capturing() -> (RequestLogger, Capture) {
        let capture = Capture::default();
        let logger = Logger::from_dispatch(tracing_subscriber::registry().with(capture.clone()));
        (RequestLogger::from_logger(Arc::new(logger), "web"), capture)
    }

    #[test]
    fn test_defaults() {
        let mw = RequestLogger::new();
        assert_eq!(mw.name(), "web");
        assert!(mw.log_starting());
        assert!(mw.excluded_urls().is_empty());
    }

    #[test]
    fn test_exclude_url_validates() {
        let mut mw = RequestLogger::new();
        mw.exclude_url("/healthz").unwrap();
        mw.exclude_url("http://example.com/metrics").unwrap();
        mw.exclude_url("/with space").unwrap();
        mw.exclude_url("").unwrap();

        let err = mw.exclude_url("http://[::1").unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { ref url, .. } if url == "http://[::1"));
        assert_eq!(
            mw.excluded_urls(),
            ["/healthz", "http://example.com/metrics", "/with space", ""]
        );
    }

    #[test]
    fn test_exclusion_matches_decoded_path() {
        let mut mw = RequestLogger::new();
        mw.exclude_url("/status page").unwrap();
        assert!(mw.is_excluded("/status%20page"));
        assert!(mw.is_excluded("/status page"));
        assert!(!mw.is_excluded("/status%2520page"));
    }

    #[test]
    fn test_exclusion_is_exact() {
        let mut mw = RequestLogger::new();
        mw.exclude_url("/healthz").unwrap();
        assert!(mw.is_excluded("/healthz"));
        assert!(!mw.is_excluded("/healthz/"));
        assert!(!mw.is_excluded("/healthz/deep"));
    }

    #[test]
    fn test_default_before_fields() {
        let req: Request = http::Request::builder()
            .method("POST")
            .uri("/users?invite=1")
            .body(Bytes::new())
            .unwrap()
            .into();

        let entry = default_before(Entry::discard(), &req, "10.0.0.7:1234");
        assert_eq!(entry.fields()["request"], Value::from("/users?invite=1"));
        assert_eq!(entry.fields()["method"], Value::from("POST"));
        assert_eq!(entry.fields()["remote"], Value::from("10.0.0.7:1234"));
    }

    #[test]
    fn test_default_after_fields() {
        let rec = Recorder::new();
        rec.write(crate::Response::status(StatusCode::NOT_FOUND));

        let entry = default_after(Entry::discard(), &rec, Duration::from_micros(1500), "api");
        let fields = entry.fields();
        assert_eq!(fields["status"], Value::Uint(404));
        assert_eq!(fields["text_status"], Value::from("Not Found"));
        assert_eq!(fields["took"], Value::Duration(Duration::from_micros(1500)));
        assert_eq!(fields["measure#api.latency"], Value::Int(1_500_000));
    }

    #[test]
    fn test_default_after_unknown_status_text_is_empty() {
        let rec = Recorder::new();
        rec.write(crate::Response::status(StatusCode::from_u16(599).unwrap()));

        let entry = default_after(Entry::discard(), &rec, Duration::ZERO, "web");
        assert_eq!(entry.fields()["text_status"], Value::from(""));
    }

    #[test]
    fn test_from_config() {
        let config = Config {
            level: Level::DEBUG,
            format: Format::Json,
            name: "api".to_owned(),
            log_starting: false,
            exclude: vec!["/healthz".to_owned(), "/readyz".to_owned()],
        };
        let mw = RequestLogger::from_config(&config).unwrap();
        assert_eq!(mw.name(), "api");
        assert!(!mw.log_starting());
        assert_eq!(mw.excluded_urls(), ["/healthz", "/readyz"]);
    }

    #[test]
    fn test_from_config_rejects_bad_exclude() {
        let config = Config { exclude: vec!["http://[::1".to_owned()], ..Config::default() };
        assert!(RequestLogger::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_hooks_resolved_per_dispatch() {
        let (mut mw, capture) = capturing();
        mw.set_log_starting(false);
        mw.set_before(|entry: Entry, _req: &Request, _remote: &str| entry.with_field("hooked", true));
        mw.reset_hooks();

        let chain = crate::middleware::Chain::new(|_req: Request| async { "ok" }).with(mw);
        let req: Request = http::Request::builder().uri("/").body(Bytes::new()).unwrap().into();
        chain.call(Arc::new(Recorder::new()), req).await;

        let records = capture.records();
        assert_eq!(records.len(), 1);
        assert!(!records[0].fields.contains_key("hooked"));
        assert!(records[0].fields.contains_key("method"));
    }
}
