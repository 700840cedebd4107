//! Middleware layer.
//!
//! Middleware sees every request on its way in and gets control back once
//! the rest of the chain has written a response. A [`Chain`] is an ordered
//! stack of middleware in front of one endpoint [`Handler`]; the first
//! middleware added is the outermost.
//!
//! ```rust,no_run
//! use tsu_reqlog::{Chain, Request, Response, Server};
//! use tsu_reqlog::middleware::RequestLogger;
//!
//! # async fn run() -> Result<(), tsu_reqlog::Error> {
//! let mut logger = RequestLogger::new();
//! logger.exclude_url("/healthz")?;
//!
//! let app = Chain::new(hello).with(logger);
//! Server::bind("0.0.0.0:3000").serve(app).await
//! # }
//!
//! async fn hello(_req: Request) -> Response {
//!     Response::text("hello")
//! }
//! ```

pub mod logger;

use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::request::Request;
use crate::writer::{Writer, add_writer_to_context};

pub use logger::{After, Before, Clock, RequestLogger, SystemClock, default_after, default_before};

/// One link in a [`Chain`].
///
/// Implementations call `next.run(rw, req)` to pass the request on, or write
/// to `rw` themselves to answer early.
pub trait Middleware: Send + Sync + 'static {
    fn handle<'a>(&'a self, rw: Writer, req: Request, next: Next<'a>) -> BoxFuture<'a>;
}

/// The remainder of the chain after the current middleware.
pub struct Next<'a> {
    stack: &'a [Arc<dyn Middleware>],
    endpoint: &'a BoxedHandler,
}

impl<'a> Next<'a> {
    /// Runs the rest of the chain. Resolves once the endpoint's response has
    /// been written to `rw`.
    pub async fn run(self, rw: Writer, req: Request) {
        match self.stack.split_first() {
            Some((middleware, rest)) => {
                let next = Next { stack: rest, endpoint: self.endpoint };
                middleware.handle(rw, req, next).await;
            }
            None => {
                let response = self.endpoint.call(req).await;
                rw.write(response);
            }
        }
    }
}

/// An ordered middleware stack ending in one endpoint.
pub struct Chain {
    stack: Vec<Arc<dyn Middleware>>,
    endpoint: BoxedHandler,
}

impl Chain {
    pub fn new(endpoint: impl Handler) -> Self {
        Self { stack: Vec::new(), endpoint: endpoint.into_boxed_handler() }
    }

    /// Appends `middleware` inside everything added before it.
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.stack.push(Arc::new(middleware));
        self
    }

    /// Dispatches one request through the whole chain.
    pub async fn call(&self, rw: Writer, req: Request) {
        Next { stack: &self.stack, endpoint: &self.endpoint }.run(rw, req).await
    }
}

/// Parks the writer it receives in the request's extensions, then passes the
/// request on unchanged.
///
/// Add it to the [`Chain`] before any middleware that wraps the writer
/// without forwarding
/// [`status_writer`](crate::writer::ResponseWriter::status_writer), and add
/// the [`RequestLogger`] after both. The logger reads the parked writer from
/// the request it receives, so the writer must already be parked by then.
///
/// ```rust
/// use tsu_reqlog::middleware::RequestLogger;
/// use tsu_reqlog::{Chain, PreserveWriter, Request, Response};
/// # use tsu_reqlog::{BoxFuture, Middleware, Next};
/// # use tsu_reqlog::writer::Writer;
/// # struct Instrument;
/// # impl Middleware for Instrument {
/// #     fn handle<'a>(&'a self, rw: Writer, req: Request, next: Next<'a>) -> BoxFuture<'a> {
/// #         Box::pin(next.run(rw, req))
/// #     }
/// # }
///
/// let app = Chain::new(|_req: Request| async { Response::text("ok") })
///     .with(PreserveWriter)
///     .with(Instrument) // wraps the writer opaquely
///     .with(RequestLogger::new());
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct PreserveWriter;

impl Middleware for PreserveWriter {
    fn handle<'a>(&'a self, rw: Writer, mut req: Request, next: Next<'a>) -> BoxFuture<'a> {
        add_writer_to_context(req.extensions_mut(), Arc::clone(&rw));
        Box::pin(next.run(rw, req))
    }
}
