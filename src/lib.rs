//! # tsu-reqlog
//!
//! Request-scoped structured logging for tsu services.
//!
//! [`RequestLogger`](middleware::RequestLogger) sits in a [`Chain`] and logs
//! every request as it comes in and as its response goes out, with method,
//! target, remote address, request id, status and latency. Between the two
//! it keeps the request's log [`Entry`](log::Entry) in the request's
//! extensions so handlers can log with the same fields, and add their own to
//! the completion record:
//!
//! ```rust,no_run
//! use tsu_reqlog::middleware::RequestLogger;
//! use tsu_reqlog::{Chain, Request, Response, Server, context};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tsu_reqlog::Error> {
//!     let mut logger = RequestLogger::new();
//!     logger.exclude_url("/healthz")?;
//!
//!     let app = Chain::new(get_user).with(logger);
//!     Server::bind("0.0.0.0:3000").serve(app).await
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let log = context::extract(req.extensions());
//!     log.info("looking up user");
//!     context::add_fields(req.extensions(), [("user_id", "42")]);
//!     Response::json(br#"{"id":"42"}"#.to_vec())
//! }
//! ```
//!
//! Records are `tracing` events with target `tsu::access`; the default
//! middleware prints them on stderr with `tracing-subscriber`'s `fmt` layer:
//!
//! ```text
//! … INFO tsu::access: started handling request fields={"method":"GET","remote":"10.0.0.7:51234","request":"/users/42"}
//! … INFO tsu::access: looking up user fields={"method":"GET","remote":"10.0.0.7:51234","request":"/users/42"}
//! … INFO tsu::access: completed handling request fields={"measure#web.latency":81250,"method":"GET",…,"status":200,"text_status":"OK","took":"81.25µs","user_id":"42"}
//! ```

mod error;
mod handler;
mod request;
mod response;
mod server;

pub mod config;
pub mod context;
pub mod log;
pub mod middleware;
pub mod writer;

pub use error::Error;
pub use handler::{BoxFuture, Handler};
pub use middleware::{Chain, Middleware, Next, PreserveWriter};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use server::Server;
