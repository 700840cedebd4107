//! Minimal example: a JSON endpoint behind the request logger.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -H 'X-Request-Id: abc123' http://localhost:3000/users/7
//!   curl http://localhost:3000/healthz      ← not logged
//!
//! Access-log settings come from the `TSU_LOG_*` environment variables; see
//! `tsu_reqlog::config`.

use std::sync::Arc;

use http::StatusCode;
use tsu_reqlog::config::Config;
use tsu_reqlog::log::{self, Logger};
use tsu_reqlog::middleware::RequestLogger;
use tsu_reqlog::{Chain, Request, Response, Server, context};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::from_env()?;
    if config.exclude.is_empty() {
        config.exclude.push("/healthz".to_owned());
    }
    log::init_logging(&config)?;

    // Share the global subscriber with the server's own logs.
    let mut access_log = RequestLogger::from_logger(Arc::new(Logger::current()), &config.name);
    access_log.set_log_starting(config.log_starting);
    for url in &config.exclude {
        access_log.exclude_url(url)?;
    }

    let app = Chain::new(route).with(access_log);

    Server::bind("0.0.0.0:3000").serve(app).await?;
    Ok(())
}

async fn route(req: Request) -> Response {
    match req.path() {
        "/healthz" => Response::text("ok"),
        path => match path.strip_prefix("/users/") {
            Some(id) if !id.is_empty() => get_user(&req, id),
            _ => Response::status(StatusCode::NOT_FOUND),
        },
    }
}

// GET /users/{id}
fn get_user(req: &Request, id: &str) -> Response {
    let log = context::extract(req.extensions());
    log.with_field("user_id", id).info("loading user");

    // Shows up on the "completed handling request" line.
    context::add_fields(req.extensions(), [("user_id", id)]);

    Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#).into_bytes())
}
