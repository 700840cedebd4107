//! Response writers and the status capability.
//!
//! Every request travels down a [`Chain`](crate::middleware::Chain) together
//! with a [`Writer`]. The server hands the chain a [`Recorder`], which keeps
//! the response and remembers its status. Middleware may wrap the writer in
//! its own type; unless that type forwards [`ResponseWriter::status_writer`],
//! the status is no longer reachable through it.
//!
//! For that case the original writer can be parked in the request's
//! extensions with [`add_writer_to_context`] before the wrapping happens, and
//! picked back up with [`extract_writer`]. [`PreserveWriter`] does exactly
//! that and is meant to sit in front of wrappers you do not control.
//!
//! [`PreserveWriter`]: crate::middleware::PreserveWriter

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use http::{Extensions, StatusCode};
use tracing::warn;

use crate::response::Response;

/// A shared, type-erased writer.
pub type Writer = Arc<dyn ResponseWriter>;

/// Destination for the response produced by a handler chain.
pub trait ResponseWriter: Send + Sync + 'static {
    fn write(&self, response: Response);

    /// Capability query: the writer's status view, if it has one.
    ///
    /// Wrappers should forward this to the writer they wrap when they can.
    fn status_writer(&self) -> Option<&dyn StatusWriter> {
        None
    }
}

/// A writer that can report what it wrote.
pub trait StatusWriter: Send + Sync {
    /// The status written so far. `200 OK` until something is written,
    /// matching what the server sends for an empty response.
    fn status(&self) -> StatusCode;
    fn written(&self) -> bool;
    /// Body length of the written response, in bytes.
    fn size(&self) -> usize;
}

/// The status-capturing writer the server gives to every chain.
///
/// The first response written wins; later writes are dropped with a warning.
#[derive(Default)]
pub struct Recorder {
    response: Mutex<Option<Response>>,
    written: AtomicBool,
    status: AtomicU16,
    size: AtomicUsize,
}

impl Recorder {
    pub fn new() -> Self { Self::default() }

    /// Takes the written response out of the recorder.
    pub fn take(&self) -> Option<Response> {
        self.response.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

impl ResponseWriter for Recorder {
    fn write(&self, response: Response) {
        if self.written.swap(true, Ordering::AcqRel) {
            warn!(status = response.status_code().as_u16(), "superfluous response write ignored");
            return;
        }
        self.status.store(response.status_code().as_u16(), Ordering::Release);
        self.size.store(response.body().len(), Ordering::Release);
        *self.response.lock().unwrap_or_else(PoisonError::into_inner) = Some(response);
    }

    fn status_writer(&self) -> Option<&dyn StatusWriter> {
        Some(self)
    }
}

impl StatusWriter for Recorder {
    fn status(&self) -> StatusCode {
        if !self.written() {
            return StatusCode::OK;
        }
        StatusCode::from_u16(self.status.load(Ordering::Acquire)).unwrap_or(StatusCode::OK)
    }

    fn written(&self) -> bool {
        self.written.load(Ordering::Acquire)
    }

    fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }
}

#[derive(Clone)]
struct WriterKey(Writer);

/// Parks `writer` in `extensions` for [`extract_writer`].
pub fn add_writer_to_context(extensions: &mut Extensions, writer: Writer) {
    extensions.insert(WriterKey(writer));
}

/// The writer parked by [`add_writer_to_context`], if any.
pub fn extract_writer(extensions: &Extensions) -> Option<Writer> {
    extensions.get::<WriterKey>().map(|WriterKey(w)| Arc::clone(w))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Opaque(Writer);

    impl ResponseWriter for Opaque {
        fn write(&self, response: Response) { self.0.write(response) }
    }

    #[test]
    fn test_recorder_defaults_to_ok() {
        let rec = Recorder::new();
        assert!(!rec.written());
        assert_eq!(rec.status(), StatusCode::OK);
        assert_eq!(rec.size(), 0);
    }

    #[test]
    fn test_recorder_captures_first_write() {
        let rec = Recorder::new();
        rec.write(Response::builder().status(StatusCode::CREATED).text("made"));
        rec.write(Response::status(StatusCode::INTERNAL_SERVER_ERROR));

        assert_eq!(rec.status(), StatusCode::CREATED);
        assert_eq!(rec.size(), 4);
        assert_eq!(rec.take().map(|r| r.status_code()), Some(StatusCode::CREATED));
        assert!(rec.take().is_none());
    }

    #[test]
    fn test_opaque_wrapper_hides_status() {
        let rec: Writer = Arc::new(Recorder::new());
        let wrapped = Opaque(Arc::clone(&rec));

        assert!(rec.status_writer().is_some());
        assert!(wrapped.status_writer().is_none());

        wrapped.write(Response::status(StatusCode::NOT_FOUND));
        assert_eq!(rec.status_writer().map(|s| s.status()), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_extract_writer_absent() {
        assert!(extract_writer(&Extensions::new()).is_none());
    }

    #[test]
    fn test_writer_round_trip_through_extensions() {
        let rec: Writer = Arc::new(Recorder::new());
        let mut ext = Extensions::new();
        add_writer_to_context(&mut ext, Arc::clone(&rec));

        let found = extract_writer(&ext).unwrap();
        assert!(Arc::ptr_eq(&found, &rec));
    }
}
