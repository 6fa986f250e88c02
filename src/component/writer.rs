//! Response writers: where a component's output goes.

use crate::http::{Headers, Response, StatusCode};

/// What the caller should do after a component has written its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The output is a fragment; the host keeps composing the page around it.
    Continue,
    /// The output is the entire response and has been finalized. Nothing else
    /// may be written for this request.
    Finished,
}

impl Completion {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Finished)
    }
}

/// Sink for a component's response.
///
/// The responder calls these in a fixed order: `reset_buffer` (when the
/// output must be the whole response), status/headers, `write`, then
/// `flush` and `finalize` for complete responses.
pub trait ResponseWriter {
    /// Discards anything buffered so far, including output written by the host.
    fn reset_buffer(&mut self);

    fn set_status(&mut self, status: StatusCode);

    /// Sets a header, replacing any earlier value with the same name.
    fn set_header(&mut self, name: &str, value: &str);

    fn write(&mut self, bytes: &[u8]);

    /// Commits pending headers and state.
    fn flush(&mut self);

    /// Marks the response complete. Writes after this are ignored.
    fn finalize(&mut self);
}

/// In-memory [`ResponseWriter`] that can be turned into an HTTP [`Response`].
///
/// # Examples
///
/// ```
/// use rcomp::component::{BufferedWriter, ResponseWriter};
/// use rcomp::http::StatusCode;
///
/// let mut out = BufferedWriter::new();
/// out.write(b"<header>");
/// out.reset_buffer();
/// out.write(b"{}");
/// out.finalize();
///
/// assert!(out.is_finalized());
/// let response = out.into_response();
/// assert_eq!(response.status(), StatusCode::Ok);
/// assert_eq!(response.content(), b"{}");
/// ```
#[derive(Debug)]
pub struct BufferedWriter {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
    resets: usize,
    flushed: bool,
    finalized: bool,
}

impl BufferedWriter {
    pub fn new() -> Self {
        Self {
            status: StatusCode::Ok,
            headers: Headers::new(),
            body: Vec::new(),
            resets: 0,
            flushed: false,
            finalized: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// How many times the buffer was reset.
    pub fn resets(&self) -> usize {
        self.resets
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Converts the buffered output into an HTTP response. HTML content type
    /// is assumed when none was set and there is a body.
    pub fn into_response(self) -> Response {
        let mut response = Response::new(self.status);
        let mut has_content_type = false;
        for (name, value) in self.headers.iter() {
            has_content_type |= name.eq_ignore_ascii_case("content-type");
            response.add_header(name, value);
        }
        if !has_content_type && !self.body.is_empty() {
            response.add_header("Content-Type", "text/html; charset=utf-8");
        }
        response.body_bytes(self.body)
    }
}

impl Default for BufferedWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter for BufferedWriter {
    fn reset_buffer(&mut self) {
        if self.finalized {
            return;
        }
        self.body.clear();
        self.resets += 1;
    }

    fn set_status(&mut self, status: StatusCode) {
        if !self.finalized {
            self.status = status;
        }
    }

    fn set_header(&mut self, name: &str, value: &str) {
        if !self.finalized {
            self.headers.set(name, value);
        }
    }

    fn write(&mut self, bytes: &[u8]) {
        if !self.finalized {
            self.body.extend_from_slice(bytes);
        }
    }

    fn flush(&mut self) {
        self.flushed = true;
    }

    fn finalize(&mut self) {
        self.finalized = true;
    }
}
