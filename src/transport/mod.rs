mod http_transport;
mod retry_policy;

pub use http_transport::HttpTransport;

use std::fmt;
use std::io::{self, Read};

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode};

use crate::error::AgentError;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Lazily pulled response body. Dropping it releases the connection.
pub type BodyChunks = Box<dyn Iterator<Item = io::Result<Bytes>> + Send>;

/// HTTP client the dispatch loop posts through.
pub trait Transport {
    /// Send one POST and return the response without reading its body.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Network`] when no HTTP response was received.
    fn post(&self, url: &str, headers: &HeaderMap, body: Bytes)
        -> Result<HttpResponse, AgentError>;

    /// Headers authenticating every request.
    fn auth_header(&self) -> HeaderMap;

    /// Absolute URL for a service path.
    fn service_url(&self, path: &str) -> String;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn post(
        &self,
        url: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<HttpResponse, AgentError> {
        (**self).post(url, headers, body)
    }

    fn auth_header(&self) -> HeaderMap {
        (**self).auth_header()
    }

    fn service_url(&self, path: &str) -> String {
        (**self).service_url(path)
    }
}

/// Status, headers and a not-yet-read body.
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: BodyChunks,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: BodyChunks) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// A response whose whole body is already in memory.
    #[must_use]
    pub fn from_bytes(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        let chunks: BodyChunks = if body.is_empty() {
            Box::new(std::iter::empty())
        } else {
            Box::new(std::iter::once(Ok(body)))
        };
        Self::new(status, headers, chunks)
    }

    /// A response whose body is read from `reader` on demand.
    #[must_use]
    pub fn from_reader<R>(status: StatusCode, headers: HeaderMap, reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        Self::new(status, headers, Box::new(ReaderChunks::new(reader)))
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Media type without parameters, lowercased.
    #[must_use]
    pub fn content_type(&self) -> Option<String> {
        let raw = self.headers.get(CONTENT_TYPE)?.to_str().ok()?;
        let media = raw.split(';').next().unwrap_or_default().trim();
        (!media.is_empty()).then(|| media.to_ascii_lowercase())
    }

    #[must_use]
    pub fn is_json(&self) -> bool {
        self.content_type()
            .is_some_and(|media| media == "application/json" || media.ends_with("+json"))
    }

    #[must_use]
    pub fn into_body(self) -> BodyChunks {
        self.body
    }

    /// Read the whole body. Invalid UTF-8 is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::StreamRead`] when reading fails.
    pub fn text(self) -> Result<String, AgentError> {
        let mut buf = Vec::new();
        for chunk in self.body {
            let chunk = chunk.map_err(|err| AgentError::StreamRead(err.to_string()))?;
            buf.extend_from_slice(&chunk);
        }
        Ok(match String::from_utf8(buf) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        })
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Byte chunks read from a [`Read`] until EOF or the first error.
pub struct ReaderChunks<R> {
    reader: Option<R>,
}

impl<R: Read> ReaderChunks<R> {
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
        }
    }
}

impl<R: Read> Iterator for ReaderChunks<R> {
    type Item = io::Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    self.reader = None;
                    return None;
                }
                Ok(n) => {
                    buf.truncate(n);
                    return Some(Ok(Bytes::from(buf)));
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.reader = None;
                    return Some(Err(err));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("Application/JSON; charset=utf-8"),
        );
        headers
    }

    #[test]
    fn test_content_type_strips_parameters() {
        let response = HttpResponse::from_bytes(StatusCode::OK, json_headers(), "{}");
        assert_eq!(response.content_type().as_deref(), Some("application/json"));
        assert!(response.is_json());

        let response = HttpResponse::from_bytes(StatusCode::OK, HeaderMap::new(), "");
        assert!(response.content_type().is_none());
        assert!(!response.is_json());
    }

    #[test]
    fn test_text_reads_all_chunks() {
        let response = HttpResponse::from_reader(
            StatusCode::OK,
            HeaderMap::new(),
            io::Cursor::new(vec![b'x'; READ_CHUNK_SIZE + 10]),
        );
        assert_eq!(response.text().unwrap().len(), READ_CHUNK_SIZE + 10);
    }

    #[test]
    fn test_reader_chunks_stop_after_error() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            }
        }
        let mut chunks = ReaderChunks::new(Failing);
        assert!(chunks.next().unwrap().is_err());
        assert!(chunks.next().is_none());
    }
}
