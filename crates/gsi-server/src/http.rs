//! Just enough HTTP/1.1 to receive one GSI update per connection.
//!
//! [`read_request`] reads a request line, CRLF-terminated headers and a body
//! of exactly `Content-Length` bytes. There is no chunked encoding, no
//! keep-alive and no pipelining: every response closes the connection.

use std::collections::HashMap;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::RequestError;

/// Longest accepted request line or header line, terminator included.
pub const MAX_LINE_BYTES: u64 = 8 * 1024;

/// Most headers accepted in one request.
pub const MAX_HEADERS: usize = 64;

/// Methods whose requests carry a body and so must declare its length.
const BODY_METHODS: [&str; 3] = ["POST", "PUT", "PATCH"];

/// One parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method, as sent.
    pub method: String,
    /// Request target with the query string removed.
    pub path: String,
    /// Headers keyed by lowercased name. Repeated headers keep the last value.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The `Content-Type` media type, lowercased, without parameters.
    pub fn media_type(&self) -> Option<String> {
        self.header("content-type").map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    /// Whether the body is declared as `application/json`.
    pub fn is_json(&self) -> bool {
        self.media_type().as_deref() == Some("application/json")
    }
}

/// Read one request.
///
/// Returns `Ok(None)` when the peer closed the connection before sending
/// anything.
///
/// # Errors
///
/// Returns [`RequestError::MissingContentLength`] for a body-bearing request
/// without a length, [`RequestError::BodyTooLarge`] when the declared length
/// exceeds `max_body_bytes`, [`RequestError::Malformed`] for syntax errors,
/// and [`RequestError::Io`] when the socket fails or times out.
pub async fn read_request<R>(
    reader: &mut R,
    max_body_bytes: usize,
) -> Result<Option<HttpRequest>, RequestError>
where
    R: AsyncBufRead + Unpin,
{
    let mut request_line = String::new();
    if read_line(reader, &mut request_line).await? == 0 {
        return Ok(None);
    }
    let (method, target) = parse_request_line(&request_line)?;

    let mut headers = HashMap::new();
    loop {
        let mut header_line = String::new();
        if read_line(reader, &mut header_line).await? == 0 {
            return Err(RequestError::Malformed(String::from(
                "connection closed inside headers",
            )));
        }
        let header_line = header_line.trim_end_matches(['\r', '\n']);
        if header_line.is_empty() {
            break;
        }
        if headers.len() >= MAX_HEADERS {
            return Err(RequestError::Malformed(String::from("too many headers")));
        }
        let (name, value) = header_line
            .split_once(':')
            .ok_or_else(|| RequestError::Malformed(String::from("invalid HTTP header")))?;
        headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    let content_length = match headers.get("content-length") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|e| RequestError::Malformed(format!("invalid content-length header: {e}")))?,
        None if BODY_METHODS.contains(&method.as_str())
            || headers.contains_key("transfer-encoding") =>
        {
            return Err(RequestError::MissingContentLength);
        }
        None => 0,
    };
    if content_length > max_body_bytes {
        return Err(RequestError::BodyTooLarge {
            declared: content_length,
            limit: max_body_bytes,
        });
    }
    let mut body = vec![0_u8; content_length];
    reader.read_exact(&mut body).await?;

    Ok(Some(HttpRequest {
        method,
        path: strip_query(&target).to_owned(),
        headers,
        body,
    }))
}

/// Read one line of at most [`MAX_LINE_BYTES`].
async fn read_line<R>(reader: &mut R, line: &mut String) -> Result<usize, RequestError>
where
    R: AsyncBufRead + Unpin,
{
    let mut limited = AsyncReadExt::take(&mut *reader, MAX_LINE_BYTES);
    let read = limited.read_line(line).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::InvalidData {
            RequestError::Malformed(String::from("request head is not UTF-8"))
        } else {
            RequestError::Io(e)
        }
    })?;
    if limited.limit() == 0 && !line.ends_with('\n') {
        return Err(RequestError::Malformed(String::from("line too long")));
    }
    Ok(read)
}

fn parse_request_line(line: &str) -> Result<(String, String), RequestError> {
    let mut parts = line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| RequestError::Malformed(String::from("missing HTTP method")))?;
    let target = parts
        .next()
        .ok_or_else(|| RequestError::Malformed(String::from("missing HTTP target")))?;
    let version = parts
        .next()
        .ok_or_else(|| RequestError::Malformed(String::from("missing HTTP version")))?;
    if !version.starts_with("HTTP/1.") || parts.next().is_some() {
        return Err(RequestError::Malformed(String::from(
            "unsupported HTTP version",
        )));
    }
    Ok((method.to_owned(), target.to_owned()))
}

fn strip_query(target: &str) -> &str {
    target
        .split_once('?')
        .map_or(target, |(path, _query)| path)
}

/// A complete response. Every response closes the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// `Content-Type` header value; omitted when the body is empty.
    pub content_type: &'static str,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// 200 with an empty body.
    pub const fn accepted() -> Self {
        Self {
            status: 200,
            content_type: "text/plain; charset=utf-8",
            body: Vec::new(),
        }
    }

    /// 200 with an HTML body.
    pub fn html(body: String) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8",
            body: body.into_bytes(),
        }
    }

    /// A plain-text error.
    pub fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: message.as_bytes().to_vec(),
        }
    }

    /// 404 Not Found.
    pub fn not_found() -> Self {
        Self::error(404, "not found")
    }

    /// Serialize the status line, headers and body.
    pub fn render(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status));
        if !self.body.is_empty() {
            head.push_str("Content-Type: ");
            head.push_str(self.content_type);
            head.push_str("\r\n");
        }
        head.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n",
            self.body.len()
        ));
        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

/// Reason phrase for the statuses this server emits.
pub const fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        413 => "Payload Too Large",
        _ => "Internal Server Error",
    }
}

/// Write `response` and flush.
///
/// # Errors
///
/// Returns the I/O error if the peer went away.
pub async fn write_response<W>(writer: &mut W, response: &HttpResponse) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&response.render()).await?;
    writer.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::io::BufReader;

    use super::*;

    async fn parse(raw: &[u8]) -> Result<Option<HttpRequest>, RequestError> {
        let mut reader = BufReader::new(raw);
        read_request(&mut reader, 1024).await
    }

    #[tokio::test]
    async fn parses_post_with_body() {
        let raw = b"POST /gsi?x=1 HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json; charset=UTF-8\r\nContent-Length: 2\r\n\r\n{}";
        let request = parse(raw).await.unwrap().unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/gsi");
        assert_eq!(request.header("HOST"), Some("localhost"));
        assert_eq!(request.media_type().as_deref(), Some("application/json"));
        assert!(request.is_json());
        assert_eq!(request.body, b"{}");
    }

    #[tokio::test]
    async fn get_without_length_has_empty_body() {
        let request = parse(b"GET / HTTP/1.1\r\n\r\n").await.unwrap().unwrap();
        assert_eq!(request.method, "GET");
        assert!(request.body.is_empty());
        assert!(!request.is_json());
    }

    #[tokio::test]
    async fn empty_stream_is_none() {
        assert!(parse(b"").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn post_without_length_is_dropped() {
        let result = parse(b"POST / HTTP/1.1\r\nContent-Type: application/json\r\n\r\n{}").await;
        assert!(matches!(result, Err(RequestError::MissingContentLength)));
    }

    #[tokio::test]
    async fn chunked_without_length_is_dropped() {
        let result = parse(b"GET / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n").await;
        assert!(matches!(result, Err(RequestError::MissingContentLength)));
    }

    #[tokio::test]
    async fn oversized_body_is_refused() {
        let result = parse(b"POST / HTTP/1.1\r\nContent-Length: 4096\r\n\r\n").await;
        assert!(matches!(
            result,
            Err(RequestError::BodyTooLarge {
                declared: 4096,
                limit: 1024
            })
        ));
    }

    #[tokio::test]
    async fn malformed_heads_are_rejected() {
        assert!(matches!(
            parse(b"POST /\r\n\r\n").await,
            Err(RequestError::Malformed(_))
        ));
        assert!(matches!(
            parse(b"GET / HTTP/2\r\n\r\n").await,
            Err(RequestError::Malformed(_))
        ));
        assert!(matches!(
            parse(b"GET / HTTP/1.1\r\nno-colon\r\n\r\n").await,
            Err(RequestError::Malformed(_))
        ));
        assert!(matches!(
            parse(b"POST / HTTP/1.1\r\nContent-Length: ten\r\n\r\n").await,
            Err(RequestError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn short_body_is_an_io_error() {
        let result = parse(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\n{}").await;
        assert!(matches!(result, Err(RequestError::Io(_))));
    }

    #[test]
    fn renders_empty_accepted_response() {
        let rendered = String::from_utf8(HttpResponse::accepted().render()).unwrap();
        assert_eq!(
            rendered,
            "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        );
    }

    #[test]
    fn renders_error_response() {
        let rendered = String::from_utf8(HttpResponse::error(403, "forbidden").render()).unwrap();
        assert!(rendered.starts_with("HTTP/1.1 403 Forbidden\r\n"));
        assert!(rendered.contains("Content-Length: 9\r\n"));
        assert!(rendered.ends_with("\r\n\r\nforbidden"));
    }
}
