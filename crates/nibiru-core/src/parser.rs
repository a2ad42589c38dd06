// src/parser.rs
use memchr::memmem;

/// Methods the server recognizes. Case-sensitive, exact length.
pub const SUPPORTED_METHODS: [&[u8]; 9] = [
    b"GET", b"HEAD", b"POST", b"PUT", b"DELETE", b"CONNECT", b"OPTIONS", b"TRACE", b"PATCH",
];

/// The only protocol version the server speaks.
pub const SUPPORTED_VERSION: &[u8] = b"HTTP/1.1";

/// Outcomes of request-line parsing, mutually exclusive. The first eight are
/// malformed input (400); the last two are validation failures the caller
/// maps to 501 and 505.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// No CRLF in the buffer, or the request line is empty.
    NoTerminator,
    /// The request line starts with whitespace.
    LeadingWhitespace,
    EmptyMethod,
    /// The line ends before a target appears.
    NoTarget,
    EmptyTarget,
    /// The line ends before a version appears.
    NoVersion,
    EmptyVersion,
    /// The version run is not followed by CRLF.
    InvalidTerminator,
    UnsupportedMethod,
    UnsupportedVersion,
}

/// Borrowed view of a parsed request line. The slices point into the read
/// buffer and are only valid until it is reused.
#[derive(Debug, PartialEq, Eq)]
pub struct RequestLine<'a> {
    pub method: &'a [u8],
    pub target: &'a [u8],
    pub version: &'a [u8],
    /// Offset of the first byte after the terminating CRLF.
    pub consumed: usize,
}

pub fn is_supported_method(method: &[u8]) -> bool {
    SUPPORTED_METHODS.contains(&method)
}

pub fn is_supported_version(version: &[u8]) -> bool {
    version == SUPPORTED_VERSION
}

/// Parse and validate the request line at the start of `buf`.
///
/// Fields are whitespace-separated; runs of spaces between fields are
/// tolerated, leading whitespace is not. Does not allocate.
pub fn parse_request_line(buf: &[u8]) -> Result<RequestLine<'_>, ParseError> {
    let line_end = memmem::find(buf, b"\r\n").ok_or(ParseError::NoTerminator)?;
    if line_end == 0 {
        return Err(ParseError::NoTerminator);
    }
    if buf[0] == b' ' {
        return Err(ParseError::LeadingWhitespace);
    }

    let line = &buf[..line_end];
    let mut pos = 0;

    let method_start = pos;
    while pos < line.len() && line[pos] != b' ' {
        pos += 1;
    }
    let method = &line[method_start..pos];
    if method.is_empty() {
        return Err(ParseError::EmptyMethod);
    }

    while pos < line.len() && line[pos] == b' ' {
        pos += 1;
    }
    if pos >= line.len() {
        return Err(ParseError::NoTarget);
    }

    let target_start = pos;
    while pos < line.len() && line[pos] != b' ' {
        pos += 1;
    }
    let target = &line[target_start..pos];
    if target.is_empty() {
        return Err(ParseError::EmptyTarget);
    }

    while pos < line.len() && line[pos] == b' ' {
        pos += 1;
    }
    if pos >= line.len() {
        return Err(ParseError::NoVersion);
    }

    let version_start = pos;
    while pos < line.len() && line[pos] != b'\r' {
        pos += 1;
    }
    let version = &line[version_start..pos];
    if version.is_empty() {
        return Err(ParseError::EmptyVersion);
    }

    // The version run must end exactly at the CRLF that terminates the line.
    if pos != line.len() || buf[line_end + 1] != b'\n' {
        return Err(ParseError::InvalidTerminator);
    }

    if !is_supported_method(method) {
        return Err(ParseError::UnsupportedMethod);
    }
    if !is_supported_version(version) {
        return Err(ParseError::UnsupportedVersion);
    }

    Ok(RequestLine {
        method,
        target,
        version,
        consumed: line_end + 2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_methods() {
        for method in ["GET", "HEAD", "POST", "PUT", "DELETE", "CONNECT", "OPTIONS", "TRACE", "PATCH"] {
            assert!(is_supported_method(method.as_bytes()), "{method}");
        }
    }

    #[test]
    fn test_unsupported_methods() {
        assert!(!is_supported_method(b"INVALID"));
        assert!(!is_supported_method(b"get"));
        assert!(!is_supported_method(b"GETS"));
        assert!(!is_supported_method(b""));
    }

    #[test]
    fn test_supported_versions() {
        assert!(is_supported_version(b"HTTP/1.1"));
        assert!(!is_supported_version(b"HTTP/1.0"));
        assert!(!is_supported_version(b"HTTP/2.0"));
        assert!(!is_supported_version(b"http/1.1"));
        assert!(!is_supported_version(b""));
    }

    #[test]
    fn test_parse_valid_get() {
        let buf = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let line = parse_request_line(buf).unwrap();
        assert_eq!(line.method, b"GET");
        assert_eq!(line.target, b"/");
        assert_eq!(line.version, b"HTTP/1.1");
        assert_eq!(&buf[line.consumed..], b"Host: localhost\r\n\r\n");
    }

    #[test]
    fn test_parse_valid_post() {
        let buf = b"POST /api HTTP/1.1\r\nContent-Length: 0\r\n\r\n";
        let line = parse_request_line(buf).unwrap();
        assert_eq!(line.method, b"POST");
        assert_eq!(line.target, b"/api");
        assert_eq!(line.version, b"HTTP/1.1");
    }

    #[test]
    fn test_parse_unsupported_method() {
        let buf = b"FROBNICATE / HTTP/1.1\r\n\r\n";
        assert_eq!(parse_request_line(buf), Err(ParseError::UnsupportedMethod));
    }

    #[test]
    fn test_parse_unsupported_version() {
        let buf = b"GET / HTTP/2.0\r\n\r\n";
        assert_eq!(parse_request_line(buf), Err(ParseError::UnsupportedVersion));
    }

    #[test]
    fn test_parse_missing_crlf() {
        assert_eq!(parse_request_line(b"GET / HTTP/1.1"), Err(ParseError::NoTerminator));
    }

    #[test]
    fn test_parse_empty_line() {
        assert_eq!(parse_request_line(b"\r\n"), Err(ParseError::NoTerminator));
        assert_eq!(parse_request_line(b""), Err(ParseError::NoTerminator));
    }

    #[test]
    fn test_parse_leading_whitespace() {
        let buf = b" GET / HTTP/1.1\r\n\r\n";
        assert_eq!(parse_request_line(buf), Err(ParseError::LeadingWhitespace));
    }

    #[test]
    fn test_parse_missing_target() {
        // Both collapse to "line ends before a version appears", same as the
        // C parser: the spaces are skipped and the line runs out.
        assert_eq!(parse_request_line(b"GET  HTTP/1.1\r\n\r\n"), Err(ParseError::NoVersion));
        assert_eq!(parse_request_line(b"GET /\r\n\r\n"), Err(ParseError::NoVersion));
        assert_eq!(parse_request_line(b"GET \r\n\r\n"), Err(ParseError::NoTarget));
    }

    #[test]
    fn test_parse_extra_spaces() {
        let buf = b"GET   /   HTTP/1.1\r\n\r\n";
        let line = parse_request_line(buf).unwrap();
        assert_eq!(line.method, b"GET");
        assert_eq!(line.target, b"/");
        assert_eq!(line.version, b"HTTP/1.1");
    }

    #[test]
    fn test_parse_query_string_target() {
        let buf = b"GET /api/v1/users?query=test HTTP/1.1\r\n\r\n";
        let line = parse_request_line(buf).unwrap();
        assert_eq!(line.target, b"/api/v1/users?query=test");
    }

    #[test]
    fn test_parse_version_with_trailing_space() {
        // Trailing spaces fold into the version run and fail validation.
        let buf = b"GET / HTTP/1.1 \r\n\r\n";
        assert_eq!(parse_request_line(buf), Err(ParseError::UnsupportedVersion));
    }

    #[test]
    fn test_parse_does_not_read_past_first_crlf() {
        let buf = b"GET /a HTTP/1.1\r\nGET /b HTTP/1.1\r\n\r\n";
        let line = parse_request_line(buf).unwrap();
        assert_eq!(line.target, b"/a");
        assert_eq!(line.consumed, 17);
    }
}
