// src/http.rs
use crate::parser::ParseError;

// Responses the server emits on its own behalf. Exact bytes matter to
// clients that key on the status line, so these are fixed constants.
pub const BAD_REQUEST: &[u8] = b"HTTP/1.1 400 Bad Request\r\n\r\n";
pub const INTERNAL_ERROR: &[u8] = b"HTTP/1.1 500 Internal Server Error\r\n\r\n";
pub const NOT_IMPLEMENTED: &[u8] = b"HTTP/1.1 501 Not Implemented\r\n\r\n";
pub const VERSION_NOT_SUPPORTED: &[u8] = b"HTTP/1.1 505 HTTP Version Not Supported\r\n\r\n";

/// Static 404. No Content-Length; the connection close delimits the body.
pub const NOT_FOUND: &[u8] =
    b"HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\n\r\n404 Not Found";

/// Response bytes for a request-line failure: unsupported method and version
/// get their own statuses, everything else is a generic 400.
pub fn error_response(err: ParseError) -> &'static [u8] {
    match err {
        ParseError::UnsupportedMethod => NOT_IMPLEMENTED,
        ParseError::UnsupportedVersion => VERSION_NOT_SUPPORTED,
        _ => BAD_REQUEST,
    }
}

/// Header block for a successful static response; the file bytes follow.
pub fn file_header(mime: &str, len: u64) -> String {
    format!("HTTP/1.1 200 OK\r\nContent-Type: {mime}\r\nContent-Length: {len}\r\n\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_mapping() {
        assert_eq!(error_response(ParseError::UnsupportedMethod), NOT_IMPLEMENTED);
        assert_eq!(error_response(ParseError::UnsupportedVersion), VERSION_NOT_SUPPORTED);
        assert_eq!(error_response(ParseError::NoTerminator), BAD_REQUEST);
        assert_eq!(error_response(ParseError::LeadingWhitespace), BAD_REQUEST);
    }

    #[test]
    fn test_canned_response_bytes() {
        assert_eq!(NOT_IMPLEMENTED, b"HTTP/1.1 501 Not Implemented\r\n\r\n");
        assert_eq!(VERSION_NOT_SUPPORTED, b"HTTP/1.1 505 HTTP Version Not Supported\r\n\r\n");
    }

    #[test]
    fn test_file_header() {
        assert_eq!(
            file_header("text/plain", 3),
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 3\r\n\r\n"
        );
    }
}
