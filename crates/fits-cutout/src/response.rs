//! Error-response emitter: a minimal HTTP/1.x error document written through
//! a sink, for hosts that have not yet sent any success bytes.

use crate::error::{Error, Result};
use crate::sink::Sink;

/// Write a complete HTTP error response (status line, headers, HTML body)
/// describing `error`, then finish the sink.
///
/// `protocol` is the HTTP version token for the status line, e.g.
/// `HTTP/1.1` (a CGI host would pass `SERVER_PROTOCOL`). Responses with
/// status 401, 403, or 404 omit the error origin and message.
pub fn write_error_response<S: Sink>(sink: &mut S, protocol: &str, error: &Error) -> Result<()> {
    let code = error.class.code();
    let summary = error.class.summary();

    let mut body = String::new();
    body.push_str(
        "<!DOCTYPE HTML PUBLIC \"-//W3C//DTD HTML 4.01//EN\" \
         \"http://www.w3.org/TR/html4/strict.dtd\">\n",
    );
    body.push_str(&format!(
        "<html>\n<head><title>{code} {summary}</title></head>\n<body>\n\
         <h1>{code} {summary}</h1>\n{}",
        error.class.description()
    ));
    if !matches!(code, 401 | 403 | 404) {
        let loc = error.location();
        body.push_str(&format!(
            "<br /><br />\n<tt>Error</tt> raised at <tt>{}: {}</tt>:<br/>\n{}",
            loc.file(),
            loc.line(),
            error.message
        ));
    }
    body.push_str("</body>\n</html>\n");

    let head = format!(
        "{protocol} {code} {summary}\r\n\
         Content-Language: en\r\n\
         Content-Length: {}\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         Cache-Control: no-cache\r\n\r\n",
        body.len()
    );
    sink.write(head.as_bytes())?;
    sink.write(body.as_bytes())?;
    sink.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn render(error: &Error) -> String {
        let mut sink = MemorySink::new();
        write_error_response(&mut sink, "HTTP/1.1", error).unwrap();
        String::from_utf8(sink.into_content()).unwrap()
    }

    #[test]
    fn status_line_and_headers() {
        let out = render(&Error::bad_request("Negative cutout size"));
        assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(out.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(out.contains("Cache-Control: no-cache\r\n"));
        assert!(out.contains("Content-Language: en\r\n"));
    }

    #[test]
    fn content_length_matches_body() {
        let out = render(&Error::internal("boom"));
        let (head, body) = out.split_once("\r\n\r\n").unwrap();
        let len: usize = head
            .lines()
            .find_map(|l| l.strip_prefix("Content-Length: "))
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(len, body.len());
    }

    #[test]
    fn message_and_origin_included_for_500() {
        let out = render(&Error::internal("tile decompression failed"));
        assert!(out.contains("tile decompression failed"));
        assert!(out.contains("response.rs"));
    }

    #[test]
    fn not_found_omits_origin() {
        let out = render(&Error::not_found("secret path"));
        assert!(out.contains("404 Not Found"));
        assert!(!out.contains("secret path"));
        assert!(!out.contains("raised at"));
    }
}
