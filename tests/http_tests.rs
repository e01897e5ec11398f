use webserv::http::*;

#[test]
fn parses_a_simple_get_request_line_and_headers() {
    let mut req = HttpRequest::new();
    req.buffer.extend_from_slice(b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n");

    req.parse_request_line().unwrap();
    assert_eq!(req.method, Method::Get);
    assert_eq!(req.url, "/index.html");
    assert_eq!(req.version, "HTTP/1.1");
    assert_eq!(req.state, ParsingState::Headers);

    req.parse_headers().unwrap();
    assert_eq!(req.state, ParsingState::HeadersDone);
    assert_eq!(req.headers.get("host").unwrap(), "localhost");
}

#[test]
fn request_line_reports_incomplete_until_crlf_arrives() {
    let mut req = HttpRequest::new();
    req.buffer.extend_from_slice(b"GET /path ");
    assert_eq!(req.parse_request_line(), Err(ParseError::IncompleteRequestLine));

    req.buffer.extend_from_slice(b"HTTP/1.1\r\n");
    assert!(req.parse_request_line().is_ok());
}

#[test]
fn rejects_unknown_methods() {
    let mut req = HttpRequest::new();
    req.buffer.extend_from_slice(b"PATCH /invalid HTTP/1.1\r\n");
    assert_eq!(req.parse_request_line(), Err(ParseError::InvalidMethod));
}

#[test]
fn header_names_are_case_insensitive_and_last_wins() {
    let mut req = HttpRequest::new();
    req.buffer
        .extend_from_slice(b"Host: first\r\nHOST: second\r\nX-Test: 1\r\n\r\n");
    req.parse_headers().unwrap();
    assert_eq!(req.headers.get("host").unwrap(), "second");
}

#[test]
fn content_length_and_chunked_detection() {
    let mut req = HttpRequest::new();
    req.buffer
        .extend_from_slice(b"Content-Length: 42\r\nTransfer-Encoding: chunked\r\n\r\n");
    req.parse_headers().unwrap();
    assert_eq!(req.content_length(), 42);
    assert!(req.is_chunked());
}

#[test]
fn content_length_defaults_to_zero_when_absent() {
    let req = HttpRequest::new();
    assert_eq!(req.content_length(), 0);
    assert!(!req.is_chunked());
}

#[test]
fn response_serializes_status_headers_and_body() {
    let mut res = HttpResponse::new(200, "OK");
    res.set_header("Content-Type", "text/plain");
    res.set_body(b"Hello Rust".to_vec(), "text/plain");

    let bytes = res.to_bytes();
    let s = String::from_utf8_lossy(&bytes);

    assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(s.contains("Content-Type: text/plain\r\n"));
    assert!(s.contains("Content-Length: 10\r\n"));
    assert!(s.ends_with("\r\n\r\nHello Rust"));
    assert_eq!(s.matches("\r\n\r\n").count(), 1);
}

#[test]
fn redirect_response_uses_301_and_empty_body() {
    let res = HttpResponse::redirect(301, "/new");
    assert_eq!(res.status_code, 301);
    assert_eq!(res.headers.get("location").unwrap(), "/new");
    assert_eq!(res.headers.get("content-length").unwrap(), "0");
}

#[test]
fn unknown_status_code_falls_back_to_unknown_reason() {
    assert_eq!(status_text(599), "Unknown");
    assert_eq!(status_text(404), "Not Found");
}

#[test]
fn mime_types_resolve_by_extension() {
    assert_eq!(get_mime_type(Some("html")), "text/html");
    assert_eq!(get_mime_type(Some("png")), "image/png");
    assert_eq!(get_mime_type(None), "application/octet-stream");
}
