use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
    Head,
}

impl Method {
    pub fn is_allowed(&self, allowed: &[String]) -> bool {
        allowed.is_empty() || allowed.iter().any(|m| m.eq_ignore_ascii_case(self.as_str()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }
}

impl FromStr for Method {
    type Err = ParseError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            _ => Err(ParseError::InvalidMethod),
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParsingState {
    RequestLine,
    Headers,
    HeadersDone,
    Body,
    Complete,
}

const CRLF_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    IncompleteRequestLine,
    MalformedRequestLine,
    InvalidMethod,
    HeaderTooLong,
    ChunkedRequestRejected,
    PayloadTooLarge,
    Io,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::IncompleteRequestLine => write!(f, "incomplete request"),
            ParseError::MalformedRequestLine => write!(f, "malformed request line"),
            ParseError::InvalidMethod => write!(f, "invalid HTTP method"),
            ParseError::HeaderTooLong => write!(f, "header line too long"),
            ParseError::ChunkedRequestRejected => write!(f, "chunked request bodies are not supported"),
            ParseError::PayloadTooLarge => write!(f, "payload too large"),
            ParseError::Io => write!(f, "local I/O error while handling request"),
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub version: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub buffer: Vec<u8>,
    pub cursor: usize,
    pub state: ParsingState,
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpRequest {
    pub fn new() -> Self {
        HttpRequest {
            method: Method::Get,
            url: String::new(),
            version: String::new(),
            headers: HashMap::new(),
            body: Vec::new(),
            buffer: Vec::with_capacity(4096),
            cursor: 0,
            state: ParsingState::RequestLine,
        }
    }

    fn clear(&mut self) {
        self.state = ParsingState::RequestLine;
        self.headers.clear();
        self.body.clear();
    }

    /// Drops the bytes already consumed and resets per-request fields, but keeps
    /// any pipelined residue sitting after the cursor so the next request can
    /// pick it up without asking the socket for more data.
    pub fn finish_request(&mut self) {
        self.buffer.drain(..self.cursor);
        self.cursor = 0;
        self.clear();
    }

    pub fn parse_request_line(&mut self) -> std::result::Result<(), ParseError> {
        let Some(abs_index) = find_crlf(&self.buffer, self.cursor) else {
            return Err(ParseError::IncompleteRequestLine);
        };
        let line_bytes = &self.buffer[self.cursor..abs_index];
        let line = std::str::from_utf8(line_bytes).map_err(|_| ParseError::MalformedRequestLine)?;

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(ParseError::MalformedRequestLine);
        }
        self.method = parts[0].parse()?;
        self.url = parts[1].to_string();
        self.version = parts[2].to_string();

        self.cursor = abs_index + CRLF_LEN;
        self.state = ParsingState::Headers;
        Ok(())
    }

    fn extract_header_line(&mut self) -> std::result::Result<Option<(String, String)>, ParseError> {
        let Some(abs_index) = find_crlf(&self.buffer, self.cursor) else {
            return Err(ParseError::IncompleteRequestLine);
        };
        let line_bytes = &self.buffer[self.cursor..abs_index];
        if line_bytes.is_empty() {
            self.cursor = abs_index + CRLF_LEN;
            return Ok(None);
        }
        if line_bytes.len() > 8192 {
            return Err(ParseError::HeaderTooLong);
        }
        let line = std::str::from_utf8(line_bytes).map_err(|_| ParseError::MalformedRequestLine)?;
        self.cursor = abs_index + CRLF_LEN;
        match line.find(':') {
            Some(sep) => Ok(Some((
                line[..sep].trim().to_ascii_lowercase(),
                line[sep + 1..].trim().to_string(),
            ))),
            None => Err(ParseError::MalformedRequestLine),
        }
    }

    pub fn parse_headers(&mut self) -> std::result::Result<(), ParseError> {
        loop {
            match self.extract_header_line()? {
                Some((k, v)) => {
                    self.headers.insert(k, v);
                }
                None => {
                    self.buffer.drain(..self.cursor);
                    self.cursor = 0;
                    self.state = ParsingState::HeadersDone;
                    return Ok(());
                }
            }
        }
    }

    pub fn content_length(&self) -> usize {
        self.headers
            .get("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    pub fn is_chunked(&self) -> bool {
        self.headers
            .get("transfer-encoding")
            .map(|v| v.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false)
    }

    /// §4.E: keep-alive unless the client explicitly asked for something
    /// other than `keep-alive` in its own `Connection` header.
    pub fn wants_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            None => true,
            Some(v) => v.eq_ignore_ascii_case("keep-alive"),
        }
    }

    /// Generates a timestamp-based filename for a POST target that resolves to
    /// a directory.
    pub fn extract_filename(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        format!("upload_{millis}")
    }
}

/// Drives the per-connection parser through as many states as the buffered
/// bytes allow, dispatching to the active handler once headers are known and
/// feeding body bytes to it as they arrive. Returns `Ok(true)` if the
/// connection should close after the current write.
pub fn process_request(
    poll: &Poll,
    token: Token,
    next_token: &mut usize,
    cgi_to_client: &mut HashMap<Token, Token>,
    conn: &mut HttpConnection,
) -> Result<bool> {
    let mut closed = false;
    loop {
        match advance_request(conn, poll, next_token, cgi_to_client, token) {
            Ok(()) => {
                if let ActiveAction::Cgi { in_stream, .. } = &mut conn.action {
                    if conn.body_remaining == 0 {
                        if let Some(in_token) = conn.cgi_in_token {
                            if let Some(pipe) = in_stream {
                                poll.registry().reregister(pipe, in_token, Interest::WRITABLE).ok();
                            }
                        }
                    }
                }
                conn.request.finish_request();
                break;
            }
            Err(ParseError::IncompleteRequestLine) => break,
            Err(e) => {
                let code = match e {
                    ParseError::PayloadTooLarge => HTTP_PAYLOAD_TOO_LARGE,
                    ParseError::InvalidMethod => HTTP_METHOD_NOT_ALLOWED,
                    ParseError::HeaderTooLong | ParseError::MalformedRequestLine => HTTP_BAD_REQUEST,
                    ParseError::ChunkedRequestRejected => HTTP_NOT_IMPLEMENTED,
                    ParseError::Io => HTTP_INTERNAL_SERVER_ERROR,
                };
                let mut response = handle_error(code, conn.s_cfg.as_ref());
                response.set_header("Connection", "close");
                closed = true;
                conn.write_buffer.extend_from_slice(&response.to_bytes());
                conn.request.finish_request();
                break;
            }
        }
    }

    if !conn.write_buffer.is_empty() || matches!(conn.action, ActiveAction::FileDownload(_, _)) {
        poll.registry()
            .reregister(&mut conn.stream, token, Interest::READABLE | Interest::WRITABLE)?;
    }
    Ok(closed)
}

fn advance_request(
    conn: &mut HttpConnection,
    poll: &Poll,
    next_token: &mut usize,
    cgi_to_client: &mut HashMap<Token, Token>,
    client_token: Token,
) -> std::result::Result<(), ParseError> {
    loop {
        let result = match conn.request.state {
            ParsingState::RequestLine => conn.request.parse_request_line(),
            ParsingState::Headers => conn.request.parse_headers(),
            ParsingState::HeadersDone => {
                if let Some(response) = setup_action(conn, poll, next_token, cgi_to_client, client_token)? {
                    conn.write_buffer.extend_from_slice(&response.to_bytes());
                    conn.request.state = ParsingState::Complete;
                }
                Ok(())
            }
            ParsingState::Body => parse_body(conn),
            ParsingState::Complete => break,
        };

        match result {
            Ok(()) => {
                if conn.request.state == ParsingState::Complete {
                    break;
                }
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn setup_action(
    conn: &mut HttpConnection,
    poll: &Poll,
    next_token: &mut usize,
    cgi_to_client: &mut HashMap<Token, Token>,
    client_token: Token,
) -> std::result::Result<Option<HttpResponse>, ParseError> {
    let s_cfg = conn.resolve_config();
    conn.s_cfg = Some(Arc::clone(&s_cfg));

    if conn.request.is_chunked() {
        return Err(ParseError::ChunkedRequestRejected);
    }

    let content_length = conn.request.content_length();
    let method = conn.request.method;
    let url = conn.request.url.clone();

    let response = match router::resolve(&s_cfg, &url) {
        Err(RoutingError::NotFound) => Some(handle_error(HTTP_NOT_FOUND, Some(&s_cfg))),
        Ok(location) => {
            if let Some(redirect_to) = &location.redirect {
                Some(HttpResponse::redirect(HTTP_MOVED_PERMANENTLY, redirect_to))
            } else if !method.is_allowed(&location.allow_methods) {
                Some(handle_error(HTTP_METHOD_NOT_ALLOWED, Some(&s_cfg)))
            } else {
                let limit = if location.client_max_body_size > 0 {
                    location.client_max_body_size
                } else {
                    s_cfg.client_max_body_size
                };
                if limit > 0 && content_length > limit {
                    Some(handle_error(HTTP_PAYLOAD_TOO_LARGE, Some(&s_cfg)))
                } else if let Some(interpreter) = cgi::cgi_interpreter(location, &url) {
                    match cgi::spawn_cgi(conn, &s_cfg, location, &interpreter, poll, next_token, cgi_to_client, client_token) {
                        Ok(()) => None,
                        Err(_) => Some(handle_error(HTTP_INTERNAL_SERVER_ERROR, Some(&s_cfg))),
                    }
                } else {
                    match method {
                        Method::Get | Method::Head => {
                            let (response, action) = handle_get(&conn.request, location, &s_cfg);
                            conn.action = action;
                            Some(response)
                        }
                        Method::Post => match handle_post_begin(&conn.request, location, &s_cfg) {
                            Ok((response, action)) => {
                                conn.action = action;
                                response
                            }
                            Err(response) => Some(response),
                        },
                        Method::Delete => Some(handle_delete(&conn.request, location, &s_cfg)),
                    }
                }
            }
        }
    };
    conn.body_remaining = content_length;

    let keep_alive = conn.request.wants_keep_alive();
    let response = response.map(|mut r| {
        r.set_connection_policy(keep_alive);
        r
    });
    if !keep_alive {
        conn.closed = true;
    }

    if response.is_none() {
        if content_length > 0 {
            conn.request.state = ParsingState::Body;
        } else if matches!(conn.action, ActiveAction::Cgi { .. }) {
            conn.request.state = ParsingState::Complete;
        } else {
            conn.request.state = ParsingState::Complete;
        }
    }

    Ok(response)
}

fn parse_body(conn: &mut HttpConnection) -> std::result::Result<(), ParseError> {
    let available = conn.request.buffer.len() - conn.request.cursor;
    let to_process = std::cmp::min(available, conn.body_remaining);

    if to_process > 0 {
        let start = conn.request.cursor;
        match &mut conn.action {
            ActiveAction::Cgi { .. } => {
                let data = conn.request.buffer[start..start + to_process].to_vec();
                conn.cgi_buffer.extend_from_slice(&data);
                conn.request.buffer.drain(start..start + to_process);
            }
            ActiveAction::Upload(file, _) => {
                file.write_all(&conn.request.buffer[start..start + to_process])
                    .map_err(|_| ParseError::Io)?;
                conn.request.buffer.drain(start..start + to_process);
            }
            _ => {
                conn.request.buffer.drain(start..start + to_process);
            }
        }
        conn.body_remaining -= to_process;
    }

    if conn.body_remaining == 0 {
        if let ActiveAction::Upload(_, location_url) = &conn.action {
            let mut response = handle_post_complete(location_url);
            response.set_connection_policy(!conn.closed);
            conn.write_buffer.extend_from_slice(&response.to_bytes());
            conn.action = ActiveAction::None;
        }
        conn.request.state = ParsingState::Complete;
        Ok(())
    } else {
        Err(ParseError::IncompleteRequestLine)
    }
}

fn find_crlf(buffer: &[u8], start_offset: usize) -> Option<usize> {
    let search_area = buffer.get(start_offset..)?;
    let mut pos = 0;
    while let Some(r) = search_area[pos..].iter().position(|&b| b == b'\r') {
        let abs = pos + r;
        if search_area.get(abs + 1) == Some(&b'\n') {
            return Some(start_offset + abs);
        }
        pos = abs + 1;
    }
    None
}

pub fn find_subsequence(buffer: &[u8], needle: &[u8], start_offset: usize) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let search_area = buffer.get(start_offset..)?;
    let first = needle[0];
    let mut pos = 0;
    while let Some(rel) = search_area[pos..].iter().position(|&b| b == first) {
        let abs = pos + rel;
        match search_area.get(abs..abs + needle.len()) {
            Some(candidate) if candidate == needle => return Some(start_offset + abs),
            Some(_) => {}
            None => return None,
        }
        pos = abs + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_simple_get_request() {
        let mut req = HttpRequest::new();
        req.buffer.extend_from_slice(b"GET /index.html HTTP/1.1\r\n");
        assert!(req.parse_request_line().is_ok());
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.url, "/index.html");
        assert_eq!(req.state, ParsingState::Headers);
    }

    #[test]
    fn request_line_reports_incomplete_until_crlf_arrives() {
        let mut req = HttpRequest::new();
        req.buffer.extend_from_slice(b"GET /index.html ");
        assert_eq!(req.parse_request_line(), Err(ParseError::IncompleteRequestLine));
    }

    #[test]
    fn rejects_unknown_methods() {
        let mut req = HttpRequest::new();
        req.buffer.extend_from_slice(b"PATCH /x HTTP/1.1\r\n");
        assert_eq!(req.parse_request_line(), Err(ParseError::InvalidMethod));
    }

    #[test]
    fn parses_headers_case_insensitively() {
        let mut req = HttpRequest::new();
        req.buffer.extend_from_slice(b"Host: example.com\r\nX-Test: 1\r\n\r\n");
        assert!(req.parse_headers().is_ok());
        assert_eq!(req.state, ParsingState::HeadersDone);
        assert_eq!(req.headers.get("host").unwrap(), "example.com");
    }

    #[test]
    fn head_is_recognized_as_its_own_method() {
        assert_eq!("HEAD".parse::<Method>().unwrap(), Method::Head);
    }

    #[test]
    fn content_length_defaults_to_zero() {
        let req = HttpRequest::new();
        assert_eq!(req.content_length(), 0);
    }
}
