use crate::prelude::*;

#[derive(Debug)]
pub struct HttpConnection {
    pub stream: TcpStream,
    pub write_buffer: Vec<u8>,
    pub request: HttpRequest,
    pub config_list: Vec<Arc<ServerConfig>>,
    pub s_cfg: Option<Arc<ServerConfig>>,
    pub action: ActiveAction,
    pub body_remaining: usize,
    pub closed: bool,
    pub cgi_in_token: Option<Token>,
    pub cgi_out_token: Option<Token>,
    pub cgi_buffer: Vec<u8>,
    pub last_activity: Instant,
}

/// Per-state data for whatever the connection is currently doing, so a plain
/// GET doesn't carry CGI pipe handles around and vice versa.
#[derive(Debug)]
pub enum ActiveAction {
    /// File being streamed to disk plus the URL path the created resource
    /// will be reachable at, used for the `Location:` header on completion.
    Upload(File, String),
    FileDownload(File, usize),
    Cgi {
        out_stream: mio::net::UnixStream,
        in_stream: Option<mio::net::UnixStream>,
        child: std::process::Child,
        parse_state: CgiParsingState,
        header_buf: Vec<u8>,
        start_time: Instant,
    },
    None,
}

impl HttpConnection {
    pub fn new(stream: TcpStream, config_list: Vec<Arc<ServerConfig>>) -> Self {
        Self {
            stream,
            write_buffer: Vec::new(),
            request: HttpRequest::new(),
            config_list,
            s_cfg: None,
            action: ActiveAction::None,
            body_remaining: 0,
            closed: false,
            cgi_in_token: None,
            cgi_out_token: None,
            cgi_buffer: Vec::new(),
            last_activity: Instant::now(),
        }
    }

    pub fn should_close(&self) -> bool {
        self.closed && self.write_buffer.is_empty() && self.cgi_buffer.is_empty()
    }

    /// Host-header based virtual host selection with default-server fallback,
    /// per the longest-match-then-default routing spec.md describes.
    pub fn resolve_config(&self) -> Arc<ServerConfig> {
        if let Some(host_header) = self.request.headers.get("host") {
            let hostname = host_header.split(':').next().unwrap_or("");
            for config in &self.config_list {
                if config.server_names.iter().any(|n| n == hostname) {
                    return Arc::clone(config);
                }
            }
        }

        for config in &self.config_list {
            if config.default_server {
                return Arc::clone(config);
            }
        }

        Arc::clone(&self.config_list[0])
    }

    /// Returns true on EOF/error (connection should close after flushing).
    pub fn read_data(&mut self) -> bool {
        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => return true,
                Ok(n) => {
                    self.request.buffer.extend_from_slice(&buf[..n]);
                    if self.request.buffer.len() >= MAX_READ_DATA / 2 {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(_) => return true,
            }
        }
        false
    }

    /// Returns true if the socket write failed (connection should close).
    pub fn write_data(&mut self) -> bool {
        match self.stream.write(&self.write_buffer) {
            Ok(n) => {
                self.write_buffer.drain(..n);
                false
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => false,
            Err(_) => true,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn handle_read_phase(
        conn: &mut HttpConnection,
        poll: &Poll,
        token: Token,
        next_token: &mut usize,
        cgi_to_client: &mut HashMap<Token, Token>,
    ) -> Result<()> {
        conn.closed = conn.read_data();
        conn.touch();

        let mut interest = Interest::READABLE;
        if matches!(conn.action, ActiveAction::Cgi { .. }) && conn.request.buffer.len() > MAX_READ_DATA {
            interest = Interest::WRITABLE;
        }
        poll.registry().reregister(&mut conn.stream, token, interest)?;

        if !conn.closed && !conn.request.buffer.is_empty() {
            conn.closed = process_request(poll, token, next_token, cgi_to_client, conn)?;
        }
        Ok(())
    }

    pub fn handle_write_phase(
        conn: &mut HttpConnection,
        poll: &Poll,
        token: Token,
        next_token: &mut usize,
        cgi_to_client: &mut HashMap<Token, Token>,
    ) -> Result<()> {
        if conn.write_buffer.is_empty() {
            if let ActiveAction::FileDownload(file, remaining) = &mut conn.action {
                let mut chunk = vec![0u8; 8192];
                match file.read(&mut chunk) {
                    Ok(0) => conn.action = ActiveAction::None,
                    Ok(n) => {
                        conn.write_buffer.extend_from_slice(&chunk[..n]);
                        *remaining -= n;
                    }
                    Err(_) => conn.closed = true,
                }
            }
        }

        if !conn.write_buffer.is_empty() {
            conn.closed = conn.write_data() || conn.closed;
        }

        if !conn.closed && conn.write_buffer.is_empty() {
            HttpConnection::handle_post_write_update(conn, poll, token, next_token, cgi_to_client)?;
        }

        Ok(())
    }

    /// After a response finishes draining, either goes back to waiting for
    /// more client data or, if pipelined bytes already sit in the buffer,
    /// starts parsing the next request immediately.
    fn handle_post_write_update(
        conn: &mut HttpConnection,
        poll: &Poll,
        token: Token,
        next_token: &mut usize,
        cgi_to_client: &mut HashMap<Token, Token>,
    ) -> Result<()> {
        let mut interest = Interest::READABLE;
        if matches!(conn.action, ActiveAction::FileDownload(_, _)) {
            interest |= Interest::WRITABLE;
        }
        poll.registry().reregister(&mut conn.stream, token, interest)?;

        if !conn.request.buffer.is_empty() && conn.request.state == ParsingState::RequestLine {
            trace!("pipelined request detected, continuing to parse");
            conn.closed = process_request(poll, token, next_token, cgi_to_client, conn)?;
        }

        Ok(())
    }

    pub fn terminate(server: &mut Server, token: Token) {
        if let Some(mut conn) = server.connections.remove(&token) {
            let action = std::mem::replace(&mut conn.action, ActiveAction::None);
            if let ActiveAction::Cgi { mut child, .. } = action {
                let _ = child.kill();
                if let Ok(None) = child.try_wait() {
                    server.zombie_purgatory.push(child);
                }
                cgi::cleanup(&mut server.cgi_to_client, &mut conn);
            }
        }
    }
}
