use crate::prelude::*;

#[derive(Debug, PartialEq)]
pub enum CgiParsingState {
    ReadHeaders,
    StreamBody,
    StreamBodyChuncked,
}

/// Returns the configured interpreter for `url`'s extension, if the matched
/// location maps it to one via `cgi_pass`.
pub fn cgi_interpreter(location: &LocationConfig, url: &str) -> Option<String> {
    let path_only = url.split('?').next().unwrap_or(url);
    let ext = Path::new(path_only).extension()?.to_str()?;
    location.cgi_pass.get(ext).cloned()
}

/// Forks the interpreter against the resolved script, wiring its stdin/stdout
/// to a pair of non-blocking Unix sockets registered with the event loop in
/// place of the real pipe()/fork()/dup2()/execve() the original server used.
pub fn spawn_cgi(
    conn: &mut HttpConnection,
    s_cfg: &Arc<ServerConfig>,
    location: &LocationConfig,
    interpreter: &str,
    poll: &Poll,
    next_token: &mut usize,
    cgi_to_client: &mut HashMap<Token, Token>,
    client_token: Token,
) -> Result<()> {
    let root = location.root.as_deref().unwrap_or(&s_cfg.root);
    let path_only = conn.request.url.split('?').next().unwrap_or(&conn.request.url);
    let relative = path_only.strip_prefix(location.path.as_str()).unwrap_or(path_only);
    let script_path = Path::new(root).join(relative.trim_start_matches('/'));
    let working_dir = script_path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));

    let (stdin_parent, stdin_child) = UnixStream::pair()?;
    let (stdout_parent, stdout_child) = UnixStream::pair()?;
    stdin_parent.set_nonblocking(true)?;
    stdout_parent.set_nonblocking(true)?;

    let env = build_cgi_env(conn, &script_path);
    let child = Command::new(interpreter)
        .arg(&script_path)
        .envs(env)
        .current_dir(working_dir)
        .stdin(Stdio::from(stdin_child))
        .stdout(Stdio::from(stdout_child))
        .stderr(Stdio::inherit())
        .spawn()?;

    let mut in_stream = mio::net::UnixStream::from_std(stdin_parent);
    let mut out_stream = mio::net::UnixStream::from_std(stdout_parent);

    let in_token = Token(*next_token);
    *next_token += 1;
    let out_token = Token(*next_token);
    *next_token += 1;

    poll.registry().register(&mut in_stream, in_token, Interest::WRITABLE)?;
    poll.registry().register(&mut out_stream, out_token, Interest::READABLE)?;

    cgi_to_client.insert(in_token, client_token);
    cgi_to_client.insert(out_token, client_token);
    conn.cgi_in_token = Some(in_token);
    conn.cgi_out_token = Some(out_token);

    conn.action = ActiveAction::Cgi {
        out_stream,
        in_stream: Some(in_stream),
        child,
        parse_state: CgiParsingState::ReadHeaders,
        header_buf: Vec::new(),
        start_time: Instant::now(),
    };

    Ok(())
}

pub fn parse_cgi_headers(bytes: &[u8]) -> (u16, Vec<(String, String)>) {
    let mut status = 200;
    let mut headers = Vec::new();
    let content = String::from_utf8_lossy(bytes);

    for line in content.lines() {
        if let Some((key, val)) = line.split_once(':') {
            let key = key.trim().to_lowercase();
            let val = val.trim().to_string();

            if key == "status" {
                status = val.split_whitespace().next().and_then(|s| s.parse().ok()).unwrap_or(200);
            } else {
                headers.push((key, val));
            }
        }
    }
    (status, headers)
}

/// Drives the CGI file descriptors for a single readiness event: pumps
/// stdout into the client's write buffer (demuxing CGI headers from body the
/// first time through), pumps the buffered request body into stdin, and
/// reaps the child once it exits.
pub fn handle_cgi_event(
    poll: &Poll,
    readable: bool,
    writable: bool,
    cgi_token: Token,
    client_token: Token,
    conn: &mut HttpConnection,
    cgi_to_client: &mut HashMap<Token, Token>,
) -> Result<()> {
    let keep_alive = !conn.closed;
    if let ActiveAction::Cgi {
        out_stream,
        in_stream,
        child,
        parse_state,
        header_buf,
        ..
    } = &mut conn.action
    {
        if readable && Some(cgi_token) == conn.cgi_out_token {
            let mut buf = [0u8; 4096];
            match out_stream.read(&mut buf) {
                Ok(0) => {
                    if *parse_state == CgiParsingState::StreamBodyChuncked {
                        conn.write_buffer.extend_from_slice(b"0\r\n\r\n");
                    }
                    conn.cgi_out_token = None;
                    poll.registry()
                        .reregister(&mut conn.stream, client_token, Interest::READABLE | Interest::WRITABLE)?;
                }
                Ok(n) => {
                    process_cgi_stdout(parse_state, header_buf, &mut conn.write_buffer, &buf[..n], keep_alive)?;
                    poll.registry()
                        .reregister(&mut conn.stream, client_token, Interest::READABLE | Interest::WRITABLE)?;
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(_) => conn.closed = true,
            }
        }

        if writable && Some(cgi_token) == conn.cgi_in_token && !conn.cgi_buffer.is_empty() {
            if let Some(pipe) = in_stream {
                match pipe.write(&conn.cgi_buffer) {
                    Ok(n) => {
                        conn.cgi_buffer.drain(..n);
                        if conn.body_remaining == 0 && conn.cgi_buffer.is_empty() {
                            conn.cgi_in_token = None;
                            trace!("CGI stdin pipe closed (EOF sent)");
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                    Err(_) => conn.closed = true,
                }
            }
        }

        match child.try_wait() {
            Ok(Some(_status)) => {
                if conn.body_remaining == 0 && conn.cgi_buffer.is_empty() {
                    if let ActiveAction::Cgi { in_stream, .. } = &mut conn.action {
                        if let Some(pipe) = in_stream.take() {
                            drop(pipe);
                        }
                    }
                }
                conn.cgi_in_token = None;
                cleanup(cgi_to_client, conn);
                conn.action = ActiveAction::None;
            }
            Ok(None) => {}
            Err(_) => conn.closed = true,
        }
    }
    Ok(())
}

pub fn build_cgi_env(conn: &mut HttpConnection, script_path: &Path) -> HashMap<String, String> {
    let req = &conn.request;
    let mut envs = HashMap::new();

    envs.insert("GATEWAY_INTERFACE".to_string(), "CGI/1.1".to_string());
    envs.insert("SERVER_PROTOCOL".to_string(), "HTTP/1.1".to_string());
    envs.insert("SERVER_SOFTWARE".to_string(), "webserv/1.0".to_string());
    envs.insert("SCRIPT_FILENAME".to_string(), script_path.to_string_lossy().to_string());
    envs.insert("REQUEST_METHOD".to_string(), req.method.to_string());
    let (path, query) = match req.url.split_once('?') {
        Some((p, q)) => (p.to_string(), q.to_string()),
        None => (req.url.clone(), String::new()),
    };
    envs.insert("PATH_INFO".to_string(), path.clone());
    envs.insert("SCRIPT_NAME".to_string(), path);
    envs.insert("QUERY_STRING".to_string(), query);

    let server_name = conn
        .s_cfg
        .as_ref()
        .and_then(|cfg| cfg.server_names.first().cloned())
        .unwrap_or_else(|| "webserv".to_string());
    envs.insert("SERVER_NAME".to_string(), server_name);

    if let Ok(addr) = conn.stream.peer_addr() {
        envs.insert("REMOTE_ADDR".to_string(), addr.ip().to_string());
        envs.insert("REMOTE_PORT".to_string(), addr.port().to_string());
    }

    if let Some(ct) = req.headers.get("content-type") {
        envs.insert("CONTENT_TYPE".to_string(), ct.clone());
    }
    if let Some(cl) = req.headers.get("content-length") {
        envs.insert("CONTENT_LENGTH".to_string(), cl.clone());
    }

    for (k, v) in req.headers.iter() {
        let env_key = format!("HTTP_{}", k.to_uppercase().replace('-', "_"));
        envs.insert(env_key, v.clone());
    }

    envs
}

pub fn process_cgi_stdout(
    parse_state: &mut CgiParsingState,
    header_buf: &mut Vec<u8>,
    write_buffer: &mut Vec<u8>,
    new_data: &[u8],
    keep_alive: bool,
) -> Result<()> {
    match parse_state {
        CgiParsingState::ReadHeaders => {
            header_buf.extend_from_slice(new_data);

            if let Some(pos) =
                find_subsequence(header_buf, b"\r\n\r\n", 0).or_else(|| find_subsequence(header_buf, b"\n\n", 0))
            {
                let is_crlf = header_buf[..pos].contains(&b'\r');
                let delimiter_len = if is_crlf { 4 } else { 2 };

                let header_bytes = header_buf[..pos].to_vec();
                let body_start = header_buf[pos + delimiter_len..].to_vec();

                let (status, cgi_headers) = parse_cgi_headers(&header_bytes);
                let mut res = HttpResponse::new(status, status_text(status));
                res.headers.remove("content-length");
                res.set_connection_policy(keep_alive);

                for (k, v) in cgi_headers {
                    res.set_header(&k, &v);
                }

                let is_chunked = !res.headers.contains_key("content-length");
                if is_chunked {
                    res.set_header("transfer-encoding", "chunked");
                    *parse_state = CgiParsingState::StreamBodyChuncked;
                } else {
                    *parse_state = CgiParsingState::StreamBody;
                }

                write_buffer.extend_from_slice(&res.to_bytes_headers_only());

                if !body_start.is_empty() {
                    push_cgi_data(write_buffer, &body_start, is_chunked);
                }
            }
        }
        CgiParsingState::StreamBody => {
            write_buffer.extend_from_slice(new_data);
        }
        CgiParsingState::StreamBodyChuncked => {
            push_cgi_data(write_buffer, new_data, true);
        }
    }
    Ok(())
}

fn push_cgi_data(write_buffer: &mut Vec<u8>, data: &[u8], chunked: bool) {
    if chunked {
        let header = format!("{:X}\r\n", data.len());
        write_buffer.extend_from_slice(header.as_bytes());
        write_buffer.extend_from_slice(data);
        write_buffer.extend_from_slice(b"\r\n");
    } else {
        write_buffer.extend_from_slice(data);
    }
}

pub fn cleanup(cgi_to_client: &mut HashMap<Token, Token>, conn: &mut HttpConnection) {
    if let Some(t) = conn.cgi_out_token.take() {
        cgi_to_client.remove(&t);
    }
    if let Some(t) = conn.cgi_in_token.take() {
        cgi_to_client.remove(&t);
    }
}

pub fn force_cgi_timeout(conn: &mut HttpConnection, cgi_to_client: &mut HashMap<Token, Token>) {
    if let ActiveAction::Cgi { ref mut child, ref parse_state, .. } = conn.action {
        let _ = child.kill();
        let _ = child.wait();

        if *parse_state == CgiParsingState::StreamBodyChuncked {
            conn.write_buffer.extend_from_slice(b"0\r\n\r\n");
        } else {
            let mut res = handle_error(HTTP_GATEWAY_TIMEOUT, conn.s_cfg.as_ref());
            res.set_header("Connection", "close");
            conn.write_buffer.clear();
            conn.write_buffer.extend_from_slice(&res.to_bytes());
        }

        conn.cgi_in_token = None;
        conn.cgi_out_token = None;
        conn.cgi_buffer.clear();
        conn.closed = true;

        cleanup(cgi_to_client, conn);
        conn.action = ActiveAction::None;
    }
}
