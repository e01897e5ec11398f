use crate::prelude::*;
use std::net::SocketAddr;

/// Owns every listening socket, every live connection, the CGI-pipe-token ↔
/// client-token map, and the zombie-process purgatory for children that
/// ignored a `kill()` before their connection was torn down.
pub struct Server {
    pub connections: HashMap<Token, HttpConnection>,
    pub cgi_to_client: HashMap<Token, Token>,
    pub zombie_purgatory: Vec<std::process::Child>,
    listeners: HashMap<Token, (TcpListener, u16)>,
    configs_by_port: HashMap<u16, Vec<Arc<ServerConfig>>>,
    next_token: usize,
}

impl Server {
    /// Binds one socket per distinct numeric port across the whole config
    /// (deduplication key is the port only, matching the original source's
    /// `_globalSocketMap`), and leaves every other socket/token empty.
    pub fn new(config: AppConfig, poll: &Poll) -> Result<Self> {
        let shared_configs: Vec<Arc<ServerConfig>> = config.servers.into_iter().map(Arc::new).collect();

        let mut listeners = HashMap::new();
        let mut port_tokens: HashMap<u16, Token> = HashMap::new();
        let mut configs_by_port: HashMap<u16, Vec<Arc<ServerConfig>>> = HashMap::new();
        let mut next_token = 0usize;

        for cfg in &shared_configs {
            for addr in &cfg.listen {
                configs_by_port.entry(addr.port).or_default().push(Arc::clone(cfg));

                if port_tokens.contains_key(&addr.port) {
                    continue;
                }

                let socket_addr: SocketAddr = format!("{}:{}", addr.ip, addr.port)
                    .parse()
                    .map_err(|_| CleanError::from(format!("invalid listen address {}:{}", addr.ip, addr.port)))?;

                let mut listener = TcpListener::bind(socket_addr)?;
                let token = Token(next_token);
                next_token += 1;
                poll.registry().register(&mut listener, token, Interest::READABLE)?;

                info!("listening on {socket_addr}");
                port_tokens.insert(addr.port, token);
                listeners.insert(token, (listener, addr.port));
            }
        }

        Ok(Server {
            connections: HashMap::new(),
            cgi_to_client: HashMap::new(),
            zombie_purgatory: Vec::new(),
            listeners,
            configs_by_port,
            next_token,
        })
    }

    pub fn run(mut self, mut poll: Poll) -> Result<()> {
        let mut events = Events::with_capacity(1024);

        loop {
            if let Err(e) = poll.poll(&mut events, Some(Duration::from_secs(1))) {
                if e.kind() == ErrorKind::Interrupted {
                    continue;
                }
                return Err(e.into());
            }

            // Pass 1: accept every ready listener before touching client events,
            // so freshly accepted sockets aren't polled again this iteration.
            let ready_listeners: Vec<Token> = events
                .iter()
                .map(|e| e.token())
                .filter(|t| self.listeners.contains_key(t))
                .collect();
            for token in ready_listeners {
                self.accept_connections(token, &poll)?;
            }

            // Pass 2: dispatch every other ready fd to its owning connection,
            // either as a socket event or a CGI-pipe event.
            let other_events: Vec<ReadyEvent> = events
                .iter()
                .filter(|e| !self.listeners.contains_key(&e.token()))
                .map(ReadyEvent::from)
                .collect();
            for ready in other_events {
                if let Some(client_token) = self.cgi_to_client.get(&ready.token).copied() {
                    self.handle_cgi_ready(&poll, &ready, client_token)?;
                } else if self.connections.contains_key(&ready.token) {
                    self.handle_client_ready(&poll, &ready)?;
                }
            }

            // Pass 3: close sweep.
            let to_close: Vec<Token> = self
                .connections
                .iter()
                .filter(|(_, conn)| conn.should_close())
                .map(|(token, _)| *token)
                .collect();
            for token in to_close {
                HttpConnection::terminate(&mut self, token);
            }

            // Pass 4: timeout sweep (idle clients, stuck CGI children).
            timeouts::process(&mut self, &poll);

            self.reap_zombies();
        }
    }

    fn accept_connections(&mut self, listener_token: Token, poll: &Poll) -> Result<()> {
        let Some((listener, port)) = self.listeners.get(&listener_token) else {
            return Ok(());
        };
        let config_list = self.configs_by_port.get(port).cloned().unwrap_or_default();

        loop {
            match listener.accept() {
                Ok((mut stream, peer)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    poll.registry().register(&mut stream, token, Interest::READABLE | Interest::WRITABLE)?;
                    debug!("accepted connection {peer} as {token:?} on port {port}");
                    self.connections.insert(token, HttpConnection::new(stream, config_list.clone()));
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    errors!("accept failed on port {port}: {e}");
                    break;
                }
            }
        }
        Ok(())
    }

    fn handle_client_ready(&mut self, poll: &Poll, ready: &ReadyEvent) -> Result<()> {
        let token = ready.token;
        if ready.is_error || (ready.is_read_closed && ready.is_write_closed) {
            if let Some(conn) = self.connections.get_mut(&token) {
                conn.closed = true;
            }
            return Ok(());
        }

        if ready.is_readable {
            if let Some(conn) = self.connections.get_mut(&token) {
                HttpConnection::handle_read_phase(conn, poll, token, &mut self.next_token, &mut self.cgi_to_client)?;
            }
        }
        if ready.is_writable {
            if let Some(conn) = self.connections.get_mut(&token) {
                HttpConnection::handle_write_phase(conn, poll, token, &mut self.next_token, &mut self.cgi_to_client)?;
            }
        }
        Ok(())
    }

    fn handle_cgi_ready(&mut self, poll: &Poll, ready: &ReadyEvent, client_token: Token) -> Result<()> {
        if let Some(conn) = self.connections.get_mut(&client_token) {
            cgi::handle_cgi_event(poll, ready.is_readable, ready.is_writable, ready.token, client_token, conn, &mut self.cgi_to_client)?;
        }
        Ok(())
    }

    fn reap_zombies(&mut self) {
        self.zombie_purgatory.retain_mut(|child| matches!(child.try_wait(), Ok(None)));
    }
}

/// Plain-data snapshot of a single `mio::event::Event`, taken so the two
/// dispatch passes don't need to borrow `Events` across mutation of `self`.
struct ReadyEvent {
    token: Token,
    is_readable: bool,
    is_writable: bool,
    is_error: bool,
    is_read_closed: bool,
    is_write_closed: bool,
}

impl From<&Event> for ReadyEvent {
    fn from(event: &Event) -> Self {
        ReadyEvent {
            token: event.token(),
            is_readable: event.is_readable(),
            is_writable: event.is_writable(),
            is_error: event.is_error(),
            is_read_closed: event.is_read_closed(),
            is_write_closed: event.is_write_closed(),
        }
    }
}
