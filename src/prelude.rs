pub use config_lang::{AppConfig, ListenAddr, LocationConfig, ServerConfig};
pub use mio::{
    Events, Interest, Poll, Token,
    event::Event,
    net::TcpListener,
    net::TcpStream,
};
pub use proxy_log::{debug, errors, info, trace, warn};
pub use std::collections::HashMap;
pub use std::fs::{self, File};
pub use std::io::{ErrorKind, Read, Write};
pub use std::net::Shutdown;
pub use std::os::unix::fs::MetadataExt;
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;
pub use std::time::{Duration, Instant, SystemTime};

pub use std::{
    fmt::{self, Display},
    os::unix::net::UnixStream,
    process::{Command, Stdio},
    str::FromStr,
};

pub use crate::cgi::{self, CgiParsingState};
pub use crate::error::{CleanError, Result};
pub use crate::handlers::*;
pub use crate::http::*;
pub use crate::router::{self, RoutingError};
pub use crate::server::Server;
pub use crate::timeouts;

pub const READ_BUF_SIZE: usize = 4096;

// 2xx
pub const HTTP_OK: u16 = 200;
pub const HTTP_CREATED: u16 = 201;
pub const HTTP_NO_CONTENT: u16 = 204;

// 3xx
pub const HTTP_MOVED_PERMANENTLY: u16 = 301;

// 4xx
pub const HTTP_BAD_REQUEST: u16 = 400;
pub const HTTP_FORBIDDEN: u16 = 403;
pub const HTTP_NOT_FOUND: u16 = 404;
pub const HTTP_METHOD_NOT_ALLOWED: u16 = 405;
pub const HTTP_REQUEST_TIMEOUT: u16 = 408;
pub const HTTP_PAYLOAD_TOO_LARGE: u16 = 413;
pub const HTTP_URI_TOO_LONG: u16 = 414;

// 5xx
pub const HTTP_INTERNAL_SERVER_ERROR: u16 = 500;
pub const HTTP_NOT_IMPLEMENTED: u16 = 501;
pub const HTTP_BAD_GATEWAY: u16 = 502;
pub const HTTP_SERVICE_UNAVAILABLE: u16 = 503;
pub const HTTP_GATEWAY_TIMEOUT: u16 = 504;

pub const MAX_READ_DATA: usize = u16::MAX as usize; // 64KB, caps how much we buffer per read pass

pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);
pub const CGI_TIMEOUT_SECS: u64 = 10;
