use std::collections::HashMap;

pub const DEFAULT_ROOT: &str = "./www";
pub const DEFAULT_MAX_BODY_SIZE: usize = 1_048_576; // 1 MiB; 0 means unlimited

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenAddr {
    pub ip: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct LocationConfig {
    pub path: String,
    pub root: Option<String>,
    pub index: Option<String>,
    pub autoindex: bool,
    /// empty means every method is allowed
    pub allow_methods: Vec<String>,
    /// file extension (no leading dot, e.g. "py") -> interpreter path
    pub cgi_pass: HashMap<String, String>,
    pub redirect: Option<String>,
    /// 0 means "no override"; the server's limit applies
    pub client_max_body_size: usize,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            root: None,
            index: None,
            autoindex: false,
            allow_methods: Vec::new(),
            cgi_pass: HashMap::new(),
            redirect: None,
            client_max_body_size: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: Vec<ListenAddr>,
    pub server_names: Vec<String>,
    pub root: String,
    pub index: String,
    pub error_pages: HashMap<u16, String>,
    /// 0 means unlimited
    pub client_max_body_size: usize,
    pub locations: Vec<LocationConfig>,
    /// selected when a listening port has no server_name matching the Host header
    pub default_server: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: Vec::new(),
            server_names: Vec::new(),
            root: DEFAULT_ROOT.to_string(),
            index: "index.html".to_string(),
            error_pages: HashMap::new(),
            client_max_body_size: DEFAULT_MAX_BODY_SIZE,
            locations: Vec::new(),
            default_server: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub servers: Vec<ServerConfig>,
}
