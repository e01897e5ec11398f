//! Lexer, parser and validator for the server's brace/semicolon configuration
//! grammar (`server { listen 8080; location /path { ... } }`).

pub mod display;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod tokens;
pub mod types;
pub mod validate;

pub use error::{ConfigError, ParseResult};
pub use parser::ConfigParser;
pub use types::{AppConfig, ListenAddr, LocationConfig, ServerConfig};

/// Parses and validates a configuration file's contents in one call: the
/// shape the CLI entry point wants.
pub fn load(input: &str) -> ParseResult<AppConfig> {
    let parsed = ConfigParser::parse_str(input)?;
    let servers = validate::validate_configs(parsed.servers);
    if servers.is_empty() {
        return Err(ConfigError::new(
            "no valid server blocks remained after validation",
            None,
        ));
    }
    Ok(AppConfig { servers })
}
