use crate::error::{ConfigError, ParseResult};
use crate::lexer::Lexer;
use crate::tokens::{Loc, Token, TokenKind};
use crate::types::{AppConfig, ListenAddr, LocationConfig, ServerConfig};

pub struct ConfigParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ConfigParser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse_str(input: &str) -> ParseResult<AppConfig> {
        let tokens = Lexer::new(input)
            .tokenize()
            .map_err(|e| ConfigError::new(e, None).with_context("lexing phase"))?;
        let mut parser = ConfigParser::new(tokens);
        parser.parse_config()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_loc(&self) -> Option<Loc> {
        self.peek().map(|t| t.loc)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<()> {
        match self.advance() {
            Some(t) if std::mem::discriminant(&t.kind) == std::mem::discriminant(&kind) => Ok(()),
            Some(t) => Err(ConfigError::new(
                format!("expected {kind}, found {}", t.kind),
                Some(t.loc),
            )),
            None => Err(ConfigError::new(
                format!("expected {kind}, found end of file"),
                None,
            )),
        }
    }

    fn expect_word(&mut self) -> ParseResult<(String, Loc)> {
        match self.advance() {
            Some(Token {
                kind: TokenKind::Word(w),
                loc,
            }) => Ok((w, loc)),
            Some(Token {
                kind: TokenKind::StringLit(w),
                loc,
            }) => Ok((w, loc)),
            Some(t) => Err(ConfigError::new(
                format!("expected a word, found {}", t.kind),
                Some(t.loc),
            )),
            None => Err(ConfigError::new("expected a word, found end of file", None)),
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> ParseResult<()> {
        let (w, loc) = self.expect_word()?;
        if w == kw {
            Ok(())
        } else {
            Err(ConfigError::new(format!("expected '{kw}', found '{w}'"), Some(loc)))
        }
    }

    /// Reads one-or-more value tokens up to (and consuming) the terminating `;`.
    fn read_values(&mut self, directive: &str) -> ParseResult<Vec<String>> {
        let mut values = Vec::new();
        loop {
            match self.peek() {
                Some(Token {
                    kind: TokenKind::Semicolon,
                    ..
                }) => {
                    self.advance();
                    break;
                }
                Some(Token {
                    kind: TokenKind::Word(_) | TokenKind::StringLit(_),
                    ..
                }) => {
                    let (v, _) = self.expect_word()?;
                    values.push(v);
                }
                Some(t) => {
                    return Err(ConfigError::new(
                        format!("unexpected {} inside '{directive}' directive", t.kind),
                        Some(t.loc),
                    ));
                }
                None => {
                    return Err(ConfigError::new(
                        format!("unterminated '{directive}' directive (missing ';')"),
                        None,
                    ));
                }
            }
        }
        if values.is_empty() {
            return Err(ConfigError::new(
                format!("'{directive}' directive requires at least one value"),
                self.peek_loc(),
            ));
        }
        Ok(values)
    }

    pub fn parse_config(&mut self) -> ParseResult<AppConfig> {
        let mut servers = Vec::new();
        while self.peek().is_some() {
            self.expect_keyword("server")?;
            let server = self
                .parse_server_block()
                .map_err(|e| e.with_context("parsing server block"))?;
            servers.push(server);
        }
        if servers.is_empty() {
            return Err(ConfigError::new("configuration has no server blocks", None));
        }
        Ok(AppConfig { servers })
    }

    fn parse_server_block(&mut self) -> ParseResult<ServerConfig> {
        self.expect(TokenKind::LBrace)?;
        let mut cfg = ServerConfig::default();
        cfg.root = String::new(); // distinguish "unset" from the crate default until resolved later

        loop {
            match self.peek() {
                Some(Token {
                    kind: TokenKind::RBrace,
                    ..
                }) => {
                    self.advance();
                    break;
                }
                Some(Token {
                    kind: TokenKind::Word(w),
                    ..
                }) if w == "location" => {
                    self.advance();
                    cfg.locations.push(self.parse_location_block()?);
                }
                Some(_) => {
                    let (name, loc) = self.expect_word()?;
                    self.apply_server_directive(&mut cfg, &name, loc)?;
                }
                None => {
                    return Err(ConfigError::new("unterminated server block (missing '}')", None));
                }
            }
        }

        if cfg.root.is_empty() {
            cfg.root = crate::types::DEFAULT_ROOT.to_string();
        }
        Ok(cfg)
    }

    fn apply_server_directive(
        &mut self,
        cfg: &mut ServerConfig,
        name: &str,
        loc: Loc,
    ) -> ParseResult<()> {
        match name {
            "listen" => {
                for v in self.read_values("listen")? {
                    cfg.listen.push(parse_listen_addr(&v, loc)?);
                }
            }
            "server_name" => {
                cfg.server_names.extend(self.read_values("server_name")?);
            }
            "root" => {
                let mut v = self.read_values("root")?;
                cfg.root = v.remove(0);
            }
            "index" => {
                let mut v = self.read_values("index")?;
                cfg.index = v.remove(0);
            }
            "error_page" => {
                let values = self.read_values("error_page")?;
                if values.len() < 2 {
                    return Err(ConfigError::new(
                        "'error_page' requires one or more codes and a path",
                        Some(loc),
                    ));
                }
                let path = values.last().unwrap().clone();
                for code_str in &values[..values.len() - 1] {
                    let code: u16 = code_str
                        .parse()
                        .map_err(|_| ConfigError::new(format!("invalid status code '{code_str}'"), Some(loc)))?;
                    cfg.error_pages.insert(code, path.clone());
                }
            }
            "client_max_body_size" => {
                let mut v = self.read_values("client_max_body_size")?;
                cfg.client_max_body_size = parse_body_size(&v.remove(0), loc)?;
            }
            "default_server" => {
                if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Semicolon)) {
                    self.advance();
                    cfg.default_server = true;
                } else {
                    let mut v = self.read_values("default_server")?;
                    cfg.default_server = v.remove(0) != "off";
                }
            }
            other => {
                return Err(ConfigError::new(format!("unknown server directive '{other}'"), Some(loc)));
            }
        }
        Ok(())
    }

    fn parse_location_block(&mut self) -> ParseResult<LocationConfig> {
        let (path, _) = self.expect_word()?;
        self.expect(TokenKind::LBrace)?;
        let mut loc_cfg = LocationConfig {
            path,
            ..Default::default()
        };

        loop {
            match self.peek() {
                Some(Token {
                    kind: TokenKind::RBrace,
                    ..
                }) => {
                    self.advance();
                    break;
                }
                Some(_) => {
                    let (name, loc) = self.expect_word()?;
                    self.apply_location_directive(&mut loc_cfg, &name, loc)?;
                }
                None => {
                    return Err(ConfigError::new("unterminated location block (missing '}')", None));
                }
            }
        }
        Ok(loc_cfg)
    }

    fn apply_location_directive(
        &mut self,
        loc_cfg: &mut LocationConfig,
        name: &str,
        loc: Loc,
    ) -> ParseResult<()> {
        match name {
            "root" => {
                let mut v = self.read_values("root")?;
                loc_cfg.root = Some(v.remove(0));
            }
            "index" => {
                let mut v = self.read_values("index")?;
                loc_cfg.index = Some(v.remove(0));
            }
            "autoindex" => {
                let mut v = self.read_values("autoindex")?;
                let word = v.remove(0);
                loc_cfg.autoindex = match word.as_str() {
                    "on" => true,
                    "off" => false,
                    other => {
                        return Err(ConfigError::new(
                            format!("'autoindex' expects 'on' or 'off', found '{other}'"),
                            Some(loc),
                        ));
                    }
                };
            }
            "allow_methods" => {
                loc_cfg.allow_methods = self.read_values("allow_methods")?;
            }
            "cgi_pass" => {
                let v = self.read_values("cgi_pass")?;
                if v.len() != 2 {
                    return Err(ConfigError::new(
                        "'cgi_pass' requires exactly an extension and an executor path",
                        Some(loc),
                    ));
                }
                let ext = v[0].trim_start_matches('.').to_string();
                loc_cfg.cgi_pass.insert(ext, v[1].clone());
            }
            "return" => {
                let mut v = self.read_values("return")?;
                loc_cfg.redirect = Some(v.remove(0));
            }
            "client_max_body_size" => {
                let mut v = self.read_values("client_max_body_size")?;
                loc_cfg.client_max_body_size = parse_body_size(&v.remove(0), loc)?;
            }
            other => {
                return Err(ConfigError::new(format!("unknown location directive '{other}'"), Some(loc)));
            }
        }
        Ok(())
    }
}

fn parse_listen_addr(raw: &str, loc: Loc) -> ParseResult<ListenAddr> {
    let (ip, port_str) = match raw.rsplit_once(':') {
        Some((ip, port)) => (ip.to_string(), port),
        None => ("0.0.0.0".to_string(), raw),
    };
    let port: u16 = port_str
        .parse()
        .map_err(|_| ConfigError::new(format!("invalid port in listen directive: '{raw}'"), Some(loc)))?;
    if port == 0 {
        return Err(ConfigError::new(format!("port must be in 1..=65535, found '{raw}'"), Some(loc)));
    }
    let ip = if ip.is_empty() { "0.0.0.0".to_string() } else { ip };
    Ok(ListenAddr { ip, port })
}

fn parse_body_size(raw: &str, loc: Loc) -> ParseResult<usize> {
    let lower = raw.to_ascii_lowercase();
    let (digits, multiplier) = if let Some(stripped) = lower.strip_suffix('k') {
        (stripped, 1024)
    } else if let Some(stripped) = lower.strip_suffix('m') {
        (stripped, 1024 * 1024)
    } else {
        (lower.as_str(), 1)
    };
    let n: usize = digits
        .parse()
        .map_err(|_| ConfigError::new(format!("invalid body size '{raw}'"), Some(loc)))?;
    Ok(n * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_server() {
        let src = r#"
            server {
                listen 8080;
                server_name example.com;
                root /var/www;
                index index.html;
            }
        "#;
        let cfg = ConfigParser::parse_str(src).unwrap();
        assert_eq!(cfg.servers.len(), 1);
        let s = &cfg.servers[0];
        assert_eq!(s.listen, vec![ListenAddr { ip: "0.0.0.0".into(), port: 8080 }]);
        assert_eq!(s.server_names, vec!["example.com"]);
        assert_eq!(s.root, "/var/www");
    }

    #[test]
    fn parses_location_with_cgi_and_methods() {
        let src = r#"
            server {
                listen 127.0.0.1:9000;
                location /cgi {
                    allow_methods GET POST;
                    cgi_pass .py /usr/bin/python3;
                }
            }
        "#;
        let cfg = ConfigParser::parse_str(src).unwrap();
        let loc = &cfg.servers[0].locations[0];
        assert_eq!(loc.path, "/cgi");
        assert_eq!(loc.allow_methods, vec!["GET", "POST"]);
        assert_eq!(loc.cgi_pass.get("py").unwrap(), "/usr/bin/python3");
    }

    #[test]
    fn body_size_suffixes() {
        let src = "server { listen 80; client_max_body_size 10m; }";
        let cfg = ConfigParser::parse_str(src).unwrap();
        assert_eq!(cfg.servers[0].client_max_body_size, 10 * 1024 * 1024);
    }

    #[test]
    fn rejects_unknown_directive() {
        let src = "server { listen 80; bogus_directive x; }";
        assert!(ConfigParser::parse_str(src).is_err());
    }

    #[test]
    fn rejects_invalid_port() {
        let src = "server { listen 99999; }";
        assert!(ConfigParser::parse_str(src).is_err());
    }
}
