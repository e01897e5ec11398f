use config_lang::{load, ConfigParser};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_server_config() {
        let src = r#"
            server {
                listen 0.0.0.0:80;
                listen 443;
                server_name myserv;
                client_max_body_size 2048;
                root ./www;
            }
        "#;
        let config = ConfigParser::parse_str(src).unwrap();
        let server = &config.servers[0];
        assert_eq!(server.listen.len(), 2);
        assert_eq!(server.listen[0].ip, "0.0.0.0");
        assert_eq!(server.listen[0].port, 80);
        assert_eq!(server.listen[1].port, 443);
        assert_eq!(server.server_names, vec!["myserv"]);
        assert_eq!(server.client_max_body_size, 2048);
        assert_eq!(server.root, "./www");
    }

    #[test]
    fn test_multiple_servers_with_locations() {
        let src = r#"
            server {
                listen 8080;
                server_name test_server;
                root ./www;
                location / {
                    allow_methods GET;
                    autoindex on;
                }
                location /upload {
                    allow_methods POST DELETE;
                    client_max_body_size 5m;
                }
            }
            server {
                listen 8081;
                server_name other_server;
            }
        "#;
        let config = ConfigParser::parse_str(src).expect("should parse valid config");
        assert_eq!(config.servers.len(), 2);
        let server = &config.servers[0];
        assert_eq!(server.locations.len(), 2);
        assert_eq!(server.locations[0].path, "/");
        assert!(server.locations[0].autoindex);
        assert_eq!(server.locations[1].allow_methods, vec!["POST", "DELETE"]);
        assert_eq!(server.locations[1].client_max_body_size, 5 * 1024 * 1024);
    }

    #[test]
    fn test_error_pages_and_redirects() {
        let src = r#"
            server {
                listen 80;
                error_page 404 500 502 /errors/generic.html;
                location /old {
                    return /new;
                }
            }
        "#;
        let config = ConfigParser::parse_str(src).unwrap();
        let server = &config.servers[0];
        assert_eq!(server.error_pages.get(&404).unwrap(), "/errors/generic.html");
        assert_eq!(server.error_pages.get(&502).unwrap(), "/errors/generic.html");
        assert_eq!(server.locations[0].redirect.as_deref(), Some("/new"));
    }

    #[test]
    fn test_rejects_malformed_config() {
        assert!(ConfigParser::parse_str("server {").is_err());
        assert!(ConfigParser::parse_str("server { listen abc; }").is_err());
        assert!(ConfigParser::parse_str("not_a_server {}").is_err());
    }

    #[test]
    fn test_load_drops_conflicting_blocks_but_keeps_valid_ones() {
        let src = r#"
            server {
                listen 0.0.0.0:8080;
                server_name dup.com;
                root .;
            }
            server {
                listen 0.0.0.0:8080;
                server_name dup.com;
                root .;
            }
            server {
                listen 0.0.0.0:9090;
                server_name fine.com;
                root .;
            }
        "#;
        let config = load(src).expect("at least one valid block should remain");
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].server_names, vec!["fine.com"]);
    }
}
