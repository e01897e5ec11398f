use crate::types::ServerConfig;
use std::collections::{HashMap, HashSet};

/// Drops conflicting or malformed server blocks, logging why, rather than
/// aborting the whole load. Port range and bind-time errors are still hard
/// failures elsewhere; this pass only resolves ambiguity between blocks that
/// parsed fine individually but can't coexist.
pub fn validate_configs(configs: Vec<ServerConfig>) -> Vec<ServerConfig> {
    let mut dropped = HashSet::new();

    // (ip, port, server_name) collisions - same virtual host declared twice.
    let mut usage: HashMap<(String, u16, String), Vec<usize>> = HashMap::new();
    for (idx, cfg) in configs.iter().enumerate() {
        let names = if cfg.server_names.is_empty() {
            vec![String::new()]
        } else {
            cfg.server_names.clone()
        };
        for addr in &cfg.listen {
            for name in &names {
                usage
                    .entry((addr.ip.clone(), addr.port, name.clone()))
                    .or_default()
                    .push(idx);
            }
        }
    }
    for ((ip, port, name), indices) in &usage {
        if indices.len() > 1 {
            println!(
                "\x1b[1;31mconflict:\x1b[0m multiple servers bind {ip}:{port} with name '{name}'; dropping them"
            );
            dropped.extend(indices);
        }
    }

    // wildcard 0.0.0.0 vs a specific IP on the same port can't both bind.
    let mut port_ips: HashMap<u16, HashSet<String>> = HashMap::new();
    for cfg in &configs {
        for addr in &cfg.listen {
            port_ips.entry(addr.port).or_default().insert(addr.ip.clone());
        }
    }
    for (port, ips) in &port_ips {
        if ips.len() > 1 && ips.contains("0.0.0.0") {
            println!(
                "\x1b[1;31mconflict:\x1b[0m port {port} mixes wildcard 0.0.0.0 with specific addresses {ips:?}; dropping all of them"
            );
            for (idx, cfg) in configs.iter().enumerate() {
                if cfg.listen.iter().any(|a| a.port == *port) {
                    dropped.insert(idx);
                }
            }
        }
    }

    // per-block sanity: status codes and filesystem existence.
    for (idx, cfg) in configs.iter().enumerate() {
        let mut ok = true;
        for (code, path) in &cfg.error_pages {
            if !(100..=599).contains(code) {
                println!(
                    "\x1b[1;31minvalid:\x1b[0m server with root '{}' has error_page code {code} outside 100-599",
                    cfg.root
                );
                ok = false;
            }
            if std::fs::metadata(path).is_err() {
                println!(
                    "\x1b[1;31mmissing file:\x1b[0m error_page {code} refers to '{path}' which does not exist"
                );
                ok = false;
            }
        }
        if std::fs::metadata(&cfg.root).is_err() {
            println!("\x1b[1;31mmissing root:\x1b[0m '{}' does not exist", cfg.root);
            ok = false;
        }
        for location in &cfg.locations {
            if let Some(root) = &location.root {
                if std::fs::metadata(root).is_err() {
                    println!(
                        "\x1b[1;31mmissing root:\x1b[0m location '{}' root '{root}' does not exist",
                        location.path
                    );
                    ok = false;
                }
            }
        }
        if !ok {
            dropped.insert(idx);
        }
    }

    if !dropped.is_empty() {
        println!(
            "\x1b[33mresult:\x1b[0m {} server block(s) dropped during validation",
            dropped.len()
        );
    }

    configs
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| !dropped.contains(idx))
        .map(|(_, cfg)| cfg)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ListenAddr;

    fn make(ip: &str, port: u16, name: &str) -> ServerConfig {
        let mut c = ServerConfig::default();
        c.listen.push(ListenAddr {
            ip: ip.to_string(),
            port,
        });
        c.server_names.push(name.to_string());
        c.root = ".".to_string(); // always exists
        c
    }

    #[test]
    fn keeps_distinct_virtual_hosts() {
        let configs = vec![
            make("0.0.0.0", 8080, "a.com"),
            make("0.0.0.0", 8080, "b.com"),
        ];
        assert_eq!(validate_configs(configs).len(), 2);
    }

    #[test]
    fn drops_exact_duplicates() {
        let configs = vec![
            make("127.0.0.1", 8080, "same.com"),
            make("127.0.0.1", 8080, "same.com"),
            make("127.0.0.1", 8081, "other.com"),
        ];
        let valid = validate_configs(configs);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].server_names, vec!["other.com"]);
    }

    #[test]
    fn drops_wildcard_vs_specific_clash() {
        let configs = vec![make("0.0.0.0", 80, "a"), make("10.0.0.5", 80, "b")];
        assert_eq!(validate_configs(configs).len(), 0);
    }

    #[test]
    fn drops_missing_root() {
        let mut c = make("0.0.0.0", 80, "a");
        c.root = "/this/path/does/not/exist/anywhere".to_string();
        assert_eq!(validate_configs(vec![c]).len(), 0);
    }
}
