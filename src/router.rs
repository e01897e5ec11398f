use crate::prelude::*;

#[derive(Debug, PartialEq, Eq)]
pub enum RoutingError {
    NotFound,
}

/// Longest-prefix location match within the already-selected server block.
/// Ties at equal length keep the first-declared location, so declaration
/// order in the config is a stable tiebreaker. Method allow-lists, body
/// limits and redirects are not enforced here; the connection state machine
/// applies those to whatever location this returns.
pub fn resolve<'a>(s_cfg: &'a ServerConfig, url: &str) -> std::result::Result<&'a LocationConfig, RoutingError> {
    let mut best: Option<&LocationConfig> = None;
    for loc in &s_cfg.locations {
        if !url.starts_with(loc.path.as_str()) {
            continue;
        }
        match best {
            Some(current) if current.path.len() >= loc.path.len() => {}
            _ => best = Some(loc),
        }
    }
    best.ok_or(RoutingError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(path: &str) -> LocationConfig {
        LocationConfig {
            path: path.to_string(),
            ..Default::default()
        }
    }

    fn server_with(locations: Vec<LocationConfig>) -> ServerConfig {
        ServerConfig {
            locations,
            ..Default::default()
        }
    }

    #[test]
    fn matches_the_root_location() {
        let cfg = server_with(vec![location("/")]);
        let result = resolve(&cfg, "/index.html");
        assert_eq!(result.unwrap().path, "/");
    }

    #[test]
    fn prefers_the_longest_matching_prefix() {
        let cfg = server_with(vec![location("/a"), location("/a/b")]);
        let result = resolve(&cfg, "/a/b/c");
        assert_eq!(result.unwrap().path, "/a/b");
    }

    #[test]
    fn ties_at_equal_length_keep_the_first_declared() {
        let mut first = location("/a");
        first.index = Some("first.html".to_string());
        let mut second = location("/a");
        second.index = Some("second.html".to_string());
        let cfg = server_with(vec![first, second]);
        let result = resolve(&cfg, "/a/thing");
        assert_eq!(result.unwrap().index.as_deref(), Some("first.html"));
    }

    #[test]
    fn no_matching_location_is_not_found() {
        let cfg = server_with(vec![location("/a")]);
        let result = resolve(&cfg, "/b");
        assert_eq!(result.unwrap_err(), RoutingError::NotFound);
    }
}
