use config_lang::{LocationConfig, ServerConfig};
use webserv::http::Method;
use webserv::router::{self, RoutingError};

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
fn resolves_the_root_location() {
    let cfg = server_with(vec![location("/")]);
    let result = router::resolve(&cfg, "/index.html");
    assert_eq!(result.unwrap().path, "/");
}

#[test]
fn longest_prefix_wins_over_a_shorter_one() {
    let cfg = server_with(vec![location("/a"), location("/a/b")]);
    let result = router::resolve(&cfg, "/a/b/c");
    assert_eq!(result.unwrap().path, "/a/b");
}

#[test]
fn no_matching_prefix_is_not_found() {
    let cfg = server_with(vec![location("/a")]);
    let result = router::resolve(&cfg, "/b");
    assert_eq!(result.unwrap_err(), RoutingError::NotFound);
}

#[test]
fn empty_location_list_never_resolves() {
    let cfg = server_with(vec![]);
    assert!(router::resolve(&cfg, "/").is_err());
}

#[test]
fn router_does_not_enforce_methods_itself() {
    // Method allow-lists are enforced by the connection state machine, not
    // the router: a location with a restrictive allow-list still resolves.
    let mut loc = location("/api");
    loc.allow_methods = vec!["GET".to_string()];
    let cfg = server_with(vec![loc]);

    let resolved = router::resolve(&cfg, "/api/widgets").unwrap();
    assert!(!Method::Delete.is_allowed(&resolved.allow_methods));
    assert!(Method::Get.is_allowed(&resolved.allow_methods));
}

#[test]
fn empty_allow_list_permits_any_method() {
    let loc = location("/");
    assert!(Method::Delete.is_allowed(&loc.allow_methods));
    assert!(Method::Post.is_allowed(&loc.allow_methods));
}
