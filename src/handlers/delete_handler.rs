use crate::prelude::*;

pub fn handle_delete(
    request: &HttpRequest,
    location: &LocationConfig,
    s_cfg: &Arc<ServerConfig>,
) -> HttpResponse {
    let root = location.root.as_deref().unwrap_or(&s_cfg.root);
    let root_base = PathBuf::from(root);

    let relative_path = request.url.strip_prefix(location.path.as_str()).unwrap_or(&request.url);
    let target_path = root_base.join(relative_path.trim_start_matches('/'));

    // Canonicalize both sides so `DELETE /files/../../etc/passwd` can't escape root.
    let absolute_root = match root_base.canonicalize() {
        Ok(path) => path,
        Err(_) => return handle_error(HTTP_NOT_FOUND, Some(s_cfg)),
    };

    let absolute_target = match target_path.canonicalize() {
        Ok(path) => path,
        Err(e) => {
            return match e.kind() {
                ErrorKind::NotFound => handle_error(HTTP_NOT_FOUND, Some(s_cfg)),
                _ => handle_error(HTTP_FORBIDDEN, Some(s_cfg)),
            };
        }
    };

    if !absolute_target.starts_with(&absolute_root) {
        return handle_error(HTTP_FORBIDDEN, Some(s_cfg));
    }

    if absolute_target.is_dir() {
        return handle_error(HTTP_FORBIDDEN, Some(s_cfg));
    }

    match fs::remove_file(&absolute_target) {
        Ok(_) => HttpResponse::new(HTTP_NO_CONTENT, "No Content"),
        Err(e) => match e.kind() {
            ErrorKind::NotFound => handle_error(HTTP_NOT_FOUND, Some(s_cfg)),
            ErrorKind::PermissionDenied => handle_error(HTTP_FORBIDDEN, Some(s_cfg)),
            _ => handle_error(HTTP_INTERNAL_SERVER_ERROR, Some(s_cfg)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn cfg(root: &str) -> Arc<ServerConfig> {
        Arc::new(ServerConfig {
            root: root.to_string(),
            ..Default::default()
        })
    }

    fn loc() -> LocationConfig {
        LocationConfig {
            path: "/".to_string(),
            ..Default::default()
        }
    }

    fn request_for(url: &str) -> HttpRequest {
        let mut r = HttpRequest::new();
        r.method = Method::Delete;
        r.url = url.to_string();
        r
    }

    #[test]
    fn deletes_existing_file() {
        let dir = std::env::temp_dir().join(format!("webserv_delete_test_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let file_path = dir.join("victim.txt");
        std::fs::File::create(&file_path).unwrap().write_all(b"bye").unwrap();

        let s_cfg = cfg(dir.to_str().unwrap());
        let req = request_for("/victim.txt");
        let res = handle_delete(&req, &loc(), &s_cfg);

        assert_eq!(res.status_code, HTTP_NO_CONTENT);
        assert!(!file_path.exists());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn rejects_path_traversal_outside_root() {
        let dir = std::env::temp_dir().join(format!("webserv_delete_test_trav_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let s_cfg = cfg(dir.to_str().unwrap());
        let req = request_for("/../../etc/passwd");
        let res = handle_delete(&req, &loc(), &s_cfg);

        assert_ne!(res.status_code, HTTP_NO_CONTENT);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_is_404() {
        let dir = std::env::temp_dir().join(format!("webserv_delete_test_missing_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let s_cfg = cfg(dir.to_str().unwrap());
        let req = request_for("/nope.txt");
        let res = handle_delete(&req, &loc(), &s_cfg);

        assert_eq!(res.status_code, HTTP_NOT_FOUND);
        fs::remove_dir_all(&dir).ok();
    }
}
