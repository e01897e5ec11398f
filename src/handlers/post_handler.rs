use crate::prelude::*;

/// Begins a POST upload: resolves the target path under the location's root,
/// opens (creating/truncating) the destination file, and hands control back
/// to the request parser to stream the body straight into it verbatim — no
/// multipart boundary parsing, matching a plain file-upload PUT-like POST.
pub fn handle_post_begin(
    request: &HttpRequest,
    location: &LocationConfig,
    s_cfg: &Arc<ServerConfig>,
) -> std::result::Result<(Option<HttpResponse>, ActiveAction), HttpResponse> {
    let root = location.root.as_deref().unwrap_or(&s_cfg.root);
    let root_base = PathBuf::from(root);

    let relative = request.url.strip_prefix(location.path.as_str()).unwrap_or(&request.url);
    let relative = relative.trim_start_matches('/');

    let (target_path, resource_url) = if relative.is_empty() || root_base.join(relative).is_dir() {
        let filename = request.extract_filename();
        let url = format!("{}/{filename}", request.url.trim_end_matches('/'));
        (root_base.join(relative).join(&filename), url)
    } else {
        (root_base.join(relative), request.url.clone())
    };

    if let Some(parent) = target_path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return Err(handle_error(HTTP_INTERNAL_SERVER_ERROR, Some(s_cfg)));
        }
    }

    let file = match File::create(&target_path) {
        Ok(f) => f,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::PermissionDenied => HTTP_FORBIDDEN,
                _ => HTTP_INTERNAL_SERVER_ERROR,
            };
            return Err(handle_error(code, Some(s_cfg)));
        }
    };

    if request.content_length() == 0 {
        return Ok((Some(handle_post_complete(&resource_url)), ActiveAction::None));
    }

    Ok((None, ActiveAction::Upload(file, resource_url)))
}

/// Called once the full body has been written to the upload file, to produce
/// the deferred 201 response the parser couldn't build at `setup_action` time.
pub fn handle_post_complete(resource_url: &str) -> HttpResponse {
    let mut response = HttpResponse::new(HTTP_CREATED, "Created");
    response.set_header("Content-Length", "0");
    response.set_header("Location", resource_url);
    response
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
            path: "/upload".to_string(),
            ..Default::default()
        }
    }

    fn request_for(url: &str, content_length: usize) -> HttpRequest {
        let mut r = HttpRequest::new();
        r.method = Method::Post;
        r.url = url.to_string();
        if content_length > 0 {
            r.headers.insert("content-length".to_string(), content_length.to_string());
        }
        r
    }

    #[test]
    fn opens_file_for_streaming_when_body_present() {
        let dir = std::env::temp_dir().join(format!("webserv_post_test_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let s_cfg = cfg(dir.to_str().unwrap());
        let req = request_for("/upload/file.txt", 5);
        let (response, action) = handle_post_begin(&req, &loc(), &s_cfg).unwrap();

        assert!(response.is_none());
        assert!(matches!(action, ActiveAction::Upload(_, _)));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn created_response_carries_location_header() {
        let dir = std::env::temp_dir().join(format!("webserv_post_test_loc_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let s_cfg = cfg(dir.to_str().unwrap());
        let req = request_for("/upload/file.txt", 0);
        let (response, _) = handle_post_begin(&req, &loc(), &s_cfg).unwrap();

        assert_eq!(response.unwrap().headers.get("location").unwrap(), "/upload/file.txt");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn zero_length_body_responds_immediately() {
        let dir = std::env::temp_dir().join(format!("webserv_post_test_empty_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let s_cfg = cfg(dir.to_str().unwrap());
        let req = request_for("/upload/empty.txt", 0);
        let (response, action) = handle_post_begin(&req, &loc(), &s_cfg).unwrap();

        assert_eq!(response.unwrap().status_code, HTTP_CREATED);
        assert!(matches!(action, ActiveAction::None));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn directory_target_gets_a_generated_filename() {
        let dir = std::env::temp_dir().join(format!("webserv_post_test_dir_{}", std::process::id()));
        fs::create_dir_all(dir.join("upload")).unwrap();

        let s_cfg = cfg(dir.to_str().unwrap());
        let mut req = request_for("/upload/", 5);
        req.url = "/upload/".to_string();
        let (_, action) = handle_post_begin(&req, &loc(), &s_cfg).unwrap();

        assert!(matches!(action, ActiveAction::Upload(_, _)));
        let mut entries = fs::read_dir(dir.join("upload")).unwrap();
        assert!(entries.next().is_some());
        fs::remove_dir_all(&dir).ok();
    }
}
