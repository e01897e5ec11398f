use crate::prelude::*;

/// Serves a static file (or a directory listing/index) under a location's
/// root. HEAD follows the identical resolution path and headers as GET but
/// never attaches a `FileDownload` action, so no body bytes are streamed.
pub fn handle_get(
    request: &HttpRequest,
    location: &LocationConfig,
    s_cfg: &Arc<ServerConfig>,
) -> (HttpResponse, ActiveAction) {
    let root = location.root.as_deref().unwrap_or(&s_cfg.root);
    let relative = request.url.strip_prefix(location.path.as_str()).unwrap_or(&request.url);
    let mut path = PathBuf::from(root);
    path.push(relative.trim_start_matches('/'));

    if path.is_dir() {
        let index = location.index.as_deref().unwrap_or(&s_cfg.index);
        let candidate = path.join(index);
        if candidate.is_file() {
            path = candidate;
        } else if location.autoindex {
            return (generate_autoindex(&path, &request.url), ActiveAction::None);
        } else {
            return (handle_error(HTTP_FORBIDDEN, Some(s_cfg)), ActiveAction::None);
        }
    }

    match File::open(&path) {
        Ok(file) => {
            let Ok(metadata) = file.metadata() else {
                return (handle_error(HTTP_INTERNAL_SERVER_ERROR, Some(s_cfg)), ActiveAction::None);
            };
            let file_size = metadata.size() as usize;
            let mime_type = get_mime_type(path.extension().and_then(|s| s.to_str()));

            let mut response = HttpResponse::new(HTTP_OK, "OK");
            response.set_header("Content-Length", &file_size.to_string());
            response.set_header("Content-Type", mime_type);

            if request.method == Method::Head {
                (response, ActiveAction::None)
            } else {
                (response, ActiveAction::FileDownload(file, file_size))
            }
        }
        Err(e) => {
            let code = match e.kind() {
                std::io::ErrorKind::NotFound => HTTP_NOT_FOUND,
                std::io::ErrorKind::PermissionDenied => HTTP_FORBIDDEN,
                _ => HTTP_INTERNAL_SERVER_ERROR,
            };
            (handle_error(code, Some(s_cfg)), ActiveAction::None)
        }
    }
}
