use crate::prelude::*;

/// Sweeps every connection once per event-loop iteration: drops clients that
/// have gone quiet past the inactivity budget, and kills any CGI child that
/// has been running longer than its execution budget.
pub fn process(server: &mut Server, poll: &Poll) {
    let now = Instant::now();

    server.connections.retain(|token, conn| {
        if now.duration_since(conn.last_activity) > CLIENT_TIMEOUT {
            debug!("connection {:?} timed out after {:?} of inactivity", token, CLIENT_TIMEOUT);
            force_cgi_timeout(conn, &mut server.cgi_to_client);
            cleanup_connection(conn, poll);
            return false;
        }

        if let ActiveAction::Cgi { start_time, .. } = &conn.action {
            if start_time.elapsed().as_secs() > CGI_TIMEOUT_SECS {
                force_cgi_timeout(conn, &mut server.cgi_to_client);
                poll.registry().reregister(&mut conn.stream, *token, Interest::READABLE | Interest::WRITABLE).ok();
            }
        }

        true
    });
}

fn cleanup_connection(conn: &mut HttpConnection, poll: &Poll) {
    let _ = poll.registry().deregister(&mut conn.stream);
    let _ = conn.stream.shutdown(Shutdown::Both);
}
