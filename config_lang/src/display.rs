use crate::types::{AppConfig, LocationConfig, ServerConfig};
use std::fmt;

impl fmt::Display for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "\x1b[1;37m── loaded {} server block(s) ──\x1b[0m",
            self.servers.len()
        )?;
        for server in &self.servers {
            write!(f, "{server}")?;
        }
        Ok(())
    }
}

impl fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  \x1b[38;5;244m───────────────────────────────────────\x1b[0m")?;
        let addrs: Vec<String> = self.listen.iter().map(|a| format!("{}:{}", a.ip, a.port)).collect();
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mlisten:\x1b[0m   \x1b[32m{}\x1b[0m",
            addrs.join(", ")
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mnames:\x1b[0m    \x1b[36m{}\x1b[0m",
            if self.server_names.is_empty() {
                "(default)".to_string()
            } else {
                self.server_names.join(", ")
            }
        )?;
        writeln!(f, "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mroot:\x1b[0m     \x1b[32m{}\x1b[0m", self.root)?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mbody cap:\x1b[0m \x1b[33m{} KiB\x1b[0m",
            self.client_max_body_size / 1024
        )?;
        if !self.error_pages.is_empty() {
            writeln!(f, "  \x1b[1;34m⦿\x1b[0m \x1b[1;37merror pages:\x1b[0m")?;
            let mut codes: Vec<_> = self.error_pages.iter().collect();
            codes.sort_by_key(|(code, _)| **code);
            for (code, path) in codes {
                writeln!(f, "      \x1b[38;5;244m{code}\x1b[0m \u{2192} {path}")?;
            }
        }

        writeln!(f, "  \x1b[1;37mlocations ({}):\x1b[0m", self.locations.len())?;
        let mut locations = self.locations.clone();
        locations.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        for (idx, location) in locations.iter().enumerate() {
            let last = idx == locations.len() - 1;
            let branch = if last { "  \u{2514}\u{2500}\u{2500}" } else { "  \u{251c}\u{2500}\u{2500}" };
            writeln!(f, "{branch} \x1b[1;37m{}\x1b[0m", location.path)?;
            location.fmt_details(f, last)?;
        }
        Ok(())
    }
}

impl LocationConfig {
    fn fmt_details(&self, f: &mut fmt::Formatter<'_>, last: bool) -> fmt::Result {
        let indent = if last { "       " } else { "  \u{2502}    " };
        if let Some(root) = &self.root {
            writeln!(f, "{indent}root: \x1b[32m{root}\x1b[0m")?;
        }
        if let Some(redirect) = &self.redirect {
            writeln!(f, "{indent}return: \x1b[35m{redirect}\x1b[0m")?;
        }
        let methods = if self.allow_methods.is_empty() {
            "ANY".to_string()
        } else {
            self.allow_methods.join("|")
        };
        writeln!(f, "{indent}methods: {methods}")?;
        writeln!(
            f,
            "{indent}autoindex: \x1b[{}m{}\x1b[0m",
            if self.autoindex { "32" } else { "31" },
            if self.autoindex { "on" } else { "off" }
        )?;
        if !self.cgi_pass.is_empty() {
            let mut exts: Vec<_> = self.cgi_pass.iter().collect();
            exts.sort_by_key(|(ext, _)| ext.clone());
            for (ext, interpreter) in exts {
                writeln!(f, "{indent}cgi {ext} -> {interpreter}")?;
            }
        }
        Ok(())
    }
}
