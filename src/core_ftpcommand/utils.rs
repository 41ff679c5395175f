use crate::core_driver::FileInfo;
use crate::core_error::FtpError;
use chrono::{DateTime, Utc};

/// Resolves a client-supplied path against the working directory into an
/// absolute virtual path with `.` and `..` collapsed.
///
/// An empty argument yields `current_dir`. Climbing above `/` is refused, as are
/// embedded NUL bytes.
pub fn resolve_path(current_dir: &str, arg: &str) -> Result<String, FtpError> {
    if arg.contains('\0') {
        return Err(FtpError::Syntax("path contains NUL".to_string()));
    }

    let joined = if arg.starts_with('/') {
        arg.to_string()
    } else {
        format!("{}/{}", current_dir.trim_end_matches('/'), arg)
    };

    let mut parts: Vec<&str> = Vec::new();
    for component in joined.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(FtpError::PermissionDenied(arg.to_string()));
                }
            }
            name => parts.push(name),
        }
    }

    Ok(format!("/{}", parts.join("/")))
}

/// Drops `ls`-style option words (`-la`, `-a`) from a LIST/NLST argument and
/// returns whatever path remains.
pub fn strip_list_options(arg: &str) -> &str {
    let mut rest = arg.trim();
    while rest.starts_with('-') {
        rest = match rest.split_once(' ') {
            Some((_, tail)) => tail.trim_start(),
            None => "",
        };
    }
    rest
}

/// Quotes a path for a 257 reply, doubling embedded quotes.
pub fn quote_path(path: &str) -> String {
    format!("\"{}\"", path.replace('"', "\"\""))
}

/// One `ls -l` style line, CRLF terminated.
pub fn format_list_line(info: &FileInfo, now: DateTime<Utc>) -> String {
    let kind = if info.is_dir { 'd' } else { '-' };
    // entries older than ~6 months show the year instead of the time
    let date = if (now - info.modified).num_days().abs() < 180 {
        info.modified.format("%b %e %H:%M")
    } else {
        info.modified.format("%b %e  %Y")
    };
    format!(
        "{}{} 1 {} {} {:>12} {} {}\r\n",
        kind,
        mode_string(info.mode),
        info.owner,
        info.group,
        info.size,
        date,
        info.name
    )
}

fn mode_string(mode: u32) -> String {
    let mut out = String::with_capacity(9);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}
