//! Lexical path resolution for worker script imports
//!
//! Dependency paths handed to a thread are resolved against the origin of the
//! host location before they are imported by the worker. Resolution is purely
//! lexical: no filesystem or network access takes place, and `.`/`..` segments
//! are folded the same way a browser folds them in a URL path.
//!
//! The worker-side `require()` capability embeds a JavaScript port of
//! [`absolute`] (see [`ABSOLUTE_JS`]) so paths resolve identically on both
//! sides of the message channel.

/// Resolve `path` into an absolute path, optionally prefixed with `base`.
///
/// `..` pops the previous segment (a no-op at the root), `.` is skipped and
/// everything else, including empty segments, is kept. Leading slashes of the
/// folded path are stripped before the prefix is applied, so
/// `absolute("/a/b", None)` and `absolute("a/b", None)` both yield `/a/b`.
///
/// Malformed input degrades to a best-effort path; this never fails.
pub fn absolute(path: &str, base: Option<&str>) -> String {
    let mut stack: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            ".." => {
                stack.pop();
            }
            "." => {}
            _ => stack.push(part),
        }
    }

    let joined = stack.join("/");
    let trimmed = joined.trim_start_matches('/');

    match base {
        Some(base) => format!("{}/{}", base, trimmed),
        None => format!("/{}", trimmed),
    }
}

/// JavaScript implementation of [`absolute`], injected into every worker program.
pub const ABSOLUTE_JS: &str = r#"
function __strand_absolute(path, base) {
    var parts = String(path).split("/"),
        stack = [],
        i;
    for (i = 0; i < parts.length; ++i) {
        if (parts[i] === "..") {
            stack.pop();
        } else if (parts[i] !== ".") {
            stack.push(parts[i]);
        }
    }
    path = stack.join("/").replace(/^\/+/, "");
    return base == null ? "/" + path : base + "/" + path;
}
"#;
