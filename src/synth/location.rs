//! Host location as seen from inside a worker

use serde::Serialize;
use url::Url;

/// Components of the host URL, in the shape of a browser `Location`.
/// Exposed to worker programs as `self.location`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerLocation {
    pub hash: String,
    pub host: String,
    pub hostname: String,
    pub href: String,
    pub pathname: String,
    pub port: String,
    pub protocol: String,
    pub search: String,
}

impl WorkerLocation {
    /// `protocol + "//" + host`, the base remote dependencies resolve against
    pub fn origin(&self) -> String {
        format!("{}//{}", self.protocol, self.host)
    }
}

impl Default for WorkerLocation {
    /// The `file:///` root
    fn default() -> Self {
        Self {
            hash: String::new(),
            host: String::new(),
            hostname: String::new(),
            href: "file:///".to_string(),
            pathname: "/".to_string(),
            port: String::new(),
            protocol: "file:".to_string(),
            search: String::new(),
        }
    }
}

impl From<&Url> for WorkerLocation {
    fn from(url: &Url) -> Self {
        let hostname = url.host_str().unwrap_or_default().to_string();
        let port = url.port().map(|p| p.to_string()).unwrap_or_default();
        let host = if port.is_empty() {
            hostname.clone()
        } else {
            format!("{}:{}", hostname, port)
        };

        Self {
            hash: url.fragment().map(|f| format!("#{}", f)).unwrap_or_default(),
            host,
            hostname,
            href: url.as_str().to_string(),
            pathname: url.path().to_string(),
            port,
            protocol: format!("{}:", url.scheme()),
            search: url.query().map(|q| format!("?{}", q)).unwrap_or_default(),
        }
    }
}
