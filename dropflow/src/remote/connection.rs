//! Connection parameters with per-step overrides.

use crate::config::FtpConnectionSettings;
use crate::definition::PipelineStep;
use std::fmt;

/// Effective connection for one ingestion step.
#[derive(Clone, PartialEq, Eq)]
pub struct FtpConnection {
    /// Host name.
    pub host: String,
    /// Port.
    pub port: u16,
    /// User name.
    pub user: String,
    /// Password.
    pub password: String,
    /// Use explicit TLS.
    pub use_ssl: bool,
}

impl FtpConnection {
    /// Applies the step's `host`, `user` and `password` parameters on top of
    /// the defaults. `host` may be `name`, `name:port` or `scheme://name:port`.
    #[must_use]
    pub fn resolve(defaults: &FtpConnectionSettings, step: &PipelineStep) -> Self {
        let mut connection = Self::from(defaults);

        if let Some(raw) = step.parameters.first_non_blank(&["host"]) {
            let (host, port) = parse_host(raw);
            connection.host = host;
            if let Some(port) = port {
                connection.port = port;
            }
        }
        if let Some(user) = step.parameters.first_non_blank(&["user"]) {
            connection.user = user.to_string();
        }
        if let Some(password) = step.parameter("password").filter(|p| !p.is_empty()) {
            connection.password = password.to_string();
        }
        connection
    }
}

impl From<&FtpConnectionSettings> for FtpConnection {
    fn from(settings: &FtpConnectionSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            user: settings.user.clone(),
            password: settings.password.clone(),
            use_ssl: settings.use_ssl,
        }
    }
}

fn parse_host(raw: &str) -> (String, Option<u16>) {
    let without_scheme = raw.split_once("://").map_or(raw, |(_, rest)| rest);
    let authority = without_scheme
        .split('/')
        .next()
        .unwrap_or(without_scheme);

    match authority.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(port) => (host.to_string(), Some(port)),
            Err(_) => (authority.to_string(), None),
        },
        None => (authority.to_string(), None),
    }
}

impl fmt::Debug for FtpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtpConnection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("use_ssl", &self.use_ssl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Topic;
    use pretty_assertions::assert_eq;

    fn defaults() -> FtpConnectionSettings {
        FtpConnectionSettings {
            host: "ftp.default".to_string(),
            port: 21,
            user: "anonymous".to_string(),
            password: "default".to_string(),
            use_ssl: false,
        }
    }

    fn step() -> PipelineStep {
        PipelineStep::new(Topic::new("orders.scan").unwrap(), "ftpScan")
    }

    #[test]
    fn test_defaults_without_overrides() {
        let connection = FtpConnection::resolve(&defaults(), &step());
        assert_eq!(connection, FtpConnection::from(&defaults()));
    }

    #[test]
    fn test_host_with_scheme_and_port() {
        let step = step()
            .with_parameter("host", "ftp://files.example:2121")
            .with_parameter("user", "ingest")
            .with_parameter("password", "s3cret");
        let connection = FtpConnection::resolve(&defaults(), &step);
        assert_eq!(connection.host, "files.example");
        assert_eq!(connection.port, 2121);
        assert_eq!(connection.user, "ingest");
        assert_eq!(connection.password, "s3cret");
        assert!(!format!("{connection:?}").contains("s3cret"));
    }

    #[test]
    fn test_host_forms() {
        assert_eq!(parse_host("files.example"), ("files.example".to_string(), None));
        assert_eq!(parse_host("files.example:990"), ("files.example".to_string(), Some(990)));
        assert_eq!(parse_host("ftps://files.example/"), ("files.example".to_string(), None));
        assert_eq!(parse_host("files.example:abc"), ("files.example:abc".to_string(), None));
    }
}
