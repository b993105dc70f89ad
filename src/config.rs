use std::{env, fmt, net::SocketAddr};

use crate::error::ServiceError;

pub const ENV_SUBDOMAIN: &str = "ZENDESK_SUBDOMAIN";
pub const ENV_USERNAME: &str = "ZENDESK_USERNAME";
pub const ENV_API_TOKEN: &str = "ZENDESK_API_TOKEN";
pub const ENV_ALLOW_USER_EMAIL: &str = "ZENDESK_ALLOW_USER_EMAIL";
pub const ENV_API_URL: &str = "ZENDESK_API_URL";

const DEFAULT_PORT: u16 = 3000;

#[derive(Clone)]
pub struct ServiceConfig {
    pub subdomain: String,
    pub service_username: String,
    pub service_token: String,
    pub allow_per_request_identity: bool,
    pub api_base_url: String,
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("subdomain", &self.subdomain)
            .field("service_username", &self.service_username)
            .field("service_token", &"<redacted>")
            .field("allow_per_request_identity", &self.allow_per_request_identity)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ServiceError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServiceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let subdomain = read(ENV_SUBDOMAIN);
        let service_username = read(ENV_USERNAME);
        let service_token = read(ENV_API_TOKEN);

        let mut missing = Vec::new();
        if subdomain.is_none() {
            missing.push(ENV_SUBDOMAIN);
        }
        if service_username.is_none() {
            missing.push(ENV_USERNAME);
        }
        if service_token.is_none() {
            missing.push(ENV_API_TOKEN);
        }

        let (Some(subdomain), Some(service_username), Some(service_token)) =
            (subdomain, service_username, service_token)
        else {
            return Err(ServiceError::MissingConfig(missing));
        };

        // Exact match only; anything else leaves per-request identity off.
        let allow_per_request_identity = lookup(ENV_ALLOW_USER_EMAIL).as_deref() == Some("true");

        let api_base_url = read(ENV_API_URL)
            .unwrap_or_else(|| format!("https://{subdomain}.zendesk.com"))
            .trim_end_matches('/')
            .to_string();
        if let Err(err) = reqwest::Url::parse(&api_base_url) {
            return Err(ServiceError::InvalidConfig(format!(
                "{ENV_API_URL} is not a valid URL ({api_base_url}): {err}"
            )));
        }

        Ok(Self {
            subdomain,
            service_username,
            service_token,
            allow_per_request_identity,
            api_base_url,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub log_level: String,
    pub log_json: bool,
    pub bind_addr: SocketAddr,
}

impl ServerSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_level = lookup("LOG_LEVEL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "info".to_string());

        let log_json = lookup("LOG_FORMAT")
            .map(|v| v.trim().eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let port = lookup("MCP_PORT")
            .and_then(|v| v.trim().parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let host_raw = lookup("MCP_BIND_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let host_normalized = host_raw.trim().trim_matches('"').trim_matches('\'');
        let bind_addr = format!("{host_normalized}:{port}")
            .parse::<SocketAddr>()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));

        Self {
            log_level,
            log_json,
            bind_addr,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn loads_required_values_and_defaults() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            (ENV_SUBDOMAIN, "acme"),
            (ENV_USERNAME, "agent@acme.test"),
            (ENV_API_TOKEN, "secret"),
        ]))
        .expect("config");

        assert_eq!(config.subdomain, "acme");
        assert_eq!(config.service_username, "agent@acme.test");
        assert!(!config.allow_per_request_identity);
        assert_eq!(config.api_base_url, "https://acme.zendesk.com");
    }

    #[test]
    fn missing_values_are_all_named() {
        let err = ServiceConfig::from_lookup(lookup_from(&[])).unwrap_err();
        let message = err.to_string();
        assert!(message.contains(ENV_SUBDOMAIN));
        assert!(message.contains(ENV_USERNAME));
        assert!(message.contains(ENV_API_TOKEN));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let err = ServiceConfig::from_lookup(lookup_from(&[
            (ENV_SUBDOMAIN, "acme"),
            (ENV_USERNAME, "   "),
            (ENV_API_TOKEN, "secret"),
        ]))
        .unwrap_err();
        match err {
            ServiceError::MissingConfig(names) => assert_eq!(names, vec![ENV_USERNAME]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn allow_user_email_only_accepts_true() {
        for (raw, expected) in [
            ("true", true),
            ("TRUE", false),
            (" TRUE ", false),
            (" true", false),
            ("True", false),
            ("1", false),
            ("yes", false),
        ] {
            let config = ServiceConfig::from_lookup(lookup_from(&[
                (ENV_SUBDOMAIN, "acme"),
                (ENV_USERNAME, "agent@acme.test"),
                (ENV_API_TOKEN, "secret"),
                (ENV_ALLOW_USER_EMAIL, raw),
            ]))
            .expect("config");
            assert_eq!(config.allow_per_request_identity, expected, "raw={raw}");
        }
    }

    #[test]
    fn api_url_override_drops_trailing_slash() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            (ENV_SUBDOMAIN, "acme"),
            (ENV_USERNAME, "agent@acme.test"),
            (ENV_API_TOKEN, "secret"),
            (ENV_API_URL, "http://127.0.0.1:9000/"),
        ]))
        .expect("config");
        assert_eq!(config.api_base_url, "http://127.0.0.1:9000");
    }

    #[test]
    fn invalid_api_url_is_rejected() {
        let err = ServiceConfig::from_lookup(lookup_from(&[
            (ENV_SUBDOMAIN, "acme"),
            (ENV_USERNAME, "agent@acme.test"),
            (ENV_API_TOKEN, "secret"),
            (ENV_API_URL, "not a url"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidConfig(_)));
    }

    #[test]
    fn debug_output_hides_token() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            (ENV_SUBDOMAIN, "acme"),
            (ENV_USERNAME, "agent@acme.test"),
            (ENV_API_TOKEN, "super-secret"),
        ]))
        .expect("config");
        assert!(!format!("{config:?}").contains("super-secret"));
    }

    #[test]
    fn server_settings_defaults() {
        let settings = ServerSettings::from_lookup(lookup_from(&[]));
        assert_eq!(settings.log_level, "info");
        assert!(!settings.log_json);
        assert_eq!(settings.bind_addr, SocketAddr::from(([0, 0, 0, 0], 3000)));
    }

    #[test]
    fn server_settings_read_port_and_format() {
        let settings = ServerSettings::from_lookup(lookup_from(&[
            ("MCP_PORT", "8081"),
            ("MCP_BIND_HOST", "127.0.0.1"),
            ("LOG_FORMAT", "JSON"),
            ("LOG_LEVEL", "debug"),
        ]));
        assert_eq!(settings.bind_addr, SocketAddr::from(([127, 0, 0, 1], 8081)));
        assert!(settings.log_json);
        assert_eq!(settings.log_level, "debug");
    }
}
