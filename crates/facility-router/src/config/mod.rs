use std::env;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "3000";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LLM_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Deployment stage, read from `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        if matches!(normalized.as_str(), "prod" | "production") {
            Self::Production
        } else if matches!(normalized.as_str(), "test" | "ci") {
            Self::Test
        } else {
            Self::Development
        }
    }
}

/// Settings resolved once at startup and passed down to the router, telemetry and assist
/// collaborators. Nothing below the service reads the environment itself.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub assist: AssistConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::parse(&var_or("APP_ENV", "development"));
        let server = ServerConfig {
            host: var_or("APP_HOST", DEFAULT_HOST),
            port: var_or("APP_PORT", DEFAULT_PORT)
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
        };
        let telemetry = TelemetryConfig {
            log_level: var_or("APP_LOG_LEVEL", DEFAULT_LOG_LEVEL),
            ansi: environment == AppEnvironment::Development,
        };
        let assist = AssistConfig {
            classify: flag("AI_CLASSIFY"),
            explain: flag("AI_EXPLAIN"),
            api_key: env::var("ANTHROPIC_API_KEY")
                .ok()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            model: var_or("LLM_MODEL", DEFAULT_LLM_MODEL),
        };

        Ok(Self {
            environment,
            server,
            telemetry,
            assist,
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Only the literal `true` (any case) switches a toggle on.
fn flag(name: &str) -> bool {
    env::var(name)
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// Accepts an IP literal or `localhost`.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = if self.host.eq_ignore_ascii_case("localhost") {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.host
                .parse()
                .map_err(|source| ConfigError::InvalidHost { source })?
        };
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub ansi: bool,
}

/// Toggles for the optional text-generation collaborators.
///
/// Both toggles are independent of the key: a toggle without a key still runs the
/// collaborator, which then answers with its deterministic fallback.
#[derive(Clone, Default)]
pub struct AssistConfig {
    pub classify: bool,
    pub explain: bool,
    pub api_key: Option<String>,
    pub model: String,
}

impl fmt::Debug for AssistConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssistConfig")
            .field("classify", &self.classify)
            .field("explain", &self.explain)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPort => f.write_str("APP_PORT is not a port number between 0 and 65535"),
            Self::InvalidHost { .. } => f.write_str("APP_HOST is neither an IP address nor localhost"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Self::InvalidHost { source } = self {
            Some(source)
        } else {
            None
        }
    }
}
