use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("Unknown environment '{name}' (expected 'local' or 'production')")]
    Unknown { name: String },
}

/// Deployment the client talks to. Selects the host; `/api` is appended by
/// the client, never by the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    Local,
    #[default]
    Production,
}

pub struct EnvironmentConfig {
    pub host: &'static str,
    pub env_var: &'static str,
}

impl Environment {
    pub fn config(&self) -> EnvironmentConfig {
        match self {
            Environment::Local => EnvironmentConfig {
                host: "http://localhost:8000",
                env_var: "SHORTREELS_ENV",
            },
            Environment::Production => EnvironmentConfig {
                host: "https://www.shortreels.app",
                env_var: "SHORTREELS_ENV",
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }

    /// Read `SHORTREELS_ENV`, falling back to production when unset
    pub fn from_env() -> Result<Self, EnvironmentError> {
        match std::env::var(Environment::default().config().env_var) {
            Ok(name) => name.parse(),
            Err(_) => Ok(Environment::default()),
        }
    }

    /// Hosts that count as a local development server
    pub fn for_host(host: &str) -> Self {
        if matches!(host, "localhost" | "127.0.0.1") {
            Environment::Local
        } else {
            Environment::Production
        }
    }
}

impl FromStr for Environment {
    type Err = EnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "dev" | "development" => Ok(Environment::Local),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(EnvironmentError::Unknown {
                name: s.to_string(),
            }),
        }
    }
}
