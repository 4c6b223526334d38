//! The environment the host is running in.
//!
//! Components receive an [`Environment`] explicitly instead of consulting process-wide
//! state, so the same code can be exercised as a development or production build.

use std::fmt;
use std::str::FromStr;

/// Environment variable consulted when no environment is given on the command line.
pub const ENV_VAR: &str = "OPENAPI_DEVKIT_ENV";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Environment {
    Development,
    Production,
    Test,
    Other(String),
}

impl Environment {
    /// Development tooling (artifact sync, viewer route, static middleware) is active only here.
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
            Environment::Other(name) => name,
        }
    }
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            "production" | "prod" => Environment::Production,
            "test" => Environment::Test,
            other => Environment::Other(other.to_string()),
        })
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
