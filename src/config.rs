//! Process configuration.
//!
//! Every field is settable by flag or environment variable (`.env` is loaded
//! by `main` before parsing). Values are read once at startup and never change.

use crate::auth::password::{MAX_COST, MIN_COST};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Parser, Clone)]
#[command(name = "examportal")]
#[command(about = "Examination portal backend - authentication and user management API")]
pub struct AppConfig {
    /// HMAC secret used to sign identity tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true, value_parser = parse_secret)]
    pub jwt_secret: String,

    /// Token validity window, e.g. 7d, 12h, 30m, 45s or bare seconds
    #[arg(long, env = "JWT_EXPIRES_IN", default_value = "7d", value_parser = parse_duration)]
    pub jwt_expires_in: Duration,

    /// SQLite database: a path, sqlite://path, or :memory:
    #[arg(long, env = "DATABASE_URL", default_value = "examportal.db")]
    pub database_url: String,

    /// Listen address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listen port
    #[arg(long, env = "PORT", default_value = "5000")]
    pub port: u16,

    /// bcrypt work factor
    #[arg(long, env = "BCRYPT_COST", default_value = "10",
          value_parser = clap::value_parser!(u32).range(i64::from(MIN_COST)..=i64::from(MAX_COST)))]
    pub bcrypt_cost: u32,

    /// Email of an admin account to create at startup if missing
    #[arg(long, env = "ADMIN_EMAIL", requires = "admin_password")]
    pub admin_email: Option<String>,

    /// Password for the bootstrap admin
    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true, requires = "admin_email")]
    pub admin_password: Option<String>,

    /// Display name for the bootstrap admin
    #[arg(long, env = "ADMIN_FULL_NAME", default_value = "Administrator")]
    pub admin_full_name: String,
}

// Keeps the secret out of `{:?}` output.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_expires_in", &self.jwt_expires_in)
            .field("database_url", &self.database_url)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("admin_email", &self.admin_email)
            .field("admin_full_name", &self.admin_full_name)
            .finish()
    }
}

impl AppConfig {
    /// Filesystem path (or `:memory:`) for the SQLite store
    pub fn database_path(&self) -> &str {
        self.database_url
            .strip_prefix("sqlite://")
            .or_else(|| self.database_url.strip_prefix("sqlite:"))
            .unwrap_or(&self.database_url)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    /// Bootstrap admin credentials, when both are configured
    pub fn bootstrap_admin(&self) -> Option<(&str, &str)> {
        match (&self.admin_email, &self.admin_password) {
            (Some(email), Some(password)) => Some((email.as_str(), password.as_str())),
            _ => None,
        }
    }
}

fn parse_secret(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        return Err("JWT secret must not be empty".to_string());
    }
    Ok(s.to_string())
}

/// Parse `<n>[s|m|h|d|w]`; a bare number is seconds. Zero is rejected.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration '{}': expected e.g. 7d, 12h, 3600", s))?;

    let multiplier = match unit.trim() {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        "w" => 604_800,
        other => return Err(format!("invalid duration unit '{}' in '{}'", other, s)),
    };

    let secs = value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("duration '{}' is too large", s))?;
    if secs == 0 {
        return Err("duration must be greater than zero".to_string());
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<AppConfig, clap::Error> {
        let mut argv = vec!["examportal"];
        argv.extend_from_slice(args);
        AppConfig::try_parse_from(argv)
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("45s"), Ok(Duration::from_secs(45)));
        assert_eq!(parse_duration("30m"), Ok(Duration::from_secs(1800)));
        assert_eq!(parse_duration("12h"), Ok(Duration::from_secs(43_200)));
        assert_eq!(parse_duration("7d"), Ok(Duration::from_secs(604_800)));
        assert_eq!(parse_duration("2w"), Ok(Duration::from_secs(1_209_600)));
        assert_eq!(parse_duration("3600"), Ok(Duration::from_secs(3600)));
        assert_eq!(parse_duration(" 7d "), Ok(Duration::from_secs(604_800)));
    }

    #[test]
    fn test_parse_duration_rejects_bad_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("0").is_err());
        assert!(parse_duration("0d").is_err());
        assert!(parse_duration("7y").is_err());
        assert!(parse_duration("d").is_err());
        assert!(parse_duration("-5m").is_err());
        assert!(parse_duration("99999999999999999999w").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--jwt-secret", "s3cret"]).unwrap();

        assert_eq!(config.jwt_expires_in, Duration::from_secs(7 * 86_400));
        assert_eq!(config.bcrypt_cost, 10);
        assert!(config.bootstrap_admin().is_none());
    }

    #[test]
    fn test_bind_addr() {
        let config =
            parse(&["--jwt-secret", "s", "--host", "127.0.0.1", "--port", "8080"]).unwrap();
        assert_eq!(
            config.bind_addr().unwrap(),
            "127.0.0.1:8080".parse::<SocketAddr>().unwrap()
        );

        let config = parse(&["--jwt-secret", "s", "--host", "not a host"]).unwrap();
        assert!(config.bind_addr().is_err());
    }

    #[test]
    fn test_secret_required_and_non_empty() {
        assert!(parse(&["--jwt-secret", "  "]).is_err());
    }

    #[test]
    fn test_database_url_forms() {
        let config = parse(&[
            "--jwt-secret",
            "s",
            "--database-url",
            "sqlite:///var/lib/examportal.db",
        ])
        .unwrap();
        assert_eq!(config.database_path(), "/var/lib/examportal.db");

        let config = parse(&["--jwt-secret", "s", "--database-url", "portal.db"]).unwrap();
        assert_eq!(config.database_path(), "portal.db");

        let config = parse(&["--jwt-secret", "s", "--database-url", ":memory:"]).unwrap();
        assert_eq!(config.database_path(), ":memory:");
    }

    #[test]
    fn test_bcrypt_cost_range() {
        assert!(parse(&["--jwt-secret", "s", "--bcrypt-cost", "3"]).is_err());
        assert!(parse(&["--jwt-secret", "s", "--bcrypt-cost", "32"]).is_err());
        assert!(parse(&["--jwt-secret", "s", "--bcrypt-cost", "4"]).is_ok());
        assert!(parse(&["--jwt-secret", "s", "--bcrypt-cost", "31"]).is_ok());
    }

    #[test]
    fn test_bootstrap_admin_needs_both_fields() {
        assert!(parse(&["--jwt-secret", "s", "--admin-email", "root@x.com"]).is_err());

        let config = parse(&[
            "--jwt-secret",
            "s",
            "--admin-email",
            "root@x.com",
            "--admin-password",
            "changeme",
        ])
        .unwrap();
        assert_eq!(config.bootstrap_admin(), Some(("root@x.com", "changeme")));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = parse(&["--jwt-secret", "very-secret-value"]).unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("very-secret-value"));
        assert!(printed.contains("<redacted>"));
    }
}
