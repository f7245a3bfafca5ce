use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Default)]
#[command(name = "quill", about = "A blogging API server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Path to the SQLite database file
    #[arg(long, env = "DATABASE_PATH")]
    pub database: Option<PathBuf>,

    /// Secret used to sign credentials
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Secret required by the admin signup endpoint
    #[arg(long, env = "ADMIN_SECRET_KEY", hide_env_values = true)]
    pub admin_secret_key: Option<String>,

    /// Origin of the frontend, used for CORS and password reset links
    #[arg(long, env = "FRONTEND_URL")]
    pub frontend_url: Option<String>,

    /// SMTP relay used for outbound mail
    #[arg(long, env = "EMAIL_HOST")]
    pub smtp_host: Option<String>,

    /// SMTP account name; mail is only delivered when this and the password are set
    #[arg(long, env = "EMAIL_USERNAME")]
    pub smtp_username: Option<String>,

    /// SMTP account password
    #[arg(long, env = "EMAIL_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub frontend_url: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub jwt_secret: String,
    pub jwt_expires_hours: u64,
    pub admin_secret_key: String,
    pub bcrypt_cost: u32,
    pub reset_token_minutes: i64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MailConfig {
    pub from: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            request_timeout_secs: 15,
            frontend_url: "http://localhost:5173".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "jwt".to_string(),
            jwt_secret: String::new(),
            jwt_expires_hours: 90 * 24,
            admin_secret_key: String::new(),
            bcrypt_cost: 10,
            reset_token_minutes: 10,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: "Quill <no-reply@quill.local>".to_string(),
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
        }
    }
}

impl MailConfig {
    /// Mail goes out over SMTP only when an account is configured.
    pub fn smtp_enabled(&self) -> bool {
        !self.smtp_host.is_empty()
            && !self.smtp_username.is_empty()
            && !self.smtp_password.is_empty()
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI and environment overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(ref url) = cli.frontend_url {
            config.server.frontend_url = url.clone();
        }
        if let Some(ref path) = cli.database {
            config.database.path = Some(path.clone());
        }
        if let Some(ref secret) = cli.jwt_secret {
            config.auth.jwt_secret = secret.clone();
        }
        if let Some(ref key) = cli.admin_secret_key {
            config.auth.admin_secret_key = key.clone();
        }

        if let Some(ref host) = cli.smtp_host {
            config.mail.smtp_host = host.clone();
        }
        if let Some(ref username) = cli.smtp_username {
            config.mail.smtp_username = username.clone();
        }
        if let Some(ref password) = cli.smtp_password {
            config.mail.smtp_password = password.clone();
        }

        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("quill.db"));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".quill")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("quill.db"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Link mailed to users who asked for a password reset.
    pub fn reset_url(&self, token: &str) -> String {
        format!(
            "{}/reset-password/{}",
            self.server.frontend_url.trim_end_matches('/'),
            token
        )
    }
}
