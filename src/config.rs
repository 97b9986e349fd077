use clap::Parser;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "slid", about = "Social identity hub")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub sync: SyncConfig,
    pub oauth: OAuthConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally visible base URL, encoded into QR badges.
    pub public_url: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Media root for uploads and generated QR badges
    pub path: Option<PathBuf>,
    pub max_upload_mb: usize,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
    pub secure_cookies: bool,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SyncConfig {
    /// Background refresh period for linked accounts. Unset disables the scheduler.
    pub interval_secs: Option<u64>,
    /// Timeout applied to every provider HTTP call.
    pub timeout_secs: u64,
    /// Refresh the target's linked accounts before rendering a profile.
    pub on_profile_view: bool,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct OAuthConfig {
    pub instagram: ProviderConfig,
    pub facebook: ProviderConfig,
}

/// Client credentials for one provider. Endpoint URLs fall back to the
/// provider's public endpoints when unset.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ProviderConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub redirect_uri: Option<String>,
    pub authorize_url: Option<String>,
    pub token_url: Option<String>,
    pub api_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            public_url: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_upload_mb: 50,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "slid_session".to_string(),
            session_hours: 720,
            secure_cookies: false,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: None,
            timeout_secs: 10,
            on_profile_view: true,
        }
    }
}

impl ProviderConfig {
    /// Fill unset credentials from `SLID_<PREFIX>_CLIENT_ID`,
    /// `SLID_<PREFIX>_CLIENT_SECRET` and `SLID_<PREFIX>_REDIRECT_URI`.
    fn apply_env(&mut self, prefix: &str, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup(&format!("SLID_{}_CLIENT_ID", prefix)) {
            self.client_id = Some(id);
        }
        if let Some(secret) = lookup(&format!("SLID_{}_CLIENT_SECRET", prefix)) {
            self.client_secret = Some(SecretString::from(secret));
        }
        if let Some(uri) = lookup(&format!("SLID_{}_REDIRECT_URI", prefix)) {
            self.redirect_uri = Some(uri);
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        Self::load_with_env(cli, |key| std::env::var(key).ok())
    }

    /// Load with an explicit environment lookup. Secrets are read here and
    /// nowhere else.
    pub fn load_with_env(
        cli: &Cli,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
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

        config.oauth.instagram.apply_env("INSTAGRAM", &lookup);
        config.oauth.facebook.apply_env("FACEBOOK", &lookup);

        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("slid.db"));
        }
        if config.storage.path.is_none() {
            config.storage.path = Some(data_dir.join("media"));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".slid")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("slid.db"))
    }

    pub fn media_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("media"))
    }

    /// Base URL that profile links and QR badges point at.
    pub fn public_url(&self) -> String {
        match &self.server.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.server.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn cli_for(dir: &std::path::Path) -> Cli {
        Cli {
            config: None,
            host: None,
            port: None,
            data_dir: Some(dir.to_path_buf()),
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.cookie_name, "slid_session");
        assert_eq!(config.auth.session_hours, 720);
        assert_eq!(config.sync.timeout_secs, 10);
        assert!(config.sync.interval_secs.is_none());
        assert!(config.sync.on_profile_view);
        assert!(config.oauth.instagram.client_id.is_none());
    }

    #[test]
    fn data_dir_defaults_to_home_dot_slid() {
        let cli = Cli {
            config: None,
            host: None,
            port: None,
            data_dir: None,
        };
        assert!(Config::data_dir(&cli).ends_with(".slid"));
    }

    #[test]
    fn load_with_no_config_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load_with_env(&cli_for(tmp.path()), |_| None).unwrap();
        assert_eq!(config.db_path(), tmp.path().join("slid.db"));
        assert_eq!(config.media_path(), tmp.path().join("media"));
        assert_eq!(config.public_url(), "http://localhost:3000");
    }

    #[test]
    fn load_reads_toml_file_and_cli_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000
public_url = "https://slid.example/"

[sync]
interval_secs = 900
on_profile_view = false

[oauth.instagram]
client_id = "ig-id"
client_secret = "ig-secret"
redirect_uri = "https://slid.example/instagram_callback"
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: None,
            port: Some(4000),
            data_dir: Some(tmp.path().to_path_buf()),
        };
        let config = Config::load_with_env(&cli, |_| None).unwrap();
        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.public_url(), "https://slid.example");
        assert_eq!(config.sync.interval_secs, Some(900));
        assert!(!config.sync.on_profile_view);
        assert_eq!(config.oauth.instagram.client_id.as_deref(), Some("ig-id"));
        assert_eq!(
            config
                .oauth
                .instagram
                .client_secret
                .as_ref()
                .unwrap()
                .expose_secret(),
            "ig-secret"
        );
    }

    #[test]
    fn environment_supplies_oauth_credentials() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load_with_env(&cli_for(tmp.path()), |key| match key {
            "SLID_FACEBOOK_CLIENT_ID" => Some("fb-id".to_string()),
            "SLID_FACEBOOK_CLIENT_SECRET" => Some("fb-secret".to_string()),
            "SLID_FACEBOOK_REDIRECT_URI" => Some("http://localhost/cb".to_string()),
            _ => None,
        })
        .unwrap();

        let fb = &config.oauth.facebook;
        assert_eq!(fb.client_id.as_deref(), Some("fb-id"));
        assert_eq!(fb.client_secret.as_ref().unwrap().expose_secret(), "fb-secret");
        assert_eq!(fb.redirect_uri.as_deref(), Some("http://localhost/cb"));
        assert!(config.oauth.instagram.client_id.is_none());
    }
}
