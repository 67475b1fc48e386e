//! Repository credentials
//!
//! Credentials live outside the project configuration, in
//! `~/.config/chartwright/credentials.yaml`, keyed by the repository's
//! `credentialRef` (or its name). Entries can hold literal values, point at
//! environment variables (CI/CD friendly) or defer to a Docker `config.json`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use url::Url;

use crate::config::Repository;
use crate::error::{RepoError, Result};

/// Credential types supported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Credentials {
    /// Basic authentication (username/password)
    Basic { username: String, password: String },

    /// Bearer token authentication
    Bearer { token: String },

    /// Environment variable references
    Env {
        username_var: String,
        password_var: String,
    },

    /// Docker config.json reference
    #[serde(rename = "dockerconfig")]
    DockerConfig { path: Option<PathBuf> },
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Credentials::Bearer {
            token: token.into(),
        }
    }

    pub fn from_env(username_var: impl Into<String>, password_var: impl Into<String>) -> Self {
        Credentials::Env {
            username_var: username_var.into(),
            password_var: password_var.into(),
        }
    }

    /// Resolve to concrete values for a repository URL
    pub fn resolve(&self, url: &str) -> Result<ResolvedCredentials> {
        match self {
            Credentials::Basic { username, password } => Ok(ResolvedCredentials::Basic {
                username: username.clone(),
                password: password.clone(),
            }),
            Credentials::Bearer { token } => Ok(ResolvedCredentials::Bearer {
                token: token.clone(),
            }),
            Credentials::Env {
                username_var,
                password_var,
            } => Ok(ResolvedCredentials::Basic {
                username: env_var(username_var)?,
                password: env_var(password_var)?,
            }),
            Credentials::DockerConfig { path } => {
                let config = DockerConfig::load(path.as_deref())?;
                config
                    .basic_for_url(url)
                    .ok_or_else(|| RepoError::AuthFailed {
                        message: format!("No Docker credentials found for {}", url),
                    })
            }
        }
    }
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| RepoError::AuthFailed {
        message: format!("Environment variable {} not set", name),
    })
}

/// Credentials ready for use
#[derive(Clone, PartialEq, Eq)]
pub enum ResolvedCredentials {
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl ResolvedCredentials {
    /// `Authorization` header value
    pub fn auth_header(&self) -> String {
        match self {
            ResolvedCredentials::Basic { username, password } => {
                format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
            }
            ResolvedCredentials::Bearer { token } => format!("Bearer {}", token),
        }
    }
}

// Secrets stay out of logs
impl std::fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedCredentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            ResolvedCredentials::Bearer { .. } => {
                f.debug_struct("Bearer").field("token", &"***").finish()
            }
        }
    }
}

/// Docker config.json format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockerConfig {
    #[serde(default)]
    pub auths: HashMap<String, DockerAuth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerAuth {
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl DockerConfig {
    /// Load from a path, or `~/.docker/config.json`
    ///
    /// A missing file is an empty configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => dirs::home_dir()
                .ok_or_else(|| RepoError::AuthFailed {
                    message: "Could not determine home directory".to_string(),
                })?
                .join(".docker")
                .join("config.json"),
        };

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Basic credentials for the registry host of `url`
    pub fn basic_for_url(&self, url: &str) -> Option<ResolvedCredentials> {
        let parsed = Url::parse(url).ok()?;
        let host = match parsed.port() {
            Some(port) => format!("{}:{}", parsed.host_str()?, port),
            None => parsed.host_str()?.to_string(),
        };

        let candidates = [
            host.clone(),
            format!("https://{}", host),
            format!("http://{}", host),
        ];
        let auth = candidates.iter().find_map(|c| self.auths.get(c))?;

        if let (Some(username), Some(password)) = (&auth.username, &auth.password) {
            return Some(ResolvedCredentials::Basic {
                username: username.clone(),
                password: password.clone(),
            });
        }

        let decoded = STANDARD.decode(auth.auth.as_ref()?).ok()?;
        let pair = String::from_utf8(decoded).ok()?;
        let (username, password) = pair.split_once(':')?;
        Some(ResolvedCredentials::Basic {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

/// Credential store - credentials by repository name or credential reference
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialStore {
    #[serde(default)]
    credentials: HashMap<String, Credentials>,
}

impl CredentialStore {
    /// Load credential store from default location
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Save with owner-only permissions on Unix
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)?;
            file.write_all(content.as_bytes())?;
        }

        #[cfg(not(unix))]
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| RepoError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("chartwright").join("credentials.yaml"))
    }

    pub fn set(&mut self, key: &str, credentials: Credentials) {
        self.credentials.insert(key.to_string(), credentials);
    }

    pub fn get(&self, key: &str) -> Option<&Credentials> {
        self.credentials.get(key)
    }

    /// Resolve the credentials configured for a repository, if any
    pub fn resolve_for(&self, repo: &Repository) -> Result<Option<ResolvedCredentials>> {
        self.get(repo.credential_key())
            .map(|creds| creds.resolve(&repo.url))
            .transpose()
    }
}
