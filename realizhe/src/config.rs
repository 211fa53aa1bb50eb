use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

use crate::backend::ProductRow;

const DEFAULT_STORAGE_BUCKET: &str = "produtos";
const DEFAULT_CUSTOM_PLAN_BUCKET: &str = "planos-personalizados";
const DEFAULT_ORDERS_NUMBER: &str = "5551982895068";
const DEFAULT_CUSTOM_PLANS_NUMBER: &str = "5551992476399";
const DEFAULT_SESSION_TTL: &str = "24h";

#[derive(Debug, Parser)]
#[command(
    name = "realizhe",
    version,
    about = "Storefront API for Realizhe Real Food"
)]
pub struct Cli {
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long, value_name = "URL")]
    pub supabase_url: Option<String>,

    /// Serve from an in-process store instead of the hosted backend.
    #[arg(long)]
    pub memory_backend: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub session_ttl: Duration,
    pub secure_cookies: bool,
    pub memory_backend: bool,
    pub supabase: SupabaseConfig,
    pub whatsapp: WhatsappConfig,
    pub seed_products: Vec<ProductRow>,
}

#[derive(Debug, Clone, Default)]
pub struct SupabaseConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub service_role_key: Option<String>,
    pub storage_bucket: String,
    pub storage_url: Option<String>,
    pub custom_plan_bucket: String,
    pub custom_plan_bucket_public: bool,
}

impl SupabaseConfig {
    /// Public URL prefix for product images.
    pub fn storage_base_url(&self) -> Option<String> {
        if let Some(url) = &self.storage_url {
            return Some(url.trim_end_matches('/').to_string());
        }
        self.url.as_ref().map(|url| {
            format!(
                "{}/storage/v1/object/public/{}",
                url.trim_end_matches('/'),
                self.storage_bucket
            )
        })
    }
}

#[derive(Debug, Clone)]
pub struct WhatsappConfig {
    pub orders_number: String,
    pub custom_plans_number: String,
}

impl Default for WhatsappConfig {
    fn default() -> Self {
        Self {
            orders_number: String::from(DEFAULT_ORDERS_NUMBER),
            custom_plans_number: String::from(DEFAULT_CUSTOM_PLANS_NUMBER),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config in {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid boolean value for env var {key}: {value}")]
    InvalidEnvBool { key: String, value: String },
    #[error("invalid session_ttl {value}: {source}")]
    InvalidDuration {
        value: String,
        source: humantime::DurationError,
    },
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    bind: Option<SocketAddr>,
    session_ttl: Option<String>,
    secure_cookies: Option<bool>,
    memory_backend: Option<bool>,
    #[serde(default)]
    supabase: FileSupabase,
    #[serde(default)]
    whatsapp: FileWhatsapp,
    #[serde(default)]
    products: Vec<ProductRow>,
}

#[derive(Debug, Default, Deserialize)]
struct FileSupabase {
    url: Option<String>,
    anon_key: Option<String>,
    service_role_key: Option<String>,
    storage_bucket: Option<String>,
    storage_url: Option<String>,
    custom_plan_bucket: Option<String>,
    custom_plan_bucket_public: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct FileWhatsapp {
    orders_number: Option<String>,
    custom_plans_number: Option<String>,
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let from_file = read_file_config(cli.config.as_deref())?;

        let bind = cli
            .bind
            .or(from_file.bind)
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let ttl_raw = from_file
            .session_ttl
            .unwrap_or_else(|| String::from(DEFAULT_SESSION_TTL));
        let session_ttl =
            humantime::parse_duration(&ttl_raw).map_err(|source| ConfigError::InvalidDuration {
                value: ttl_raw.clone(),
                source,
            })?;

        let secure_cookies = read_env_bool("REALIZHE_SECURE_COOKIES")?
            .or(from_file.secure_cookies)
            .unwrap_or(false);
        let memory_backend = cli.memory_backend
            || read_env_bool("REALIZHE_MEMORY_BACKEND")?
                .or(from_file.memory_backend)
                .unwrap_or(false);

        let file_supabase = from_file.supabase;
        let supabase = SupabaseConfig {
            url: cli
                .supabase_url
                .or_else(|| read_env("SUPABASE_URL"))
                .or(file_supabase.url)
                .map(|url| url.trim_end_matches('/').to_string()),
            anon_key: read_env("SUPABASE_ANON_KEY").or(file_supabase.anon_key),
            service_role_key: read_env("SUPABASE_SERVICE_ROLE_KEY")
                .or(file_supabase.service_role_key),
            storage_bucket: read_env("SUPABASE_STORAGE_BUCKET")
                .or(file_supabase.storage_bucket)
                .unwrap_or_else(|| String::from(DEFAULT_STORAGE_BUCKET)),
            storage_url: read_env("SUPABASE_STORAGE_URL").or(file_supabase.storage_url),
            custom_plan_bucket: read_env("SUPABASE_CUSTOM_PLAN_BUCKET")
                .or(file_supabase.custom_plan_bucket)
                .unwrap_or_else(|| String::from(DEFAULT_CUSTOM_PLAN_BUCKET)),
            custom_plan_bucket_public: file_supabase.custom_plan_bucket_public.unwrap_or(true),
        };

        let defaults = WhatsappConfig::default();
        let whatsapp = WhatsappConfig {
            orders_number: from_file
                .whatsapp
                .orders_number
                .unwrap_or(defaults.orders_number),
            custom_plans_number: from_file
                .whatsapp
                .custom_plans_number
                .unwrap_or(defaults.custom_plans_number),
        };

        Ok(Self {
            bind,
            session_ttl,
            secure_cookies,
            memory_backend,
            supabase,
            whatsapp,
            seed_products: from_file.products,
        })
    }
}

fn read_file_config(path: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Non-empty env value, trimmed.
fn read_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => parse_bool_value(key, &value).map(Some),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidEnvBool {
            key: String::from(key),
            value: String::from("<non-unicode>"),
        }),
    }
}

fn parse_bool_value(key: &str, raw: &str) -> Result<bool, ConfigError> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnvBool {
            key: String::from(key),
            value: String::from(raw),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use tempfile::tempdir;

    use super::{parse_bool_value, read_file_config, SupabaseConfig};

    #[test]
    fn parse_bool_value_accepts_common_values() {
        assert_eq!(parse_bool_value("K", "true").ok(), Some(true));
        assert_eq!(parse_bool_value("K", " on ").ok(), Some(true));
        assert_eq!(parse_bool_value("K", "NO").ok(), Some(false));
        assert_eq!(parse_bool_value("K", "0").ok(), Some(false));
    }

    #[test]
    fn parse_bool_value_rejects_invalid_values() {
        assert!(parse_bool_value("K", "maybe").is_err());
    }

    #[test]
    fn storage_base_prefers_explicit_url() {
        let config = SupabaseConfig {
            url: Some(String::from("https://abc.supabase.co")),
            storage_url: Some(String::from("https://cdn.example.com/img/")),
            storage_bucket: String::from("produtos"),
            ..Default::default()
        };
        assert_eq!(
            config.storage_base_url().as_deref(),
            Some("https://cdn.example.com/img")
        );
    }

    #[test]
    fn storage_base_derives_from_project_url() {
        let config = SupabaseConfig {
            url: Some(String::from("https://abc.supabase.co")),
            storage_bucket: String::from("produtos"),
            ..Default::default()
        };
        assert_eq!(
            config.storage_base_url().as_deref(),
            Some("https://abc.supabase.co/storage/v1/object/public/produtos")
        );
        assert_eq!(SupabaseConfig::default().storage_base_url(), None);
    }

    #[test]
    fn file_config_reads_sections_and_seed_products() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("realizhe.toml");
        std::fs::write(
            &path,
            r#"
bind = "127.0.0.1:4000"
session_ttl = "2h"

[supabase]
url = "https://abc.supabase.co"
custom_plan_bucket_public = false

[whatsapp]
orders_number = "5511999999999"

[[products]]
id = "p1"
slug = "frango"
nome = "Frango grelhado"
preco = 29.9
categoria = "equilibrio"
"#,
        )?;

        let parsed = read_file_config(Some(&path))?;
        assert_eq!(parsed.bind.map(|b| b.port()), Some(4000));
        assert_eq!(
            humantime::parse_duration(parsed.session_ttl.as_deref().unwrap())?,
            Duration::from_secs(7200)
        );
        assert_eq!(parsed.supabase.custom_plan_bucket_public, Some(false));
        assert_eq!(
            parsed.whatsapp.orders_number.as_deref(),
            Some("5511999999999")
        );
        assert_eq!(parsed.products.len(), 1);
        assert_eq!(parsed.products[0].nome, "Frango grelhado");
        Ok(())
    }

    #[test]
    fn file_config_rejects_invalid_toml() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "bind = [")?;
        assert!(read_file_config(Some(&path)).is_err());
        Ok(())
    }
}
