//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::{CliArgs, Command, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "filedeck";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8081;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_API_URL: &str = "http://127.0.0.1:8080/api";
const DEFAULT_API_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REMOTE_PORTAL_URL: &str = "https://siasky.net";
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SERVICE_NAME: &str = "filedeck";
const DEFAULT_WEBSITE_ADDRESS: &str = "http://127.0.0.1:8081";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub api: ApiSettings,
    pub remote: RemoteSettings,
    pub site: SiteSettings,
    pub captcha: CaptchaSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub url: Url,
    pub timeout: Duration,
    pub proxy_requests: bool,
}

#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub portal_url: Url,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub service_name: String,
    pub website_address: String,
    pub subscription_banner_html: String,
}

#[derive(Debug, Clone)]
pub struct CaptchaSettings {
    pub site_key: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("FILEDECK").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    api: RawApiSettings,
    remote: RawRemoteSettings,
    site: RawSiteSettings,
    captcha: RawCaptchaSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.api_url.as_ref() {
            self.api.url = Some(url.clone());
        }
        if let Some(seconds) = overrides.api_timeout_seconds {
            self.api.timeout_seconds = Some(seconds);
        }
        if let Some(proxy) = overrides.api_proxy_requests {
            self.api.proxy_requests = Some(proxy);
        }
        if let Some(url) = overrides.remote_portal_url.as_ref() {
            self.remote.portal_url = Some(url.clone());
        }
        if let Some(seconds) = overrides.remote_timeout_seconds {
            self.remote.timeout_seconds = Some(seconds);
        }
        if let Some(name) = overrides.site_service_name.as_ref() {
            self.site.service_name = Some(name.clone());
        }
        if let Some(address) = overrides.site_website_address.as_ref() {
            self.site.website_address = Some(address.clone());
        }
        if let Some(key) = overrides.captcha_site_key.as_ref() {
            self.captcha.site_key = Some(key.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            api,
            remote,
            site,
            captcha,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            api: build_api_settings(api)?,
            remote: build_remote_settings(remote)?,
            site: build_site_settings(site)?,
            captcha: CaptchaSettings {
                site_key: captcha.site_key.unwrap_or_default(),
            },
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    let graceful_shutdown = positive_seconds(graceful_secs, "server.graceful_shutdown_seconds")?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_api_settings(api: RawApiSettings) -> Result<ApiSettings, LoadError> {
    let url = parse_base_url(
        api.url.as_deref().unwrap_or(DEFAULT_API_URL),
        "api.url",
    )?;
    let timeout = positive_seconds(
        api.timeout_seconds.unwrap_or(DEFAULT_API_TIMEOUT_SECS),
        "api.timeout_seconds",
    )?;

    Ok(ApiSettings {
        url,
        timeout,
        proxy_requests: api.proxy_requests.unwrap_or(false),
    })
}

fn build_remote_settings(remote: RawRemoteSettings) -> Result<RemoteSettings, LoadError> {
    let portal_url = parse_base_url(
        remote
            .portal_url
            .as_deref()
            .unwrap_or(DEFAULT_REMOTE_PORTAL_URL),
        "remote.portal_url",
    )?;
    let timeout = positive_seconds(
        remote.timeout_seconds.unwrap_or(DEFAULT_REMOTE_TIMEOUT_SECS),
        "remote.timeout_seconds",
    )?;

    Ok(RemoteSettings {
        portal_url,
        timeout,
    })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let service_name = site
        .service_name
        .map(|name| name.trim().to_string())
        .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());
    if service_name.is_empty() {
        return Err(LoadError::invalid(
            "site.service_name",
            "must not be empty",
        ));
    }

    let website_address = site
        .website_address
        .unwrap_or_else(|| DEFAULT_WEBSITE_ADDRESS.to_string());
    Url::parse(&website_address)
        .map_err(|err| LoadError::invalid("site.website_address", err.to_string()))?;

    Ok(SiteSettings {
        service_name,
        website_address: website_address.trim_end_matches('/').to_string(),
        subscription_banner_html: site.subscription_banner_html.unwrap_or_default(),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiSettings {
    url: Option<String>,
    timeout_seconds: Option<u64>,
    proxy_requests: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRemoteSettings {
    portal_url: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    service_name: Option<String>,
    website_address: Option<String>,
    subscription_banner_html: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCaptchaSettings {
    site_key: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

/// Base URLs are joined with relative paths, so they must end in `/`.
fn parse_base_url(value: &str, key: &'static str) -> Result<Url, LoadError> {
    let trimmed = value.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&normalized).map_err(|err| LoadError::invalid(key, err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(key, "scheme must be http or https"));
    }
    Ok(url)
}

fn positive_seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
