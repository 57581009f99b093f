use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the filedeck binary.
#[derive(Debug, Parser)]
#[command(name = "filedeck", version, about = "filedeck viewer and account pages")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FILEDECK_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the content API base URL.
    #[arg(long = "api-url", value_name = "URL")]
    pub api_url: Option<String>,

    /// Override the content API request timeout.
    #[arg(long = "api-timeout-seconds", value_name = "SECONDS")]
    pub api_timeout_seconds: Option<u64>,

    /// Whether browser API calls are proxied through this service.
    #[arg(
        long = "api-proxy-requests",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub api_proxy_requests: Option<bool>,

    /// Override the remote content portal URL.
    #[arg(long = "remote-portal-url", value_name = "URL")]
    pub remote_portal_url: Option<String>,

    /// Override the remote probe timeout.
    #[arg(long = "remote-timeout-seconds", value_name = "SECONDS")]
    pub remote_timeout_seconds: Option<u64>,

    /// Override the service name shown in page titles.
    #[arg(long = "site-service-name", value_name = "NAME")]
    pub site_service_name: Option<String>,

    /// Override the public base URL of the site.
    #[arg(long = "site-website-address", value_name = "URL")]
    pub site_website_address: Option<String>,

    /// Override the CAPTCHA site key handed to the viewer.
    #[arg(long = "captcha-site-key", value_name = "KEY")]
    pub captcha_site_key: Option<String>,
}
