use std::{env, sync::Once};

use metrics::{Unit, describe_counter};
use tracing::level_filters::LevelFilter;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// HTTP client and server internals log every connection at debug level.
const QUIET_DEPENDENCIES: [&str; 4] = ["hyper", "h2", "reqwest", "rustls"];

/// Install the global subscriber. `RUST_LOG` replaces the configured level
/// entirely when set.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let directives = filter_directives(logging.level, env::var(EnvFilter::DEFAULT_ENV).ok());
    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .parse_lossy(directives);

    // Spans carry the request id and route area of each viewer or account
    // request.
    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("subscriber already installed: {err}")))
}

fn filter_directives(level: LevelFilter, from_env: Option<String>) -> String {
    if let Some(directives) = from_env.filter(|value| !value.trim().is_empty()) {
        return directives;
    }

    let mut directives = level.to_string().to_lowercase();
    let dependency_level = LevelFilter::WARN.min(level).to_string().to_lowercase();
    for dependency in QUIET_DEPENDENCIES {
        directives.push_str(&format!(",{dependency}={dependency_level}"));
    }
    directives
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "filedeck_viewer_resolved_total",
            Unit::Count,
            "Viewer pages resolved, by content source (file, list, remote, demo)."
        );
        describe_counter!(
            "filedeck_remote_probe_failures_total",
            Unit::Count,
            "Remote portal probes that failed or returned unusable metadata."
        );
        describe_counter!(
            "filedeck_form_submissions_total",
            Unit::Count,
            "Account form submissions, by form and outcome."
        );
        describe_counter!(
            "filedeck_http_responses_total",
            Unit::Count,
            "Responses sent, by route area and status class."
        );
    });
}
