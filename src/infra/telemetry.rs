use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing::Subscriber;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::application::resolver::METRIC_RESOLUTION_TOTAL;
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

pub const METRIC_REDIRECT_TOTAL: &str = "scriptorium_http_redirect_total";
pub const METRIC_PAGE_RENDER_MS: &str = "scriptorium_page_render_ms";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global subscriber. `RUST_LOG` refines the configured level.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(output_layer(logging.format))
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("subscriber already installed: {err}")))
}

fn output_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    }
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_RESOLUTION_TOTAL,
            Unit::Count,
            "Slug and id resolutions by outcome."
        );
        describe_counter!(
            METRIC_REDIRECT_TOTAL,
            Unit::Count,
            "Redirects issued by public routes, by route."
        );
        describe_histogram!(
            METRIC_PAGE_RENDER_MS,
            Unit::Milliseconds,
            "Time from request to rendered page, by page kind."
        );
    });
}
