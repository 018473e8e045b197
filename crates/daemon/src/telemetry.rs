//! Tracing subscriber setup, with optional OpenTelemetry export

use crate::settings::{LogFormat, LoggingConfig};
use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

type BoxedLayer = Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>;

/// Install the global subscriber.
///
/// The returned guard flushes the file sink; keep it alive until exit.
///
/// # Environment Variables
///
/// - `RUST_LOG`: overrides `logging.filter`
/// - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (e.g., http://localhost:4317)
/// - `OTEL_SERVICE_NAME`: Service name (default: marketfeed)
pub fn init(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.filter))?;

    let (file_layer, guard) = match logging.directory.as_deref() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(
                shellexpand::tilde(dir).into_owned(),
                "marketfeed.log",
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_writer(writer).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let console_layer = match logging.format {
        LogFormat::Json => fmt::layer().json().boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
    };

    tracing_subscriber::registry()
        .with(otel_layer())
        .with(file_layer)
        .with(console_layer)
        .with(env_filter)
        .try_init()?;

    Ok(guard)
}

fn otel_layer() -> Option<BoxedLayer> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;

    #[cfg(feature = "telemetry")]
    {
        match otel_layer_impl(&endpoint) {
            Ok(layer) => Some(layer),
            Err(e) => {
                eprintln!("Failed to initialize OpenTelemetry (continuing without it): {e}");
                None
            }
        }
    }

    #[cfg(not(feature = "telemetry"))]
    {
        eprintln!(
            "OTEL_EXPORTER_OTLP_ENDPOINT={endpoint} set but feature 'telemetry' not enabled; \
             rebuild with: cargo build --features telemetry"
        );
        None
    }
}

#[cfg(feature = "telemetry")]
fn otel_layer_impl(endpoint: &str) -> Result<BoxedLayer> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{trace::TracerProvider, Resource};

    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "marketfeed".to_string());

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            service_name.clone(),
        )]))
        .build();

    let tracer = provider.tracer(service_name);
    opentelemetry::global::set_tracer_provider(provider);

    Ok(tracing_opentelemetry::layer().with_tracer(tracer).boxed())
}
