//! Tracing subscriber wiring for the orchestration crates.
//!
//! ```no_run
//! use orchestry_observe::tracing_setup::{self, TracingOptions};
//!
//! tracing_setup::init_tracing(TracingOptions::default()).unwrap();
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use std::sync::OnceLock;

/// Kept so [`shutdown_tracing`] can flush the exporter on exit.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// How the subscriber is assembled.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingOptions {
    /// Emit log lines as JSON objects instead of human-readable text.
    pub json_output: bool,
    /// Bridge spans to OpenTelemetry with a stdout exporter. Local-dev
    /// oriented; production deployments swap in an OTLP exporter.
    pub enable_otel: bool,
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise execution lifecycle events from the
/// orchestration crates are logged at `info` and everything else at `warn`.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_tracing(options: TracingOptions) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,orchestry_core=info,orchestry_infra=info"));

    // Option<Layer> is itself a Layer, so one chain covers both shapes.
    let otel_layer = options.enable_otel.then(|| {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("orchestry");
        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);
        tracing_opentelemetry::layer().with_tracer(tracer)
    });

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer);

    if options.json_output {
        registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .init();
    }

    Ok(())
}

/// Flush buffered spans and shut the tracer provider down. No-op when OTel
/// was never enabled.
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(err) = provider.shutdown() {
            tracing::warn!(error = %err, "tracer provider shutdown failed");
        }
    }
}
