use crate::events::{EngineEvent, EventMessageVerbosity};
use std::env;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, with the current span.
    Json,
    /// Human readable, filtered by `RUST_LOG` (info when unset).
    Pretty,
}

impl LogFormat {
    /// JSON on CI, pretty everywhere else.
    pub fn from_env() -> Self {
        match env::var_os("CI") {
            Some(_) => LogFormat::Json,
            None => LogFormat::Pretty,
        }
    }
}

/// Installs the global tracing subscriber. Calling it more than once is a no-op.
pub fn init_tracing(format: LogFormat) {
    let _ = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::INFO)
            .with_current_span(true)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .try_init(),
    };
}

/// Logger: receives every event the engine emits, cleanup progress included.
pub trait Logger: Send + Sync {
    fn log(&self, event: EngineEvent);
    fn clone_dyn(&self) -> Box<dyn Logger>;
}

impl Clone for Box<dyn Logger> {
    fn clone(&self) -> Self {
        self.clone_dyn()
    }
}

/// StdIoLogger: forwards events to `tracing`, within a span describing where they come from.
#[derive(Clone, Default)]
pub struct StdIoLogger {}

impl StdIoLogger {
    pub fn new() -> StdIoLogger {
        StdIoLogger {}
    }
}

impl Logger for StdIoLogger {
    fn log(&self, event: EngineEvent) {
        let event_details = event.get_details();
        let stage = event_details.stage();

        tracing::span!(
            tracing::Level::INFO,
            "std_io_logger",
            project = event_details.project_name(),
            stage = stage.to_string().as_str(),
            step = stage.sub_step_name().as_str(),
            environment = event_details.environment().map(|e| e.to_string()).unwrap_or_default().as_str(),
            progress = event_details.progress().map(|p| format!("{}%", p)).unwrap_or_default().as_str(),
        )
        .in_scope(|| {
            // full details may hold vendor stderr, env vars never leave the event
            let message = event.message(EventMessageVerbosity::FullDetailsWithoutEnvVars);
            match &event {
                EngineEvent::Info(..) => info!("{}", message),
                EngineEvent::Warning(..) => warn!("{}", message),
                EngineEvent::Error(..) => error!("{}", message),
            };
        });
    }

    fn clone_dyn(&self) -> Box<dyn Logger> {
        Box::new(self.clone())
    }
}
