use resource_engine::errors::CommandError;
use resource_engine::events::EngineEvent;
use resource_engine::logger::{LogFormat, Logger, init_tracing};
use resource_engine::models::cleanup::DeletionStep;
use resource_engine::orchestrator::ResourceDeleter;
use std::sync::{Arc, Mutex};
use std::time::Instant;

pub fn init() -> Instant {
    init_tracing(LogFormat::from_env());

    info!(
        "running from current directory: {}",
        std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    );

    Instant::now()
}

/// RecordingLogger: keeps every event, for assertions on what users would have seen.
#[derive(Clone, Default)]
pub struct RecordingLogger {
    pub events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl RecordingLogger {
    pub fn sub_step_names(&self) -> Vec<String> {
        self.events
            .lock()
            .expect("poisoned lock")
            .iter()
            .map(|e| e.get_details().stage().sub_step_name())
            .collect()
    }
}

impl Logger for RecordingLogger {
    fn log(&self, event: EngineEvent) {
        self.events.lock().expect("poisoned lock").push(event);
    }

    fn clone_dyn(&self) -> Box<dyn Logger> {
        Box::new(self.clone())
    }
}

/// FailingDeleter: deletes nothing, fails on one step id and records every attempt.
#[derive(Clone, Default)]
pub struct FailingDeleter {
    pub failing_step: Option<String>,
    pub attempts: Arc<Mutex<Vec<String>>>,
}

impl FailingDeleter {
    pub fn failing_on(step_id: &str) -> Self {
        FailingDeleter {
            failing_step: Some(step_id.to_string()),
            ..Default::default()
        }
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().expect("poisoned lock").clone()
    }
}

impl ResourceDeleter for FailingDeleter {
    fn delete(&self, step: &DeletionStep) -> Result<(), CommandError> {
        self.attempts.lock().expect("poisoned lock").push(step.id.clone());

        match self.failing_step.as_deref() == Some(step.id.as_str()) {
            true => Err(CommandError::new(
                format!("Cannot delete `{}`", step.id),
                Some("vendor returned 503".to_string()),
                None,
            )),
            false => Ok(()),
        }
    }
}
