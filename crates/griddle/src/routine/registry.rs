use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use crate::config::ServiceConfig;
use crate::error::{GriddleError, Result, RoutineError};
use super::core_trait::InferenceRoutine;

/// Shared handle to a resolved routine.
pub type SharedRoutine<P, O> = Arc<dyn InferenceRoutine<P, O>>;

type Factory<P, O> = Box<dyn Fn(&serde_json::Value) -> std::result::Result<SharedRoutine<P, O>, RoutineError> + Send + Sync>;

/// # RoutineRegistry
///
/// Startup-time table of named routine factories.
///
/// Services register every routine they can serve, then resolve the one
/// named in their [`ServiceConfig`]. Resolution failures are fatal and meant
/// to abort startup, they never surface per request.
pub struct RoutineRegistry<P, O>
where P: Send + Sync, O: Send
{
    factories: HashMap<String, Factory<P, O>>,
}

impl<P, O> Default for RoutineRegistry<P, O>
where P: Send + Sync, O: Send
{
    fn default() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }
}

impl<P, O> RoutineRegistry<P, O>
where P: Send + Sync + 'static, O: Send + 'static
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `name`, replacing any previous entry.
    ///
    /// The factory receives the `routine_config` section of the service
    /// configuration.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where F: Fn(&serde_json::Value) -> std::result::Result<SharedRoutine<P, O>, RoutineError> + Send + Sync + 'static
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    /// Whether a factory is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names = self.factories.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    /// Builds the routine registered under `name`.
    ///
    /// # Parameters
    ///
    /// * `name` - Registered routine name
    /// * `routine_config` - Settings passed through to the factory
    ///
    /// # Returns
    ///
    /// The shared routine, or [`GriddleError::RoutineResolution`] when the
    /// name is unknown or the factory fails
    pub fn build(&self, name: &str, routine_config: &serde_json::Value) -> Result<SharedRoutine<P, O>> {
        let factory = self.factories.get(name).ok_or_else(|| GriddleError::RoutineResolution {
            name: name.to_string(),
            reason: "no routine registered under this name".to_string(),
        })?;
        let routine = factory(routine_config).map_err(|e| GriddleError::RoutineResolution {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        info!(routine = name, "resolved inference routine");
        Ok(routine)
    }

    /// Builds the routine the configuration names.
    pub fn resolve(&self, config: &ServiceConfig) -> Result<SharedRoutine<P, O>> {
        self.build(&config.routine, &config.routine_config)
    }
}
