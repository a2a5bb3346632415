use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use skein_core::{BuildError, ProgramError, RunReport, SchedulerConfig};

use crate::transcript::Transcript;

/// How a scenario run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Quiescent,
    Stalled,
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Program(#[from] ProgramError),
}

/// A bundled client program.
#[async_trait]
pub trait Scenario: Send + Sync {
    fn name(&self) -> &'static str;

    fn about(&self) -> &'static str;

    /// How a correct run of this program ends.
    fn expected(&self) -> RunStatus {
        RunStatus::Quiescent
    }

    async fn run(
        &self,
        config: &SchedulerConfig,
        out: Transcript,
    ) -> Result<RunReport, ScenarioError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("scenario already registered: {0}")]
    Duplicate(&'static str),
}

/// Registry of scenarios (name -> scenario).
///
/// Built once at startup, read-only afterwards.
#[derive(Default)]
pub struct ScenarioRegistry {
    scenarios: BTreeMap<&'static str, Arc<dyn Scenario>>,
}

impl ScenarioRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, scenario: Arc<dyn Scenario>) -> Result<(), RegistryError> {
        let name = scenario.name();
        if self.scenarios.contains_key(name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.scenarios.insert(name, scenario);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Scenario>> {
        self.scenarios.get(name)
    }

    /// Scenarios sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Scenario>> {
        self.scenarios.values()
    }
}
