//! Runs one scenario and turns the result into a printable record.

use serde::Serialize;
use skein_core::{ProgramError, RunReport, SchedulerConfig};
use tracing::info;

use crate::registry::{RunStatus, Scenario, ScenarioError};
use crate::transcript::Transcript;

#[derive(Debug, Serialize)]
pub struct ScenarioRun {
    pub scenario: String,
    pub expected: RunStatus,
    pub status: RunStatus,
    pub output: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RunReport>,
}

impl ScenarioRun {
    /// 0 on quiescence, 3 on a stall, 2 on any other error.
    pub fn exit_code(&self) -> u8 {
        match self.status {
            RunStatus::Quiescent => 0,
            RunStatus::Stalled => 3,
            RunStatus::Failed => 2,
        }
    }

    pub fn as_expected(&self) -> bool {
        self.status == self.expected
    }
}

pub async fn run_scenario(scenario: &dyn Scenario, config: &SchedulerConfig) -> ScenarioRun {
    let out = Transcript::default();
    info!(scenario = scenario.name(), ?config, "running scenario");

    let (status, error, report) = match scenario.run(config, out.clone()).await {
        Ok(report) => (RunStatus::Quiescent, None, Some(report)),
        Err(ScenarioError::Program(ProgramError::Stall(stall))) => {
            let message = stall.to_string();
            (RunStatus::Stalled, Some(message), Some(stall.report))
        }
        Err(e) => (RunStatus::Failed, Some(e.to_string()), None),
    };

    ScenarioRun {
        scenario: scenario.name().to_string(),
        expected: scenario.expected(),
        status,
        output: out.lines(),
        error,
        report,
    }
}
