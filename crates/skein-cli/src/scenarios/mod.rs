//! Bundled client programs.

mod channels;
mod closure_capture;
mod global_init;
mod mutex_counter;
mod select_fan_in;

use std::sync::Arc;

use crate::registry::{RegistryError, ScenarioRegistry};

pub fn registry() -> Result<ScenarioRegistry, RegistryError> {
    let mut reg = ScenarioRegistry::new();
    reg.register(Arc::new(channels::UnbufferedChannel))?;
    reg.register(Arc::new(channels::BufferedChannel))?;
    reg.register(Arc::new(channels::ProducerConsumer))?;
    reg.register(Arc::new(mutex_counter::MutexCounter))?;
    reg.register(Arc::new(select_fan_in::SelectFanIn))?;
    reg.register(Arc::new(closure_capture::ClosureCapture))?;
    reg.register(Arc::new(global_init::GlobalInit))?;
    Ok(reg)
}
