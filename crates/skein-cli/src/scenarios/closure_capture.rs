use std::ops::ControlFlow;

use async_trait::async_trait;
use skein_core::{ProgramBuilder, RunReport, SchedulerConfig, for_each_iteration};

use crate::registry::{Scenario, ScenarioError};
use crate::transcript::Transcript;

pub struct ClosureCapture;

#[async_trait]
impl Scenario for ClosureCapture {
    fn name(&self) -> &'static str {
        "closure-capture"
    }

    fn about(&self) -> &'static str {
        "a loop that bumps its index in the body; closures see the shared cell"
    }

    async fn run(
        &self,
        config: &SchedulerConfig,
        out: Transcript,
    ) -> Result<RunReport, ScenarioError> {
        let program = ProgramBuilder::<()>::new()
            .config(config.clone())
            .entry(move |_, _| async move {
                // for i := 1; i <= 10; i++ { f = func() { return i }; i++; println(i) }
                let mut f: Option<Box<dyn Fn() -> i32 + Send>> = None;
                for_each_iteration(
                    1,
                    |i| *i <= 10,
                    |i| *i += 1,
                    |i| {
                        let cell = i.clone();
                        f = Some(Box::new(move || cell.get()));
                        i.update(|v| *v += 1);
                        out.println(i.get());
                        ControlFlow::Continue(())
                    },
                );
                if let Some(f) = f {
                    out.println(f());
                }
                Ok(())
            })
            .build()?;
        Ok(program.run().await?)
    }
}
