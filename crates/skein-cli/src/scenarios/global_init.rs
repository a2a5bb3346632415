use async_trait::async_trait;
use skein_core::{Declaration, Globals, ProgramBuilder, RunReport, SchedulerConfig};

use crate::registry::{Scenario, ScenarioError};
use crate::transcript::Transcript;

fn f(a: i64, b: i64) -> i64 {
    a + b
}

pub struct GlobalInit;

#[async_trait]
impl Scenario for GlobalInit {
    fn name(&self) -> &'static str {
        "global-init"
    }

    fn about(&self) -> &'static str {
        "globals declared out of order are initialized after what they read"
    }

    async fn run(
        &self,
        config: &SchedulerConfig,
        out: Transcript,
    ) -> Result<RunReport, ScenarioError> {
        // var x = f(1+y, 2) + 1
        // var y = f(1, 2) + 1
        // func f(a, b) { return a + b }
        let log = out.clone();
        let program = ProgramBuilder::<i64>::new()
            .config(config.clone())
            .declare(Declaration::variable("x", ["f", "y"], |g: &Globals<i64>| {
                Ok(f(1 + g.get("y")?, 2) + 1)
            }))
            .declare(Declaration::variable("y", ["f"], |_: &Globals<i64>| {
                Ok(f(1, 2) + 1)
            }))
            .declare(Declaration::function("f"))
            .entry(move |_, globals| async move {
                log.println(format!("x = {}", globals.get("x")?));
                log.println(format!("y = {}", globals.get("y")?));
                Ok(())
            })
            .build()?;

        out.println(format!("init order: {}", program.order().names().join(" ")));
        Ok(program.run().await?)
    }
}
