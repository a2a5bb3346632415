use async_trait::async_trait;
use skein_core::{Barrier, CaptureCell, Mutex, ProgramBuilder, RunReport, SchedulerConfig};

use crate::registry::{Scenario, ScenarioError};
use crate::transcript::Transcript;

const ROUNDS: u32 = 100;

pub struct MutexCounter;

#[async_trait]
impl Scenario for MutexCounter {
    fn name(&self) -> &'static str {
        "mutex-counter"
    }

    fn about(&self) -> &'static str {
        "two tasks increment a shared counter 100 times each under one mutex"
    }

    async fn run(
        &self,
        config: &SchedulerConfig,
        out: Transcript,
    ) -> Result<RunReport, ScenarioError> {
        let program = ProgramBuilder::<()>::new()
            .config(config.clone())
            .entry(move |cx, _| async move {
                let count = CaptureCell::new(0u32);
                let m = Mutex::new();
                let wg = Barrier::new();
                wg.add(2)?;

                for name in ["increment-1", "increment-2"] {
                    let (count, m, wg) = (count.clone(), m.clone(), wg.clone());
                    cx.spawn(name, move |cx| async move {
                        for _ in 0..ROUNDS {
                            m.acquire(&cx).await?;
                            let seen = count.get();
                            tokio::task::yield_now().await;
                            count.set(seen + 1);
                            m.release(&cx)?;
                        }
                        wg.done()?;
                        Ok(())
                    });
                }

                wg.wait(&cx).await?;
                out.println(count.get());
                Ok(())
            })
            .build()?;
        Ok(program.run().await?)
    }
}
