use async_trait::async_trait;
use skein_core::{Channel, ProgramBuilder, RunReport, SchedulerConfig, Select};

use crate::registry::{Scenario, ScenarioError};
use crate::transcript::Transcript;

const PER_PRODUCER: usize = 10;

enum Source {
    Left,
    Right,
}

pub struct SelectFanIn;

#[async_trait]
impl Scenario for SelectFanIn {
    fn name(&self) -> &'static str {
        "select-fan-in"
    }

    fn about(&self) -> &'static str {
        "main selects over two producers' channels until both are drained"
    }

    async fn run(
        &self,
        config: &SchedulerConfig,
        out: Transcript,
    ) -> Result<RunReport, ScenarioError> {
        let program = ProgramBuilder::<()>::new()
            .config(config.clone())
            .entry(move |cx, _| async move {
                let left: Channel<i32> = Channel::new(1);
                let right: Channel<i32> = Channel::new(1);

                // まだ誰も送っていないので default 節に落ちる
                let idle = Select::new()
                    .recv(&left, |_| Source::Left)
                    .recv(&right, |_| Source::Right)
                    .try_select()?;
                if idle.is_none() {
                    out.println("default");
                }

                for (name, ch, value) in [("left", &left, 100), ("right", &right, 200)] {
                    let tx = ch.clone();
                    cx.spawn(name, move |cx| async move {
                        for _ in 0..PER_PRODUCER {
                            tx.send(&cx, value).await?;
                        }
                        Ok(())
                    });
                }

                let (mut from_left, mut from_right) = (0, 0);
                for _ in 0..2 * PER_PRODUCER {
                    let source = Select::new()
                        .recv(&left, |_| Source::Left)
                        .recv(&right, |_| Source::Right)
                        .select(&cx)
                        .await?;
                    match source {
                        Source::Left => from_left += 1,
                        Source::Right => from_right += 1,
                    }
                }
                out.println(format!("left {from_left}"));
                out.println(format!("right {from_right}"));
                Ok(())
            })
            .build()?;
        Ok(program.run().await?)
    }
}
