use async_trait::async_trait;
use skein_core::{Barrier, BuildError, Channel, Program, ProgramBuilder, RunReport, SchedulerConfig};

use crate::registry::{RunStatus, Scenario, ScenarioError};
use crate::transcript::Transcript;

pub struct UnbufferedChannel;

#[async_trait]
impl Scenario for UnbufferedChannel {
    fn name(&self) -> &'static str {
        "unbuffered-channel"
    }

    fn about(&self) -> &'static str {
        "one sender, one receiver, three values over a rendezvous channel"
    }

    async fn run(
        &self,
        config: &SchedulerConfig,
        out: Transcript,
    ) -> Result<RunReport, ScenarioError> {
        let program = ProgramBuilder::<()>::new()
            .config(config.clone())
            .entry(move |cx, _| async move {
                let ch = Channel::unbuffered();
                let tx = ch.clone();
                cx.spawn("sender", move |cx| async move {
                    for v in ["v1", "v2", "v3"] {
                        tx.send(&cx, v).await?;
                    }
                    Ok(())
                });
                for _ in 0..3 {
                    if let Some(v) = ch.recv(&cx).await? {
                        out.println(v);
                    }
                }
                Ok(())
            })
            .build()?;
        Ok(program.run().await?)
    }
}

/// Producer sends five values, consumer takes four, main waits for both.
fn producer_consumer(
    capacity: usize,
    config: &SchedulerConfig,
    out: Transcript,
) -> Result<Program<()>, BuildError> {
    ProgramBuilder::<()>::new()
        .config(config.clone())
        .entry(move |cx, _| async move {
            let wg = Barrier::new();
            wg.add(2)?;
            let ch = Channel::new(capacity);

            let (tx, done, log) = (ch.clone(), wg.clone(), out.clone());
            cx.spawn("producer", move |cx| async move {
                for i in 0..5 {
                    tx.send(&cx, i).await?;
                }
                log.println("Producer done");
                done.done()?;
                Ok(())
            });

            let (rx, done, log) = (ch, wg.clone(), out);
            cx.spawn("consumer", move |cx| async move {
                for _ in 0..4 {
                    if let Some(v) = rx.recv(&cx).await? {
                        log.println(v);
                    }
                }
                log.println("Consumer done");
                done.done()?;
                Ok(())
            });

            wg.wait(&cx).await?;
            Ok(())
        })
        .build()
}

pub struct ProducerConsumer;

#[async_trait]
impl Scenario for ProducerConsumer {
    fn name(&self) -> &'static str {
        "producer-consumer"
    }

    fn about(&self) -> &'static str {
        "five sends, four receives on an unbuffered channel; the producer never finishes"
    }

    fn expected(&self) -> RunStatus {
        RunStatus::Stalled
    }

    async fn run(
        &self,
        config: &SchedulerConfig,
        out: Transcript,
    ) -> Result<RunReport, ScenarioError> {
        Ok(producer_consumer(0, config, out)?.run().await?)
    }
}

pub struct BufferedChannel;

#[async_trait]
impl Scenario for BufferedChannel {
    fn name(&self) -> &'static str {
        "buffered-channel"
    }

    fn about(&self) -> &'static str {
        "producer-consumer with capacity 1; the spare slot lets the producer finish"
    }

    async fn run(
        &self,
        config: &SchedulerConfig,
        out: Transcript,
    ) -> Result<RunReport, ScenarioError> {
        Ok(producer_consumer(1, config, out)?.run().await?)
    }
}
