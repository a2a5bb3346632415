//! Select - 複数のチャネル操作のうち、実行できる一つだけを行う
//!
//! - 準備できているケースが複数あれば、ランダムに一つを選ぶ
//! - どれも準備できていなければ、全ケースに同じ episode の待機票を出して眠る。
//!   最初に起こしたケースが勝ち、残りの待機票は stale になる
//! - `try_select` は眠らない（`default` 節にあたる）
//!
//! 送信ケースの値は、待機票を出すたびに clone される。選ばれなかった送信は
//! 行われない。

use std::fmt;
use std::future::{Future, poll_fn};
use std::pin::Pin;
use std::task::Poll;

use rand::seq::SliceRandom;
use tracing::debug;

use super::channel::{Channel, TryRecvError, TrySendError};
use crate::domain::{BlockReason, SyncError};
use crate::sched::Cx;
use crate::sched::park::Episode;

/// A parked case. Resolves to `None` when the case lost to another one.
type Pending<'s, R> = Pin<Box<dyn Future<Output = Option<Result<R, SyncError>>> + Send + 's>>;

trait Case<R>: Send + Sync {
    /// Fire without blocking, if the channel allows it right now.
    fn try_fire(&self) -> Option<Result<R, SyncError>>;

    /// Queue a waiter for `episode`. `None` when the case became ready and
    /// nothing was queued.
    fn enlist<'s>(&'s self, episode: &Episode) -> Option<Pending<'s, R>>
    where
        R: 's;
}

struct RecvCase<'a, T, F> {
    channel: &'a Channel<T>,
    map: F,
}

impl<T, F, R> Case<R> for RecvCase<'_, T, F>
where
    T: Send,
    F: Fn(Option<T>) -> R + Send + Sync,
    R: Send,
{
    fn try_fire(&self) -> Option<Result<R, SyncError>> {
        match self.channel.try_receive() {
            Ok(value) => Some(Ok((self.map)(Some(value)))),
            Err(TryRecvError::Closed) => Some(Ok((self.map)(None))),
            Err(TryRecvError::Empty) => None,
        }
    }

    fn enlist<'s>(&'s self, episode: &Episode) -> Option<Pending<'s, R>>
    where
        R: 's,
    {
        let parked = self.channel.enlist_recv(episode)?;
        Some(Box::pin(async move {
            let value = parked.wait().await.ok()?;
            Some(Ok((self.map)(value)))
        }))
    }
}

struct SendCase<'a, T, F> {
    channel: &'a Channel<T>,
    value: T,
    map: F,
}

impl<T, F, R> Case<R> for SendCase<'_, T, F>
where
    T: Clone + Send + Sync,
    F: Fn() -> R + Send + Sync,
    R: Send,
{
    fn try_fire(&self) -> Option<Result<R, SyncError>> {
        match self.channel.try_send(self.value.clone()) {
            Ok(()) => Some(Ok((self.map)())),
            Err(TrySendError::Closed(_)) => Some(Err(SyncError::ChannelClosed {
                channel: self.channel.id(),
            })),
            Err(TrySendError::Full(_)) => None,
        }
    }

    fn enlist<'s>(&'s self, episode: &Episode) -> Option<Pending<'s, R>>
    where
        R: 's,
    {
        let parked = self.channel.enlist_send(episode, self.value.clone())?;
        Some(Box::pin(async move {
            match parked.wait().await {
                Ok(Ok(())) => Some(Ok((self.map)())),
                Ok(Err(e)) => Some(Err(e)),
                Err(_) => None,
            }
        }))
    }
}

/// Select は複数のチャネル操作から一つを選んで実行する
///
/// # 使用例
/// ```ignore
/// let event = Select::new()
///     .recv(&jobs, |job| Event::Job(job))
///     .send(&acks, 1, || Event::Acked)
///     .select(&cx)
///     .await?;
/// ```
///
/// 受信ケースの closure は、チャネルが close 済みで空のとき `None` を受け取る。
/// 送信ケースは close 済みのチャネルで選ばれると `ChannelClosed` で失敗する。
pub struct Select<'a, R> {
    cases: Vec<Box<dyn Case<R> + 'a>>,
}

impl<'a, R: Send + 'a> Select<'a, R> {
    pub fn new() -> Self {
        Self { cases: Vec::new() }
    }

    pub fn recv<T, F>(mut self, channel: &'a Channel<T>, map: F) -> Self
    where
        T: Send + 'a,
        F: Fn(Option<T>) -> R + Send + Sync + 'a,
    {
        self.cases.push(Box::new(RecvCase { channel, map }));
        self
    }

    pub fn send<T, F>(mut self, channel: &'a Channel<T>, value: T, map: F) -> Self
    where
        T: Clone + Send + Sync + 'a,
        F: Fn() -> R + Send + Sync + 'a,
    {
        self.cases.push(Box::new(SendCase {
            channel,
            value,
            map,
        }));
        self
    }

    fn shuffled(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.cases.len()).collect();
        order.shuffle(&mut rand::thread_rng());
        order
    }

    fn fire_first(&self, order: &[usize]) -> Option<Result<R, SyncError>> {
        order.iter().find_map(|&i| self.cases[i].try_fire())
    }

    /// Run one ready case without blocking. `Ok(None)` means no case was
    /// ready; the caller takes its default branch.
    pub fn try_select(&self) -> Result<Option<R>, SyncError> {
        self.fire_first(&self.shuffled()).transpose()
    }

    /// Run exactly one case, blocking until one can fire.
    ///
    /// With no cases at all this blocks forever, which the scheduler reports
    /// as a stall once every other task is blocked too.
    pub async fn select(&self, cx: &Cx) -> Result<R, SyncError> {
        loop {
            let order = self.shuffled();
            if let Some(fired) = self.fire_first(&order) {
                return fired;
            }

            let episode = cx.episode();
            let mut pending = Vec::with_capacity(order.len());
            let mut ready = false;
            for &i in &order {
                match self.cases[i].enlist(&episode) {
                    Some(parked) => pending.push(parked),
                    None => {
                        ready = true;
                        break;
                    }
                }
            }

            if ready {
                if episode.cancel() {
                    debug!(task = %cx.task_id(), "select case became ready, retrying");
                    continue;
                }
            } else if episode.commit(BlockReason::Select) && pending.is_empty() {
                std::future::pending::<()>().await;
            }

            // 一度 wake された episode の勝者は pending の中にいる
            return first_fired(pending)
                .await
                .unwrap_or(Err(SyncError::Disconnected));
        }
    }
}

impl<'a, R: Send + 'a> Default for Select<'a, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for Select<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Select")
            .field("cases", &self.cases.len())
            .finish()
    }
}

/// Poll every parked case until one fires. Cases that lost drop out.
async fn first_fired<R>(mut pending: Vec<Pending<'_, R>>) -> Option<Result<R, SyncError>> {
    poll_fn(move |waker| {
        let mut i = 0;
        while i < pending.len() {
            match pending[i].as_mut().poll(waker) {
                Poll::Ready(Some(fired)) => return Poll::Ready(Some(fired)),
                Poll::Ready(None) => {
                    pending.swap_remove(i);
                }
                Poll::Pending => i += 1,
            }
        }
        if pending.is_empty() {
            Poll::Ready(None)
        } else {
            Poll::Pending
        }
    })
    .await
}
