//! Channel - タスク間の FIFO 通信路
//!
//! - capacity 0: 送信側と受信側が揃った時点で値を直接受け渡す（rendezvous）
//! - capacity N: バッファが N 個埋まるまで送信はブロックしない
//!
//! どちらの場合も、値は送った順に届く。

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::debug;

use crate::domain::{BlockReason, ChannelId, SyncError, TaskId};
use crate::sched::park::{Episode, Parked, Waiter};
use crate::sched::{Cx, lock};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrySendError<T> {
    #[error("channel is full")]
    Full(T),

    #[error("channel is closed")]
    Closed(T),
}

impl<T> TrySendError<T> {
    /// The value that could not be sent.
    pub fn into_inner(self) -> T {
        match self {
            TrySendError::Full(value) | TrySendError::Closed(value) => value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TryRecvError {
    #[error("channel is empty")]
    Empty,

    #[error("channel is closed")]
    Closed,
}

pub(super) type SendAck = Result<(), SyncError>;

struct State<T> {
    buffer: VecDeque<T>,
    /// Blocked senders, each with the value it is offering.
    senders: VecDeque<(Waiter<SendAck>, T)>,
    receivers: VecDeque<Waiter<Option<T>>>,
    closed: bool,
}

impl<T> State<T> {
    /// Hand `value` to the first receiver still waiting. Returns the value if
    /// nobody took it.
    fn offer_to_receivers(&mut self, value: T) -> Option<T> {
        let mut value = Some(value);
        while let Some(receiver) = self.receivers.pop_front() {
            match receiver.wake(value.take()) {
                Ok(()) => return None,
                Err(back) => value = back,
            }
        }
        value
    }

    /// Take the value of the first sender still waiting and release it.
    /// Values of senders whose wait was cancelled are dropped.
    fn take_from_sender(&mut self) -> Option<T> {
        while let Some((sender, value)) = self.senders.pop_front() {
            if sender.wake(Ok(())).is_ok() {
                return Some(value);
            }
        }
        None
    }

    /// Oldest value available without blocking. Refills the buffer from the
    /// sender queue so a blocked sender moves in as soon as there is room.
    fn take_ready(&mut self) -> Option<T> {
        if let Some(value) = self.buffer.pop_front() {
            if let Some(next) = self.take_from_sender() {
                self.buffer.push_back(next);
            }
            return Some(value);
        }
        self.take_from_sender()
    }

    // 自分自身の待機票は相手にならない
    fn recv_ready(&self, me: TaskId) -> bool {
        self.closed
            || !self.buffer.is_empty()
            || self.senders.iter().any(|(sender, _)| sender.task() != me)
    }

    fn send_ready(&self, me: TaskId, capacity: usize) -> bool {
        self.closed
            || self.buffer.len() < capacity
            || self.receivers.iter().any(|receiver| receiver.task() != me)
    }
}

struct Inner<T> {
    id: ChannelId,
    capacity: usize,
    state: Mutex<State<T>>,
}

/// Channel はタスク間で共有される FIFO 通信路
///
/// Clone しても同じチャネルを指す。
pub struct Channel<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Channel<T> {
    /// `capacity` 0 は unbuffered（同期）チャネル
    pub fn new(capacity: usize) -> Self {
        let id = ChannelId::next();
        debug!(channel = %id, capacity, "channel created");
        Self {
            inner: Arc::new(Inner {
                id,
                capacity,
                state: Mutex::new(State {
                    buffer: VecDeque::with_capacity(capacity),
                    senders: VecDeque::new(),
                    receivers: VecDeque::new(),
                    closed: false,
                }),
            }),
        }
    }

    pub fn unbuffered() -> Self {
        Self::new(0)
    }

    pub fn id(&self) -> ChannelId {
        self.inner.id
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of buffered values. Always 0 for an unbuffered channel.
    pub fn len(&self) -> usize {
        lock(&self.inner.state).buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner.state).closed
    }

    fn closed_error(&self) -> SyncError {
        SyncError::ChannelClosed {
            channel: self.inner.id,
        }
    }

    /// Send `value`, blocking while no receiver is ready (unbuffered) or the
    /// buffer is full (buffered).
    ///
    /// Fails with `ChannelClosed` if the channel is closed before or while
    /// waiting; the value is dropped in that case.
    pub async fn send(&self, cx: &Cx, value: T) -> Result<(), SyncError> {
        let parked = {
            let mut state = lock(&self.inner.state);
            if state.closed {
                return Err(self.closed_error());
            }
            let Some(value) = state.offer_to_receivers(value) else {
                return Ok(());
            };
            if state.buffer.len() < self.inner.capacity {
                state.buffer.push_back(value);
                return Ok(());
            }
            let (waiter, parked) = cx.park(BlockReason::Send(self.inner.id));
            state.senders.push_back((waiter, value));
            parked
        };
        parked.wait().await?
    }

    /// Receive the oldest value, blocking until one is available.
    ///
    /// Returns `None` once the channel is closed and drained.
    pub async fn recv(&self, cx: &Cx) -> Result<Option<T>, SyncError> {
        let parked = {
            let mut state = lock(&self.inner.state);
            if let Some(value) = state.take_ready() {
                return Ok(Some(value));
            }
            if state.closed {
                return Ok(None);
            }
            let (waiter, parked) = cx.park(BlockReason::Receive(self.inner.id));
            state.receivers.push_back(waiter);
            parked
        };
        parked.wait().await
    }

    /// Send without blocking. On an unbuffered channel this only succeeds
    /// when a receiver is already waiting.
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        let mut state = lock(&self.inner.state);
        if state.closed {
            return Err(TrySendError::Closed(value));
        }
        let Some(value) = state.offer_to_receivers(value) else {
            return Ok(());
        };
        if state.buffer.len() < self.inner.capacity {
            state.buffer.push_back(value);
            return Ok(());
        }
        Err(TrySendError::Full(value))
    }

    pub fn try_receive(&self) -> Result<T, TryRecvError> {
        let mut state = lock(&self.inner.state);
        match state.take_ready() {
            Some(value) => Ok(value),
            None if state.closed => Err(TryRecvError::Closed),
            None => Err(TryRecvError::Empty),
        }
    }

    /// Queue a receive waiter for one case of a select. Returns `None`, and
    /// queues nothing, when a receive could complete right now.
    pub(super) fn enlist_recv(&self, episode: &Episode) -> Option<Parked<Option<T>>> {
        let mut state = lock(&self.inner.state);
        if state.recv_ready(episode.task()) {
            return None;
        }
        let (waiter, parked) = episode.pair();
        state.receivers.push_back(waiter);
        Some(parked)
    }

    /// Queue a send waiter carrying `value`. Returns `None` when a send could
    /// complete right now; `value` is dropped then.
    pub(super) fn enlist_send(&self, episode: &Episode, value: T) -> Option<Parked<SendAck>> {
        let mut state = lock(&self.inner.state);
        if state.send_ready(episode.task(), self.inner.capacity) {
            return None;
        }
        let (waiter, parked) = episode.pair();
        state.senders.push_back((waiter, value));
        Some(parked)
    }

    /// Close the channel.
    ///
    /// Buffered values stay receivable. Blocked receivers get `None`, blocked
    /// senders fail with `ChannelClosed`.
    pub fn close(&self) -> Result<(), SyncError> {
        let mut state = lock(&self.inner.state);
        if state.closed {
            return Err(self.closed_error());
        }
        state.closed = true;
        for receiver in state.receivers.drain(..) {
            let _ = receiver.wake(None);
        }
        let dropped = state.senders.len();
        for (sender, _) in state.senders.drain(..) {
            let _ = sender.wake(Err(self.closed_error()));
        }
        debug!(channel = %self.inner.id, dropped, "channel closed");
        Ok(())
    }
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.inner.id)
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use crate::domain::{TaskOutcome, TaskState};
    use crate::sched::Scheduler;
    use crate::test_support::init_test_logging;
    use rstest::rstest;
    use std::time::Duration;
    use tokio::time::timeout;

    const LIMIT: Duration = Duration::from_secs(5);

    fn scheduler() -> Scheduler {
        init_test_logging();
        Scheduler::new(SchedulerConfig::default())
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(3)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn values_arrive_in_send_order(#[case] capacity: usize) {
        let scheduler = scheduler();
        let ch = Channel::new(capacity);
        let received = Arc::new(Mutex::new(Vec::new()));

        let tx = ch.clone();
        scheduler.spawn("producer", move |cx| async move {
            for v in 0..20 {
                tx.send(&cx, v).await?;
            }
            tx.close()?;
            Ok(())
        });
        let rx = ch.clone();
        let sink = Arc::clone(&received);
        scheduler.spawn("consumer", move |cx| async move {
            while let Some(v) = rx.recv(&cx).await? {
                sink.lock().unwrap().push(v);
            }
            Ok(())
        });

        timeout(LIMIT, scheduler.run_until_quiescent())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*received.lock().unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn try_operations_never_block() {
        let ch = Channel::new(1);
        assert_eq!(ch.try_receive(), Err(TryRecvError::Empty));
        assert_eq!(ch.try_send(1), Ok(()));
        assert_eq!(ch.try_send(2), Err(TrySendError::Full(2)));
        assert_eq!(ch.len(), 1);
        assert_eq!(ch.try_receive(), Ok(1));

        let unbuffered = Channel::unbuffered();
        assert_eq!(unbuffered.try_send("x").unwrap_err().into_inner(), "x");
    }

    #[test]
    fn close_drains_buffer_then_reports_closed() {
        let ch = Channel::new(2);
        ch.try_send('a').unwrap();
        ch.close().unwrap();

        assert_eq!(ch.try_send('b'), Err(TrySendError::Closed('b')));
        assert_eq!(ch.try_receive(), Ok('a'));
        assert_eq!(ch.try_receive(), Err(TryRecvError::Closed));
        assert_eq!(
            ch.close(),
            Err(SyncError::ChannelClosed { channel: ch.id() })
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn close_wakes_blocked_receiver_with_none() {
        let scheduler = scheduler();
        let ch: Channel<u32> = Channel::unbuffered();

        let rx = ch.clone();
        let got = Arc::new(Mutex::new(Some(0)));
        let slot = Arc::clone(&got);
        let receiver = scheduler.spawn("receiver", move |cx| async move {
            let value = rx.recv(&cx).await?;
            *slot.lock().unwrap() = value;
            Ok(())
        });
        let closer = ch.clone();
        scheduler.spawn("closer", move |_| async move {
            while receiver.state() != TaskState::Blocked {
                tokio::task::yield_now().await;
            }
            closer.close()?;
            Ok(())
        });

        timeout(LIMIT, scheduler.run_until_quiescent())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*got.lock().unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn close_fails_blocked_sender() {
        let scheduler = scheduler();
        let ch = Channel::unbuffered();

        let tx = ch.clone();
        let sender = scheduler.spawn("sender", move |cx| async move {
            tx.send(&cx, 7).await?;
            Ok(())
        });
        let closer = ch.clone();
        let watched = sender.clone();
        scheduler.spawn("closer", move |_| async move {
            while watched.state() != TaskState::Blocked {
                tokio::task::yield_now().await;
            }
            closer.close()?;
            Ok(())
        });

        timeout(LIMIT, scheduler.run_until_quiescent())
            .await
            .unwrap()
            .unwrap();
        let expected = SyncError::ChannelClosed { channel: ch.id() }.to_string();
        assert_eq!(sender.outcome(), Some(TaskOutcome::Failed(expected)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn lone_receiver_stalls() {
        let scheduler = scheduler();
        let ch: Channel<()> = Channel::unbuffered();
        let rx = ch.clone();
        scheduler.spawn("consumer", move |cx| async move {
            rx.recv(&cx).await?;
            Ok(())
        });

        let err = timeout(LIMIT, scheduler.run_until_quiescent())
            .await
            .unwrap()
            .unwrap_err();
        assert!(err.is_blocked("consumer"));
        assert_eq!(err.blocked()[0].reason, BlockReason::Receive(ch.id()));
    }
}
