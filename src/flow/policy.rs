//! Applying an [`ExecutionPolicy`] to a stream of triggers.

use super::producer::channel_stream;
use crate::core::ExecutionPolicy;
use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Handler invocation started for each accepted trigger.
pub(crate) type Invocation<T, R> = Arc<dyn Fn(T) -> BoxFuture<'static, R> + Send + Sync>;

/// Map every trigger of `input` through `invoke`, scheduling invocations as
/// `policy` dictates. Results are emitted as invocations complete.
pub(crate) fn map_with_policy<T, R>(
    input: BoxStream<'static, T>,
    policy: ExecutionPolicy,
    invoke: Invocation<T, R>,
) -> BoxStream<'static, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    match policy {
        ExecutionPolicy::Ordered => input.then(move |trigger| invoke(trigger)).boxed(),
        ExecutionPolicy::Unordered => input
            .map(move |trigger| invoke(trigger))
            .buffer_unordered(usize::MAX)
            .boxed(),
        ExecutionPolicy::CancelPrevious => one_at_a_time(input, invoke, Admission::Replace),
        ExecutionPolicy::Throttled(window) => {
            let admission = Admission::Throttle(ThrottleWindow::new(window));
            one_at_a_time(input, invoke, admission)
        }
    }
}

enum Admission {
    /// A new trigger cancels the running invocation.
    Replace,
    /// A new trigger is dropped unless the handler is idle and the window
    /// has room.
    Throttle(ThrottleWindow),
}

fn one_at_a_time<T, R>(
    input: BoxStream<'static, T>,
    invoke: Invocation<T, R>,
    mut admission: Admission,
) -> BoxStream<'static, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    channel_stream(move |producer| async move {
        let mut input = input;
        let mut running: Option<BoxFuture<'static, R>> = None;
        let mut input_done = false;

        loop {
            if input_done && running.is_none() {
                return;
            }

            tokio::select! {
                biased;
                next = input.next(), if !input_done => match next {
                    Some(trigger) => {
                        let accept = match &mut admission {
                            Admission::Replace => true,
                            Admission::Throttle(window) => {
                                window.try_accept(Instant::now(), running.is_none())
                            }
                        };
                        if accept {
                            // Dropping the previous future cancels it.
                            running = Some(invoke(trigger));
                        }
                    }
                    None => input_done = true,
                },
                result = poll_running(&mut running) => {
                    running = None;
                    if !producer.send(result) {
                        return;
                    }
                }
            }
        }
    })
}

async fn poll_running<R>(running: &mut Option<BoxFuture<'static, R>>) -> R {
    match running {
        Some(invocation) => invocation.await,
        None => std::future::pending().await,
    }
}

/// Fixed, quantized throttle window.
///
/// The first accepted trigger opens a window of `length`. Later windows start
/// at whole multiples of `length` after it, so a burst never shifts the
/// schedule. At most one trigger is accepted per window, and only while the
/// handler is idle.
#[derive(Clone, Debug)]
pub struct ThrottleWindow {
    length: Duration,
    start: Option<Instant>,
    accepted: bool,
}

impl ThrottleWindow {
    pub fn new(length: Duration) -> Self {
        Self {
            length,
            start: None,
            accepted: false,
        }
    }

    /// Decide whether a trigger arriving at `now` runs. `idle` tells whether
    /// no accepted invocation is still running.
    pub fn try_accept(&mut self, now: Instant, idle: bool) -> bool {
        if let Some(start) = self.start {
            let elapsed = now.saturating_duration_since(start);
            if self.length.is_zero() || elapsed >= self.length {
                self.start = Some(self.window_start(start, elapsed));
                self.accepted = false;
            }
        }

        if self.accepted || !idle {
            return false;
        }
        if self.start.is_none() {
            self.start = Some(now);
        }
        self.accepted = true;
        true
    }

    fn window_start(&self, start: Instant, elapsed: Duration) -> Instant {
        if self.length.is_zero() {
            return start + elapsed;
        }
        let windows = elapsed.as_nanos() / self.length.as_nanos();
        let offset = self.length.as_nanos() * windows;
        start + Duration::from_nanos(u64::try_from(offset).unwrap_or(u64::MAX))
    }
}
