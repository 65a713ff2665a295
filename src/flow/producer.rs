//! Task-backed streams.

use futures::stream::{BoxStream, Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Handle given to the body of a [`channel_stream`].
///
/// Values sent through it become items of the stream. Tasks started with
/// [`Producer::launch`] are children of the stream: dropping the stream
/// cancels them.
pub(crate) struct Producer<T> {
    tx: mpsc::UnboundedSender<T>,
    token: CancellationToken,
}

impl<T: Send + 'static> Producer<T> {
    /// Emit an item. Returns `false` once the stream has been dropped.
    pub(crate) fn send(&self, item: T) -> bool {
        self.tx.send(item).is_ok()
    }

    /// New token cancelled together with the stream.
    pub(crate) fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Run `work` until it finishes or `token` is cancelled.
    pub(crate) fn launch<F>(&self, token: CancellationToken, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = work => {}
            }
        });
    }
}

impl<T> Clone for Producer<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            token: self.token.clone(),
        }
    }
}

/// Stream fed by a spawned body.
///
/// The stream ends when the body and every task it launched have finished
/// (all producers dropped). Dropping the stream cancels all of them.
pub(crate) fn channel_stream<T, F, Fut>(body: F) -> BoxStream<'static, T>
where
    T: Send + 'static,
    F: FnOnce(Producer<T>) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let token = CancellationToken::new();
    let producer = Producer {
        tx,
        token: token.clone(),
    };

    let work = body(producer.clone());
    producer.launch(token.clone(), work);

    ProducerStream {
        rx,
        _guard: token.drop_guard(),
    }
    .boxed()
}

struct ProducerStream<T> {
    rx: mpsc::UnboundedReceiver<T>,
    _guard: DropGuard,
}

impl<T> Stream for ProducerStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn emits_from_body_and_children() {
        let stream = channel_stream(|producer: Producer<u32>| async move {
            producer.send(1);
            let child = producer.clone();
            producer.launch(producer.child_token(), async move {
                child.send(2);
            });
        });

        let mut items: Vec<u32> = stream.collect().await;
        items.sort_unstable();

        assert_eq!(items, vec![1, 2]);
    }

    #[tokio::test]
    async fn dropping_the_stream_cancels_children() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let mut stream = channel_stream(move |producer: Producer<u32>| async move {
            producer.send(0);
            tokio::time::sleep(Duration::from_millis(200)).await;
            flag.store(true, Ordering::SeqCst);
            producer.send(1);
        });

        assert_eq!(stream.next().await, Some(0));
        drop(stream);
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancelled_child_stops_early() {
        let stream = channel_stream(|producer: Producer<&'static str>| async move {
            let token = producer.child_token();
            let child = producer.clone();
            producer.launch(token.clone(), async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                child.send("late");
            });
            token.cancel();
            producer.send("done");
        });

        let items: Vec<_> = tokio::time::timeout(Duration::from_secs(1), stream.collect::<Vec<_>>())
            .await
            .expect("stream should end once the child is cancelled");

        assert_eq!(items, vec!["done"]);
    }
}
