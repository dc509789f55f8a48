// ── Directory and state-cache subscriptions ──
//
// What a UI holds to redraw the fan list or the controls: every store
// mutation publishes a whole new ordered snapshot.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// An ordered, immutable view of one collection.
pub type Snapshot<T> = Arc<Vec<Arc<T>>>;

/// Subscription to the fan directory or the state cache, vended by
/// [`FanHub::devices_stream`](crate::FanHub::devices_stream) and
/// [`FanHub::states_stream`](crate::FanHub::states_stream).
///
/// Snapshots are in backend order. Intermediate snapshots may be skipped
/// when several mutations land between two reads; the latest one always
/// arrives.
pub struct EntityStream<T: Clone + Send + Sync + 'static> {
    seen: Snapshot<T>,
    receiver: watch::Receiver<Snapshot<T>>,
}

impl<T: Clone + Send + Sync + 'static> EntityStream<T> {
    pub(crate) fn new(receiver: watch::Receiver<Snapshot<T>>) -> Self {
        let seen = Arc::clone(&*receiver.borrow());
        Self { seen, receiver }
    }

    /// Snapshot as of subscription, or as of the last `changed()`.
    pub fn current(&self) -> &Snapshot<T> {
        &self.seen
    }

    /// What the store holds right now.
    pub fn latest(&self) -> Snapshot<T> {
        Arc::clone(&*self.receiver.borrow())
    }

    /// Wait until the store changes. `None` once the hub is gone.
    pub async fn changed(&mut self) -> Option<Snapshot<T>> {
        self.receiver.changed().await.ok()?;
        self.seen = Arc::clone(&*self.receiver.borrow_and_update());
        Some(Arc::clone(&self.seen))
    }

    /// Turn into a `Stream` that yields what the store holds now, then the
    /// newest snapshot after each change, and ends when the hub is dropped.
    pub fn into_stream(self) -> EntityWatchStream<T> {
        EntityWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` form of an [`EntityStream`].
pub struct EntityWatchStream<T: Clone + Send + Sync + 'static> {
    inner: WatchStream<Snapshot<T>>,
}

impl<T: Clone + Send + Sync + 'static> Stream for EntityWatchStream<T> {
    type Item = Snapshot<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
