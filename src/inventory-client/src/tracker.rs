use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::Weak;
use std::task::Context;
use std::task::Poll;

use futures_util::task::AtomicWaker;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::io::ReadBuf;
use tracing::debug;
use tracing::trace;

/// Connections dialed for one session.
///
/// `close_all` aborts every live connection. A dial that began before a
/// `close_all` is aborted as soon as it is tracked.
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    state: Mutex<TrackerState>,
}

#[derive(Debug, Default)]
struct TrackerState {
    next_id: u64,
    generation: u64,
    conns: HashMap<u64, Arc<ConnHandle>>,
}

#[derive(Debug, Default)]
struct ConnHandle {
    closed: AtomicBool,
    waker: AtomicWaker,
}

impl ConnHandle {
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.waker.wake();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// taken before dialing, handed back to [`ConnectionTracker::track`]
#[derive(Debug, Clone, Copy)]
pub struct DialTicket {
    generation: u64,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn begin_dial(&self) -> DialTicket {
        DialTicket {
            generation: self.lock().generation,
        }
    }

    /// Register a freshly dialed stream.
    pub fn track<S>(self: &Arc<Self>, ticket: DialTicket, stream: S) -> TrackedStream<S> {
        let handle = Arc::new(ConnHandle::default());
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;

        if ticket.generation != state.generation {
            debug!(id, "connection dialed across close_all, closing");
            handle.close();
        } else {
            state.conns.insert(id, handle.clone());
            trace!(id, live = state.conns.len(), "tracking connection");
        }

        TrackedStream {
            inner: stream,
            id,
            handle,
            tracker: Arc::downgrade(self),
        }
    }

    /// Abort every tracked connection; returns how many were closed.
    pub fn close_all(&self) -> usize {
        let conns = {
            let mut state = self.lock();
            state.generation += 1;
            std::mem::take(&mut state.conns)
        };
        for handle in conns.values() {
            handle.close();
        }
        debug!(closed = conns.len(), "closed tracked connections");
        conns.len()
    }

    /// number of live tracked connections
    pub fn len(&self) -> usize {
        self.lock().conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// number of `close_all` calls so far
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    fn untrack(&self, id: u64) {
        if self.lock().conns.remove(&id).is_some() {
            trace!(id, "untracked connection");
        }
    }
}

/// Stream that fails with `ConnectionAborted` once its tracker closes it.
#[derive(Debug)]
pub struct TrackedStream<S> {
    inner: S,
    id: u64,
    handle: Arc<ConnHandle>,
    tracker: Weak<ConnectionTracker>,
}

impl<S> TrackedStream<S> {
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    fn check(&self, cx: &mut Context<'_>) -> io::Result<()> {
        self.handle.waker.register(cx.waker());
        if self.handle.is_closed() {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "connection closed after credential rotation",
            ));
        }
        Ok(())
    }
}

impl<S> Drop for TrackedStream<S> {
    fn drop(&mut self) {
        if let Some(tracker) = self.tracker.upgrade() {
            tracker.untrack(self.id);
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for TrackedStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if let Err(err) = self.check(cx) {
            return Poll::Ready(Err(err));
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for TrackedStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if let Err(err) = self.check(cx) {
            return Poll::Ready(Err(err));
        }
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if let Err(err) = self.check(cx) {
            return Poll::Ready(Err(err));
        }
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod test {

    use std::sync::Arc;

    use tokio::io::duplex;
    use tokio::io::AsyncReadExt;
    use tokio::io::AsyncWriteExt;

    use super::ConnectionTracker;

    #[tokio::test]
    async fn test_close_all_aborts_streams() {
        let tracker = Arc::new(ConnectionTracker::new());
        let (client, mut server) = duplex(64);

        let mut stream = tracker.track(tracker.begin_dial(), client);
        assert_eq!(tracker.len(), 1);

        server.write_all(b"ping").await.expect("write");
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).await.expect("read");
        assert_eq!(&buf, b"ping");

        assert_eq!(tracker.close_all(), 1);
        assert!(tracker.is_empty());
        let err = stream.read(&mut buf).await.expect_err("aborted");
        assert_eq!(err.kind(), std::io::ErrorKind::ConnectionAborted);
        assert!(stream.write_all(b"x").await.is_err());
    }

    #[tokio::test]
    async fn test_close_wakes_pending_read() {
        let tracker = Arc::new(ConnectionTracker::new());
        let (client, _server) = duplex(64);
        let mut stream = tracker.track(tracker.begin_dial(), client);

        let reader = tokio::spawn(async move {
            let mut buf = [0u8; 1];
            stream.read(&mut buf).await
        });
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        tracker.close_all();
        let result = reader.await.expect("join");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_dial_racing_close_all() {
        let tracker = Arc::new(ConnectionTracker::new());

        let before = tracker.begin_dial();
        tracker.close_all();
        let after = tracker.begin_dial();

        let (raced, _a) = duplex(8);
        let (fresh, _b) = duplex(8);
        let raced = tracker.track(before, raced);
        let fresh = tracker.track(after, fresh);

        assert!(raced.is_closed());
        assert!(!fresh.is_closed());
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.generation(), 1);
    }

    #[test]
    fn test_drop_untracks() {
        let tracker = Arc::new(ConnectionTracker::new());
        let (client, _server) = duplex(8);
        let stream = tracker.track(tracker.begin_dial(), client);
        assert_eq!(tracker.len(), 1);
        drop(stream);
        assert!(tracker.is_empty());
    }
}
