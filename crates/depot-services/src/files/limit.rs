use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Reader that fails once `max_bytes` or more have passed through it.
///
/// The backend only sees an I/O error, so the shared [`LimitFlag`] lets the
/// caller tell a size violation apart from a real read failure. A limit of 0
/// disables the check.
pub struct SizeLimitedReader<R> {
    inner: R,
    max_bytes: u64,
    consumed: u64,
    exceeded: LimitFlag,
}

/// Set when a [`SizeLimitedReader`] tripped its limit.
#[derive(Clone, Default)]
pub struct LimitFlag(Arc<AtomicBool>);

impl LimitFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl<R> SizeLimitedReader<R> {
    pub fn new(inner: R, max_bytes: u64) -> (Self, LimitFlag) {
        let flag = LimitFlag::default();
        let reader = Self {
            inner,
            max_bytes,
            consumed: 0,
            exceeded: flag.clone(),
        };
        (reader, flag)
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for SizeLimitedReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        ready!(Pin::new(&mut self.inner).poll_read(cx, buf))?;
        self.consumed += (buf.filled().len() - before) as u64;

        if self.max_bytes > 0 && self.consumed >= self.max_bytes {
            self.exceeded.set();
            return Poll::Ready(Err(io::Error::other(format!(
                "content reached the {} byte limit",
                self.max_bytes
            ))));
        }

        Poll::Ready(Ok(()))
    }
}
