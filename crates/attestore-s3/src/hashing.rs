//! Streaming md5 tee used to compute an S3-shaped ETag for request bodies
//! the handler must stream straight into the backend without buffering
//! (`PutObject`). `Artifact::digest` is sha256, computed by the backend;
//! `Artifact::md5` is the ETag field and must be the md5 of the bytes the
//! client actually sent, not of the sha256 digest string.
//!
//! Multipart parts and completed multipart objects are already fully
//! buffered by the handler before the backend write, so those hash
//! directly with `attestore_common::types::md5_hex` instead of this tee.

use md5::{Digest, Md5};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Shared handle to the running hash state, readable once the reader it
/// was created alongside has been fully consumed.
#[derive(Clone, Default)]
pub struct Md5Handle(Arc<Mutex<Md5>>);

impl Md5Handle {
    /// Hex digest of every byte read through the paired [`Md5TeeReader`]
    /// so far. Call only after the backend's copy has reached EOF.
    #[must_use]
    pub fn finalize_hex(&self) -> String {
        let hasher = self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone();
        hex::encode(hasher.finalize())
    }
}

/// Hashes bytes as they're read, passing them through unmodified.
pub struct Md5TeeReader<R> {
    inner: R,
    handle: Md5Handle,
}

impl<R> Md5TeeReader<R> {
    pub fn new(inner: R) -> (Self, Md5Handle) {
        let handle = Md5Handle::default();
        (Self { inner, handle: handle.clone() }, handle)
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for Md5TeeReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        let inner = Pin::new(&mut self.inner);
        let poll = inner.poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            self.handle
                .0
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .update(&buf.filled()[before..]);
        }
        poll
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn tee_reader_passes_bytes_through_and_hashes_them() {
        let (mut reader, handle) = Md5TeeReader::new(std::io::Cursor::new(b"hello".to_vec()));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello");
        assert_eq!(handle.finalize_hex(), "5d41402abc4b2a76b9719d911017c592");
    }
}
