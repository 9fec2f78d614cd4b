//! Streaming sha256 wrappers shared by every backend driver.
//!
//! Both readers are `Unpin` by construction (every field is `Unpin`), so
//! their `AsyncRead` impls can project through `Pin::get_mut` without
//! needing a pin-projection macro.

use sha2::{Digest, Sha256};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Hashes bytes as they're read, without altering the stream. Used on the
/// write path (the handler's TeeReader-equivalent): the backend reads
/// through this wrapper while copying to the destination, then reads
/// `finalize()` once the copy is done.
pub struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
}

impl<R> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// Consume the wrapper and return the sha256 hex digest of everything
    /// read so far. Call only after the underlying copy has reached EOF.
    #[must_use]
    pub fn finalize_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for HashingReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let inner = Pin::new(&mut self.inner);
        let poll = inner.poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            self.hasher.update(&buf.filled()[before..]);
        }
        poll
    }
}

/// Verifies a stream against a known sha256 digest as it's read, failing
/// the final `poll_read` (the one that observes EOF) with
/// `io::ErrorKind::InvalidData` on mismatch. Per the backend contract this
/// wrapper is only used for whole-object reads, never range reads.
pub struct ChecksumVerifyingReader<R> {
    inner: R,
    hasher: Sha256,
    expected_hex: String,
    finished: bool,
}

/// Error kind stashed in the `io::Error` raised on mismatch, so callers can
/// distinguish it from a plain I/O failure and map it to
/// `ErrorCode::ChecksumMismatch` instead of `ErrorCode::ReadError`.
pub const CHECKSUM_MISMATCH_MARKER: &str = "CHECKSUM_MISMATCH";

impl<R> ChecksumVerifyingReader<R> {
    pub fn new(inner: R, expected_hex: impl Into<String>) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            expected_hex: expected_hex.into(),
            finished: false,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ChecksumVerifyingReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.finished {
            return Poll::Ready(Ok(()));
        }
        let before = buf.filled().len();
        let inner = Pin::new(&mut self.inner);
        match inner.poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let chunk = &buf.filled()[before..];
                if chunk.is_empty() {
                    self.finished = true;
                    let actual_hex = hex::encode(self.hasher.clone().finalize());
                    if actual_hex != self.expected_hex {
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!(
                                "{CHECKSUM_MISMATCH_MARKER}: expected {}, got {actual_hex}",
                                self.expected_hex
                            ),
                        )));
                    }
                } else {
                    self.hasher.update(chunk);
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

/// Whether an I/O error produced by [`ChecksumVerifyingReader`] represents a
/// checksum mismatch rather than a transport-level failure.
#[must_use]
pub fn is_checksum_mismatch(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::InvalidData
        && err
            .get_ref()
            .is_some_and(|e| e.to_string().starts_with(CHECKSUM_MISMATCH_MARKER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn hashing_reader_matches_direct_digest() {
        let data = b"the quick brown fox".to_vec();
        let mut reader = HashingReader::new(std::io::Cursor::new(data.clone()));
        let mut out = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut out)
            .await
            .unwrap();
        assert_eq!(out, data);
        assert_eq!(reader.finalize_hex(), attestore_common::types::sha256_hex(&data));
    }

    #[tokio::test]
    async fn checksum_verifying_reader_passes_on_match() {
        let data = b"payload".to_vec();
        let digest = attestore_common::types::sha256_hex(&data);
        let mut reader = ChecksumVerifyingReader::new(std::io::Cursor::new(data.clone()), digest);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn checksum_verifying_reader_fails_on_mismatch() {
        let data = b"payload".to_vec();
        let mut reader =
            ChecksumVerifyingReader::new(std::io::Cursor::new(data), "deadbeef".to_string());
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).await.unwrap_err();
        assert!(is_checksum_mismatch(&err));
    }
}
