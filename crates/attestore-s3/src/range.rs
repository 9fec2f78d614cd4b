//! `Range: bytes=start-end` parsing for `GetObject`. Only the single-range
//! `bytes=start-end` form is accepted; anything else is treated as no
//! range at all (the whole object is returned), matching the way most S3
//! clients degrade when a server doesn't support multi-range requests.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Parses a `Range` header against a known object `size`.
///
/// Returns `Ok(None)` when the header is absent or isn't the
/// single-range `bytes=` form (callers should serve the full object).
/// Returns `Err(())` when the header IS the `bytes=` form but the
/// resulting range violates `0 <= start <= end < size` — callers should
/// respond 416.
pub fn parse(header: Option<&str>, size: u64) -> Result<Option<ByteRange>, ()> {
    let Some(header) = header else { return Ok(None) };
    let header = header.trim();
    let Some(spec) = header.strip_prefix("bytes=") else {
        return Ok(None);
    };

    let (start_str, end_str) = spec.split_once('-').ok_or(())?;
    let start_str = start_str.trim();
    let end_str = end_str.trim();

    // A missing start (including the suffix form `bytes=-N`) is invalid;
    // only the explicit `start-end` and `start-` forms are accepted.
    if start_str.is_empty() {
        return Err(());
    }

    let start: u64 = start_str.parse().map_err(|_| ())?;

    if end_str.is_empty() {
        return validate(start, size.saturating_sub(1), size);
    }

    let end: u64 = end_str.parse().map_err(|_| ())?;
    validate(start, end, size)
}

fn validate(start: u64, end: u64, size: u64) -> Result<Option<ByteRange>, ()> {
    if size == 0 || start > end || end >= size {
        return Err(());
    }
    Ok(Some(ByteRange { start, end }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_header_means_whole_object() {
        assert_eq!(parse(None, 100).unwrap(), None);
    }

    #[test]
    fn explicit_start_and_end() {
        assert_eq!(parse(Some("bytes=0-99"), 1000).unwrap(), Some(ByteRange { start: 0, end: 99 }));
    }

    #[test]
    fn open_ended_runs_to_eof() {
        assert_eq!(
            parse(Some("bytes=100-"), 1000).unwrap(),
            Some(ByteRange { start: 100, end: 999 })
        );
    }

    #[test]
    fn suffix_range_is_unsatisfiable() {
        assert!(parse(Some("bytes=-10"), 100).is_err());
    }

    #[test]
    fn start_past_end_of_object_is_unsatisfiable() {
        assert!(parse(Some("bytes=1000-2000"), 100).is_err());
    }

    #[test]
    fn start_after_end_is_unsatisfiable() {
        assert!(parse(Some("bytes=50-10"), 100).is_err());
    }

    #[test]
    fn missing_start_and_end_is_unsatisfiable() {
        assert!(parse(Some("bytes=-"), 100).is_err());
    }

    #[test]
    fn non_bytes_unit_is_ignored() {
        assert_eq!(parse(Some("items=0-1"), 100).unwrap(), None);
    }
}
