use hyper::header::HeaderValue;

/// A concrete byte window over a resource of `total` bytes.
/// Invariant: `start <= end < total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ByteRange {
    /// Number of bytes in the window.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the Content-Range header, e.g. `bytes 100-199/2000`.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

/// Plans a byte window from a Range header against a known resource size.
///
/// Handles single byte ranges like bytes=0-499, bytes=500-, bytes=-500.
/// Returns None when no partial range applies: missing header, non-bytes
/// unit, malformed or unsatisfiable spec. A bad header never blocks
/// whole-resource delivery; the caller just serves the full body with 200.
/// Of a multi-range header only the first satisfiable range is honored.
pub fn plan(range_header: Option<&HeaderValue>, total_size: u64) -> Option<ByteRange> {
    let header_str = range_header.and_then(|h| h.to_str().ok())?;

    let spec_list = header_str.strip_prefix("bytes=")?;

    spec_list
        .split(',')
        .find_map(|spec| plan_single(spec.trim(), total_size))
}

fn plan_single(spec: &str, total_size: u64) -> Option<ByteRange> {
    if total_size == 0 {
        return None;
    }

    let (start_str, end_str) = spec.split_once('-')?;
    let start_str = start_str.trim();
    let end_str = end_str.trim();

    let (start, end) = match (start_str.is_empty(), end_str.is_empty()) {
        // bytes=-500 (last 500 bytes)
        (true, false) => {
            let suffix_len = end_str.parse::<u64>().ok()?;
            if suffix_len == 0 {
                return None;
            }
            (total_size.saturating_sub(suffix_len), total_size - 1)
        }
        // bytes=500- (from byte 500 to end)
        (false, true) => {
            let start_pos = start_str.parse::<u64>().ok()?;
            if start_pos >= total_size {
                return None;
            }
            (start_pos, total_size - 1)
        }
        // bytes=0-499 (specific range, end clamped to the last byte)
        (false, false) => {
            let start_pos = start_str.parse::<u64>().ok()?;
            let end_pos = end_str.parse::<u64>().ok()?;
            if start_pos > end_pos || start_pos >= total_size {
                return None;
            }
            (start_pos, end_pos.min(total_size - 1))
        }
        // bytes=-
        (true, true) => return None,
    };

    Some(ByteRange {
        start,
        end,
        total: total_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(value: &str) -> HeaderValue {
        HeaderValue::from_str(value).unwrap()
    }

    #[test]
    fn no_header_means_full_resource() {
        assert_eq!(plan(None, 100), None);
    }

    #[test]
    fn specific_range() {
        let range = plan(Some(&header("bytes=100-199")), 2000).unwrap();
        assert_eq!((range.start, range.end, range.total), (100, 199, 2000));
        assert_eq!(range.len(), 100);
        assert_eq!(range.content_range(), "bytes 100-199/2000");
    }

    #[test]
    fn open_ended_range_runs_to_last_byte() {
        let range = plan(Some(&header("bytes=450-")), 500).unwrap();
        assert_eq!((range.start, range.end), (450, 499));
    }

    #[test]
    fn suffix_range_counts_from_the_end() {
        let range = plan(Some(&header("bytes=-100")), 1024).unwrap();
        assert_eq!((range.start, range.end), (924, 1023));
        // Suffix longer than the resource clamps to the whole resource.
        let range = plan(Some(&header("bytes=-4096")), 10).unwrap();
        assert_eq!((range.start, range.end), (0, 9));
    }

    #[test]
    fn end_is_clamped_to_resource_size() {
        let range = plan(Some(&header("bytes=5-5000")), 10).unwrap();
        assert_eq!((range.start, range.end), (5, 9));
    }

    #[test]
    fn unsatisfiable_and_malformed_fall_back_to_none() {
        assert_eq!(plan(Some(&header("bytes=10-5")), 100), None);
        assert_eq!(plan(Some(&header("bytes=100-")), 100), None);
        assert_eq!(plan(Some(&header("bytes=-0")), 100), None);
        assert_eq!(plan(Some(&header("bytes=-")), 100), None);
        assert_eq!(plan(Some(&header("bytes=a-b")), 100), None);
        assert_eq!(plan(Some(&header("bits=0-10")), 100), None);
        assert_eq!(plan(Some(&header("bytes=0-10")), 0), None);
    }

    #[test]
    fn multi_range_honors_first_satisfiable() {
        let range = plan(Some(&header("bytes=0-4, 10-14")), 100).unwrap();
        assert_eq!((range.start, range.end), (0, 4));
        // First spec unsatisfiable, second honored.
        let range = plan(Some(&header("bytes=500-, 10-14")), 100).unwrap();
        assert_eq!((range.start, range.end), (10, 14));
    }
}
