use std::str;

pub const MAX_INPUT_SIZE: usize = 256 * 1024;

/// UTF-8 view of `data` truncated to `MAX_INPUT_SIZE`.
///
/// Trims up to 3 bytes when the cap splits a multibyte codepoint; any other
/// invalid UTF-8 yields `None`.
#[inline]
pub fn truncate_utf8(data: &[u8]) -> Option<&str> {
    let cap = data.len().min(MAX_INPUT_SIZE);
    for trim in 0..=3 {
        if cap < trim {
            break;
        }
        if let Ok(text) = str::from_utf8(&data[..cap - trim]) {
            return Some(text);
        }
    }
    None
}
