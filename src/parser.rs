//! Filter content summary

/// Count the usable rules in raw filter content
///
/// Lines are split on `\n` and trimmed of ASCII whitespace; a line counts
/// unless it is then empty or starts with `#` or `!`. Content need not be
/// valid UTF-8.
pub fn summarize(body: &[u8]) -> u64 {
    body.split(|&b| b == b'\n')
        .map(<[u8]>::trim_ascii)
        .filter(|line| !matches!(line.first(), None | Some(b'#') | Some(b'!')))
        .count() as u64
}
