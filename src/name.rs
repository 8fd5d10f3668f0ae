//! `BZ` name tag.
//!
//! ```text
//! BZ:<rest>       default compression level
//! BZ<d>:<rest>    level d, 1..=9
//! ```
//!
//! The tag is matched case-insensitively.  Anything else is not tagged and
//! belongs to the next driver in the chain.

/// Tag written back by `IoName` reconstruction.
pub const TAG_PREFIX: &str = "BZ:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedName<'a> {
    /// Level digit from the tag, if present.
    pub level: Option<u32>,
    /// Remainder, resolved by the rest of the chain.
    pub rest:  &'a str,
}

pub fn parse(name: &str) -> Option<TaggedName<'_>> {
    let b = name.as_bytes();
    if b.len() < 3 || !b[0].eq_ignore_ascii_case(&b'B') || !b[1].eq_ignore_ascii_case(&b'Z') {
        return None;
    }
    match b[2] {
        b':' => Some(TaggedName { level: None, rest: &name[3..] }),
        d @ b'1'..=b'9' if b.get(3) == Some(&b':') => Some(TaggedName {
            level: Some(u32::from(d - b'0')),
            rest:  &name[4..],
        }),
        _ => None,
    }
}

/// `true` when `name` carries the tag.
pub fn is_tagged(name: &str) -> bool {
    parse(name).is_some()
}

/// Name with the tag removed; untagged names come back unchanged.
pub fn strip(name: &str) -> &str {
    parse(name).map_or(name, |t| t.rest)
}

/// Level selected by `name`'s tag, or `default` when it has none.
pub fn level_of(name: &str, default: u32) -> u32 {
    parse(name).and_then(|t| t.level).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_tag() {
        assert_eq!(parse("BZ:data.bin"), Some(TaggedName { level: None, rest: "data.bin" }));
        assert_eq!(parse("bz:x"), Some(TaggedName { level: None, rest: "x" }));
    }

    #[test]
    fn level_digit() {
        assert_eq!(parse("BZ3:a/b"), Some(TaggedName { level: Some(3), rest: "a/b" }));
        assert_eq!(level_of("Bz1:f", 9), 1);
        assert_eq!(level_of("BZ:f", 9), 9);
    }

    #[test]
    fn not_tagged() {
        for name in ["", "BZ", "BZ0:x", "BZ12:x", "BZx:x", "ZB:x", "data.bz2", "BZ9x"] {
            assert!(!is_tagged(name), "{name:?} should not be tagged");
            assert_eq!(strip(name), name);
        }
    }

    #[test]
    fn empty_rest_is_allowed() {
        assert_eq!(strip("BZ:"), "");
        assert_eq!(strip("BZ5:"), "");
    }
}
