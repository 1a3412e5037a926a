//! Picking one source out of a snapshot.
//!
//! Matching rules:
//!
//! - **Name**: the wanted name must be a case-sensitive substring of the
//!   source's full name, so `"cam"` finds `"STUDIO (cam-1)"`.
//! - **Address** (optional): a trailing `:NNNN` port is stripped from the
//!   source's address, then compared exactly. ANDed with the name rule.
//!
//! The first match in registry order wins. That order comes from the
//! native layer and is unspecified, so with duplicate names the pick is
//! effectively arbitrary.

use crate::native::Source;

/// Find the first source matching `name` (and `address`, if given).
///
/// An empty or non-matching input yields `None`; a missing source is a
/// normal state, not an error.
pub fn resolve<'a>(
    sources: impl IntoIterator<Item = Source<'a>>,
    name: &str,
    address: Option<&str>,
) -> Option<Source<'a>> {
    sources
        .into_iter()
        .find(|source| matches(source, name, address))
}

/// Whether a single source satisfies the matching rules.
pub fn matches(source: &Source<'_>, name: &str, address: Option<&str>) -> bool {
    if !source.name.contains(name) {
        return false;
    }
    match address {
        Some(wanted) => strip_port(source.url_address) == wanted,
        None => true,
    }
}

/// Drop a trailing `:` plus exactly four ASCII digits, if present.
///
/// `"10.0.0.5:5960"` becomes `"10.0.0.5"`; `"10.0.0.5:59"` is unchanged.
pub fn strip_port(url: &str) -> &str {
    let bytes = url.as_bytes();
    if bytes.len() < 5 {
        return url;
    }
    let split = bytes.len() - 5;
    // The colon is ASCII, so `split` is a char boundary when it matches.
    if bytes[split] == b':' && bytes[split + 1..].iter().all(u8::is_ascii_digit) {
        &url[..split]
    } else {
        url
    }
}

// ── Tests ────────────────────────────────────────────────────────
