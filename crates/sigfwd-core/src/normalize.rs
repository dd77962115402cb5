//! Channel/user reference normalization.
//!
//! Operators paste references in whatever form they have at hand: invite URLs,
//! `t.me/` paths, `@handles`, bare handles or numeric ids. Everything is
//! reduced to a canonical handle before it reaches the transport.

const SCHEMES: [&str; 2] = ["https://", "http://"];
const HOSTS: [&str; 4] = ["www.t.me/", "t.me/", "www.telegram.me/", "telegram.me/"];

/// Reduce a reference to its canonical handle: no scheme, no host prefix, no
/// query string or fragment, no trailing slash, no leading `@`.
///
/// Never fails (empty in, empty out) and is idempotent: stripping repeats
/// until nothing changes, so `@t.me/foo` and `t.me/t.me/foo` both end at `foo`.
pub fn canonical_handle(reference: &str) -> String {
    let mut s = reference;
    loop {
        let next = strip_once(s);
        if next == s {
            return next.to_string();
        }
        s = next;
    }
}

/// One pass of prefix/suffix stripping. Always returns a substring of `s`.
fn strip_once(s: &str) -> &str {
    let mut s = s.trim();

    for scheme in SCHEMES {
        if let Some(rest) = strip_prefix_ignore_case(s, scheme) {
            s = rest;
            break;
        }
    }
    for host in HOSTS {
        if let Some(rest) = strip_prefix_ignore_case(s, host) {
            s = rest;
            break;
        }
    }

    let s = s.trim_start_matches('@');
    let s = s.split(['?', '#']).next().unwrap_or_default();
    s.trim_end_matches('/').trim()
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// What the transport is asked to look up.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LookupKey {
    Username(String),
    Id(i64),
}

impl LookupKey {
    /// Normalize a raw reference and decide whether it names a numeric id.
    pub fn from_reference(reference: &str) -> Option<Self> {
        let handle = canonical_handle(reference);
        if handle.is_empty() {
            return None;
        }
        Some(match handle.parse::<i64>() {
            Ok(id) => LookupKey::Id(id),
            Err(_) => LookupKey::Username(handle),
        })
    }
}

impl std::fmt::Display for LookupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupKey::Username(u) => write!(f, "@{u}"),
            LookupKey::Id(id) => write!(f, "{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equivalent_references_share_a_handle() {
        for raw in [
            "https://t.me/iosassembly",
            "http://t.me/iosassembly/",
            "HTTPS://T.ME/iosassembly?start=1",
            "t.me/iosassembly",
            "@iosassembly",
            "iosassembly",
            "  https://telegram.me/iosassembly#top  ",
        ] {
            assert_eq!(canonical_handle(raw), "iosassembly", "input: {raw}");
        }
    }

    #[test]
    fn canonical_handle_is_idempotent() {
        for raw in [
            "https://t.me/joinchat/ABC123",
            "@signals",
            "t.me/foo/?x=1",
            "-1001234567890",
            "",
            "@t.me/foo",
            "t.me/t.me/foo",
            "foo/ /",
            "@https://t.me/@foo/",
        ] {
            let once = canonical_handle(raw);
            assert_eq!(canonical_handle(&once), once, "input: {raw}");
        }
    }

    #[test]
    fn nested_prefixes_are_fully_stripped() {
        assert_eq!(canonical_handle("@t.me/foo"), "foo");
        assert_eq!(canonical_handle("t.me/t.me/foo"), "foo");
        assert_eq!(canonical_handle("foo/ /"), "foo");
    }

    #[test]
    fn invite_paths_keep_their_inner_segment() {
        assert_eq!(
            canonical_handle("https://t.me/joinchat/ABC123"),
            "joinchat/ABC123"
        );
    }

    #[test]
    fn empty_input_yields_empty_handle() {
        assert_eq!(canonical_handle(""), "");
        assert_eq!(canonical_handle("https://t.me/"), "");
        assert_eq!(LookupKey::from_reference("  "), None);
    }

    #[test]
    fn numeric_references_become_id_keys() {
        assert_eq!(
            LookupKey::from_reference("-1001234567890"),
            Some(LookupKey::Id(-1001234567890))
        );
        assert_eq!(
            LookupKey::from_reference("https://t.me/trader"),
            Some(LookupKey::Username("trader".to_string()))
        );
    }
}
