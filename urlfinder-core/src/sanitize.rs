use serde::Serialize;

/// A generated query and its URL-safe form. Built once, never mutated.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub raw: String,
    pub sanitized: String,
    pub source_index: usize,
}

impl Query {
    pub fn new(raw: &str, source_index: usize) -> Self {
        let raw = raw.trim().to_string();
        let sanitized = encode_query_component(&raw);
        Self { raw, sanitized, source_index }
    }
}

/// Form-style encoding for a query parameter value: unreserved ASCII
/// (`A-Za-z0-9-_.~`) kept, space to `+`, everything else `%XX`.
pub fn encode_query_component(s: &str) -> String {
    // `+` is already `%2B` here, so the replace only touches spaces.
    urlencoding::encode(s).replace("%20", "+")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_unreserved(b: u8) -> bool {
        b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~')
    }

    #[test]
    fn spaces_become_plus_and_reserved_are_escaped() {
        assert_eq!(encode_query_component("diebold g2 reviews"), "diebold+g2+reviews");
        assert_eq!(encode_query_component("a+b&c=d/e?f#g"), "a%2Bb%26c%3Dd%2Fe%3Ff%23g");
        assert_eq!(encode_query_component("AT&T \"reviews\""), "AT%26T+%22reviews%22");
    }

    #[test]
    fn unreserved_characters_pass_through() {
        let s = "Az09-_.~";
        assert_eq!(encode_query_component(s), s);
    }

    #[test]
    fn output_has_only_unreserved_plus_or_escapes() {
        let inputs = ["Nestlé S.A. reviews", "東京 レビュー", "100% \t real\n", "a%20b"];
        for input in inputs {
            let enc = encode_query_component(input);
            let bytes = enc.as_bytes();
            let mut i = 0;
            while i < bytes.len() {
                let b = bytes[i];
                if b == b'%' {
                    assert!(bytes[i + 1].is_ascii_hexdigit() && bytes[i + 2].is_ascii_hexdigit(), "{enc}");
                    i += 3;
                } else {
                    assert!(is_unreserved(b) || b == b'+', "{input} -> {enc}");
                    i += 1;
                }
            }
        }
    }

    #[test]
    fn single_pass_encodes_existing_escapes_again() {
        assert_eq!(encode_query_component("a%20b"), "a%2520b");
    }

    #[test]
    fn query_trims_before_encoding() {
        let q = Query::new("  paccar g2 reviews\n", 3);
        assert_eq!(q.raw, "paccar g2 reviews");
        assert_eq!(q.sanitized, "paccar+g2+reviews");
        assert_eq!(q.source_index, 3);
    }
}
