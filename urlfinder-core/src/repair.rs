//! Strict-then-lenient JSON parsing for model output.
//!
//! `repair_json` makes one forward pass per candidate payload start, rewriting the
//! usual LLM mistakes (code fences, prose around the payload, single quotes,
//! bare keys, Python literals, comments, trailing or missing commas, raw
//! newlines in strings, truncated output) into something `serde_json` accepts.
//! It never fails; whether the result parses is decided afterwards.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Strict(Value),
    Repaired { value: Value, repaired: String },
}

impl Parsed {
    pub fn value(&self) -> &Value {
        match self {
            Parsed::Strict(v) => v,
            Parsed::Repaired { value, .. } => value,
        }
    }
    pub fn into_value(self) -> Value {
        match self {
            Parsed::Strict(v) => v,
            Parsed::Repaired { value, .. } => value,
        }
    }
    pub fn was_repaired(&self) -> bool {
        matches!(self, Parsed::Repaired { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("failed to parse or repair JSON: {reason}")]
pub struct ParseFailure {
    pub reason: String,
    pub repaired: String,
}

/// Strict parse first; on failure one repair pass and a second parse.
pub fn parse_lenient(raw: &str) -> Result<Parsed, ParseFailure> {
    let trimmed = raw.trim();
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return Ok(Parsed::Strict(v));
    }
    let repaired = repair_json(trimmed);
    debug!(%repaired, "strict parse failed, trying repaired text");
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => Ok(Parsed::Repaired { value, repaired }),
        Err(e) => Err(ParseFailure { reason: e.to_string(), repaired }),
    }
}

fn strip_code_fences(raw: &str) -> &str {
    let t = raw.trim();
    let Some(open) = t.find("```") else { return t };
    let after = &t[open + 3..];
    // skip the language tag line
    let body = match after.find('\n') {
        Some(nl) => &after[nl + 1..],
        None => after,
    };
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ObjState {
    ExpectKey,
    AfterKey,
    ExpectValue,
    AfterValue,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Frame {
    Object(ObjState),
    Array,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Role {
    Key,
    Value,
}

struct Repairer {
    chars: Vec<char>,
    pos: usize,
    out: String,
    stack: Vec<Frame>,
}

fn is_value_end(c: char) -> bool {
    c == '"' || c == '}' || c == ']' || c.is_alphanumeric() || c == '.'
}

fn is_number(tok: &str) -> bool {
    let t = tok.strip_prefix('-').unwrap_or(tok);
    if t.is_empty() || !t.starts_with(|c: char| c.is_ascii_digit()) {
        return false;
    }
    serde_json::from_str::<serde_json::Number>(tok).is_ok()
}

/// JSON spelling of a bare literal or number, including Python/JS forms.
fn json_literal(tok: &str) -> Option<&str> {
    match tok {
        "true" | "True" => Some("true"),
        "false" | "False" => Some("false"),
        "null" | "None" | "NaN" | "undefined" => Some("null"),
        t if is_number(t) => Some(t),
        _ => None,
    }
}

impl Repairer {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            out: String::with_capacity(text.len() + 16),
            stack: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn next_significant_from(&self, mut i: usize) -> Option<char> {
        while let Some(&c) = self.chars.get(i) {
            if !c.is_whitespace() {
                return Some(c);
            }
            i += 1;
        }
        None
    }

    fn last_significant(&self) -> Option<char> {
        self.out.chars().rev().find(|c| !c.is_whitespace())
    }

    fn trim_trailing_comma(&mut self) {
        let kept = self.out.trim_end().len();
        self.out.truncate(kept);
        if self.out.ends_with(',') {
            self.out.pop();
        }
    }

    /// Decides whether the token about to start is a key or a value and
    /// emits any separator the model left out.
    fn begin_token(&mut self) -> Role {
        match self.stack.last_mut() {
            None => Role::Value,
            Some(Frame::Array) => {
                if self.out.trim_end().chars().last().is_some_and(is_value_end) {
                    self.out.push(',');
                }
                Role::Value
            }
            Some(Frame::Object(state)) => match *state {
                ObjState::ExpectKey => Role::Key,
                ObjState::AfterKey => {
                    *state = ObjState::ExpectValue;
                    self.out.push(':');
                    Role::Value
                }
                ObjState::ExpectValue => Role::Value,
                ObjState::AfterValue => {
                    *state = ObjState::ExpectKey;
                    self.out.push(',');
                    Role::Key
                }
            },
        }
    }

    fn end_token(&mut self, role: Role) {
        if let Some(Frame::Object(state)) = self.stack.last_mut() {
            *state = match role {
                Role::Key => ObjState::AfterKey,
                Role::Value => ObjState::AfterValue,
            };
        }
    }

    fn push_escaped(&mut self, c: char) {
        match c {
            '"' => self.out.push_str("\\\""),
            '\\' => self.out.push_str("\\\\"),
            '\n' => self.out.push_str("\\n"),
            '\r' => self.out.push_str("\\r"),
            '\t' => self.out.push_str("\\t"),
            c if (c as u32) < 0x20 => self.out.push_str(&format!("\\u{:04x}", c as u32)),
            c => self.out.push(c),
        }
    }

    fn closes_string(&self, quote_at: usize, role: Role) -> bool {
        match self.next_significant_from(quote_at + 1) {
            None => true,
            Some(n) => match role {
                Role::Key => matches!(n, ':' | ',' | '}' | ']' | '"' | '\'' | '/'),
                Role::Value => matches!(n, ',' | '}' | ']' | '"' | '\'' | ':' | '/'),
            },
        }
    }

    fn read_string(&mut self, quote: char, role: Role) {
        self.pos += 1;
        self.out.push('"');
        while let Some(c) = self.peek() {
            if c == '\\' {
                match self.chars.get(self.pos + 1).copied() {
                    Some('\'') => self.out.push('\''),
                    Some(e @ ('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u')) => {
                        self.out.push('\\');
                        self.out.push(e);
                    }
                    Some(other) => self.push_escaped(other),
                    None => {}
                }
                self.pos += 2;
                continue;
            }
            if c == quote && (self.stack.is_empty() || self.closes_string(self.pos, role)) {
                self.pos += 1;
                self.out.push('"');
                self.end_token(role);
                return;
            }
            self.push_escaped(c);
            self.pos += 1;
        }
        // unterminated
        self.out.push('"');
        self.end_token(role);
    }

    /// A leading literal or number ends at the first separator so a missing
    /// comma after it is still seen. In an object the literal must not run
    /// into another bare word (`true story` stays one string).
    fn read_literal(&mut self) -> bool {
        let start = self.pos;
        let mut end = start;
        while let Some(&c) = self.chars.get(end) {
            if c.is_whitespace() || matches!(c, ',' | ':' | '}' | ']' | '{' | '[' | '"' | '\'' | '/') {
                break;
            }
            end += 1;
        }
        let word: String = self.chars[start..end].iter().collect();
        let Some(lit) = json_literal(&word) else { return false };
        let in_object = matches!(self.stack.last(), Some(Frame::Object(_)));
        if in_object && self.next_significant_from(end).is_some_and(|n| n.is_alphabetic()) {
            return false;
        }
        self.out.push_str(lit);
        self.pos = end;
        self.end_token(Role::Value);
        true
    }

    fn read_bare(&mut self, role: Role) {
        if role == Role::Value && self.read_literal() {
            return;
        }
        let start = self.pos;
        while let Some(c) = self.peek() {
            let stop = match role {
                Role::Key => matches!(c, ':' | ',' | '}' | ']' | '\n'),
                Role::Value => matches!(c, ',' | '}' | ']' | '\n'),
            };
            if stop {
                break;
            }
            self.pos += 1;
        }
        let tok: String = self.chars[start..self.pos].iter().collect();
        let tok = tok.trim();
        match json_literal(tok) {
            Some(lit) if role == Role::Value => self.out.push_str(lit),
            _ => {
                self.out.push('"');
                for c in tok.chars() {
                    self.push_escaped(c);
                }
                self.out.push('"');
            }
        }
        self.end_token(role);
    }

    fn skip_comment(&mut self) -> bool {
        match self.chars.get(self.pos + 1).copied() {
            Some('/') => {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.pos += 1;
                }
                true
            }
            Some('*') => {
                self.pos += 2;
                while self.pos < self.chars.len() {
                    if self.chars[self.pos] == '*' && self.chars.get(self.pos + 1) == Some(&'/') {
                        self.pos += 2;
                        return true;
                    }
                    self.pos += 1;
                }
                true
            }
            _ => false,
        }
    }

    fn close(&mut self, closer: char) {
        let want = if closer == '}' { Frame::Object(ObjState::ExpectKey) } else { Frame::Array };
        let depth = self.stack.iter().rposition(|f| {
            matches!((f, want), (Frame::Object(_), Frame::Object(_)) | (Frame::Array, Frame::Array))
        });
        // stray closer
        let Some(depth) = depth else { return };
        while self.stack.len() > depth {
            self.close_top();
        }
    }

    fn close_top(&mut self) {
        let Some(frame) = self.stack.last().copied() else { return };
        self.trim_trailing_comma();
        match frame {
            Frame::Object(ObjState::AfterKey) => self.out.push_str(":null}"),
            Frame::Object(ObjState::ExpectValue) => {
                if self.out.ends_with(':') {
                    self.out.push_str("null");
                }
                self.out.push('}');
            }
            Frame::Object(_) => self.out.push('}'),
            Frame::Array => self.out.push(']'),
        }
        self.stack.pop();
        self.end_token(Role::Value);
    }

    /// Repaired text plus the number of input bytes it covers.
    fn run(mut self) -> (String, usize) {
        while let Some(c) = self.peek() {
            if self.stack.is_empty() && !self.out.is_empty() {
                // payload complete, ignore trailing prose
                break;
            }
            match c {
                '{' | '[' => {
                    self.begin_token();
                    self.out.push(c);
                    self.stack.push(if c == '{' { Frame::Object(ObjState::ExpectKey) } else { Frame::Array });
                    self.pos += 1;
                }
                '}' | ']' => {
                    self.close(c);
                    self.pos += 1;
                }
                '"' | '\'' => {
                    let role = self.begin_token();
                    self.read_string(c, role);
                }
                ':' => {
                    if let Some(Frame::Object(state)) = self.stack.last_mut() {
                        if *state == ObjState::AfterKey {
                            *state = ObjState::ExpectValue;
                            self.out.push(':');
                        }
                    }
                    self.pos += 1;
                }
                ',' => {
                    match self.stack.last_mut() {
                        Some(Frame::Object(state)) => {
                            if *state == ObjState::AfterValue {
                                *state = ObjState::ExpectKey;
                                self.out.push(',');
                            }
                        }
                        Some(Frame::Array) => {
                            if self.last_significant().is_some_and(is_value_end) {
                                self.out.push(',');
                            }
                        }
                        None => {}
                    }
                    self.pos += 1;
                }
                '/' if self.skip_comment() => {}
                c if c.is_whitespace() => {
                    self.out.push(c);
                    self.pos += 1;
                }
                _ => {
                    let role = self.begin_token();
                    self.read_bare(role);
                }
            }
        }
        while !self.stack.is_empty() {
            self.close_top();
        }
        let consumed = self.chars[..self.pos].iter().map(|c| c.len_utf8()).sum();
        (self.out.trim().to_string(), consumed)
    }
}

/// Best-effort rewrite of almost-JSON into JSON. Text without any `{`/`[`
/// is returned trimmed and unchanged.
///
/// Every top-level `{`/`[` is tried as a payload start, so a bracket in the
/// prose before the JSON does not win. Of the candidates that parse, the one
/// covering the most input is kept; with none parsing, the first is returned.
pub fn repair_json(raw: &str) -> String {
    let body = strip_code_fences(raw);
    let mut best: Option<(usize, String)> = None;
    let mut first_failed: Option<String> = None;
    // starts inside an accepted candidate are nested containers
    let mut covered = 0;
    for (start, _) in body.match_indices(|c: char| c == '{' || c == '[') {
        if start < covered {
            continue;
        }
        let (candidate, consumed) = Repairer::new(&body[start..]).run();
        if serde_json::from_str::<Value>(&candidate).is_ok() {
            covered = start + consumed;
            if best.as_ref().map_or(true, |(len, _)| consumed > *len) {
                best = Some((consumed, candidate));
            }
        } else if first_failed.is_none() {
            first_failed = Some(candidate);
        }
    }
    match (best, first_failed) {
        (Some((_, candidate)), _) => candidate,
        (None, Some(candidate)) => candidate,
        (None, None) => body.to_string(),
    }
}

pub const DEFAULT_MARKERS: [&str; 2] = ["Reviews", "Query"];

fn push_unique(out: &mut Vec<String>, s: &str) {
    let s = s.trim();
    if !s.is_empty() && !out.iter().any(|x| x == s) {
        out.push(s.to_string());
    }
}

fn is_query_key(k: &str) -> bool {
    k.to_lowercase().contains("query") || k.eq_ignore_ascii_case("queries")
}

fn collect(v: &Value, markers: &[&str], out: &mut Vec<String>) {
    match v {
        Value::String(s) => push_unique(out, s),
        Value::Array(items) => {
            for it in items {
                match it {
                    Value::String(_) | Value::Array(_) | Value::Object(_) => collect(it, markers, out),
                    _ => {}
                }
            }
        }
        Value::Object(map) => {
            let before = out.len();
            for (k, val) in map {
                if is_query_key(k) {
                    collect(val, markers, out);
                }
            }
            if out.len() > before {
                return;
            }
            for val in map.values() {
                if let Value::String(s) = val {
                    if markers.iter().any(|m| s.contains(m)) {
                        push_unique(out, s);
                    }
                }
            }
            if out.len() > before {
                return;
            }
            for k in map.keys() {
                if markers.iter().any(|m| k.contains(m)) {
                    push_unique(out, k);
                }
            }
            if out.len() > before {
                return;
            }
            for val in map.values() {
                if matches!(val, Value::Array(_) | Value::Object(_)) {
                    collect(val, markers, out);
                }
            }
        }
        _ => {}
    }
}

/// Query strings found in a parsed reply, in document order, deduplicated.
pub fn extract_queries(v: &Value, markers: &[&str]) -> Vec<String> {
    let mut out = Vec::new();
    collect(v, markers, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repaired_value(s: &str) -> Value {
        serde_json::from_str(&repair_json(s)).unwrap_or_else(|e| panic!("{}: {}", repair_json(s), e))
    }

    #[test]
    fn strict_input_is_not_repaired() {
        let p = parse_lenient(r#" {"query": "diebold g2 reviews"} "#).unwrap();
        assert!(!p.was_repaired());
        assert_eq!(p.value(), &json!({"query": "diebold g2 reviews"}));
    }

    #[test]
    fn repairable_inputs_match_well_formed_equivalent() {
        let well_formed = json!({"queries": ["diebold g2 reviews", "paccar g2 reviews"], "ok": true});
        let cases = [
            r#"{"queries": ["diebold g2 reviews", "paccar g2 reviews",], "ok": true,}"#,
            r#"{'queries': ['diebold g2 reviews', 'paccar g2 reviews'], 'ok': True}"#,
            r#"{queries: ["diebold g2 reviews" "paccar g2 reviews"], ok: true}"#,
            "```json\n{\"queries\": [\"diebold g2 reviews\", \"paccar g2 reviews\"], \"ok\": true}\n```",
            r#"Sure! Here you go: {"queries": ["diebold g2 reviews", "paccar g2 reviews"], "ok": true} Hope it helps."#,
            "{\"queries\": [\"diebold g2 reviews\", // first\n \"paccar g2 reviews\" /* second */], \"ok\": true}",
            r#"{"queries": ["diebold g2 reviews", "paccar g2 reviews"], "ok": true"#,
            r#"{"queries": ["diebold g2 reviews", "paccar g2 reviews"]  "ok": true}"#,
            r#"{"ok": true "queries": ["diebold g2 reviews", "paccar g2 reviews"]}"#,
            r#"{ok: True
 queries: ['diebold g2 reviews' 'paccar g2 reviews']}"#,
        ];
        for c in cases {
            let p = parse_lenient(c).unwrap_or_else(|e| panic!("{c}: {e}"));
            assert!(p.was_repaired(), "{c}");
            assert_eq!(p.value(), &well_formed, "{c}");
        }
    }

    #[test]
    fn missing_comma_after_bare_literal_is_inserted() {
        assert_eq!(
            repaired_value(r#"{"ok": true "query": "diebold g2 reviews"}"#),
            json!({"ok": true, "query": "diebold g2 reviews"})
        );
        assert_eq!(
            repaired_value(r#"{"n": 1 "query": "diebold g2 reviews"}"#),
            json!({"n": 1, "query": "diebold g2 reviews"})
        );
        assert_eq!(repaired_value("[1 2 null]"), json!([1, 2, null]));
        assert_eq!(repaired_value("{x: true story}"), json!({"x": "true story"}));
    }

    #[test]
    fn bracket_in_leading_prose_does_not_win() {
        let p = parse_lenient(r#"Here are the results [as requested]: {"query": "diebold g2 reviews"}"#).unwrap();
        assert_eq!(p.value(), &json!({"query": "diebold g2 reviews"}));
        assert_eq!(extract_queries(p.value(), &DEFAULT_MARKERS), vec!["diebold g2 reviews"]);

        let p = parse_lenient(r#"{"query": "paccar g2 reviews"} (see [1])"#).unwrap();
        assert_eq!(p.value(), &json!({"query": "paccar g2 reviews"}));
    }

    #[test]
    fn truncated_string_and_missing_value_are_closed() {
        assert_eq!(repaired_value(r#"{"query": "diebold g2 rev"#), json!({"query": "diebold g2 rev"}));
        assert_eq!(repaired_value(r#"{"query": }"#), json!({"query": null}));
        assert_eq!(repaired_value(r#"["a", "b""#), json!(["a", "b"]));
    }

    #[test]
    fn inner_quotes_and_raw_newlines_are_escaped() {
        assert_eq!(
            repaired_value("{\"q\": \"say \"hi\" now\", \"n\": \"a\nb\"}"),
            json!({"q": "say \"hi\" now", "n": "a\nb"})
        );
        assert_eq!(repaired_value("{'q': 'it's fine'}"), json!({"q": "it's fine"}));
    }

    #[test]
    fn bare_values_and_python_literals() {
        assert_eq!(
            repaired_value("{query: diebold g2 reviews, n: 3, x: None}"),
            json!({"query": "diebold g2 reviews", "n": 3, "x": null})
        );
    }

    #[test]
    fn unrepairable_text_fails() {
        let err = parse_lenient("I cannot help with that.").unwrap_err();
        assert_eq!(err.repaired, "I cannot help with that.");
        assert!(parse_lenient("").is_err());
    }

    #[test]
    fn extract_prefers_query_keys() {
        let v = json!({"search_query": "diebold g2 reviews", "note": "G2 Reviews page"});
        assert_eq!(extract_queries(&v, &DEFAULT_MARKERS), vec!["diebold g2 reviews"]);
    }

    #[test]
    fn extract_falls_back_to_marker_values_then_keys() {
        let v = json!({"search": "Diebold G2 Reviews"});
        assert_eq!(extract_queries(&v, &DEFAULT_MARKERS), vec!["Diebold G2 Reviews"]);
        let v = json!({"Paccar G2 Reviews": 1});
        assert_eq!(extract_queries(&v, &DEFAULT_MARKERS), vec!["Paccar G2 Reviews"]);
        let v = json!({"nothing": "here"});
        assert!(extract_queries(&v, &DEFAULT_MARKERS).is_empty());
    }

    #[test]
    fn extract_from_arrays_dedups_and_skips_blank() {
        let v = json!(["a b", " ", "a b", {"query": "c"}, 4]);
        assert_eq!(extract_queries(&v, &DEFAULT_MARKERS), vec!["a b", "c"]);
    }
}
