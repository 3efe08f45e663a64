//! Deterministic, insertion-ordered JSON object builder.
//!
//! `serde_json::to_string` on a struct is already field-order-stable, but this
//! type exists so callers build the signed payload from explicit key/value pairs
//! rather than from a `#[derive(Serialize)]` struct whose field order could
//! silently shift in a future refactor and invalidate every outstanding cookie.

/// A single JSON object, serialized in the order fields were added.
#[derive(Debug, Default, Clone)]
pub struct CanonicalObject {
    fields: Vec<(String, String)>,
}

impl CanonicalObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn str(mut self, key: &str, value: &str) -> Self {
        self.fields.push((key.to_string(), json_string(value)));
        self
    }

    pub fn uint(mut self, key: &str, value: u64) -> Self {
        self.fields.push((key.to_string(), value.to_string()));
        self
    }

    pub fn finish(self) -> String {
        let mut out = String::from("{");
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push('"');
            out.push_str(k);
            out.push_str("\":");
            out.push_str(v);
        }
        out.push('}');
        out
    }
}

fn json_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Reads a single top-level string field out of a flat canonical JSON object.
/// Only supports the shapes this crate itself produces: no nesting, string and
/// unsigned-integer values only.
pub fn read_str_field(payload: &str, key: &str) -> Option<String> {
    read_raw_field(payload, key).and_then(|raw| {
        let raw = raw.trim();
        if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
            Some(unescape(&raw[1..raw.len() - 1]))
        } else {
            None
        }
    })
}

pub fn read_uint_field(payload: &str, key: &str) -> Option<u64> {
    read_raw_field(payload, key).and_then(|raw| raw.trim().parse().ok())
}

fn read_raw_field(payload: &str, key: &str) -> Option<String> {
    let needle = format!("\"{}\":", key);
    let start = payload.find(&needle)? + needle.len();
    let rest = &payload[start..];
    let bytes = rest.as_bytes();
    if bytes.is_empty() {
        return None;
    }
    if bytes[0] == b'"' {
        let mut i = 1;
        let mut escaped = false;
        while i < bytes.len() {
            if escaped {
                escaped = false;
            } else if bytes[i] == b'\\' {
                escaped = true;
            } else if bytes[i] == b'"' {
                return Some(rest[..=i].to_string());
            }
            i += 1;
        }
        None
    } else {
        let end = rest.find([',', '}']).unwrap_or(rest.len());
        Some(rest[..end].to_string())
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_fields_in_order() {
        let payload = CanonicalObject::new()
            .str("kind", "session")
            .str("sid", "abc123")
            .str("deviceId", "device-1")
            .uint("exp", 1_700_000_000)
            .finish();
        assert_eq!(
            payload,
            r#"{"kind":"session","sid":"abc123","deviceId":"device-1","exp":1700000000}"#
        );
        assert_eq!(read_str_field(&payload, "kind").as_deref(), Some("session"));
        assert_eq!(read_str_field(&payload, "deviceId").as_deref(), Some("device-1"));
        assert_eq!(read_uint_field(&payload, "exp"), Some(1_700_000_000));
    }

    #[test]
    fn escapes_quotes_in_values() {
        let payload = CanonicalObject::new().str("ua", "Mozilla \"5.0\"").finish();
        assert_eq!(read_str_field(&payload, "ua").as_deref(), Some("Mozilla \"5.0\""));
    }
}
