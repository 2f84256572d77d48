//! Lenient structured-output parser.
//!
//! Model responses are JSON-shaped at best: markdown code fences,
//! preamble prose before the first `{`, and truncated tails are all
//! common. The contract is explicit — return a fully parsed object, a
//! partially repaired object with named fields defaulted, or a parse
//! failure. Never silently return malformed data.

use serde_json::Value;

/// Outcome of lenient parsing.
#[derive(Debug)]
pub enum ParseOutcome {
    /// Parsed cleanly after cosmetic cleanup.
    Parsed(Value),
    /// Tail was truncated or malformed: trailing fields were dropped
    /// and re-added as null so downstream defaults apply.
    Repaired {
        value: Value,
        defaulted_fields: Vec<String>,
    },
    /// Nothing object-shaped could be recovered.
    Failed(String),
}

impl ParseOutcome {
    pub fn into_value(self) -> Option<Value> {
        match self {
            ParseOutcome::Parsed(v) => Some(v),
            ParseOutcome::Repaired { value, .. } => Some(value),
            ParseOutcome::Failed(_) => None,
        }
    }
}

/// Parse a model response leniently. `known_fields` names the expected
/// top-level keys, in schema order, used as repair boundaries.
pub fn parse_lenient(response: &str, known_fields: &[&str]) -> ParseOutcome {
    let tail = match isolate_json(response) {
        Some(c) => c,
        None => return ParseOutcome::Failed("no JSON object in response".into()),
    };

    // Strict attempt on the text up to the last closing brace — covers
    // clean output plus trailing prose after the object.
    if let Some(end) = tail.rfind('}') {
        if let Ok(v) = serde_json::from_str::<Value>(&tail[..=end]) {
            if v.is_object() {
                return ParseOutcome::Parsed(v);
            }
            return ParseOutcome::Failed("top-level JSON value is not an object".into());
        }
    }

    // Strict failed: repair against the full tail, which preserves any
    // truncated final field for the boundary walk.
    repair_truncated(tail, known_fields)
}

/// Strip markdown fences and preamble: the candidate runs from the
/// first `{` to end of body (the tail may be cut off mid-object).
fn isolate_json(response: &str) -> Option<&str> {
    let body = match response.find("```json") {
        Some(fence) => {
            let after = &response[fence + 7..];
            match after.find("```") {
                Some(end) => &after[..end],
                None => after, // unclosed fence: truncated response
            }
        }
        None => response,
    };

    let start = body.find('{')?;
    Some(body[start..].trim_end())
}

/// Walk backward through known top-level field boundaries, dropping the
/// trailing (presumably truncated) fields until the prefix parses, then
/// re-close the object with null defaults for whatever was dropped.
fn repair_truncated(candidate: &str, known_fields: &[&str]) -> ParseOutcome {
    let boundaries = top_level_key_offsets(candidate, known_fields);
    if boundaries.is_empty() {
        return ParseOutcome::Failed("no recognizable top-level fields".into());
    }

    // Try cutting before the last key, then the one before it, and so on.
    for cut_index in (0..boundaries.len()).rev() {
        let (offset, _) = boundaries[cut_index];
        let dropped: Vec<String> = boundaries[cut_index..]
            .iter()
            .map(|(_, name)| name.clone())
            .collect();

        let mut prefix = candidate[..offset].trim_end().to_string();
        while prefix.ends_with(',') {
            prefix.pop();
            prefix.truncate(prefix.trim_end().len());
        }

        let needs_comma = !prefix.trim_end().ends_with('{');
        let mut rebuilt = prefix;
        for (i, name) in dropped.iter().enumerate() {
            if i > 0 || needs_comma {
                rebuilt.push(',');
            }
            rebuilt.push_str(&format!("\"{name}\":null"));
        }
        rebuilt.push('}');

        if let Ok(v) = serde_json::from_str::<Value>(&rebuilt) {
            if v.is_object() {
                tracing::warn!(
                    defaulted = dropped.len(),
                    "Repaired truncated model response"
                );
                return ParseOutcome::Repaired {
                    value: v,
                    defaulted_fields: dropped,
                };
            }
        }
    }

    ParseOutcome::Failed("repair exhausted all field boundaries".into())
}

/// Byte offsets of known keys appearing at depth 1, in order. Tracks
/// quote/escape state and brace/bracket depth so keys inside nested
/// objects or string values are not mistaken for boundaries.
fn top_level_key_offsets(s: &str, known_fields: &[&str]) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let bytes = s.as_bytes();
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut string_start = 0usize;

    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
                // A string at depth 1 followed by ':' is a top-level key.
                if depth == 1 {
                    let content = &s[string_start + 1..i];
                    let mut j = i + 1;
                    while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                        j += 1;
                    }
                    if j < bytes.len()
                        && bytes[j] == b':'
                        && known_fields.contains(&content)
                    {
                        out.push((string_start, content.to_string()));
                    }
                }
            }
        } else {
            match b {
                b'"' => {
                    in_string = true;
                    string_start = i;
                }
                b'{' | b'[' => depth += 1,
                b'}' | b']' => depth -= 1,
                _ => {}
            }
        }
        i += 1;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &[&str] = &["patient", "diagnoses", "medications", "confidence"];

    #[test]
    fn clean_json_parses() {
        let r = r#"{"patient": {"name": "A"}, "diagnoses": [], "medications": [], "confidence": 80}"#;
        assert!(matches!(parse_lenient(r, FIELDS), ParseOutcome::Parsed(_)));
    }

    #[test]
    fn strips_code_fences_and_preamble() {
        let r = "Here is the extraction:\n```json\n{\"confidence\": 75}\n```\nDone.";
        match parse_lenient(r, FIELDS) {
            ParseOutcome::Parsed(v) => assert_eq!(v["confidence"], 75),
            other => panic!("expected Parsed, got {other:?}"),
        }
    }

    #[test]
    fn preamble_without_fence() {
        let r = "Sure! The JSON you asked for: {\"confidence\": 60}";
        assert!(matches!(parse_lenient(r, FIELDS), ParseOutcome::Parsed(_)));
    }

    #[test]
    fn truncated_tail_repaired_with_defaults() {
        // Response cut off mid-way through the medications array.
        let r = r#"{"patient": {"name": "Ramesh"}, "diagnoses": [{"name": "T2DM", "confidence": 90}], "medications": [{"name": "Metfor"#;
        match parse_lenient(r, FIELDS) {
            ParseOutcome::Repaired {
                value,
                defaulted_fields,
            } => {
                assert_eq!(value["patient"]["name"], "Ramesh");
                assert_eq!(value["diagnoses"][0]["name"], "T2DM");
                assert!(value["medications"].is_null());
                assert_eq!(defaulted_fields, vec!["medications".to_string()]);
            }
            other => panic!("expected Repaired, got {other:?}"),
        }
    }

    #[test]
    fn deep_truncation_drops_multiple_fields() {
        let r = r#"{"patient": {"name": "A"}, "diagnoses": [{"name": "T2DM", "confi"#;
        match parse_lenient(r, FIELDS) {
            ParseOutcome::Repaired {
                value,
                defaulted_fields,
            } => {
                assert_eq!(value["patient"]["name"], "A");
                assert!(value["diagnoses"].is_null());
                assert_eq!(defaulted_fields, vec!["diagnoses".to_string()]);
            }
            other => panic!("expected Repaired, got {other:?}"),
        }
    }

    #[test]
    fn key_inside_string_value_not_a_boundary() {
        // "medications" appears inside a string value; the tracker must
        // not treat it as a top-level boundary.
        let r = r#"{"patient": {"name": "on medications: many"}, "confidence": 50}"#;
        match parse_lenient(r, FIELDS) {
            ParseOutcome::Parsed(v) => {
                assert_eq!(v["patient"]["name"], "on medications: many");
            }
            other => panic!("expected Parsed, got {other:?}"),
        }
    }

    #[test]
    fn nested_key_not_a_boundary() {
        // Truncated, and the nested object has a key named like a
        // top-level field. Repair must cut at depth 1 only.
        let r = r#"{"patient": {"confidence": "high"}, "diagnoses": [{"na"#;
        match parse_lenient(r, FIELDS) {
            ParseOutcome::Repaired { value, .. } => {
                assert_eq!(value["patient"]["confidence"], "high");
            }
            other => panic!("expected Repaired, got {other:?}"),
        }
    }

    #[test]
    fn pure_prose_fails_explicitly() {
        assert!(matches!(
            parse_lenient("I could not process this document.", FIELDS),
            ParseOutcome::Failed(_)
        ));
    }

    #[test]
    fn non_object_json_fails() {
        assert!(matches!(
            parse_lenient("[1, 2, 3]", FIELDS),
            ParseOutcome::Failed(_)
        ));
    }

    #[test]
    fn unclosed_fence_still_recovered() {
        let r = "```json\n{\"patient\": {\"name\": \"A\"}, \"confidence\": 70}";
        assert!(parse_lenient(r, FIELDS).into_value().is_some());
    }
}
