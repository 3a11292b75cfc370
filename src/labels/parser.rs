use serde_json::Value;

/// Indices past this are assumed to be garbage input, not a real class id.
const MAX_LABEL_INDEX: usize = 1 << 20;

/// Attempts each supported label encoding in order and returns the first
/// successfully normalized table: strict JSON first (plain array, wrapped
/// array, sparse index map), then the permissive line-oriented scan.
pub fn parse_label_source(text: &str) -> Option<Vec<String>> {
    parse_structured(text).or_else(|| parse_lines(text))
}

fn parse_structured(text: &str) -> Option<Vec<String>> {
    let value: Value = serde_json::from_str(text).ok()?;
    normalize(&value)
}

/// Normalizes any of the structured encodings to one ordered list.
fn normalize(value: &Value) -> Option<Vec<String>> {
    // Case 1: already an array of labels
    if let Value::Array(items) = value {
        return Some(items.iter().map(value_to_string).collect());
    }

    if let Value::Object(map) = value {
        // Case 2: { "labels": [...] }
        if let Some(Value::Array(items)) = map.get("labels") {
            return Some(items.iter().map(value_to_string).collect());
        }

        // Case 3: { "0": "tench", "1": "goldfish", ... } keyed by index
        let mut entries: Vec<(usize, String)> = map
            .iter()
            .filter_map(|(key, item)| {
                key.parse::<usize>().ok().map(|index| (index, value_to_string(item)))
            })
            .collect();
        if entries.is_empty() {
            return None;
        }
        entries.sort_by_key(|(index, _)| *index);
        return Some(entries.into_iter().map(|(_, label)| label).collect());
    }

    None
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Permissive fallback for non-JSON label maps such as a Python-style
/// `{0: 'tench', 1: 'goldfish', ...}` dump: one `key: value` pair per
/// line, trailing commas and braces stripped, either quoting style.
fn parse_lines(text: &str) -> Option<Vec<String>> {
    let mut sparse: Vec<Option<String>> = Vec::new();

    for line in text.lines() {
        let Some(colon) = line.find(':') else { continue };
        let digits: String = line[..colon].chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            continue;
        }
        let Ok(index) = digits.parse::<usize>() else { continue };
        if index > MAX_LABEL_INDEX {
            continue;
        }

        let mut value = line[colon + 1..].trim();
        if let Some(stripped) = value.strip_suffix(',') {
            value = stripped.trim_end();
        }
        if let Some(stripped) = value.strip_suffix('}') {
            value = stripped.trim_end();
        }
        let value = strip_quotes(value);
        if value.is_empty() {
            continue;
        }

        if index >= sparse.len() {
            sparse.resize(index + 1, None);
        }
        sparse[index] = Some(value.to_string());
    }

    let compact: Vec<String> = sparse.into_iter().flatten().collect();
    if compact.is_empty() {
        None
    } else {
        Some(compact)
    }
}

fn strip_quotes(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'\'' && last == b'\'') || (first == b'"' && last == b'"') {
            return &s[1..s.len() - 1];
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPECTED: &[&str] = &["tench", "goldfish", "great white shark"];

    #[test]
    fn plain_array_parses() {
        let table = parse_label_source(r#"["tench", "goldfish", "great white shark"]"#).unwrap();
        assert_eq!(table, EXPECTED);
    }

    #[test]
    fn wrapped_array_parses() {
        let table = parse_label_source(
            r#"{"labels": ["tench", "goldfish", "great white shark"]}"#,
        )
        .unwrap();
        assert_eq!(table, EXPECTED);
    }

    #[test]
    fn sparse_map_parses_in_index_order() {
        // Keys deliberately out of order
        let table = parse_label_source(
            r#"{"2": "great white shark", "0": "tench", "1": "goldfish"}"#,
        )
        .unwrap();
        assert_eq!(table, EXPECTED);
    }

    #[test]
    fn tolerant_line_scan_parses() {
        let text = "{0: 'tench',\n 1: \"goldfish\",\n 2: 'great white shark'}";
        let table = parse_label_source(text).unwrap();
        assert_eq!(table, EXPECTED);
    }

    #[test]
    fn all_encodings_agree() {
        let sources = [
            r#"["tench", "goldfish", "great white shark"]"#.to_string(),
            r#"{"labels": ["tench", "goldfish", "great white shark"]}"#.to_string(),
            r#"{"0": "tench", "1": "goldfish", "2": "great white shark"}"#.to_string(),
            "{0: 'tench', 1: 'goldfish', 2: 'great white shark'}".to_string(),
        ];
        for source in &sources {
            assert_eq!(parse_label_source(source).unwrap(), EXPECTED, "source: {}", source);
        }
    }

    #[test]
    fn garbage_yields_none() {
        assert!(parse_label_source("").is_none());
        assert!(parse_label_source("not a label file").is_none());
        assert!(parse_label_source("42").is_none());
    }

    #[test]
    fn non_string_values_are_stringified() {
        let table = parse_label_source(r#"{"0": 7, "1": "goldfish"}"#).unwrap();
        assert_eq!(table, vec!["7", "goldfish"]);
    }
}
