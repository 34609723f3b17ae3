//! Class label files

use crate::error::VisionError;
use std::path::Path;

/// Upper bound on class indices in an `id2label` map
const MAX_LABEL_INDEX: usize = 100_000;

/// Read labels from a text file (one per line) or a JSON file with an
/// `id2label` map.
pub fn load_labels(path: &Path) -> Result<Vec<String>, VisionError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        VisionError::Model(format!("Failed to read label file {}: {}", path.display(), e))
    })?;

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let labels = if is_json {
        parse_id2label(&content)?
    } else {
        parse_lines(&content)
    };

    if labels.is_empty() {
        return Err(VisionError::Model(format!("Label file {} is empty", path.display())));
    }
    Ok(labels)
}

pub(crate) fn parse_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn parse_id2label(content: &str) -> Result<Vec<String>, VisionError> {
    let config: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| VisionError::Model(format!("Failed to parse label JSON: {}", e)))?;

    let id2label = config["id2label"]
        .as_object()
        .ok_or_else(|| VisionError::Model("Label JSON missing id2label field".to_string()))?;

    let mut indexed = Vec::with_capacity(id2label.len());
    for (key, value) in id2label {
        let idx = key
            .parse::<usize>()
            .map_err(|_| VisionError::Model(format!("Invalid label index: {}", key)))?;
        if idx >= MAX_LABEL_INDEX {
            return Err(VisionError::Model(format!(
                "Label index {} out of range (max {})",
                idx,
                MAX_LABEL_INDEX - 1
            )));
        }
        let label = value
            .as_str()
            .ok_or_else(|| VisionError::Model(format!("Label {} is not a string", key)))?;
        indexed.push((idx, label.to_string()));
    }
    indexed.sort_by_key(|(idx, _)| *idx);

    // Holes in the index space keep their position
    let len = indexed.last().map(|(idx, _)| idx + 1).unwrap_or(0);
    let mut labels: Vec<String> = (0..len).map(|i| format!("class_{}", i)).collect();
    for (idx, label) in indexed {
        labels[idx] = label;
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_lines_skips_blank() {
        let labels = parse_lines("n01440764 tench\n\n  n01443537 goldfish  \n");
        assert_eq!(labels, vec!["n01440764 tench", "n01443537 goldfish"]);
    }

    #[test]
    fn test_parse_id2label_orders_by_index() {
        let labels = parse_id2label(r#"{"id2label": {"1": "cat", "0": "dog", "3": "fox"}}"#).unwrap();
        assert_eq!(labels, vec!["dog", "cat", "class_2", "fox"]);
    }

    #[test]
    fn test_parse_id2label_missing_field() {
        assert!(parse_id2label(r#"{"labels": []}"#).is_err());
        assert!(parse_id2label(r#"{"id2label": {"x": "cat"}}"#).is_err());
    }

    #[test]
    fn test_parse_id2label_rejects_huge_index() {
        let err = parse_id2label(r#"{"id2label": {"18446744073709551615": "x"}}"#).unwrap_err();
        assert!(matches!(err, VisionError::Model(_)));
        assert!(parse_id2label(r#"{"id2label": {"4000000000": "x"}}"#).is_err());
        assert!(parse_id2label(r#"{"id2label": {"0": "a", "100000": "b"}}"#).is_err());
        assert_eq!(parse_id2label(r#"{"id2label": {"99999": "last"}}"#).unwrap().len(), 100_000);
    }

    #[test]
    fn test_load_labels_by_extension() {
        let dir = tempfile::TempDir::new().unwrap();

        let txt = dir.path().join("labels.txt");
        std::fs::write(&txt, "tabby\nlynx\n").unwrap();
        assert_eq!(load_labels(&txt).unwrap(), vec!["tabby", "lynx"]);

        let json = dir.path().join("config.json");
        let mut file = std::fs::File::create(&json).unwrap();
        write!(file, r#"{{"id2label": {{"0": "tabby"}}}}"#).unwrap();
        assert_eq!(load_labels(&json).unwrap(), vec!["tabby"]);

        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, "\n").unwrap();
        assert!(load_labels(&empty).is_err());

        assert!(load_labels(&dir.path().join("missing.txt")).is_err());
    }
}
