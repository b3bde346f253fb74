use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::error::ClassifierError;

/// The class-index file comes in two shapes: a plain array of names, or an
/// object keyed by stringified index (`{"0": "affenpinscher", ...}`).
#[derive(Deserialize)]
#[serde(untagged)]
enum LabelFile {
    List(Vec<String>),
    Indexed(BTreeMap<String, String>),
}

/// Reads the class names, ordered by output index.
pub fn load_labels<P: AsRef<Path>>(path: P) -> Result<Vec<String>, ClassifierError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .map_err(|e| ClassifierError::LabelError(format!("Failed to read {}: {}", path.display(), e)))?;
    parse_labels(&raw)
}

pub fn parse_labels(raw: &str) -> Result<Vec<String>, ClassifierError> {
    let file: LabelFile = serde_json::from_str(raw)
        .map_err(|e| ClassifierError::LabelError(format!("Invalid class index JSON: {}", e)))?;

    let labels = match file {
        LabelFile::List(labels) => labels,
        LabelFile::Indexed(map) => (0..map.len())
            .map(|i| {
                map.get(&i.to_string()).cloned().ok_or_else(|| {
                    ClassifierError::LabelError(format!("Class index {} missing from class index file", i))
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
    };

    if labels.is_empty() {
        return Err(ClassifierError::LabelError("Class index file lists no classes".into()));
    }
    if let Some(pos) = labels.iter().position(|l| l.trim().is_empty()) {
        return Err(ClassifierError::LabelError(format!("Class {} has an empty name", pos)));
    }
    Ok(labels)
}
