//! Class label sources.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::ModelError;

/// `0: 'person'` entries in the ultralytics `names` metadata string.
static NAMES_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\d+)\s*:\s*(?:'([^']*)'|"([^"]*)")"#).unwrap()
});

/// Read a labels file: one label per line, in class-index order.
pub fn load_labels_file(path: &Path) -> Result<Vec<String>, ModelError> {
    let text = std::fs::read_to_string(path).map_err(|source| ModelError::Labels {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_labels_text(&text))
}

pub fn parse_labels_text(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Parse the `names` metadata that ultralytics embeds in exported ONNX models,
/// e.g. `{0: 'person', 1: 'bicycle'}`.
///
/// Labels are placed at their declared index; gaps are filled with empty strings.
pub fn parse_ultralytics_names(raw: &str) -> Vec<String> {
    let mut entries: Vec<(usize, String)> = NAMES_ENTRY
        .captures_iter(raw)
        .filter_map(|caps| {
            let index = caps.get(1)?.as_str().parse::<usize>().ok()?;
            let name = caps.get(2).or_else(|| caps.get(3))?.as_str().to_string();
            Some((index, name))
        })
        .collect();

    let Some(max_index) = entries.iter().map(|(i, _)| *i).max() else {
        return Vec::new();
    };

    let mut labels = vec![String::new(); max_index + 1];
    for (index, name) in entries.drain(..) {
        labels[index] = name;
    }
    labels
}
