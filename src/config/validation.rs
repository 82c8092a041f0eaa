//! Config validation: unknown-key detection with "did you mean?" suggestions.
//!
//! The raw TOML is first parsed into a `toml::Value`, its key tree walked and
//! compared against the known field names. Unknown keys only warn; they
//! never break a config that serde accepts.

use std::collections::HashSet;

/// A non-fatal config warning (typo, unused key).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

/// Every valid dotted key path for `PlantConfig`.
///
/// Array-of-table entries (`[[equipment]]`) are listed without an index.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [plant]
        "plant",
        "plant.name",
        // [monitor]
        "monitor",
        "monitor.tick_interval_ms",
        "monitor.event_channel_capacity",
        "monitor.shutdown_timeout_ms",
        // [storage]
        "storage",
        "storage.data_dir",
        // [[equipment]]
        "equipment",
        "equipment.id",
        "equipment.name",
        "equipment.loading_m_code",
        "equipment.dwell",
        "equipment.dwell.m_code",
        "equipment.dwell.threshold_secs",
    ];
    keys.iter().copied().collect()
}

/// Collect all dotted key paths in a TOML tree.
///
/// Tables inside arrays contribute their keys under the array's own path,
/// so `[[equipment]] id = ".."` yields `equipment` and `equipment.id`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    match value {
        toml::Value::Table(table) => {
            for (k, v) in table {
                let path = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                keys.push(path.clone());
                keys.extend(walk_toml_keys(v, &path));
            }
        }
        toml::Value::Array(items) => {
            for item in items.iter().filter(|i| i.is_table()) {
                for key in walk_toml_keys(item, prefix) {
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
            }
        }
        _ => {}
    }
    keys
}

/// Levenshtein edit distance
fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Closest known key within edit distance 3
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (k, edit_distance(unknown, k)))
        .filter(|&(_, d)| d <= 3)
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(k, _)| k.to_string())
}

/// Warnings for every unknown key in a raw TOML document.
///
/// Parse errors return no warnings; serde reports them afterwards.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}
