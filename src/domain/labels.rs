// ============================================================
// Layer 3 — Label Map
// ============================================================
// Fixed, finite mapping from class index to label name for the
// classification task. Loaded once with the engine config and
// never mutated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::error::{QaError, QaResult};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LabelMap {
    labels: BTreeMap<usize, String>,
}

impl LabelMap {
    /// Build from labels listed in class-index order.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels = names
            .into_iter()
            .enumerate()
            .map(|(i, s)| (i, s.into()))
            .collect();
        Self { labels }
    }

    /// Look up the label for a class index.
    /// A missing index means model and mapping disagree.
    pub fn label(&self, index: usize) -> QaResult<&str> {
        self.labels
            .get(&index)
            .map(String::as_str)
            .ok_or_else(|| QaError::Configuration(format!(
                "class index {index} has no label (mapping holds {} labels)",
                self.labels.len()
            )))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }
}
