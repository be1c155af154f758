//! Business-rule rows and the source systems they map from

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// Cell values that tabular exports use to mean "no value"
const NULL_MARKERS: &[&str] = &[
    "NA", "N/A", "n/a", "<NA>", "#NA", "#N/A", "#N/A N/A", "NULL", "null", "NaN", "-NaN", "nan", "-nan", "None",
    "1.#IND", "-1.#IND", "1.#QNAN", "-1.#QNAN",
];

/// Check whether a raw cell value denotes an absent value
pub fn is_null_marker(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || NULL_MARKERS.contains(&trimmed)
}

fn optional_cell<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .filter(|value| !is_null_marker(value))
        .map(|value| value.trim().to_string()))
}

/// Key cells (table and field names) are compared exactly, minus padding
pub(crate) fn trimmed_cell<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().to_string())
}

/// One of the two upstream systems a rule can draw from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSystem {
    /// Source system 1 (loan servicing)
    Acbs,
    /// Source system 2 (product catalogue)
    Cap,
}

impl std::fmt::Display for SourceSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Acbs => write!(f, "acbs"),
            Self::Cap => write!(f, "cap"),
        }
    }
}

/// A business requirement for one target field
///
/// The rule may name a field in either source system, both, or neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRule {
    #[serde(default, deserialize_with = "optional_cell")]
    pub acbs_field: Option<String>,

    #[serde(default, deserialize_with = "optional_cell")]
    pub cap_field: Option<String>,

    pub target_field: String,

    pub transformation_logic: String,
}

impl MappingRule {
    pub fn new(
        acbs_field: Option<&str>,
        cap_field: Option<&str>,
        target_field: impl Into<String>,
        transformation_logic: impl Into<String>,
    ) -> Self {
        Self {
            acbs_field: acbs_field.map(str::to_string),
            cap_field: cap_field.map(str::to_string),
            target_field: target_field.into(),
            transformation_logic: transformation_logic.into(),
        }
    }

    /// Populated source fields, system 1 before system 2
    pub fn source_fields(&self) -> impl Iterator<Item = (SourceSystem, &str)> {
        debug!(target_field = %self.target_field, "MappingRule::source_fields: called");
        let acbs = self.acbs_field.as_deref().map(|f| (SourceSystem::Acbs, f));
        let cap = self.cap_field.as_deref().map(|f| (SourceSystem::Cap, f));
        acbs.into_iter().chain(cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_markers() {
        assert!(is_null_marker(""));
        assert!(is_null_marker("   "));
        assert!(is_null_marker("NaN"));
        assert!(is_null_marker("NULL"));
        assert!(is_null_marker(" N/A "));
        for marker in ["n/a", "<NA>", "#NA", "#N/A N/A", "-NaN", "-nan", "1.#IND", "-1.#IND", "1.#QNAN", "-1.#QNAN"] {
            assert!(is_null_marker(marker), "{marker} should be absent");
        }
        assert!(!is_null_marker("loan_id"));
        assert!(!is_null_marker("na_flag"));
        assert!(!is_null_marker("nullable_flag"));
    }

    #[test]
    fn test_source_fields_order() {
        let rule = MappingRule::new(Some("loan_id"), Some("cap_product_id"), "loan_identifier", "prefer acbs");
        let fields: Vec<_> = rule.source_fields().collect();
        assert_eq!(
            fields,
            vec![(SourceSystem::Acbs, "loan_id"), (SourceSystem::Cap, "cap_product_id")]
        );
    }

    #[test]
    fn test_source_fields_none() {
        let rule = MappingRule::new(None, None, "orphan", "n/a");
        assert_eq!(rule.source_fields().count(), 0);
    }

    #[test]
    fn test_source_system_display() {
        assert_eq!(SourceSystem::Acbs.to_string(), "acbs");
        assert_eq!(SourceSystem::Cap.to_string(), "cap");
    }
}
