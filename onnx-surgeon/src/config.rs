use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Checks run when an edited model is written back to disk.
pub struct SurgeryConfig {
    /// Re-parse the encoded model with tract before writing it.
    pub verify_on_save: bool,
    /// Refuse to write a graph with dangling or ambiguous tensor references.
    pub check_references: bool,
}

impl Default for SurgeryConfig {
    fn default() -> Self {
        SurgeryConfig {
            verify_on_save: false,
            check_references: true,
        }
    }
}

impl SurgeryConfig {
    /// Toggle the tract loadability check on save.
    ///
    /// # Example
    /// ```
    /// use onnx_surgeon::SurgeryConfig;
    /// let config = SurgeryConfig::default().with_verify(true);
    /// assert!(config.verify_on_save);
    /// ```
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify_on_save = verify;
        self
    }

    pub fn with_reference_check(mut self, check: bool) -> Self {
        self.check_references = check;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let config: SurgeryConfig = serde_json::from_str(r#"{"verify_on_save": true}"#).unwrap();
        assert!(config.verify_on_save);
        assert!(config.check_references);
    }
}
