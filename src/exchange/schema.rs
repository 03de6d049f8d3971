// ABOUTME: Shared naming of the keys in an export document.
// ABOUTME: Producers validate against it and consumers look values up through it.

use serde::{Deserialize, Serialize};

use super::codec::{ExportDocument, SchemaError};

/// Document keys for each identifier the consumer stack depends on.
///
/// Defaults match the key names the producer stack has always written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportKeys {
    pub repository_url: String,
    pub registry_id: String,
    pub function_name: String,
    pub function_arn: String,
    pub role_arn: String,
    pub bucket_name: String,
}

impl Default for ExportKeys {
    fn default() -> Self {
        Self {
            repository_url: "repository_url".to_string(),
            registry_id: "ecr_registry_id".to_string(),
            function_name: "lambda_function_name".to_string(),
            function_arn: "lambda_function_arn".to_string(),
            role_arn: "lambda_role_arn".to_string(),
            bucket_name: "bucket_name".to_string(),
        }
    }
}

impl ExportKeys {
    /// Every key a complete export document carries.
    pub fn all(&self) -> [&str; 6] {
        [
            &self.repository_url,
            &self.registry_id,
            &self.function_name,
            &self.function_arn,
            &self.role_arn,
            &self.bucket_name,
        ]
    }

    /// Check that every key is present and holds a string.
    ///
    /// Reports all missing keys at once rather than the first.
    pub fn validate(&self, document: &ExportDocument) -> Result<(), SchemaError> {
        let missing: Vec<String> = self
            .all()
            .into_iter()
            .filter(|key| !document.contains_key(key))
            .map(str::to_string)
            .collect();

        if !missing.is_empty() {
            return Err(SchemaError::Incomplete { missing });
        }

        for key in self.all() {
            document.require_str(key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> ExportDocument {
        ExportKeys::default()
            .all()
            .into_iter()
            .map(|k| (k.to_string(), format!("value-of-{k}")))
            .collect()
    }

    #[test]
    fn complete_document_validates() {
        assert!(ExportKeys::default().validate(&complete()).is_ok());
    }

    #[test]
    fn lists_every_missing_key() {
        let doc: ExportDocument = [("lambda_role_arn", "arn:x")].into_iter().collect();
        let err = ExportKeys::default().validate(&doc).unwrap_err();
        match err {
            SchemaError::Incomplete { missing } => {
                assert_eq!(missing.len(), 5);
                assert!(missing.contains(&"bucket_name".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_string_value_fails_validation() {
        let mut doc = complete();
        doc.insert("bucket_name", 42);
        assert!(matches!(
            ExportKeys::default().validate(&doc),
            Err(SchemaError::WrongShape { .. })
        ));
    }
}
