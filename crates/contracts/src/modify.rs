use serde::{Deserialize, Serialize};

use crate::Contract;

/// Outcome of a create/update call. Validation failures travel in the
/// payload with a 200 status; `Successful` is rendered as `"True"`/`"False"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyResult {
    #[serde(with = "true_false")]
    pub successful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_results: Vec<ModifyValidationResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyValidationResult {
    pub key: String,
    pub message: String,
}

impl ModifyResult {
    pub fn success(link: Option<String>) -> Self {
        Self {
            successful: true,
            error_message: None,
            link,
            validation_results: Vec::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            successful: false,
            error_message: Some(message.into()),
            link: None,
            validation_results: Vec::new(),
        }
    }

    pub fn invalid(validation_results: Vec<ModifyValidationResult>) -> Self {
        Self {
            successful: false,
            error_message: None,
            link: None,
            validation_results,
        }
    }

    pub fn outcome(&self) -> &'static str {
        if self.successful {
            "success"
        } else if !self.validation_results.is_empty() {
            "invalid"
        } else {
            "failed"
        }
    }
}

impl ModifyValidationResult {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl Contract for ModifyResult {
    const ROOT: &'static str = "ModifyResult";
}

mod true_false {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "True" } else { "False" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.trim() {
            "True" | "true" => Ok(true),
            "False" | "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected True or False, got `{}`",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_flag_is_stringified_on_the_wire() {
        let ok = serde_json::to_value(ModifyResult::success(None)).unwrap();
        assert_eq!(ok, serde_json::json!({ "Successful": "True" }));

        let invalid = ModifyResult::invalid(vec![ModifyValidationResult::new(
            "FirstNameMissing",
            "First name is required",
        )]);
        assert_eq!(
            serde_json::to_value(&invalid).unwrap(),
            serde_json::json!({
                "Successful": "False",
                "ValidationResults": [
                    { "Key": "FirstNameMissing", "Message": "First name is required" }
                ]
            })
        );
        assert_eq!(invalid.outcome(), "invalid");
    }

    #[test]
    fn parses_string_flag_back() {
        let parsed: ModifyResult =
            serde_json::from_str(r#"{"Successful":"False","ErrorMessage":"boom"}"#).unwrap();
        assert!(!parsed.successful);
        assert_eq!(parsed.outcome(), "failed");

        let err = serde_json::from_str::<ModifyResult>(r#"{"Successful":"yes"}"#).unwrap_err();
        assert!(err.to_string().contains("expected True or False"));
    }
}
