//! Jurisdiction model matching the `/org/jurisdictions` payload.

use serde::{Deserialize, Serialize};

/// Administrative level of a jurisdiction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JurisdictionLevel {
    Central,
    Division,
    District,
    Upazila,
    Union,
    Ward,
    Unit,
    Other(String),
}

impl JurisdictionLevel {
    pub fn as_str(&self) -> &str {
        match self {
            JurisdictionLevel::Central => "central",
            JurisdictionLevel::Division => "division",
            JurisdictionLevel::District => "district",
            JurisdictionLevel::Upazila => "upazila",
            JurisdictionLevel::Union => "union",
            JurisdictionLevel::Ward => "ward",
            JurisdictionLevel::Unit => "unit",
            JurisdictionLevel::Other(s) => s,
        }
    }
}

impl From<String> for JurisdictionLevel {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "central" => JurisdictionLevel::Central,
            "division" => JurisdictionLevel::Division,
            "district" => JurisdictionLevel::District,
            "upazila" => JurisdictionLevel::Upazila,
            "union" => JurisdictionLevel::Union,
            "ward" => JurisdictionLevel::Ward,
            "unit" => JurisdictionLevel::Unit,
            _ => JurisdictionLevel::Other(s),
        }
    }
}

impl From<JurisdictionLevel> for String {
    fn from(level: JurisdictionLevel) -> Self {
        level.as_str().to_string()
    }
}

/// A node in the administrative hierarchy.
///
/// `children: None` means the children have not been fetched yet;
/// `Some(vec![])` means they were fetched and there are none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurisdictionNode {
    pub id: String,
    pub name: String,
    pub level: JurisdictionLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_bn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<JurisdictionNode>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_level_parses_known_and_unknown_values() {
        assert_eq!(
            JurisdictionLevel::from("Division".to_string()),
            JurisdictionLevel::Division
        );
        assert_eq!(
            JurisdictionLevel::from("pourashava".to_string()),
            JurisdictionLevel::Other("pourashava".to_string())
        );
    }

    #[test]
    fn test_missing_children_is_unknown_and_empty_is_known() {
        let unknown: JurisdictionNode =
            serde_json::from_value(json!({"id": "d1", "name": "Dhaka Division", "level": "division"}))
                .unwrap();
        assert_eq!(unknown.children, None);

        let empty: JurisdictionNode = serde_json::from_value(
            json!({"id": "d1", "name": "Dhaka Division", "level": "division", "children": []}),
        )
        .unwrap();
        assert_eq!(empty.children, Some(vec![]));
    }
}
