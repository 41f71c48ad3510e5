use serde_json::{Value, json};

use crate::client::{SearchParams, ZoteroClient};
use crate::error::{Result, ZoteroError};

impl ZoteroClient {
    pub fn searches(&mut self, params: &SearchParams) -> Result<Value> {
        let path = self.library_path("/searches");
        self.get_json(&path, params)
    }

    /// Create one saved search. `conditions` must already satisfy
    /// [`validate_search_conditions`].
    pub fn create_saved_search(&mut self, name: &str, conditions: &Value) -> Result<Value> {
        validate_search_conditions(conditions)?;
        let path = self.library_path("/searches");
        let body = json!([{"name": name, "conditions": conditions}]);
        self.post_json(&path, &body, None)
    }

    pub fn delete_saved_searches(&mut self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let version = self.ensure_library_version()?;
        let path = self.library_path("/searches");
        self.delete(
            &path,
            vec![("searchKey".to_string(), keys.join(","))],
            version,
        )
    }
}

/// Saved-search conditions are a non-empty array of objects, each holding
/// `condition`, `operator`, and `value`.
pub fn validate_search_conditions(conditions: &Value) -> Result<()> {
    let entries = conditions.as_array().ok_or_else(|| {
        ZoteroError::InvalidInput("conditions must be a JSON array of condition objects".to_string())
    })?;
    if entries.is_empty() {
        return Err(ZoteroError::InvalidInput(
            "conditions array must not be empty".to_string(),
        ));
    }
    for (index, entry) in entries.iter().enumerate() {
        let object = entry.as_object().ok_or_else(|| {
            ZoteroError::InvalidInput(format!("condition at index {index} is not an object"))
        })?;
        for field in ["condition", "operator", "value"] {
            if !object.contains_key(field) {
                return Err(ZoteroError::InvalidInput(format!(
                    "condition at index {index} is missing '{field}'"
                )));
            }
        }
    }
    Ok(())
}
