use serde_json::{Value, json};

use crate::client::{SearchParams, ZoteroClient};
use crate::error::{Result, ZoteroError};

impl ZoteroClient {
    pub fn collections(&mut self, params: &SearchParams) -> Result<Value> {
        let path = self.library_path("/collections");
        self.get_json(&path, params)
    }

    pub fn collections_top(&mut self, params: &SearchParams) -> Result<Value> {
        let path = self.library_path("/collections/top");
        self.get_json(&path, params)
    }

    pub fn collection(&mut self, key: &str) -> Result<Value> {
        let path = self.library_path(&format!("/collections/{key}"));
        self.get_json(&path, &SearchParams::default())
    }

    /// Direct subcollections of a collection.
    pub fn collections_sub(&mut self, key: &str, params: &SearchParams) -> Result<Value> {
        let path = self.library_path(&format!("/collections/{key}/collections"));
        self.get_json(&path, params)
    }

    /// Full nested subtree under `key`, walking level by level.
    pub fn all_collections_under(&mut self, key: &str) -> Result<Value> {
        let mut queue = vec![key.to_string()];
        let mut collected = Vec::new();
        while let Some(parent) = queue.pop() {
            let children = self.collections_sub(&parent, &SearchParams::default())?;
            if let Some(children) = children.as_array() {
                for child in children {
                    if let Some(child_key) = child.get("key").and_then(Value::as_str) {
                        queue.push(child_key.to_string());
                    }
                    collected.push(child.clone());
                }
            }
        }
        Ok(Value::Array(collected))
    }

    pub fn collection_items(&mut self, key: &str, params: &SearchParams) -> Result<Value> {
        let path = self.library_path(&format!("/collections/{key}/items"));
        self.get_json(&path, params)
    }

    pub fn collection_items_top(&mut self, key: &str, params: &SearchParams) -> Result<Value> {
        let path = self.library_path(&format!("/collections/{key}/items/top"));
        self.get_json(&path, params)
    }

    pub fn collection_tags(&mut self, key: &str, params: &SearchParams) -> Result<Value> {
        let path = self.library_path(&format!("/collections/{key}/tags"));
        self.get_json(&path, params)
    }

    /// Map of collection key to library version.
    pub fn collection_versions(&mut self, params: &SearchParams) -> Result<Value> {
        let path = self.library_path("/collections");
        self.get_json(&path, &params.clone().with_format("versions"))
    }

    pub fn create_collections(&mut self, payloads: Vec<Value>) -> Result<Value> {
        let path = self.library_path("/collections");
        self.post_json(&path, &Value::Array(payloads), None)
    }

    /// Replace a collection's data. `data` must carry `key` and `version`
    /// from a fresh read.
    pub fn update_collection(&mut self, data: &Value) -> Result<()> {
        let key = data
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| ZoteroError::InvalidInput("collection data has no key".to_string()))?
            .to_string();
        let version = data
            .get("version")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                ZoteroError::InvalidInput("collection data has no version".to_string())
            })?;
        let path = self.library_path(&format!("/collections/{key}"));
        self.put_json(&path, data, Some(version))
    }

    pub fn delete_collection(&mut self, key: &str, version: u64) -> Result<()> {
        let path = self.library_path(&format!("/collections/{key}"));
        self.delete(&path, Vec::new(), version)
    }

    /// Build a creation payload in API shape.
    pub fn collection_payload(name: &str, parent: Option<&str>) -> Value {
        match parent {
            Some(parent) => json!({"name": name, "parentCollection": parent}),
            None => json!({"name": name}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_payload_shape() {
        let bare = ZoteroClient::collection_payload("Reading", None);
        assert_eq!(bare, json!({"name": "Reading"}));
        let nested = ZoteroClient::collection_payload("Reading", Some("ABCD2345"));
        assert_eq!(
            nested,
            json!({"name": "Reading", "parentCollection": "ABCD2345"})
        );
    }
}
