use serde_json::Value;

use crate::client::{SearchParams, ZoteroClient};
use crate::error::Result;

impl ZoteroClient {
    /// Groups the configured key can access.
    pub fn groups(&mut self, params: &SearchParams) -> Result<Value> {
        let path = self.library_path("/groups");
        self.get_json(&path, params)
    }
}
