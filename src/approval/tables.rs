//! JSON row store used as the mutation target for administrative changes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use crate::approval::types::{ActionKind, ApprovalError, ApprovalResult, ChangeRequest};

/// Performs the actual mutation once a change is allowed through.
#[async_trait]
pub trait ChangeApplier: Send + Sync {
    /// Apply the change and return the affected row.
    async fn apply_change(&self, change: &ChangeRequest) -> ApprovalResult<Value>;
}

/// Tables of JSON rows keyed by string id.
#[derive(Debug, Default)]
pub struct TableStore {
    tables: DashMap<String, BTreeMap<String, Value>>,
}

impl TableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, table: &str, id: &str) -> Option<Value> {
        self.tables.get(table).and_then(|rows| rows.get(id).cloned())
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map(|rows| rows.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ChangeApplier for TableStore {
    async fn apply_change(&self, change: &ChangeRequest) -> ApprovalResult<Value> {
        if change.table.trim().is_empty() {
            return Err(ApprovalError::Invalid("table name is required".into()));
        }

        let mut rows = self.tables.entry(change.table.clone()).or_default();
        match change.action {
            ActionKind::Insert => {
                let mut row = object(change.new_data.clone())?;
                let id = match row.get("id").and_then(Value::as_str) {
                    Some(id) => id.to_string(),
                    None => Uuid::new_v4().to_string(),
                };
                if rows.contains_key(&id) {
                    return Err(ApprovalError::Apply(format!(
                        "row '{}' already exists in '{}'",
                        id, change.table
                    )));
                }
                if let Value::Object(map) = &mut row {
                    map.insert("id".into(), Value::String(id.clone()));
                }
                rows.insert(id, row.clone());
                Ok(row)
            }
            ActionKind::Update => {
                let id = target(change)?;
                let patch = object(change.new_data.clone())?;
                let existing = rows.get_mut(id).ok_or_else(|| missing(change, id))?;
                if let (Value::Object(current), Value::Object(fields)) = (&mut *existing, patch) {
                    for (key, value) in fields {
                        if key != "id" {
                            current.insert(key, value);
                        }
                    }
                }
                Ok(existing.clone())
            }
            ActionKind::Delete => {
                let id = target(change)?;
                rows.remove(id).ok_or_else(|| missing(change, id))
            }
        }
    }
}

fn object(data: Option<Value>) -> ApprovalResult<Value> {
    match data {
        Some(v @ Value::Object(_)) => Ok(v),
        Some(_) => Err(ApprovalError::Invalid("new_data must be a JSON object".into())),
        None => Err(ApprovalError::Invalid("new_data is required".into())),
    }
}

fn target(change: &ChangeRequest) -> ApprovalResult<&str> {
    change
        .target_id
        .as_deref()
        .ok_or_else(|| ApprovalError::Invalid("target_id is required".into()))
}

fn missing(change: &ChangeRequest, id: &str) -> ApprovalError {
    ApprovalError::Apply(format!("row '{}' not found in '{}'", id, change.table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(action: ActionKind, target_id: Option<&str>, new_data: Option<Value>) -> ChangeRequest {
        ChangeRequest {
            table: "campaigns".into(),
            action,
            target_id: target_id.map(String::from),
            old_data: None,
            new_data,
        }
    }

    #[tokio::test]
    async fn test_insert_update_delete() {
        let store = TableStore::new();
        store
            .apply_change(&request(ActionKind::Insert, None, Some(json!({"id": "c1", "title": "Water"}))))
            .await
            .unwrap();

        let updated = store
            .apply_change(&request(ActionKind::Update, Some("c1"), Some(json!({"title": "Clean water"}))))
            .await
            .unwrap();
        assert_eq!(updated["title"], "Clean water");
        assert_eq!(store.get("campaigns", "c1").unwrap()["title"], "Clean water");

        store
            .apply_change(&request(ActionKind::Delete, Some("c1"), None))
            .await
            .unwrap();
        assert_eq!(store.row_count("campaigns"), 0);
    }

    #[tokio::test]
    async fn test_insert_generates_id() {
        let store = TableStore::new();
        let row = store
            .apply_change(&request(ActionKind::Insert, None, Some(json!({"title": "Books"}))))
            .await
            .unwrap();
        let id = row["id"].as_str().unwrap();
        assert!(store.get("campaigns", id).is_some());
    }

    #[tokio::test]
    async fn test_invalid_changes() {
        let store = TableStore::new();
        assert!(matches!(
            store.apply_change(&request(ActionKind::Update, None, Some(json!({})))).await,
            Err(ApprovalError::Invalid(_))
        ));
        assert!(matches!(
            store.apply_change(&request(ActionKind::Delete, Some("nope"), None)).await,
            Err(ApprovalError::Apply(_))
        ));
        assert!(matches!(
            store.apply_change(&request(ActionKind::Insert, None, Some(json!([1, 2])))).await,
            Err(ApprovalError::Invalid(_))
        ));
    }
}
