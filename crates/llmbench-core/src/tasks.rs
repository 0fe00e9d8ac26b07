//! Read-only task and collection lookup consumed by fan-out and workers.

use crate::errors::EngineError;
use crate::model::BenchmarkTask;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub trait TaskStore: Send + Sync {
    /// Tasks of a collection in collection order.
    fn list_tasks_in_collection(&self, collection_id: &str) -> Result<Vec<BenchmarkTask>, EngineError>;

    fn get_task(&self, task_id: &str) -> Result<BenchmarkTask, EngineError>;
}

/// A named, ordered list of task ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCollection {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub tasks: Vec<String>,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryTaskStore {
    tasks: HashMap<String, BenchmarkTask>,
    collections: HashMap<String, TaskCollection>,
}

impl InMemoryTaskStore {
    /// Fails if task ids repeat or a collection references an unknown task.
    pub fn new(
        tasks: impl IntoIterator<Item = BenchmarkTask>,
        collections: impl IntoIterator<Item = TaskCollection>,
    ) -> Result<Self, EngineError> {
        let mut store = Self::default();
        for task in tasks {
            if store.tasks.contains_key(&task.id) {
                return Err(EngineError::validation(format!("duplicate task id '{}'", task.id)));
            }
            store.tasks.insert(task.id.clone(), task);
        }
        for collection in collections {
            if let Some(missing) = collection.tasks.iter().find(|t| !store.tasks.contains_key(*t)) {
                return Err(EngineError::validation(format!(
                    "collection '{}' references unknown task '{}'",
                    collection.id, missing
                )));
            }
            store.collections.insert(collection.id.clone(), collection);
        }
        Ok(store)
    }

    pub fn collection_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.collections.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl TaskStore for InMemoryTaskStore {
    fn list_tasks_in_collection(&self, collection_id: &str) -> Result<Vec<BenchmarkTask>, EngineError> {
        let collection = self
            .collections
            .get(collection_id)
            .ok_or_else(|| EngineError::not_found("task collection", collection_id))?;
        collection
            .tasks
            .iter()
            .map(|id| self.get_task(id))
            .collect()
    }

    fn get_task(&self, task_id: &str) -> Result<BenchmarkTask, EngineError> {
        self.tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("task", task_id))
    }
}
