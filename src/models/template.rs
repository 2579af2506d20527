use serde::{Deserialize, Serialize};

use crate::models::project::{Category, SubTaskStatus};

/// Reusable category layout copied into new projects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectTemplate {
    pub id: String,
    pub name: String,
    pub categories: Vec<Category>,
}

impl ProjectTemplate {
    /// Categories for a fresh project: every subtask pending, with no schedule or logged work.
    pub fn instantiate(&self) -> Vec<Category> {
        self.categories
            .iter()
            .cloned()
            .map(|mut category| {
                for task in &mut category.sub_tasks {
                    task.status = SubTaskStatus::Pending;
                    task.completed_at = None;
                    task.actual_hours = None;
                    task.start_date = None;
                    task.due_date = None;
                    task.assigned_to = None;
                    task.parts.clear();
                    task.internal_notes.clear();
                }
                category
            })
            .collect()
    }
}
