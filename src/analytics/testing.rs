use chrono::Utc;

use crate::models::{
    Category, Financials, Priority, Project, ProjectStatus, SubTask, SubTaskStatus, Vehicle,
};

pub fn task(id: &str, status: SubTaskStatus) -> SubTask {
    let mut task = SubTask::new(id, format!("Task {id}"), Priority::Normal);
    task.status = status;
    task
}

/// A category with `total` subtasks, the first `completed` of them completed.
pub fn category(id: &str, weight: f64, total: usize, completed: usize) -> Category {
    Category {
        id: id.to_string(),
        name: format!("Category {id}"),
        weight,
        sub_tasks: (0..total)
            .map(|index| {
                let status = if index < completed {
                    SubTaskStatus::Completed
                } else {
                    SubTaskStatus::Pending
                };
                task(&format!("{id}{index}"), status)
            })
            .collect(),
        requires_qa: false,
        owner: None,
    }
}

pub fn project_with(categories: Vec<Category>) -> Project {
    Project {
        id: "mustang-1969-test".to_string(),
        customer_name: "John Smith".to_string(),
        vehicle: Vehicle {
            make: "Ford".to_string(),
            model: "Mustang Mach 1".to_string(),
            year: 1969,
            vin: None,
            color: None,
            mileage_in: None,
            mileage_out: None,
        },
        status: ProjectStatus::Active,
        hold_reason: None,
        created_at: Utc::now(),
        promised_date: None,
        categories,
        timeline: Vec::new(),
        media: Vec::new(),
        messages: Vec::new(),
        financials: Financials::default(),
    }
}
