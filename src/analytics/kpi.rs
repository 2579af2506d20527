use serde::Serialize;

use crate::analytics::costs::project_profitability;
use crate::analytics::time::{shift_net_hours, utilization};
use crate::models::{Project, ProjectStatus, Shift};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WorkshopKpis {
    pub utilization: f64,
    pub on_time_delivery_rate: f64,
    pub average_margin: f64,
    pub active_projects: usize,
    pub completed_projects: usize,
}

pub fn workshop_kpis(projects: &[Project], shifts: &[Shift], hourly_rate: f64) -> WorkshopKpis {
    let shift_hours: f64 = shifts.iter().map(shift_net_hours).sum();
    let task_hours: f64 = projects
        .iter()
        .flat_map(Project::sub_tasks)
        .map(|task| task.actual_hours.unwrap_or(0.0))
        .sum();

    let completed: Vec<&Project> = projects
        .iter()
        .filter(|project| project.status == ProjectStatus::Completed)
        .collect();
    let on_time = completed
        .iter()
        .filter(|project| delivered_on_time(project))
        .count();
    let on_time_delivery_rate = if completed.is_empty() {
        100.0
    } else {
        on_time as f64 / completed.len() as f64 * 100.0
    };

    let active: Vec<&Project> = projects
        .iter()
        .filter(|project| project.status == ProjectStatus::Active)
        .collect();
    let average_margin = if active.is_empty() {
        0.0
    } else {
        active
            .iter()
            .map(|project| project_profitability(project, hourly_rate).margin)
            .sum::<f64>()
            / active.len() as f64
    };

    WorkshopKpis {
        utilization: utilization(task_hours, shift_hours),
        on_time_delivery_rate,
        average_margin,
        active_projects: active.len(),
        completed_projects: completed.len(),
    }
}

/// A project is on time when it has a promised date and every subtask was
/// completed on or before it.
fn delivered_on_time(project: &Project) -> bool {
    let Some(promised) = project.promised_date else {
        return false;
    };

    project
        .sub_tasks()
        .all(|task| task.completed_at.is_some_and(|completed| completed <= promised))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::analytics::costs::WORKSHOP_HOURLY_RATE;
    use crate::analytics::kpi::workshop_kpis;
    use crate::analytics::testing::{category, project_with};
    use crate::models::ProjectStatus;

    #[test]
    fn empty_workshop_reports_full_delivery_and_no_margin() {
        let kpis = workshop_kpis(&[], &[], WORKSHOP_HOURLY_RATE);
        assert_eq!(kpis.utilization, 0.0);
        assert_eq!(kpis.on_time_delivery_rate, 100.0);
        assert_eq!(kpis.average_margin, 0.0);
    }

    #[test]
    fn late_completion_counts_against_delivery_rate() {
        let now = Utc::now();

        let mut on_time = project_with(vec![category("fa", 100.0, 1, 1)]);
        on_time.status = ProjectStatus::Completed;
        on_time.promised_date = Some(now);
        on_time.categories[0].sub_tasks[0].completed_at = Some(now - Duration::days(2));

        let mut late = on_time.clone();
        late.id = "late".to_string();
        late.categories[0].sub_tasks[0].completed_at = Some(now + Duration::days(2));

        let mut active = project_with(vec![category("bp", 100.0, 1, 0)]);
        active.financials.total_quoted = 10_000.0;

        let kpis = workshop_kpis(&[on_time, late, active], &[], WORKSHOP_HOURLY_RATE);
        assert_eq!(kpis.on_time_delivery_rate, 50.0);
        assert_eq!(kpis.average_margin, 100.0);
        assert_eq!(kpis.active_projects, 1);
        assert_eq!(kpis.completed_projects, 2);
    }
}
