use std::collections::HashMap;

use serde::Serialize;

use crate::models::{Project, Technician};

/// Workshop labor rate in ZAR per hour, applied to every logged hour.
pub const WORKSHOP_HOURLY_RATE: f64 = 450.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectCosts {
    pub labor_hours: f64,
    pub labor_cost: f64,
    pub parts_cost: f64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Profitability {
    pub net_profit: f64,
    pub margin: f64,
}

pub fn labor_hours(project: &Project) -> f64 {
    project
        .sub_tasks()
        .map(|task| task.actual_hours.unwrap_or(0.0))
        .sum()
}

pub fn parts_cost(project: &Project) -> f64 {
    project
        .sub_tasks()
        .flat_map(|task| task.parts.iter())
        .map(|part| part.line_cost())
        .sum()
}

/// Labor and parts roll-up. Labor is priced at a single workshop rate for
/// every technician; see [`labor_cost_at_technician_rates`] for the per-rate figure.
pub fn project_costs(project: &Project, hourly_rate: f64) -> ProjectCosts {
    let labor_hours = labor_hours(project);
    let labor_cost = labor_hours * hourly_rate;
    let parts_cost = parts_cost(project);

    ProjectCosts {
        labor_hours,
        labor_cost,
        parts_cost,
        total_cost: labor_cost + parts_cost,
    }
}

pub fn profitability(project: &Project, costs: &ProjectCosts) -> Profitability {
    let total_quoted = project.financials.total_quoted;
    let net_profit = total_quoted - costs.total_cost;
    let margin = if total_quoted > 0.0 {
        net_profit / total_quoted * 100.0
    } else {
        0.0
    };

    Profitability { net_profit, margin }
}

pub fn project_profitability(project: &Project, hourly_rate: f64) -> Profitability {
    profitability(project, &project_costs(project, hourly_rate))
}

/// Labor cost with each subtask's hours priced at its assignee's own rate.
/// Unassigned work, unknown technicians and technicians without a rate fall
/// back to `fallback_rate`.
pub fn labor_cost_at_technician_rates(
    project: &Project,
    technicians: &[Technician],
    fallback_rate: f64,
) -> f64 {
    let rates: HashMap<&str, f64> = technicians
        .iter()
        .filter_map(|technician| {
            technician
                .hourly_rate
                .map(|rate| (technician.id.as_str(), rate))
        })
        .collect();

    project
        .sub_tasks()
        .map(|task| {
            let rate = task
                .assigned_to
                .as_deref()
                .and_then(|technician_id| rates.get(technician_id).copied())
                .unwrap_or(fallback_rate);
            task.actual_hours.unwrap_or(0.0) * rate
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use crate::analytics::costs::{
        labor_cost_at_technician_rates, project_costs, project_profitability,
        WORKSHOP_HOURLY_RATE,
    };
    use crate::analytics::testing::{category, project_with, task};
    use crate::models::{Part, PartStatus, SubTaskStatus, Technician};

    #[test]
    fn quoted_job_with_ten_logged_hours() {
        let mut project = project_with(vec![category("bp", 100.0, 0, 0)]);
        let mut logged = task("bp1", SubTaskStatus::Completed);
        logged.actual_hours = Some(10.0);
        project.categories[0].sub_tasks.push(logged);
        project.financials.total_quoted = 75_000.0;
        project.financials.total_paid = 37_500.0;

        let costs = project_costs(&project, WORKSHOP_HOURLY_RATE);
        assert_eq!(costs.labor_cost, 4_500.0);
        assert_eq!(costs.parts_cost, 0.0);
        assert_eq!(costs.total_cost, 4_500.0);

        let profit = project_profitability(&project, WORKSHOP_HOURLY_RATE);
        assert_eq!(profit.net_profit, 70_500.0);
        assert!((profit.margin - 94.0).abs() < 1e-9);
    }

    #[test]
    fn parts_without_unit_cost_are_free() {
        let mut project = project_with(vec![category("en", 100.0, 0, 0)]);
        let mut assembly = task("en3", SubTaskStatus::InProgress);
        assembly.parts = vec![
            Part {
                id: "part-1".to_string(),
                task_id: "en3".to_string(),
                name: "Piston Ring Set".to_string(),
                part_number: None,
                supplier: None,
                qty: 2,
                unit_cost: Some(1_200.0),
                status: PartStatus::Received,
                eta: None,
            },
            Part {
                id: "part-2".to_string(),
                task_id: "en3".to_string(),
                name: "Oil Pump".to_string(),
                part_number: None,
                supplier: None,
                qty: 1,
                unit_cost: None,
                status: PartStatus::Ordered,
                eta: None,
            },
        ];
        project.categories[0].sub_tasks.push(assembly);

        let costs = project_costs(&project, WORKSHOP_HOURLY_RATE);
        assert_eq!(costs.parts_cost, 2_400.0);
        assert_eq!(costs.total_cost, 2_400.0);
    }

    #[test]
    fn margin_is_zero_without_a_quote() {
        let mut project = project_with(vec![category("bp", 100.0, 1, 1)]);
        project.categories[0].sub_tasks[0].actual_hours = Some(40.0);
        project.financials.total_quoted = 0.0;

        let profit = project_profitability(&project, WORKSHOP_HOURLY_RATE);
        assert_eq!(profit.margin, 0.0);
        assert_eq!(profit.net_profit, -18_000.0);
    }

    #[test]
    fn labor_cost_grows_with_logged_hours() {
        let mut project = project_with(vec![category("bp", 100.0, 2, 0)]);
        let mut previous = project_costs(&project, WORKSHOP_HOURLY_RATE).labor_cost;

        for hours in [0.5, 3.0, 3.0, 12.25] {
            project.categories[0].sub_tasks[1].actual_hours = Some(hours);
            let current = project_costs(&project, WORKSHOP_HOURLY_RATE).labor_cost;
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn technician_rates_price_each_assignee_separately() {
        let mut project = project_with(vec![category("bp", 100.0, 2, 2)]);
        project.categories[0].sub_tasks[0].actual_hours = Some(10.0);
        project.categories[0].sub_tasks[0].assigned_to = Some("tech-dean".to_string());
        project.categories[0].sub_tasks[1].actual_hours = Some(2.0);

        let technicians = vec![Technician {
            id: "tech-dean".to_string(),
            name: "Dean".to_string(),
            user_id: "user-tech-dean".to_string(),
            hourly_rate: Some(220.0),
        }];

        let cost = labor_cost_at_technician_rates(&project, &technicians, WORKSHOP_HOURLY_RATE);
        assert_eq!(cost, 10.0 * 220.0 + 2.0 * WORKSHOP_HOURLY_RATE);
    }
}
