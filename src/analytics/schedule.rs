use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::models::{Priority, Project, SubTaskStatus, Technician};

pub const DEFAULT_WINDOW_DAYS: u32 = 31;
pub const MAX_WINDOW_DAYS: u32 = 366;
pub const DAILY_CAPACITY_HOURS: f64 = 8.0;

/// Share of daily capacity above which a cell counts as near capacity.
const NEAR_CAPACITY_RATIO: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadBand {
    Normal,
    NearCapacity,
    OverCapacity,
}

pub fn classify(hours: f64, daily_capacity: f64) -> WorkloadBand {
    if hours > daily_capacity {
        WorkloadBand::OverCapacity
    } else if hours > daily_capacity * NEAR_CAPACITY_RATIO {
        WorkloadBand::NearCapacity
    } else {
        WorkloadBand::Normal
    }
}

/// Inclusive day count of a start/due window, or `None` when due precedes start.
pub fn span_days(start: NaiveDate, due: NaiveDate) -> Option<i64> {
    let days = (due - start).num_days() + 1;
    (days > 0).then_some(days)
}

#[derive(Debug, Clone, Copy)]
pub struct ScheduleWindow {
    start: NaiveDate,
    end: NaiveDate,
    days: u32,
}

impl ScheduleWindow {
    /// `None` when `days` is zero or the window would run past the last
    /// representable date.
    pub fn new(start: NaiveDate, days: u32) -> Option<Self> {
        let last_offset = days.checked_sub(1)?;
        let end = start.checked_add_signed(Duration::days(i64::from(last_offset)))?;
        Some(Self { start, end, days })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take(self.days as usize)
    }

    fn offset(&self, date: NaiveDate) -> i64 {
        (date - self.start).num_days()
    }
}

/// Hours of estimated work per (technician, day) in the window.
///
/// Each scheduled subtask spreads its estimate evenly over its inclusive
/// start/due span; only the days that fall inside the window are counted.
#[derive(Debug, Clone, Default)]
pub struct WorkloadMap {
    hours: HashMap<(String, NaiveDate), f64>,
}

impl WorkloadMap {
    pub fn build(projects: &[Project], window: &ScheduleWindow) -> Self {
        let mut hours: HashMap<(String, NaiveDate), f64> = HashMap::new();

        for task in projects.iter().flat_map(Project::sub_tasks) {
            let (Some(start), Some(due), Some(assignee)) =
                (task.start_date, task.due_date, task.assigned_to.as_ref())
            else {
                continue;
            };
            let Some(days) = span_days(start, due) else {
                continue;
            };

            let daily_share = task.estimate_hours.unwrap_or(0.0) / days as f64;
            for date in window.dates().filter(|date| *date >= start && *date <= due) {
                *hours.entry((assignee.clone(), date)).or_insert(0.0) += daily_share;
            }
        }

        Self { hours }
    }

    pub fn hours(&self, technician_id: &str, date: NaiveDate) -> f64 {
        self.hours
            .get(&(technician_id.to_string(), date))
            .copied()
            .unwrap_or(0.0)
    }

    /// Highest daily load of a technician across `dates`.
    pub fn peak(&self, technician_id: &str, dates: impl Iterator<Item = NaiveDate>) -> f64 {
        dates
            .map(|date| self.hours(technician_id, date))
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleCell {
    pub date: NaiveDate,
    pub hours: f64,
    pub band: WorkloadBand,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleRow {
    pub technician_id: String,
    pub name: String,
    pub cells: Vec<ScheduleCell>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduledBar {
    pub project_id: String,
    pub project_name: String,
    pub category_name: String,
    pub task_id: String,
    pub task_name: String,
    pub technician_id: String,
    pub start_offset: i64,
    pub duration: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleGrid {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub daily_capacity: f64,
    pub days: Vec<NaiveDate>,
    pub rows: Vec<ScheduleRow>,
    pub bars: Vec<ScheduledBar>,
}

pub fn schedule_grid(
    projects: &[Project],
    technicians: &[Technician],
    window: &ScheduleWindow,
    daily_capacity: f64,
) -> ScheduleGrid {
    let workload = WorkloadMap::build(projects, window);
    let days: Vec<NaiveDate> = window.dates().collect();

    let rows = technicians
        .iter()
        .map(|technician| ScheduleRow {
            technician_id: technician.id.clone(),
            name: technician.name.clone(),
            cells: days
                .iter()
                .map(|date| {
                    let hours = workload.hours(&technician.id, *date);
                    ScheduleCell {
                        date: *date,
                        hours,
                        band: classify(hours, daily_capacity),
                    }
                })
                .collect(),
        })
        .collect();

    ScheduleGrid {
        start: window.start(),
        end: window.end(),
        daily_capacity,
        days,
        rows,
        bars: scheduled_bars(projects, technicians, window),
    }
}

/// Task bars that start inside the window for known technicians, with the
/// duration clipped to the window's end.
fn scheduled_bars(
    projects: &[Project],
    technicians: &[Technician],
    window: &ScheduleWindow,
) -> Vec<ScheduledBar> {
    let mut bars = Vec::new();
    let total_days = i64::from(window.days);

    for project in projects {
        for category in &project.categories {
            for task in &category.sub_tasks {
                let (Some(start), Some(due), Some(assignee)) =
                    (task.start_date, task.due_date, task.assigned_to.as_ref())
                else {
                    continue;
                };
                if !technicians.iter().any(|technician| &technician.id == assignee) {
                    continue;
                }
                let Some(duration) = span_days(start, due) else {
                    continue;
                };
                let start_offset = window.offset(start);
                if start_offset < 0 || start_offset >= total_days {
                    continue;
                }

                bars.push(ScheduledBar {
                    project_id: project.id.clone(),
                    project_name: project.vehicle.display_name(),
                    category_name: category.name.clone(),
                    task_id: task.id.clone(),
                    task_name: task.name.clone(),
                    technician_id: assignee.clone(),
                    start_offset,
                    duration: duration.min(total_days - start_offset),
                });
            }
        }
    }

    bars
}

#[derive(Debug, Clone, Serialize)]
pub struct UnscheduledTask {
    pub project_id: String,
    pub project_name: String,
    pub category_id: String,
    pub task_id: String,
    pub task_name: String,
    pub priority: Priority,
    pub estimate_hours: Option<f64>,
    pub assigned_to: Option<String>,
}

/// Pending subtasks without a start date in active or on-hold projects, most urgent first.
pub fn unscheduled_tasks(projects: &[Project]) -> Vec<UnscheduledTask> {
    let mut tasks: Vec<UnscheduledTask> = projects
        .iter()
        .filter(|project| project.is_schedulable())
        .flat_map(|project| {
            project.categories.iter().flat_map(move |category| {
                category
                    .sub_tasks
                    .iter()
                    .filter(|task| task.status == SubTaskStatus::Pending && task.start_date.is_none())
                    .map(move |task| UnscheduledTask {
                        project_id: project.id.clone(),
                        project_name: project.vehicle.display_name(),
                        category_id: category.id.clone(),
                        task_id: task.id.clone(),
                        task_name: task.name.clone(),
                        priority: task.priority,
                        estimate_hours: task.estimate_hours,
                        assigned_to: task.assigned_to.clone(),
                    })
            })
        })
        .collect();

    tasks.sort_by_key(|task| task.priority.rank());
    tasks
}
