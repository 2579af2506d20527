use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{BreakType, Project, Shift, SubTaskStatus, Technician};

pub const UTILIZATION_CAP: f64 = 100.0;
pub const EFFICIENCY_CAP: f64 = 200.0;

const MILLIS_PER_HOUR: f64 = 60.0 * 60.0 * 1000.0;

/// Worked hours of a shift net of completed breaks. Open shifts count as 0 and
/// open breaks are ignored. Breaks longer than the shift clamp the result at 0.
pub fn shift_net_hours(shift: &Shift) -> f64 {
    let Some(clock_out) = shift.clock_out_time else {
        return 0.0;
    };

    let gross = clock_out - shift.clock_in_time;
    let breaks = shift
        .breaks
        .iter()
        .filter_map(|current| current.end_time.map(|end| end - current.start_time))
        .fold(Duration::zero(), |total, length| total + length);

    let net = gross - breaks;
    if net < Duration::zero() {
        tracing::warn!(shift_id = %shift.id, "breaks exceed shift length, clamping to zero");
        return 0.0;
    }

    net.num_milliseconds() as f64 / MILLIS_PER_HOUR
}

/// Logged task hours as a share of shift hours, capped at 100%.
pub fn utilization(task_hours: f64, shift_hours: f64) -> f64 {
    if shift_hours <= 0.0 {
        return 0.0;
    }

    (task_hours / shift_hours * 100.0).min(UTILIZATION_CAP)
}

/// Estimated hours of completed work as a share of the hours actually spent,
/// capped at 200%. Kept separate from [`utilization`] because the caps differ.
pub fn efficiency(estimated_hours: f64, actual_hours: f64) -> f64 {
    if actual_hours <= 0.0 {
        return 0.0;
    }

    (estimated_hours / actual_hours * 100.0).min(EFFICIENCY_CAP)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    ThisWeek,
    ThisMonth,
    AllTime,
}

impl Period {
    /// Inclusive lower bound of the period. Weeks start on Monday.
    pub fn start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        let first_day = match self {
            Self::ThisWeek => {
                today - Duration::days(i64::from(today.weekday().num_days_from_monday()))
            }
            Self::ThisMonth => today.with_day(1).unwrap_or(today),
            Self::AllTime => return DateTime::<Utc>::UNIX_EPOCH,
        };

        Utc.from_utc_datetime(&first_day.and_time(NaiveTime::MIN))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TechnicianPerformance {
    pub technician_id: String,
    pub user_id: String,
    pub name: String,
    pub tasks_completed: u32,
    pub task_hours: f64,
    pub estimated_hours: f64,
    pub shift_hours: f64,
    pub utilization: f64,
    pub efficiency: f64,
}

#[derive(Default)]
struct Tally {
    tasks_completed: u32,
    task_hours: f64,
    estimated_hours: f64,
    shift_hours: f64,
}

/// Per-technician completed work and shift time since `since`.
///
/// Completed tasks are attributed to their assignee by `completed_at`; shifts
/// are attributed through the technician's `user_id` by clock-in time.
pub fn technician_performance(
    projects: &[Project],
    shifts: &[Shift],
    technicians: &[Technician],
    since: DateTime<Utc>,
) -> Vec<TechnicianPerformance> {
    let mut tallies: HashMap<&str, Tally> = technicians
        .iter()
        .map(|technician| (technician.id.as_str(), Tally::default()))
        .collect();
    let by_user: HashMap<&str, &str> = technicians
        .iter()
        .map(|technician| (technician.user_id.as_str(), technician.id.as_str()))
        .collect();

    for task in projects.iter().flat_map(Project::sub_tasks) {
        if task.status != SubTaskStatus::Completed {
            continue;
        }
        let (Some(completed_at), Some(assignee)) = (task.completed_at, task.assigned_to.as_deref())
        else {
            continue;
        };
        if completed_at < since {
            continue;
        }
        if let Some(tally) = tallies.get_mut(assignee) {
            let actual = task.actual_hours.unwrap_or(0.0);
            tally.tasks_completed += 1;
            tally.task_hours += actual;
            tally.estimated_hours += task.estimate_hours.unwrap_or(actual);
        }
    }

    for shift in shifts.iter().filter(|shift| shift.clock_in_time >= since) {
        let Some(technician_id) = by_user.get(shift.user_id.as_str()) else {
            continue;
        };
        if let Some(tally) = tallies.get_mut(technician_id) {
            tally.shift_hours += shift_net_hours(shift);
        }
    }

    technicians
        .iter()
        .map(|technician| {
            let tally = tallies.remove(technician.id.as_str()).unwrap_or_default();
            TechnicianPerformance {
                technician_id: technician.id.clone(),
                user_id: technician.user_id.clone(),
                name: technician.name.clone(),
                tasks_completed: tally.tasks_completed,
                task_hours: tally.task_hours,
                estimated_hours: tally.estimated_hours,
                shift_hours: tally.shift_hours,
                utilization: utilization(tally.task_hours, tally.shift_hours),
                efficiency: efficiency(tally.estimated_hours, tally.task_hours),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrackingStatus {
    ClockedOut,
    ClockedIn { shift_id: String },
    OnBreak { shift_id: String, break_type: BreakType },
}

/// Clock state of a user, derived from their most recent shift.
pub fn tracking_status(shifts: &[Shift], user_id: &str) -> TrackingStatus {
    let latest = shifts
        .iter()
        .filter(|shift| shift.user_id == user_id)
        .max_by_key(|shift| shift.clock_in_time);

    let Some(shift) = latest.filter(|shift| shift.is_open()) else {
        return TrackingStatus::ClockedOut;
    };

    match shift.open_break() {
        Some(current) => TrackingStatus::OnBreak {
            shift_id: shift.id.clone(),
            break_type: current.kind,
        },
        None => TrackingStatus::ClockedIn {
            shift_id: shift.id.clone(),
        },
    }
}
