use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::people::UserRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    OnHold,
    Completed,
}

impl ProjectStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::OnHold => "On Hold",
            Self::Completed => "Completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldReason {
    AwaitingParts,
    AwaitingPayment,
    AwaitingClientDecision,
    InternalQa,
}

impl HoldReason {
    pub fn label(self) -> &'static str {
        match self {
            Self::AwaitingParts => "Awaiting Parts",
            Self::AwaitingPayment => "Awaiting Payment",
            Self::AwaitingClientDecision => "Awaiting Client Decision",
            Self::InternalQa => "Internal QA",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub make: String,
    pub model: String,
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mileage_in: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mileage_out: Option<u32>,
}

impl Vehicle {
    /// Display name used on schedule bars and task lists, e.g. "1969 Ford Mustang".
    pub fn display_name(&self) -> String {
        format!("{} {} {}", self.year, self.make, self.model)
    }
}

/// One restoration job for one customer and vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub customer_name: String,
    pub vehicle: Vehicle,
    pub status: ProjectStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_reason: Option<HoldReason>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promised_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub categories: Vec<Category>,
    /// Newest entry first.
    #[serde(default)]
    pub timeline: Vec<TimelineUpdate>,
    #[serde(default)]
    pub media: Vec<Media>,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub financials: Financials,
}

impl Project {
    pub fn category_mut(&mut self, category_id: &str) -> Option<&mut Category> {
        self.categories
            .iter_mut()
            .find(|category| category.id == category_id)
    }

    pub fn sub_tasks(&self) -> impl Iterator<Item = &SubTask> {
        self.categories
            .iter()
            .flat_map(|category| category.sub_tasks.iter())
    }

    pub fn is_schedulable(&self) -> bool {
        matches!(self.status, ProjectStatus::Active | ProjectStatus::OnHold)
    }

    pub fn push_timeline(&mut self, update: TimelineUpdate) {
        self.timeline.insert(0, update);
    }
}

/// A weighted phase of work within a project. Weights only mean something
/// relative to the sibling categories of the same project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub weight: f64,
    #[serde(default)]
    pub sub_tasks: Vec<SubTask>,
    #[serde(default)]
    pub requires_qa: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl Category {
    pub fn sub_task_mut(&mut self, task_id: &str) -> Option<&mut SubTask> {
        self.sub_tasks.iter_mut().find(|task| task.id == task_id)
    }

    pub fn completed_count(&self) -> usize {
        self.sub_tasks
            .iter()
            .filter(|task| task.status == SubTaskStatus::Completed)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubTaskStatus {
    Pending,
    InProgress,
    AwaitingApproval,
    Completed,
}

impl SubTaskStatus {
    const CYCLE: [Self; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::AwaitingApproval,
        Self::Completed,
    ];

    /// Next status on a manual toggle, wrapping from completed back to pending.
    pub fn next(self) -> Self {
        let index = Self::CYCLE
            .iter()
            .position(|status| *status == self)
            .unwrap_or(0);
        Self::CYCLE[(index + 1) % Self::CYCLE.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Priority {
    /// Lower rank sorts first.
    pub fn rank(self) -> u8 {
        match self {
            Self::Urgent => 1,
            Self::High => 2,
            Self::Normal => 3,
            Self::Low => 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    pub id: String,
    pub name: String,
    pub status: SubTaskStatus,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub requires_client_approval: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_impact: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_impact_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default)]
    pub internal_notes: Vec<InternalNote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technician_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_prompt: Option<String>,
    #[serde(default)]
    pub decision_options: Vec<DecisionOption>,
}

impl SubTask {
    pub fn new(id: impl Into<String>, name: impl Into<String>, priority: Priority) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: SubTaskStatus::Pending,
            priority,
            assigned_to: None,
            requires_client_approval: false,
            estimate_hours: None,
            actual_hours: None,
            price_impact: None,
            eta_impact_days: None,
            start_date: None,
            due_date: None,
            completed_at: None,
            parts: Vec::new(),
            internal_notes: Vec::new(),
            before_image_url: None,
            after_image_url: None,
            technician_notes: None,
            decision_prompt: None,
            decision_options: Vec::new(),
        }
    }

    /// Moves to `status`, stamping `completed_at` on completion and clearing it otherwise.
    pub fn set_status(&mut self, status: SubTaskStatus, now: DateTime<Utc>) {
        self.status = status;
        self.completed_at = match status {
            SubTaskStatus::Completed => Some(now),
            _ => None,
        };
    }

    pub fn advance_status(&mut self, now: DateTime<Utc>) {
        self.set_status(self.status.next(), now);
    }

    pub fn awaits_client(&self) -> bool {
        self.status == SubTaskStatus::AwaitingApproval && self.requires_client_approval
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionOption {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    Instruction,
    Feedback,
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalNote {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub note: String,
    pub kind: NoteKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartStatus {
    Needed,
    Ordered,
    Received,
    Cancelled,
}

impl PartStatus {
    pub fn next(self) -> Self {
        match self {
            Self::Needed => Self::Ordered,
            Self::Ordered => Self::Received,
            Self::Received => Self::Cancelled,
            Self::Cancelled => Self::Needed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub id: String,
    pub task_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    pub qty: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_cost: Option<f64>,
    pub status: PartStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<NaiveDate>,
}

impl Part {
    pub fn line_cost(&self) -> f64 {
        self.unit_cost.unwrap_or(0.0) * f64::from(self.qty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub description: String,
    pub amount: f64,
    pub status: InvoiceStatus,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Financials {
    pub total_quoted: f64,
    pub total_paid: f64,
    #[serde(default)]
    pub invoices: Vec<Invoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineUpdate {
    pub id: String,
    pub date: NaiveDate,
    pub update: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub id: String,
    pub url: String,
    pub caption: String,
    pub category: String,
    #[serde(default)]
    pub is_featured: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    All,
    BossOnly,
    StaffOnly,
}

impl Visibility {
    pub fn allows(self, role: UserRole) -> bool {
        match self {
            Self::All => true,
            Self::BossOnly => role == UserRole::Boss,
            Self::StaffOnly => role != UserRole::Client,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub author: String,
    pub author_role: UserRole,
    pub text: String,
    pub visible_to: Visibility,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{PartStatus, Priority, SubTask, SubTaskStatus, Visibility};
    use crate::models::UserRole;

    #[test]
    fn staff_messages_are_hidden_from_clients() {
        assert!(Visibility::StaffOnly.allows(UserRole::Technician));
        assert!(!Visibility::StaffOnly.allows(UserRole::Client));
        assert!(!Visibility::BossOnly.allows(UserRole::Manager));
        assert!(Visibility::All.allows(UserRole::Client));
    }

    #[test]
    fn status_cycle_wraps_back_to_pending() {
        assert_eq!(SubTaskStatus::Pending.next(), SubTaskStatus::InProgress);
        assert_eq!(
            SubTaskStatus::InProgress.next(),
            SubTaskStatus::AwaitingApproval
        );
        assert_eq!(
            SubTaskStatus::AwaitingApproval.next(),
            SubTaskStatus::Completed
        );
        assert_eq!(SubTaskStatus::Completed.next(), SubTaskStatus::Pending);
    }

    #[test]
    fn completing_a_task_stamps_and_reopening_clears_completed_at() {
        let now = Utc::now();
        let mut task = SubTask::new("bp1", "Media Blasting", Priority::Normal);

        task.set_status(SubTaskStatus::Completed, now);
        assert_eq!(task.completed_at, Some(now));

        task.advance_status(now);
        assert_eq!(task.status, SubTaskStatus::Pending);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn part_status_cycles_through_cancelled() {
        assert_eq!(PartStatus::Received.next(), PartStatus::Cancelled);
        assert_eq!(PartStatus::Cancelled.next(), PartStatus::Needed);
    }

    #[test]
    fn priority_rank_puts_urgent_first() {
        let mut priorities = vec![Priority::Low, Priority::Urgent, Priority::Normal];
        priorities.sort_by_key(|priority| priority.rank());
        assert_eq!(
            priorities,
            vec![Priority::Urgent, Priority::Normal, Priority::Low]
        );
    }
}
