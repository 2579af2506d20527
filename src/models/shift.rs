use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakType {
    Lunch,
    Tea,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Break {
    #[serde(rename = "type")]
    pub kind: BreakType,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

/// One clock-in to clock-out session. A shift without `clock_out_time` is open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shift {
    pub id: String,
    pub user_id: String,
    pub clock_in_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock_out_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub breaks: Vec<Break>,
}

impl Shift {
    pub fn is_open(&self) -> bool {
        self.clock_out_time.is_none()
    }

    /// The trailing break when it has not ended yet.
    pub fn open_break(&self) -> Option<&Break> {
        self.breaks
            .last()
            .filter(|current| current.end_time.is_none())
    }
}
