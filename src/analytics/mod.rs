//! Pure aggregation over the entity model: progress, costs, shift time and scheduling load.

pub mod costs;
pub mod kpi;
pub mod progress;
pub mod schedule;
pub mod time;

#[cfg(test)]
pub(crate) mod testing;
