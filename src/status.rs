//! Status condition construction and merging
//!
//! A WorkloadAction carries a single `Ready` condition describing the latest
//! pass. Conditions are keyed by type: a new condition replaces the existing one
//! in place, and `lastTransitionTime` only moves when the status flips.

use chrono::{DateTime, Utc};

use crate::crd::{Condition, ConditionReason, ConditionStatus};

/// Condition type written by every pass
pub const READY: &str = "Ready";

/// Build a `Ready` condition stamped with `now`
pub fn ready_condition(
    status: ConditionStatus,
    reason: ConditionReason,
    message: impl Into<String>,
    now: DateTime<Utc>,
) -> Condition {
    Condition::new(READY, status, reason.as_str(), message, now)
}

/// Merge `condition` into `conditions` by type
///
/// An existing entry of the same type is updated in place, keeping its
/// position and, when the status is unchanged, its transition time. New types
/// are appended.
pub fn merge_condition(conditions: &mut Vec<Condition>, mut condition: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time;
            }
            *existing = condition;
        }
        None => conditions.push(condition),
    }
}
