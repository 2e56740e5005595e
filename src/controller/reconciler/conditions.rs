//! # Conditions
//!
//! Upsert-by-type semantics for status conditions: at most one entry per
//! type, and `lastTransitionTime` only moves when the status flips.

use crate::crd::Condition;
use chrono::{SecondsFormat, Utc};

#[must_use]
pub fn find_status_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Insert or update a condition. Returns `true` if anything changed.
pub fn set_status_condition(conditions: &mut Vec<Condition>, mut new: Condition) -> bool {
    let Some(existing) = conditions.iter_mut().find(|c| c.r#type == new.r#type) else {
        if new.last_transition_time.is_none() {
            new.last_transition_time = Some(now());
        }
        conditions.push(new);
        return true;
    };

    let mut changed = false;
    if existing.status != new.status {
        existing.status = new.status;
        existing.last_transition_time = new.last_transition_time.or_else(|| Some(now()));
        changed = true;
    }
    if existing.reason != new.reason {
        existing.reason = new.reason;
        changed = true;
    }
    if existing.message != new.message {
        existing.message = new.message;
        changed = true;
    }
    changed
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(status: &str, reason: &str) -> Condition {
        Condition {
            r#type: "InvalidName".into(),
            status: status.into(),
            last_transition_time: None,
            reason: Some(reason.into()),
            message: Some(format!("{reason} message")),
        }
    }

    #[test]
    fn test_insert_sets_transition_time() {
        let mut conditions = Vec::new();
        assert!(set_status_condition(&mut conditions, condition("True", "A")));
        assert_eq!(conditions.len(), 1);
        assert!(conditions[0].last_transition_time.is_some());
    }

    #[test]
    fn test_same_status_keeps_transition_time() {
        let mut conditions = vec![Condition {
            last_transition_time: Some("2020-01-01T00:00:00Z".into()),
            ..condition("False", "A")
        }];

        assert!(!set_status_condition(&mut conditions, condition("False", "A")));
        assert!(set_status_condition(&mut conditions, condition("False", "B")));
        assert_eq!(conditions[0].reason.as_deref(), Some("B"));
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2020-01-01T00:00:00Z")
        );

        assert!(set_status_condition(&mut conditions, condition("True", "B")));
        assert_ne!(
            conditions[0].last_transition_time.as_deref(),
            Some("2020-01-01T00:00:00Z")
        );
        assert_eq!(conditions.len(), 1);
    }

    #[test]
    fn test_find() {
        let conditions = vec![condition("True", "A")];
        assert!(find_status_condition(&conditions, "InvalidName").is_some());
        assert!(find_status_condition(&conditions, "Ready").is_none());
    }
}
