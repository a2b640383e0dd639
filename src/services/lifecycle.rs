//! Pure lifecycle guards shared by every store implementation.
//!
//! The state machine is uniform across rule versions, ruleset versions,
//! and field versions:
//!
//! ```text
//! DRAFT --submit--> PENDING_APPROVAL --approve--> APPROVED --activate--> ACTIVE
//!                        |                            |                    |
//!                        +--reject--> REJECTED        +--> SUPERSEDED <----+
//! ```
//!
//! REJECTED versions may be resubmitted.

use serde_json::json;

use crate::domain::enums::EntityStatus;
use crate::errors::{Error, Result};

/// Maker-checker separation: the actor who submitted a change can never
/// decide it.
pub fn check_maker_not_checker(maker: &str, checker: &str) -> Result<()> {
    if maker == checker {
        return Err(Error::forbidden(
            "maker cannot approve or reject their own submission",
            json!({ "maker": maker, "checker": checker }),
        ));
    }
    Ok(())
}

/// Guard for submit: only DRAFT and REJECTED versions can be submitted.
pub fn ensure_submittable(status: EntityStatus) -> Result<()> {
    match status {
        EntityStatus::Draft | EntityStatus::Rejected => Ok(()),
        other => Err(Error::invalid_state(
            format!("only DRAFT or REJECTED versions can be submitted (current: {other})"),
            json!({ "status": other.as_str() }),
        )),
    }
}

/// Guard for approve/reject: the version must be awaiting a decision.
pub fn ensure_pending(status: EntityStatus) -> Result<()> {
    if status != EntityStatus::PendingApproval {
        return Err(Error::invalid_state(
            format!("only PENDING_APPROVAL versions can be decided (current: {status})"),
            json!({ "status": status.as_str() }),
        ));
    }
    Ok(())
}

/// Guard for activate: only APPROVED ruleset versions can go ACTIVE.
pub fn ensure_activatable(status: EntityStatus) -> Result<()> {
    if status != EntityStatus::Approved {
        return Err(Error::invalid_state(
            format!("only APPROVED versions can be activated (current: {status})"),
            json!({ "status": status.as_str() }),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maker_checker_separation() {
        assert!(check_maker_not_checker("maker-1", "checker-1").is_ok());

        let err = check_maker_not_checker("maker-1", "maker-1").unwrap_err();
        assert_eq!(err.kind(), "ForbiddenError");
    }

    #[test]
    fn test_submit_guard() {
        assert!(ensure_submittable(EntityStatus::Draft).is_ok());
        assert!(ensure_submittable(EntityStatus::Rejected).is_ok());

        for status in [
            EntityStatus::PendingApproval,
            EntityStatus::Approved,
            EntityStatus::Active,
            EntityStatus::Superseded,
        ] {
            let err = ensure_submittable(status).unwrap_err();
            assert_eq!(err.kind(), "InvalidStateError");
        }
    }

    #[test]
    fn test_decide_guard() {
        assert!(ensure_pending(EntityStatus::PendingApproval).is_ok());
        assert!(ensure_pending(EntityStatus::Draft).is_err());
        assert!(ensure_pending(EntityStatus::Approved).is_err());
    }

    #[test]
    fn test_activate_guard() {
        assert!(ensure_activatable(EntityStatus::Approved).is_ok());
        assert!(ensure_activatable(EntityStatus::Active).is_err());
        assert!(ensure_activatable(EntityStatus::Draft).is_err());
    }
}
