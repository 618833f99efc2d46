//! Status transitions for borrow requests, skill requests and help requests,
//! plus the trust score average.
//!
//! Everything here is pure: repositories load the current row under a lock,
//! ask this module whether the caller may move it, and write the result in
//! the same transaction.

use thiserror::Error;
use uuid::Uuid;

text_enum! {
    /// Status shared by borrow requests and skill requests
    pub enum RequestStatus {
        Pending => "pending",
        Accepted => "accepted",
        Declined => "declined",
        Cancelled => "cancelled",
        Completed => "completed",
    }
}

text_enum! {
    /// Status of a help request
    pub enum HelpStatus {
        Open => "open",
        InProgress => "in_progress",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

/// What a participant wants to do with a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Accept,
    Decline,
    Cancel,
    Complete,
}

/// What a user wants to do with a help request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpAction {
    Offer,
    Complete,
    Cancel,
}

/// Side of a two-party request. The owner holds the resource or skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Owner,
    Requester,
}

impl Party {
    /// Which side `user_id` is on, if any
    pub fn of(user_id: Uuid, owner_id: Uuid, requester_id: Uuid) -> Option<Party> {
        if user_id == owner_id {
            Some(Party::Owner)
        } else if user_id == requester_id {
            Some(Party::Requester)
        } else {
            None
        }
    }

    /// The user on the other side
    pub fn counterpart(self, owner_id: Uuid, requester_id: Uuid) -> Uuid {
        match self {
            Party::Owner => requester_id,
            Party::Requester => owner_id,
        }
    }
}

/// A refused transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    /// The caller's side may not perform this action
    #[error("Only the {required} can {action} this request")]
    NotPermitted {
        action: &'static str,
        required: &'static str,
    },

    /// The request is in a state the action does not start from
    #[error("Cannot {action} a request that is {status}")]
    InvalidState {
        action: &'static str,
        status: &'static str,
    },
}

impl RequestAction {
    fn verb(self) -> &'static str {
        match self {
            RequestAction::Accept => "accept",
            RequestAction::Decline => "decline",
            RequestAction::Cancel => "cancel",
            RequestAction::Complete => "complete",
        }
    }
}

impl RequestStatus {
    /// Apply `action` performed by `party`.
    ///
    /// pending -> accepted | declined (owner), pending -> cancelled
    /// (requester), accepted -> completed (either side).
    pub fn apply(self, action: RequestAction, party: Party) -> Result<RequestStatus, TransitionError> {
        let required = match action {
            RequestAction::Accept | RequestAction::Decline => Some((Party::Owner, "owner")),
            RequestAction::Cancel => Some((Party::Requester, "requester")),
            RequestAction::Complete => None,
        };

        if let Some((side, name)) = required {
            if side != party {
                return Err(TransitionError::NotPermitted {
                    action: action.verb(),
                    required: name,
                });
            }
        }

        match (self, action) {
            (RequestStatus::Pending, RequestAction::Accept) => Ok(RequestStatus::Accepted),
            (RequestStatus::Pending, RequestAction::Decline) => Ok(RequestStatus::Declined),
            (RequestStatus::Pending, RequestAction::Cancel) => Ok(RequestStatus::Cancelled),
            (RequestStatus::Accepted, RequestAction::Complete) => Ok(RequestStatus::Completed),
            (status, action) => Err(TransitionError::InvalidState {
                action: action.verb(),
                status: status.as_str(),
            }),
        }
    }
}

impl HelpStatus {
    /// Apply `action` performed by a user; `is_requester` is whether that user
    /// posted the help request.
    pub fn apply(self, action: HelpAction, is_requester: bool) -> Result<HelpStatus, TransitionError> {
        let verb = match action {
            HelpAction::Offer => "offer help on",
            HelpAction::Complete => "complete",
            HelpAction::Cancel => "cancel",
        };

        match action {
            HelpAction::Offer if is_requester => {
                return Err(TransitionError::NotPermitted {
                    action: verb,
                    required: "other members",
                });
            }
            HelpAction::Complete | HelpAction::Cancel if !is_requester => {
                return Err(TransitionError::NotPermitted {
                    action: verb,
                    required: "requester",
                });
            }
            _ => {}
        }

        match (self, action) {
            (HelpStatus::Open, HelpAction::Offer) => Ok(HelpStatus::InProgress),
            (HelpStatus::InProgress, HelpAction::Complete) => Ok(HelpStatus::Completed),
            (HelpStatus::Open | HelpStatus::InProgress, HelpAction::Cancel) => {
                Ok(HelpStatus::Cancelled)
            }
            (status, _) => Err(TransitionError::InvalidState {
                action: verb,
                status: status.as_str(),
            }),
        }
    }
}

/// Trust score after one more rating.
///
/// With no previous reviews the rating replaces the default score. The
/// result is rounded to two decimals.
pub fn next_trust_score(current: f64, total_reviews: i32, rating: i16) -> f64 {
    let rating = f64::from(rating);
    let average = if total_reviews <= 0 {
        rating
    } else {
        let n = f64::from(total_reviews);
        (current * n + rating) / (n + 1.0)
    };

    (average * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_accepts_pending() {
        assert_eq!(
            RequestStatus::Pending.apply(RequestAction::Accept, Party::Owner),
            Ok(RequestStatus::Accepted)
        );
        assert_eq!(
            RequestStatus::Pending.apply(RequestAction::Decline, Party::Owner),
            Ok(RequestStatus::Declined)
        );
    }

    #[test]
    fn test_requester_cannot_accept_own_request() {
        assert_eq!(
            RequestStatus::Pending.apply(RequestAction::Accept, Party::Requester),
            Err(TransitionError::NotPermitted {
                action: "accept",
                required: "owner",
            })
        );
    }

    #[test]
    fn test_only_requester_cancels() {
        assert_eq!(
            RequestStatus::Pending.apply(RequestAction::Cancel, Party::Requester),
            Ok(RequestStatus::Cancelled)
        );
        assert!(
            RequestStatus::Pending
                .apply(RequestAction::Cancel, Party::Owner)
                .is_err()
        );
    }

    #[test]
    fn test_either_party_completes_accepted() {
        for party in [Party::Owner, Party::Requester] {
            assert_eq!(
                RequestStatus::Accepted.apply(RequestAction::Complete, party),
                Ok(RequestStatus::Completed)
            );
        }
    }

    #[test]
    fn test_cannot_complete_pending_or_reaccept() {
        let err = RequestStatus::Pending
            .apply(RequestAction::Complete, Party::Owner)
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot complete a request that is pending");

        assert!(
            RequestStatus::Accepted
                .apply(RequestAction::Accept, Party::Owner)
                .is_err()
        );
        assert!(
            RequestStatus::Completed
                .apply(RequestAction::Complete, Party::Requester)
                .is_err()
        );
    }

    #[test]
    fn test_party_resolution() {
        let owner = Uuid::new_v4();
        let requester = Uuid::new_v4();

        assert_eq!(Party::of(owner, owner, requester), Some(Party::Owner));
        assert_eq!(Party::of(requester, owner, requester), Some(Party::Requester));
        assert_eq!(Party::of(Uuid::new_v4(), owner, requester), None);
        assert_eq!(Party::Owner.counterpart(owner, requester), requester);
        assert_eq!(Party::Requester.counterpart(owner, requester), owner);
    }

    #[test]
    fn test_help_request_flow() {
        let status = HelpStatus::Open.apply(HelpAction::Offer, false).unwrap();
        assert_eq!(status, HelpStatus::InProgress);

        let status = status.apply(HelpAction::Complete, true).unwrap();
        assert_eq!(status, HelpStatus::Completed);

        assert!(status.apply(HelpAction::Cancel, true).is_err());
    }

    #[test]
    fn test_help_request_roles() {
        assert!(HelpStatus::Open.apply(HelpAction::Offer, true).is_err());
        assert!(HelpStatus::InProgress.apply(HelpAction::Complete, false).is_err());
        assert!(HelpStatus::InProgress.apply(HelpAction::Offer, false).is_err());
        assert_eq!(
            HelpStatus::InProgress.apply(HelpAction::Cancel, true),
            Ok(HelpStatus::Cancelled)
        );
    }

    #[test]
    fn test_first_review_replaces_default_score() {
        assert_eq!(next_trust_score(5.0, 0, 3), 3.0);
    }

    #[test]
    fn test_running_average() {
        assert_eq!(next_trust_score(4.0, 1, 2), 3.0);
        assert_eq!(next_trust_score(3.0, 2, 5), 3.67);
        assert_eq!(next_trust_score(5.0, 9, 5), 5.0);
    }

    #[test]
    fn test_negative_count_is_treated_as_empty() {
        assert_eq!(next_trust_score(5.0, -1, 4), 4.0);
    }

    #[test]
    fn test_status_text_round_trip() {
        assert_eq!(HelpStatus::InProgress.as_str(), "in_progress");
        assert_eq!("in_progress".parse::<HelpStatus>(), Ok(HelpStatus::InProgress));
        assert!("done".parse::<RequestStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&RequestStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
    }
}
