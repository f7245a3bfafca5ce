// Reaction state machine - pure, no side effects
use serde::Serialize;

use crate::db::models::ReactionKind;

/// What the acting user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionAction {
    Like,
    Dislike,
    Remove,
}

impl ReactionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionAction::Like => "like",
            ReactionAction::Dislike => "dislike",
            ReactionAction::Remove => "remove",
        }
    }
}

/// How the stored reaction record changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created(ReactionKind),
    Removed(ReactionKind),
    Switched { from: ReactionKind, to: ReactionKind },
}

/// Result of applying an action to one (post, user) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: Option<ReactionKind>,
    pub likes_delta: i64,
    pub dislikes_delta: i64,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("no reaction to remove")]
    NothingToRemove,
}

/// Aggregate counters of a post after a transition committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionCounts {
    pub likes_count: i64,
    pub dislikes_count: i64,
}

impl ReactionCounts {
    pub fn apply(self, transition: &Transition) -> Self {
        Self {
            likes_count: self.likes_count + transition.likes_delta,
            dislikes_count: self.dislikes_count + transition.dislikes_delta,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.likes_count >= 0 && self.dislikes_count >= 0
    }
}

fn delta(kind: ReactionKind, amount: i64) -> (i64, i64) {
    match kind {
        ReactionKind::Like => (amount, 0),
        ReactionKind::Dislike => (0, amount),
    }
}

/// Computes the next state of a pair.
///
/// Pressing the sentiment already held clears it, pressing the other one
/// switches in place, and `Remove` clears whatever is held.
pub fn transition(
    current: Option<ReactionKind>,
    action: ReactionAction,
) -> Result<Transition, TransitionError> {
    let wanted = match action {
        ReactionAction::Like => Some(ReactionKind::Like),
        ReactionAction::Dislike => Some(ReactionKind::Dislike),
        ReactionAction::Remove => None,
    };

    let (next, outcome) = match (current, wanted) {
        (None, None) => return Err(TransitionError::NothingToRemove),
        (None, Some(kind)) => (Some(kind), Outcome::Created(kind)),
        (Some(held), None) => (None, Outcome::Removed(held)),
        (Some(held), Some(kind)) if held == kind => (None, Outcome::Removed(held)),
        (Some(held), Some(kind)) => (
            Some(kind),
            Outcome::Switched {
                from: held,
                to: kind,
            },
        ),
    };

    let (likes_delta, dislikes_delta) = match outcome {
        Outcome::Created(kind) => delta(kind, 1),
        Outcome::Removed(kind) => delta(kind, -1),
        Outcome::Switched { from, to } => {
            let (l1, d1) = delta(from, -1);
            let (l2, d2) = delta(to, 1);
            (l1 + l2, d1 + d2)
        }
    };

    Ok(Transition {
        next,
        likes_delta,
        dislikes_delta,
        outcome,
    })
}

impl Transition {
    /// Message shown to the user for this transition.
    pub fn message(&self, action: ReactionAction) -> &'static str {
        match (action, self.outcome) {
            (ReactionAction::Remove, _) => "Reaction removed",
            (_, Outcome::Created(ReactionKind::Like)) => "Blog liked",
            (_, Outcome::Created(ReactionKind::Dislike)) => "Blog disliked",
            (_, Outcome::Removed(ReactionKind::Like)) => "Like removed",
            (_, Outcome::Removed(ReactionKind::Dislike)) => "Dislike removed",
            (_, Outcome::Switched { to: ReactionKind::Like, .. }) => "Changed to like",
            (_, Outcome::Switched { to: ReactionKind::Dislike, .. }) => "Changed to dislike",
        }
    }
}
