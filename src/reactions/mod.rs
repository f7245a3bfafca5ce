pub mod domain;
pub mod repository;

pub use domain::{transition, Outcome, ReactionAction, ReactionCounts, Transition};
pub use repository::{AppliedReaction, ReactionRepository, SqliteReactionRepository};
