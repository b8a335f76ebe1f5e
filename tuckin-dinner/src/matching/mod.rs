//! Weekly group formation: partition the waiting pool into groups of three
//! to five, favouring gender balance, shared personality and new faces.

pub mod former;
pub mod history;
pub mod score;
pub mod search;
pub mod sizes;

pub use former::{form_groups, GroupFormer, MatchOutcome, MatchReport};
pub use history::PairHistory;
