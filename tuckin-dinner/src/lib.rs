//! Weekly dinner-cycle coordination: group formation, restaurant voting,
//! event confirmation, peer rating and the scheduler that drives them.

pub mod calendar;
pub mod config;
pub mod dining;
pub mod domain;
pub mod matching;
pub mod models;
pub mod notifier;
pub mod random;
pub mod rating;
pub mod restaurants;
pub mod routes;
pub mod scheduler;
pub mod schema;
pub mod state;
pub mod store;
pub mod voting;

#[cfg(test)]
mod testing;
