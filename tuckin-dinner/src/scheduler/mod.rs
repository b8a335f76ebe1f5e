pub mod generate;
pub mod reminders;
pub mod runner;

pub use reminders::{ReminderKind, ReminderOptions, ReminderService};
pub use runner::{spawn_scheduler_loop, Scheduler, TickReport};
