pub mod hours;
pub mod seeder;

pub use hours::{BusinessHoursProvider, RestaurantProvider};
pub use seeder::RestaurantSeeder;
