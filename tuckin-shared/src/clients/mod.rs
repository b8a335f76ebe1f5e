pub mod db;
pub mod fcm;
pub mod object_store;
