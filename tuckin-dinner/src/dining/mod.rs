pub mod archive;
pub mod lifecycle;
pub mod lock;

pub use archive::{Archiver, ObjectStore};
pub use lifecycle::EventLifecycle;
