pub mod job;
pub mod list;

pub use job::*;
pub use list::*;
