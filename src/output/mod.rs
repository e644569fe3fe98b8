/// Report rendering.
pub mod report;

pub use report::{ActionStats, LoadReport};
