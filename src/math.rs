pub mod running;
pub mod stats;
