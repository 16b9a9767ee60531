pub mod area;
pub mod monitor;
pub mod station;
pub mod tasks;
