pub mod collector;

pub use collector::{Collector, spawn_collector};
