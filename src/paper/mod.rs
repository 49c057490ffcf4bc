pub mod simulator;
pub mod strategy;
pub mod tracker;
