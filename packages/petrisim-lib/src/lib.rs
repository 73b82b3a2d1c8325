pub mod config;
pub mod logger;
pub mod marking;
pub mod net;
pub mod reachability;
pub mod simulation;
pub mod utils;
