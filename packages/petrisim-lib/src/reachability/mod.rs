pub mod algorithms;
pub mod edge;
pub mod event;
pub mod frontier;
pub mod graph;
pub mod node;
pub mod pathfinder;
pub mod result;
pub mod runner;
