pub mod backend;
pub mod entry;
pub mod executor;
pub mod manifest;
#[cfg(test)]
mod memory;
pub mod paths;
pub mod planner;
pub mod run;
pub mod signature;
pub mod tree;
