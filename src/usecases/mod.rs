pub mod aggregate;
pub mod cash;
pub mod drift;
pub mod evaluate;
pub mod rebalance;
pub mod run_service;
pub mod snapshot_service;
