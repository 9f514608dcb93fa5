pub mod certs;
pub mod cli;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod matrix;
pub mod metrics;
pub mod ports;
pub mod process;
pub mod provider;
pub mod report;
pub mod results;
pub mod runner;
pub mod scenario;
