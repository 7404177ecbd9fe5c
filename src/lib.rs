pub mod cache;
pub mod cdc;
pub mod configuration;
pub mod domain;
pub mod errors;
pub mod gateway;
pub mod ledger;
pub mod processor;
pub mod queue;
pub mod shutdown;
pub mod startup;
pub mod telemetry;
