pub mod api;
pub mod aws;
pub mod component;
pub mod definition;
pub mod distribution;
pub mod infra;
pub mod orchestrator;
pub mod pipeline;
pub mod profile;
pub mod recipe;
pub mod teardown;

#[cfg(test)]
pub(crate) mod testutil;
