//! Vision-guided shop flow for the star tower agent.
//!
//! The host supplies two boundaries: a [`probe::ProbeGateway`] that answers visual queries
//! against captured frames, and a [`probe::DeviceController`] that captures and clicks.
//! [`shop::run_shop_flow`] drives one shop episode on top of them; [`shop::invoke`] is the
//! boolean surface the host pipeline calls.

pub mod action;
pub mod config;
pub mod error;
pub mod payload;
pub mod priority;
pub mod probe;
pub mod repeat;
pub mod shop;

#[cfg(test)]
mod testing;
