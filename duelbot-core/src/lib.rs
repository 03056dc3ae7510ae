#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod commands;
pub mod config;
pub mod entities;
pub mod events;
pub mod framework;
pub mod gateways;
pub mod processors;

#[cfg(test)]
pub(crate) mod test_support;
