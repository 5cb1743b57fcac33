//! # Discovery and Command Core for an MQTT Chime
//!
//! `chime-core` is the `no_std` heart of a network-attached chime: a siren that
//! plays tone files, a small text display and optional environment sensors,
//! all exposed to Home Assistant through MQTT discovery.
//!
//! ## Core Features
//!
//! - **`no_std` & `no_alloc`:** every topic, payload and queue is a fixed
//!   capacity `heapless` buffer.
//! - **Idempotent discovery:** each entity's retained discovery message is
//!   published until the broker accepts it, then never again.
//! - **Reentrancy-safe commands:** inbound messages are only queued inside the
//!   broker's delivery callback and executed afterwards from the main loop.
//! - **Self-healing connectivity:** network and broker sessions are retried
//!   with fixed cooldowns, and the board is restarted after too many
//!   consecutive failures.
//! - **Hardware agnostic:** the network, broker, board and actuators are traits,
//!   using native `async fn` where they perform I/O.
//!
//! ## Usage
//!
//! ```ignore
//! let registry = chime_registry(DEVICE_ID, &["alarm.mp3", "doorbell.wav"], true)?;
//! let config = DeviceConfig::new(identity, credentials, BrokerOptions::new(BROKER_HOST));
//! let mut chime = Chime::new(config, registry, wifi, mqtt, delay, board);
//!
//! let mut devices = DeviceContext {
//!     siren: &mut player,
//!     display: &mut oled,
//!     status_light: &mut pixel,
//!     sensor: Some(&mut bme280),
//! };
//! let err = chime.run(&mut devices).await;
//! ```
//!
//! ## Logging
//!
//! Enable either the `log` or the `defmt` feature to route the crate's log
//! output; without either, logging compiles away.

#![cfg_attr(not(test), no_std)]

// Must stay first so the logging macros are visible in every module.
#[macro_use]
mod fmt;

pub mod config;
pub mod device;
pub mod discovery;
pub mod error;
pub mod runtime;

#[cfg(test)]
mod testing;

// Re-export key types for easier access at the crate root.
pub use config::{BrokerOptions, DeviceConfig, DeviceIdentity, NetworkCredentials, RetryPolicy};
pub use device::{Chime, chime_registry};
pub use discovery::{Registry, publish_discovery};
pub use error::{CommandError, DriverError, Error};
pub use runtime::{Board, Broker, DeviceContext, Network, QoS};
