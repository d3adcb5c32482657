#![cfg_attr(docsrs, feature(doc_cfg))]
//! # toshiba_ac_lib
//!
//! This crate speaks the wired serial protocol of Toshiba split air conditioners,
//! the one normally used by the vendor Wi-Fi module on the indoor unit.
//!
//! The [`engine::Engine`] is transport agnostic and never sleeps: it is driven by
//! the caller with the current time, received bytes and control requests, and
//! reports state changes through a [`engine::StateObserver`].
//!
//! ## Features
//!
//! - `default`: Enables `bin-dependencies`, which is intended for compiling the
//!   `toshiba-ac` command-line tool and pulls in `serialport` and `serde`.
//!
//! ### Client Features
//! - `serialport`: Enables the **synchronous** client using the `serialport` crate.
//!
//! ### Utility Features
//! - `serde`: Enables `serde` support for serializing/deserializing data structures.
//! - `bin-dependencies`: Enables all features required by the `toshiba-ac` binary.

/// Optional capabilities of the connected unit.
pub mod config;
/// Protocol engine: decoding, control and start-up.
pub mod engine;
/// Contains error types for the library.
mod error;
/// Frame codec and command encoder.
pub mod protocol;
/// Half-duplex command pacing.
pub mod scheduler;
/// Attribute values and the climate state.
pub mod state;
/// Byte transport abstraction.
pub mod transport;

pub use error::Error;

/// Synchronous client on top of a serial port.
#[cfg_attr(docsrs, doc(cfg(feature = "serialport")))]
#[cfg(feature = "serialport")]
pub mod serialport;
