//! Host-stack abstraction layer for the LE Audio broadcast sink
//!
//! This crate provides the trait-based boundary between the broadcast sink
//! core and the Bluetooth host stack it runs on, enabling development and
//! testing without a radio.
//!
//! # Architecture Layers
//!
//! ```text
//! Application Layer (sink-emulator, target firmware)
//!         ↓
//! Broadcast sink core (bluetooth crate)
//!         ↓
//! Platform layer (this crate - host traits + LE Audio types)
//!         ↓
//! Bluetooth host stack + controller
//! ```
//!
//! # Contents
//!
//! - [`BapHost`] - calls the sink makes into the host stack
//! - [`ScanObserver`], [`PaSyncObserver`], [`SinkObserver`],
//!   [`StreamObserver`], [`DelegatorHandler`], [`ConnectionObserver`] -
//!   callbacks the host stack delivers to the sink
//! - [`audio_types`] - channel allocation and BIS index newtypes
//! - [`bluetooth_types`] - addresses, handles, receive state
//!
//! # Features
//!
//! - `std`: `std::error::Error` impls and the [`mocks`] module
//! - `defmt`: Enable `defmt::Format` derives
//!
//! # Example
//!
//! ```no_run
//! use platform::{BapHost, HostError};
//!
//! fn restart_scan<H: BapHost>(host: &H) -> Result<(), HostError> {
//!     match host.scan_start() {
//!         Ok(()) | Err(HostError::Already) => Ok(()),
//!         Err(err) => Err(err),
//!     }
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this crate:
#![allow(clippy::doc_markdown)] // BLE acronyms (BASE, BIS, PAST) in doc comments
#![allow(clippy::must_use_candidate)] // accessors: callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

#[cfg(all(feature = "std", not(test)))]
extern crate std;

pub mod audio_types;
pub mod bluetooth;
pub mod bluetooth_types;
pub mod mocks;

// Re-export the host boundary
pub use bluetooth::{
    BapHost, ConnectionObserver, DelegatorError, DelegatorHandler, HostError, PaSyncObserver,
    ScanObserver, SinkObserver, StreamObserver,
};

// Re-export LE Audio types
pub use audio_types::{AudioLocation, BisBitfield, BisIndex, OutOfRangeError};
pub use bluetooth_types::{
    AddrKind, AdvSetHandle, BigInfo, BroadcastCode, BroadcastId, BtAddrLe, CodecCapability,
    ConnHandle, EncryptState, PaState, PaSyncHandle, PaSyncParams, PaSyncedInfo, PastParams,
    ReceiverState, ReceiverSubgroup, ScanReport, SinkHandle, SourceId, StreamId,
    BASS_MAX_SUBGROUPS, BROADCAST_CODE_SIZE, PA_INTERVAL_UNKNOWN,
};
