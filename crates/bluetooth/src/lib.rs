//! LE Audio broadcast sink core.
//!
//! Scans for (or is told about) a broadcast source, syncs to its periodic
//! advertising, decodes the BASE, picks the BIS to receive and joins the
//! BIG. A remote Broadcast Assistant may steer every step through the scan
//! delegator.
//!
//! The host stack is injected as a [`platform::BapHost`]; its callbacks are
//! delivered to [`BroadcastSink`] through the `platform` observer traits.
//!
//! This crate is `no_std`; it only uses `core`, `heapless` and embassy.
//!
//! # Features
//!
//! - `defmt`: log through defmt
//! - `tracing`: log through tracing
//! - `std`: `std::error::Error` impls

#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(unused_must_use)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)] // BASE, BIS, PAST
#![allow(clippy::must_use_candidate)]

#[cfg(all(feature = "std", not(test)))]
extern crate std;

// Must come first: the logging macros are used by every module below.
#[macro_use]
mod fmt;

pub mod adv;
pub mod base;
pub mod bis_select;
pub mod config;
pub mod delegator;
pub mod error;
pub mod gate;
pub mod hci;
pub mod ltv;
pub mod orchestrator;
pub mod pa_sync;
pub mod scan;
pub mod sink;
pub mod state;

pub use adv::{assistant_payload, AdvError, AdvPayload};
pub use base::{Base, BaseData, BaseError, SubgroupData};
pub use bis_select::{
    keep_least_significant_ones, select_bis_sync_bitfield, stream_count,
    validate_bis_sync_request, BisSyncRequest,
};
pub use config::{ConfigError, SinkConfig};
pub use error::{CycleOutcome, ResetError, RestartReason, SinkError};
pub use gate::{Gate, Gates};
pub use orchestrator::SinkPhase;
pub use pa_sync::{sync_timeout, PaTimerCommand};
pub use sink::{BroadcastSink, SinkHandles};
pub use state::{AssistantLink, BroadcasterInfo};
