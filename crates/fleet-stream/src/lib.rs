// SPDX-License-Identifier: MIT

//! Stream multiplexer (§4.8): buffer, JSON framer, backpressure, router,
//! and event bus for the envelope traffic exchanged with a child process.

pub mod backpressure;
pub mod buffer;
pub mod bus;
pub mod error;
pub mod parser;
pub mod router;

pub use backpressure::{AdaptiveConfig, BackpressureHandler, DropPolicy};
pub use buffer::{BufferStats, StreamBuffer};
pub use bus::{BusEvent, EventBus};
pub use error::StreamError;
pub use parser::JsonStreamParser;
pub use router::{Handler, MessageRouter};
