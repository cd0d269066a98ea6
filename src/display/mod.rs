//! Display protocol driver.
//!
//! Command/data framing, busy synchronization, and the panel lifecycle
//! sequences for the Waveshare 7.5" V2 monochrome panel, over an abstract
//! pin/bus backend.

pub mod bus;
pub mod command;
pub mod epd7in5;
pub mod framer;
pub mod rpi;

// Re-export main types
pub use epd7in5::{DisplayError, Epd7in5};
