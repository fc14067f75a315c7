//! # Relay Module
//!
//! Downstream summary frames sent over the second serial link.

pub mod encoder;
