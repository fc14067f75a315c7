//! # Sensors Module
//!
//! Decoders for the two sensor sources.
//!
//! This module handles:
//! - Reading the HYT939 and HP206C chips over I2C
//! - Parsing the anemometer's key-coded ASCII lines

pub mod bus;
pub mod line;
