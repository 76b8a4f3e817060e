//! Protocol module - hardware-independent PSX memory card protocol
//!
//! This module defines the frame layouts, checksum and response validation
//! without depending on any specific hardware backend (FTDI, embedded-hal, etc.)

pub mod checksum;
pub mod commands;
pub mod frame;
pub mod response;
