//! Backend abstraction module - hardware-specific implementations
//!
//! This module defines a common trait for full-duplex SPI transports and
//! provides implementations for embedded-hal and FTDI.

use bitflags::bitflags;

use crate::error::Error;
use super::protocol::commands::CardSlot;

pub mod bitorder;
pub mod eh1;

#[cfg(feature = "ftdi")]
pub mod ftdi;

bitflags! {
    /// Clock polarity / phase selection
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct SpiMode: u8 {
        /// Clock idles high
        const CPOL = 1 << 1;
        /// Data sampled on the trailing edge
        const CPHA = 1 << 0;
    }
}

impl SpiMode {
    pub const MODE_0: Self = Self::empty();
    pub const MODE_3: Self = Self::CPOL.union(Self::CPHA);

    /// Mode number as used by spidev (0..=3)
    pub fn number(self) -> u8 {
        self.bits()
    }
}

/// Order in which the bits of a byte go on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOrder {
    MsbFirst,
    LsbFirst,
}

/// Bus parameters a transport is opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    pub clock_hz: u32,
    pub mode: SpiMode,
    pub bit_order: BitOrder,
    /// Pause between bytes, zero for one continuous transfer
    pub byte_delay_us: u32,
}

impl BusConfig {
    /// Clock rate the memory card is driven at
    pub const PSX_CLOCK_HZ: u32 = 256_000;

    /// 256 kHz, mode 3, LSB first
    pub const fn psx() -> Self {
        Self {
            clock_hz: Self::PSX_CLOCK_HZ,
            mode: SpiMode::MODE_3,
            bit_order: BitOrder::LsbFirst,
            byte_delay_us: 0,
        }
    }

    pub fn with_clock(mut self, clock_hz: u32) -> Self {
        self.clock_hz = clock_hz;
        self
    }

    pub fn with_byte_delay(mut self, byte_delay_us: u32) -> Self {
        self.byte_delay_us = byte_delay_us;
        self
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::psx()
    }
}

/// Common SPI backend trait
///
/// This trait abstracts the full-duplex exchange needed by the memory card
/// protocol. It allows the same protocol logic to work with different
/// hardware backends.
pub trait SpiBackend {
    /// Bus parameters this backend was opened with
    fn config(&self) -> &BusConfig;

    /// Prepare the bus (pin states, clock, mode)
    fn initialize(&mut self) -> Result<(), Error>;

    /// Route the next transfers to the card in `slot`
    ///
    /// Single-port transports ignore this.
    fn select_slot(&mut self, _slot: CardSlot) -> Result<(), Error> {
        Ok(())
    }

    /// Execute one blocking full-duplex transfer
    ///
    /// Clocks out every byte of `tx` and returns the bytes clocked in at the
    /// same positions. A conforming backend returns exactly `tx.len()` bytes.
    fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>, Error>;
}

impl<B: SpiBackend + ?Sized> SpiBackend for &mut B {
    fn config(&self) -> &BusConfig {
        (**self).config()
    }

    fn initialize(&mut self) -> Result<(), Error> {
        (**self).initialize()
    }

    fn select_slot(&mut self, slot: CardSlot) -> Result<(), Error> {
        (**self).select_slot(slot)
    }

    fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>, Error> {
        (**self).transfer(tx)
    }
}
