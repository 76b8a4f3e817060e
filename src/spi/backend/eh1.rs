//! embedded-hal 1.0 SPI backend
//!
//! This backend uses `embedded_hal::spi::SpiDevice` (eh1). Clock rate and
//! mode are fixed when the HAL builds the device; [`BusConfig`] only decides
//! bit-order emulation and inter-byte pauses here.

use embedded_hal::spi::{Error as _, Operation, SpiDevice};
use log::trace;

use crate::error::{Error, TransportError};
use super::bitorder;
use super::{BitOrder, BusConfig, SpiBackend};

/// embedded-hal 1.0 SPI Backend
///
/// * `SPI` – SPI device (chip-select handled by SpiDevice)
pub struct Eh1SpiBackend<SPI> {
    spi: SPI,
    config: BusConfig,
    soft_lsb: bool,
}

impl<SPI> Eh1SpiBackend<SPI>
where
    SPI: SpiDevice,
{
    /// Create a backend for a peripheral that shifts MSB first
    ///
    /// LSB-first configs are emulated by mirroring every byte.
    pub fn new(spi: SPI, config: BusConfig) -> Self {
        Self {
            spi,
            soft_lsb: config.bit_order == BitOrder::LsbFirst,
            config,
        }
    }

    /// Create a backend for a peripheral already set to `config.bit_order`
    pub fn with_native_bit_order(spi: SPI, config: BusConfig) -> Self {
        Self {
            spi,
            config,
            soft_lsb: false,
        }
    }

    /// Give back the SPI device
    pub fn release(self) -> SPI {
        self.spi
    }

    fn exchange(&mut self, rx: &mut [u8], tx: &[u8]) -> Result<(), SPI::Error> {
        if self.config.byte_delay_us == 0 {
            return self.spi.transfer(rx, tx);
        }

        // Keep chip select asserted across the whole frame, pausing only
        // between bytes.
        let delay_ns = self.config.byte_delay_us.saturating_mul(1_000);
        let mut ops = Vec::with_capacity(tx.len() * 2);
        for (i, (r, w)) in rx.chunks_mut(1).zip(tx.chunks(1)).enumerate() {
            if i > 0 {
                ops.push(Operation::DelayNs(delay_ns));
            }
            ops.push(Operation::Transfer(r, w));
        }

        self.spi.transaction(&mut ops)
    }
}

impl<SPI> SpiBackend for Eh1SpiBackend<SPI>
where
    SPI: SpiDevice,
{
    fn config(&self) -> &BusConfig {
        &self.config
    }

    fn initialize(&mut self) -> Result<(), Error> {
        trace!(
            "eh1 backend: {} Hz, mode {}, {:?}, software LSB: {}",
            self.config.clock_hz,
            self.config.mode.number(),
            self.config.bit_order,
            self.soft_lsb
        );
        Ok(())
    }

    fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>, Error> {
        let tx = if self.soft_lsb {
            bitorder::reversed(tx)
        } else {
            tx.to_vec()
        };
        let mut rx = vec![0u8; tx.len()];

        self.exchange(&mut rx, &tx)
            .map_err(|e| TransportError::Spi(e.kind()))?;

        if self.soft_lsb {
            bitorder::reverse_in_place(&mut rx);
        }

        Ok(rx)
    }
}
