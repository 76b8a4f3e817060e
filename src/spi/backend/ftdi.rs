//! FTDI backend implementation using libftd2xx
//!
//! Drives an FT4232H channel in MPSSE mode. MPSSE shifts LSB first and picks
//! clock edges natively, so no software bit mirroring is needed.

use std::time::Duration;
use libftd2xx::{ClockData, Ft4232h, FtdiCommon, FtdiMpsse, MpsseCmdBuilder, MpsseCmdExecutor};
use bitflags::bitflags;
use log::debug;

use crate::error::{Error, TransportError};
use crate::spi::protocol::commands::CardSlot;
use super::{BitOrder, BusConfig, SpiBackend, SpiMode};

/*
Pin assignments on FTDI FT4232H:
PSX_CLK:   AD0
PSX_CMD:   AD1
PSX_DAT:   AD2
PSX_SEL1:  AD3 (slot 1 attention, active low)
PSX_SEL2:  AD4 (slot 2 attention, active low)
PSX_ACK:   AD5 (input)
*/

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub struct SpiPin: u8 {
        const CLK =    1;          // Mask 0x01, AD0
        const CMD =    1 << 1;     // Mask 0x02, AD1
        const DAT =    1 << 2;     // Mask 0x04, AD2
        const SEL1_N = 1 << 3;     // Mask 0x08, AD3
        const SEL2_N = 1 << 4;     // Mask 0x10, AD4
        const ACK =    1 << 5;     // Mask 0x20, AD5
        const UNUSED6 = 1 << 6;
        const UNUSED7 = 1 << 7;
    }
}

/// FTDI SPI Backend
pub struct FtdiBackend {
    dev: Ft4232h,
    config: BusConfig,
    slot: CardSlot,
}

impl FtdiBackend {
    /// Create a new FTDI backend with the specified device
    pub fn new(dev: Ft4232h, config: BusConfig) -> Self {
        Self {
            dev,
            config,
            slot: CardSlot::One,
        }
    }

    /// Open FTDI device by description
    pub fn open(description: &str, config: BusConfig) -> Result<Self, Error> {
        let dev = Ft4232h::with_description(description).map_err(TransportError::from)?;
        Ok(Self::new(dev, config))
    }

    /// Get pin direction configuration (which pins are outputs)
    fn pin_directions() -> SpiPin {
        SpiPin::CLK | SpiPin::CMD | SpiPin::SEL1_N | SpiPin::SEL2_N
    }

    /// Attention line for a slot
    fn select_pin(slot: CardSlot) -> SpiPin {
        match slot {
            CardSlot::One => SpiPin::SEL1_N,
            CardSlot::Two => SpiPin::SEL2_N,
        }
    }

    /// Idle pin state: both slots deselected, clock at its idle level
    fn idle_state(mode: SpiMode) -> SpiPin {
        let mut state = SpiPin::SEL1_N | SpiPin::SEL2_N;
        if mode.contains(SpiMode::CPOL) {
            state |= SpiPin::CLK;
        }
        state
    }

    /// MPSSE full-duplex opcode for the configured mode and bit order
    ///
    /// `*PosIn` clocks data out on the falling edge and samples on the
    /// rising edge, which is what modes 0 and 3 need.
    fn clock_mode(config: &BusConfig) -> ClockData {
        let sample_rising = matches!(config.mode.number(), 0 | 3);
        match (config.bit_order, sample_rising) {
            (BitOrder::LsbFirst, true) => ClockData::LsbPosIn,
            (BitOrder::LsbFirst, false) => ClockData::LsbNegIn,
            (BitOrder::MsbFirst, true) => ClockData::MsbPosIn,
            (BitOrder::MsbFirst, false) => ClockData::MsbNegIn,
        }
    }

    fn exchange(&mut self, tx: &[u8]) -> Result<Vec<u8>, TransportError> {
        let idle = Self::idle_state(self.config.mode);
        let selected = idle & !Self::select_pin(self.slot);
        let directions = Self::pin_directions().bits();
        let mode = Self::clock_mode(&self.config);
        let mut rx = vec![0u8; tx.len()];

        if self.config.byte_delay_us == 0 {
            let builder = MpsseCmdBuilder::new()
                // Assert attention for the selected slot
                .set_gpio_lower(selected.bits(), directions)
                .clock_data(mode, tx)
                // Release attention
                .set_gpio_lower(idle.bits(), directions)
                .send_immediate();

            self.dev.send(builder.as_slice())?;
            self.dev.recv(&mut rx)?;
            return Ok(rx);
        }

        // Attention stays asserted while the host pauses between bytes
        let delay = Duration::from_micros(self.config.byte_delay_us.into());

        let clocked: Result<(), TransportError> = with_attention(
            &mut self.dev,
            |dev| Ok(dev.set_gpio_lower(selected.bits(), directions)?),
            |dev| {
                for (i, (r, w)) in rx.chunks_mut(1).zip(tx.chunks(1)).enumerate() {
                    if i > 0 {
                        std::thread::sleep(delay);
                    }

                    let builder = MpsseCmdBuilder::new()
                        .clock_data(mode, w)
                        .send_immediate();

                    dev.send(builder.as_slice())?;
                    dev.recv(r)?;
                }
                Ok(())
            },
            |dev| Ok(dev.set_gpio_lower(idle.bits(), directions)?),
        );
        clocked?;

        Ok(rx)
    }
}

/// Run `body` between `select` and `release`
///
/// `release` runs whenever `select` succeeded, so a failed byte never leaves
/// the card selected. The error of `body` wins over the one of `release`.
fn with_attention<D, T, E>(
    dev: &mut D,
    select: impl FnOnce(&mut D) -> Result<(), E>,
    body: impl FnOnce(&mut D) -> Result<T, E>,
    release: impl FnOnce(&mut D) -> Result<(), E>,
) -> Result<T, E> {
    select(dev)?;
    let result = body(dev);
    let released = release(dev);

    let value = result?;
    released?;
    Ok(value)
}

impl SpiBackend for FtdiBackend {
    fn config(&self) -> &BusConfig {
        &self.config
    }

    fn initialize(&mut self) -> Result<(), Error> {
        // Set MPSSE mode
        self.dev
            .set_bit_mode(0x0, libftd2xx::BitMode::Mpsse)
            .map_err(TransportError::from)?;

        // Set latency timer
        self.dev
            .set_latency_timer(Duration::from_millis(2))
            .map_err(TransportError::from)?;

        // Both slots deselected, clock idle
        self.dev
            .set_gpio_lower(
                Self::idle_state(self.config.mode).bits(),
                Self::pin_directions().bits(),
            )
            .map_err(TransportError::from)?;

        self.dev
            .set_clock(self.config.clock_hz)
            .map_err(TransportError::from)?;

        debug!(
            "FTDI backend ready: {} Hz, mode {}",
            self.config.clock_hz,
            self.config.mode.number()
        );

        Ok(())
    }

    fn select_slot(&mut self, slot: CardSlot) -> Result<(), Error> {
        self.slot = slot;
        Ok(())
    }

    fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(self.exchange(tx)?)
    }
}
