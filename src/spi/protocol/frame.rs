//! Request frames for the PSX memory card protocol
//!
//! The bus is full duplex: for every byte the host clocks out the card clocks
//! one back at the same position. Request frames therefore carry zeroed
//! placeholders wherever the card, not the host, supplies the meaningful byte.

use crate::error::Error;
use super::commands::{geometry, offsets, CardSlot, Command, ACCESS_MEMCARD};

/// Host-side card-id bytes sent at offsets 2 and 3.
///
/// The card answers with its own ID markers at these positions regardless of
/// what the host sends; zero is the usual placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CardId(pub [u8; 2]);

/// A 140-byte "read frame" request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    bytes: [u8; geometry::READ_FRAME_SIZE],
    address: u16,
    slot: CardSlot,
}

impl CommandFrame {
    /// Build a read request for `address` with zeroed card-id bytes
    pub fn read(address: u32, slot: CardSlot) -> Result<Self, Error> {
        Self::read_with_card_id(address, slot, CardId::default())
    }

    /// Build a read request with explicit card-id bytes
    pub fn read_with_card_id(address: u32, slot: CardSlot, card_id: CardId) -> Result<Self, Error> {
        let address = u16::try_from(address).map_err(|_| Error::InvalidAddress {
            address,
            limit: u16::MAX as u32,
        })?;

        let mut bytes = [0u8; geometry::READ_FRAME_SIZE];
        bytes[offsets::ACCESS] = ACCESS_MEMCARD;
        bytes[offsets::COMMAND] = Command::Read.bits();
        bytes[offsets::CARD_ID_1] = card_id.0[0];
        bytes[offsets::CARD_ID_2] = card_id.0[1];
        bytes[offsets::ADDRESS_MSB] = (address >> 8) as u8;
        bytes[offsets::ADDRESS_LSB] = (address & 0xFF) as u8;

        Ok(Self { bytes, address, slot })
    }

    /// Requested frame address
    pub fn address(&self) -> u16 {
        self.address
    }

    /// Slot the request is meant for
    pub fn slot(&self) -> CardSlot {
        self.slot
    }

    pub fn command(&self) -> Command {
        Command::Read
    }

    /// Wire bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Expected response length (always the request length)
    pub fn response_size(&self) -> usize {
        self.bytes.len()
    }
}

/// A 10-byte "get id" request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdFrame {
    bytes: [u8; geometry::ID_FRAME_SIZE],
    slot: CardSlot,
}

impl IdFrame {
    pub fn new(slot: CardSlot) -> Self {
        let mut bytes = [0u8; geometry::ID_FRAME_SIZE];
        bytes[offsets::ACCESS] = ACCESS_MEMCARD;
        bytes[offsets::COMMAND] = Command::GetId.bits();

        Self { bytes, slot }
    }

    pub fn slot(&self) -> CardSlot {
        self.slot
    }

    pub fn command(&self) -> Command {
        Command::GetId
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn response_size(&self) -> usize {
        self.bytes.len()
    }
}
