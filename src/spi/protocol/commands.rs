//! Command and marker definitions for the PSX memory card protocol

use crate::error::Error;

/// Device class selector, first byte of every memory card frame
pub const ACCESS_MEMCARD: u8 = 0x81;

/// Memory card command byte (second byte of a frame)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Read one 128-byte frame ('R')
    Read = 0x52,
    /// Read card identification ('S')
    GetId = 0x53,
    /// Write one 128-byte frame ('W'), not issued by this crate
    Write = 0x57,
}

impl Command {
    /// Get the raw command byte
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Create from raw command byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x52 => Some(Self::Read),
            0x53 => Some(Self::GetId),
            0x57 => Some(Self::Write),
            _ => None,
        }
    }
}

/// Bytes the card drives onto the bus at fixed header positions
pub mod markers {
    /// Card ID 1, returned while the host sends the first card-id byte
    pub const CARD_ID_1: u8 = 0x5A;
    /// Card ID 2, returned while the host sends the second card-id byte
    pub const CARD_ID_2: u8 = 0x5D;
    /// Command acknowledge 1
    pub const ACK_1: u8 = 0x5C;
    /// Command acknowledge 2
    pub const ACK_2: u8 = 0x5D;
}

/// Byte offsets inside a read frame
pub mod offsets {
    pub const ACCESS: usize = 0;
    pub const COMMAND: usize = 1;
    pub const CARD_ID_1: usize = 2;
    pub const CARD_ID_2: usize = 3;
    pub const ADDRESS_MSB: usize = 4;
    pub const ADDRESS_LSB: usize = 5;
    pub const ACK_1: usize = 6;
    pub const ACK_2: usize = 7;
    pub const CONFIRM_MSB: usize = 8;
    pub const CONFIRM_LSB: usize = 9;
    pub const DATA: usize = 10;
    pub const CHECKSUM: usize = DATA + super::geometry::FRAME_DATA_SIZE;
    pub const STATUS: usize = CHECKSUM + 1;
}

/// Frame and card sizes
pub mod geometry {
    /// Header bytes before the data payload
    pub const HEADER_SIZE: usize = 10;
    /// Payload of one frame
    pub const FRAME_DATA_SIZE: usize = 128;
    /// Checksum and status
    pub const TRAILER_SIZE: usize = 2;
    /// Full read frame on the wire
    pub const READ_FRAME_SIZE: usize = HEADER_SIZE + FRAME_DATA_SIZE + TRAILER_SIZE;
    /// Full get-id frame on the wire
    pub const ID_FRAME_SIZE: usize = 10;

    pub const BLOCK_COUNT: u16 = 16;
    pub const FRAMES_PER_BLOCK: u16 = 64;
    /// Frames on a standard 128 KiB card
    pub const FRAME_COUNT: u16 = BLOCK_COUNT * FRAMES_PER_BLOCK;
}

/// Memory card end status (last byte of a read frame)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardStatus {
    /// 'G', transfer completed
    Good,
    /// 'N', card rejected the command checksum
    BadChecksum,
    /// 0xFF, sector does not exist
    BadSector,
    /// Anything the card is not documented to send
    Unknown(u8),
}

impl CardStatus {
    pub const GOOD: u8 = 0x47;
    pub const BAD_CHECKSUM: u8 = 0x4E;
    pub const BAD_SECTOR: u8 = 0xFF;

    /// Parse from the raw status byte
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            Self::GOOD => Self::Good,
            Self::BAD_CHECKSUM => Self::BadChecksum,
            Self::BAD_SECTOR => Self::BadSector,
            other => Self::Unknown(other),
        }
    }

    pub fn is_good(self) -> bool {
        self == Self::Good
    }
}

/// Controller port the card is plugged into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardSlot {
    One,
    Two,
}

impl CardSlot {
    /// Slot number as printed on the console (1 or 2)
    pub fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

impl TryFrom<u8> for CardSlot {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(Error::InvalidSlot(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_bits() {
        assert_eq!(Command::Read.bits(), b'R');
        assert_eq!(Command::GetId.bits(), b'S');
        assert_eq!(Command::Write.bits(), b'W');
    }

    #[test]
    fn test_command_from_byte() {
        assert_eq!(Command::from_byte(0x52), Some(Command::Read));
        assert_eq!(Command::from_byte(0x53), Some(Command::GetId));
        assert_eq!(Command::from_byte(0x00), None);
    }

    #[test]
    fn test_frame_layout() {
        assert_eq!(geometry::READ_FRAME_SIZE, 140);
        assert_eq!(offsets::DATA, 10);
        assert_eq!(offsets::CHECKSUM, 138);
        assert_eq!(offsets::STATUS, 139);
        assert_eq!(geometry::FRAME_COUNT, 1024);
    }

    #[test]
    fn test_card_status() {
        assert_eq!(CardStatus::from_byte(b'G'), CardStatus::Good);
        assert_eq!(CardStatus::from_byte(b'N'), CardStatus::BadChecksum);
        assert_eq!(CardStatus::from_byte(0xFF), CardStatus::BadSector);
        assert_eq!(CardStatus::from_byte(0x00), CardStatus::Unknown(0x00));
        assert!(CardStatus::Good.is_good());
        assert!(!CardStatus::BadSector.is_good());
    }

    #[test]
    fn test_card_slot() {
        assert_eq!(CardSlot::try_from(1).unwrap(), CardSlot::One);
        assert_eq!(CardSlot::try_from(2).unwrap().number(), 2);
        assert!(matches!(CardSlot::try_from(3), Err(Error::InvalidSlot(3))));
        assert!(matches!(CardSlot::try_from(0), Err(Error::InvalidSlot(0))));
    }
}
