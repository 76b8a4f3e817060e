//! Response parsing and validation for the PSX memory card protocol

use crate::error::Error;
use super::checksum::frame_checksum;
use super::commands::{geometry, markers, offsets, CardStatus};
use super::frame::CommandFrame;

/// Non-fatal problem found while validating a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    /// Checksum recomputed by the host differs from the card's
    ChecksumMismatch { computed: u8, received: u8 },
    /// Card ended the transfer with something other than 'G'
    CardStatusError { status: u8 },
    /// A header byte differs from what the card should have echoed
    HeaderMismatch { offset: usize, expected: u8, actual: u8 },
}

/// Outcome of one read frame exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResult {
    address: u16,
    data: [u8; geometry::FRAME_DATA_SIZE],
    checksum: u8,
    status: u8,
    diagnostics: Vec<Diagnostic>,
}

impl ReadResult {
    /// Requested frame address
    pub fn address(&self) -> u16 {
        self.address
    }

    /// Frame payload as received, even when invalid
    pub fn data(&self) -> &[u8; geometry::FRAME_DATA_SIZE] {
        &self.data
    }

    /// Checksum byte sent by the card
    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Raw status byte sent by the card
    pub fn status(&self) -> u8 {
        self.status
    }

    pub fn card_status(&self) -> CardStatus {
        CardStatus::from_byte(self.status)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// True when the checksum matched, the status was good and no other
    /// check failed
    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Borrowed view over a 140-byte read response
#[derive(Debug, Clone, Copy)]
pub struct ResponseFrame<'a> {
    bytes: &'a [u8; geometry::READ_FRAME_SIZE],
}

impl<'a> TryFrom<&'a [u8]> for ResponseFrame<'a> {
    type Error = Error;

    fn try_from(bytes: &'a [u8]) -> Result<Self, Self::Error> {
        let bytes = bytes.try_into().map_err(|_| Error::MalformedResponse {
            expected: geometry::READ_FRAME_SIZE,
            actual: bytes.len(),
        })?;

        Ok(Self { bytes })
    }
}

impl<'a> ResponseFrame<'a> {
    pub fn data(&self) -> &'a [u8] {
        &self.bytes[offsets::DATA..offsets::CHECKSUM]
    }

    pub fn checksum(&self) -> u8 {
        self.bytes[offsets::CHECKSUM]
    }

    pub fn status(&self) -> u8 {
        self.bytes[offsets::STATUS]
    }

    /// Address echoed back by the card
    pub fn confirmed_address(&self) -> u16 {
        u16::from_be_bytes([
            self.bytes[offsets::CONFIRM_MSB],
            self.bytes[offsets::CONFIRM_LSB],
        ])
    }

    /// Checksum the card should have sent for this payload
    pub fn computed_checksum(&self) -> u8 {
        frame_checksum(
            self.bytes[offsets::CONFIRM_MSB],
            self.bytes[offsets::CONFIRM_LSB],
            self.data(),
        )
    }

    /// Header bytes that differ from the expected card echo
    fn header_mismatches(&self, request: &CommandFrame) -> impl Iterator<Item = Diagnostic> + 'a {
        let [msb, lsb] = request.address().to_be_bytes();
        let expected = [
            (offsets::CARD_ID_1, markers::CARD_ID_1),
            (offsets::CARD_ID_2, markers::CARD_ID_2),
            (offsets::ACK_1, markers::ACK_1),
            (offsets::ACK_2, markers::ACK_2),
            (offsets::CONFIRM_MSB, msb),
            (offsets::CONFIRM_LSB, lsb),
        ];
        let bytes = self.bytes;

        expected.into_iter().filter_map(move |(offset, expected)| {
            let actual = bytes[offset];
            (actual != expected).then_some(Diagnostic::HeaderMismatch { offset, expected, actual })
        })
    }

    /// Validate against the request that produced this response
    pub fn validate(&self, request: &CommandFrame, verify_header: bool) -> ReadResult {
        let mut diagnostics = Vec::new();

        if verify_header {
            diagnostics.extend(self.header_mismatches(request));
        }

        let computed = self.computed_checksum();
        let received = self.checksum();
        if computed != received {
            diagnostics.push(Diagnostic::ChecksumMismatch { computed, received });
        }

        if !CardStatus::from_byte(self.status()).is_good() {
            diagnostics.push(Diagnostic::CardStatusError { status: self.status() });
        }

        let mut data = [0u8; geometry::FRAME_DATA_SIZE];
        data.copy_from_slice(self.data());

        ReadResult {
            address: request.address(),
            data,
            checksum: received,
            status: self.status(),
            diagnostics,
        }
    }
}

/// Parse and validate a raw read response
pub fn parse_read_response(
    request: &CommandFrame,
    response: &[u8],
    verify_header: bool,
) -> Result<ReadResult, Error> {
    let frame = ResponseFrame::try_from(response)?;
    Ok(frame.validate(request, verify_header))
}

/// Identification block returned by the "get id" command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardIdentity {
    bytes: [u8; 4],
    valid: bool,
}

impl CardIdentity {
    const MARKERS: [(usize, u8); 4] = [
        (2, markers::CARD_ID_1),
        (3, markers::CARD_ID_2),
        (4, markers::ACK_1),
        (5, markers::ACK_2),
    ];

    /// Parse a 10-byte get-id response
    pub fn parse(response: &[u8]) -> Result<Self, Error> {
        if response.len() != geometry::ID_FRAME_SIZE {
            return Err(Error::MalformedResponse {
                expected: geometry::ID_FRAME_SIZE,
                actual: response.len(),
            });
        }

        let valid = Self::MARKERS
            .iter()
            .all(|&(offset, marker)| response[offset] == marker);

        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&response[6..10]);

        Ok(Self { bytes, valid })
    }

    pub fn bytes(&self) -> [u8; 4] {
        self.bytes
    }

    /// True when the card answered with the memory card markers
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}
