//! High-level memory card reader
//!
//! This module provides the read API on top of any [`SpiBackend`]: single
//! frames, card identification and whole-card dumps. Each call is one
//! blocking request/response exchange; nothing is retried here.

use log::{debug, info, trace, warn};

use crate::error::Error;
use super::backend::SpiBackend;
use super::card_image::CardImage;
use super::protocol::commands::{geometry, CardSlot};
use super::protocol::frame::{CommandFrame, IdFrame};
use super::protocol::response::{parse_read_response, CardIdentity, ReadResult};

/// Reader settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Number of frames on the card, addresses must be below this
    ///
    /// `0x1_0000` opens the whole 16-bit address range.
    pub frame_count: u32,
    /// Also check the card-id, ack and address echo bytes
    pub verify_header: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            frame_count: u32::from(geometry::FRAME_COUNT),
            verify_header: false,
        }
    }
}

/// Read one frame without an engine object.
///
/// Only checks that `address` fits in 16 bits; the card bound is the
/// caller's business.
pub fn read_sector<B: SpiBackend>(
    backend: &mut B,
    address: u32,
    slot: CardSlot,
) -> Result<ReadResult, Error> {
    let request = CommandFrame::read(address, slot)?;
    let response = exchange(backend, slot, request.as_bytes())?;
    parse_read_response(&request, &response, false)
}

/// One full-duplex exchange on `slot`
fn exchange<B: SpiBackend>(backend: &mut B, slot: CardSlot, tx: &[u8]) -> Result<Vec<u8>, Error> {
    backend.select_slot(slot)?;

    trace!("tx[{}] {}", tx.len(), hex::encode(tx));
    let rx = backend.transfer(tx)?;
    trace!("rx[{}] {}", rx.len(), hex::encode(&rx));

    Ok(rx)
}

/// PSX memory card reader - works with any backend
pub struct MemcardReader<B: SpiBackend> {
    backend: B,
    config: ReaderConfig,
    initialized: bool,
}

impl<B: SpiBackend> MemcardReader<B> {
    /// Create a new reader for a standard card
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, ReaderConfig::default())
    }

    pub fn with_config(backend: B, config: ReaderConfig) -> Self {
        Self {
            backend,
            config,
            initialized: false,
        }
    }

    /// Prepare the backend, does nothing when already done
    pub fn init(&mut self) -> Result<(), Error> {
        if self.initialized {
            return Ok(());
        }

        self.backend.initialize()?;

        let bus = self.backend.config();
        info!(
            "Memory card bus ready: {} Hz, mode {}, {:?}",
            bus.clock_hz,
            bus.mode.number(),
            bus.bit_order
        );

        self.initialized = true;
        Ok(())
    }

    /// Check if initialization is complete
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Give back the backend
    pub fn into_inner(self) -> B {
        self.backend
    }

    fn ensure_initialized(&self) -> Result<(), Error> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    /// Read one 128-byte frame
    ///
    /// Checksum and status problems do not fail the call; they come back
    /// as diagnostics on the returned [`ReadResult`].
    pub fn read_frame(&mut self, address: u32, slot: CardSlot) -> Result<ReadResult, Error> {
        self.ensure_initialized()?;

        if address >= u32::from(self.config.frame_count) {
            return Err(Error::InvalidAddress {
                address,
                limit: self.config.frame_count.saturating_sub(1),
            });
        }

        let request = CommandFrame::read(address, slot)?;
        debug!("Reading frame {:#05X} from slot {}", request.address(), slot.number());

        let response = exchange(&mut self.backend, slot, request.as_bytes())?;
        let result = parse_read_response(&request, &response, self.config.verify_header)?;

        if !result.is_valid() {
            warn!(
                "Frame {:#05X}: {:?}",
                result.address(),
                result.diagnostics()
            );
        }

        Ok(result)
    }

    /// Read the card identification block
    pub fn read_id(&mut self, slot: CardSlot) -> Result<CardIdentity, Error> {
        self.ensure_initialized()?;

        let request = IdFrame::new(slot);
        let response = exchange(&mut self.backend, request.slot(), request.as_bytes())?;
        let identity = CardIdentity::parse(&response)?;

        if !identity.is_valid() {
            warn!("Slot {} did not answer as a memory card", slot.number());
        }

        Ok(identity)
    }

    /// Read every frame `image` is still missing
    ///
    /// Returns how many frames were added. Invalid frames stay missing, so
    /// calling this again re-reads only those. Frames of `image` beyond the
    /// configured card are left alone.
    pub fn read_missing(&mut self, image: &mut CardImage, slot: CardSlot) -> Result<usize, Error> {
        self.ensure_initialized()?;

        if image.frame_count() > self.config.frame_count {
            warn!(
                "Image holds {} frames, card has {}; reading only the card",
                image.frame_count(),
                self.config.frame_count
            );
        }

        let mut added = 0;
        let last = image.frame_count().min(self.config.frame_count);

        for index in image.indices().take(last as usize) {
            if image.contains(index) {
                continue;
            }

            let result = self.read_frame(u32::from(index), slot)?;
            if result.is_valid() && image.insert(index, *result.data()) {
                added += 1;
            }

            if index % geometry::FRAMES_PER_BLOCK == geometry::FRAMES_PER_BLOCK - 1 {
                info!(
                    "Block {} done, {}/{} frames",
                    index / geometry::FRAMES_PER_BLOCK,
                    image.len(),
                    image.frame_count()
                );
            }
        }

        Ok(added)
    }

    /// Dump the whole card
    pub fn read_card(&mut self, slot: CardSlot) -> Result<CardImage, Error> {
        let mut image = CardImage::with_frame_count(self.config.frame_count);
        self.read_missing(&mut image, slot)?;

        if !image.is_full() {
            warn!(
                "Card dump incomplete: {}/{} frames valid",
                image.len(),
                image.frame_count()
            );
        }

        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::spi::backend::BusConfig;
    use crate::spi::protocol::commands::CardStatus;
    use crate::spi::protocol::response::tests::card_response;
    use crate::spi::protocol::response::Diagnostic;
    use hex_literal::hex;

    /// Behaves like a card: answers read frames from an in-memory image
    struct MockBackend {
        config: BusConfig,
        frames: Vec<[u8; 128]>,
        sent: Vec<Vec<u8>>,
        slots: Vec<CardSlot>,
        initialized: bool,
        corrupt_checksum: Option<u16>,
        truncate: bool,
        fail: bool,
    }

    impl MockBackend {
        fn new(frame_count: usize) -> Self {
            let frames = (0..frame_count)
                .map(|i| {
                    let mut frame = [0u8; 128];
                    frame[0] = (i >> 8) as u8;
                    frame[1] = i as u8;
                    frame[2..6].copy_from_slice(&hex!("DE AD BE EF"));
                    frame
                })
                .collect();

            Self {
                config: BusConfig::psx(),
                frames,
                sent: Vec::new(),
                slots: Vec::new(),
                initialized: false,
                corrupt_checksum: None,
                truncate: false,
                fail: false,
            }
        }
    }

    impl SpiBackend for MockBackend {
        fn config(&self) -> &BusConfig {
            &self.config
        }

        fn initialize(&mut self) -> Result<(), Error> {
            self.initialized = true;
            Ok(())
        }

        fn select_slot(&mut self, slot: CardSlot) -> Result<(), Error> {
            self.slots.push(slot);
            Ok(())
        }

        fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>, Error> {
            self.sent.push(tx.to_vec());

            if self.fail {
                let cause = std::io::Error::new(std::io::ErrorKind::TimedOut, "bus timeout");
                return Err(TransportError::from(cause).into());
            }

            let mut rx = match tx[1] {
                0x53 => hex!("FF 08 5A 5D 5C 5D 04 00 00 80").to_vec(),
                _ => {
                    let address = u16::from_be_bytes([tx[4], tx[5]]);
                    match self.frames.get(address as usize) {
                        Some(data) => card_response(address, data),
                        None => {
                            let mut rx = card_response(address, &[0xFF; 128]);
                            rx[139] = CardStatus::BAD_SECTOR;
                            rx
                        }
                    }
                }
            };

            if self.corrupt_checksum.is_some_and(|a| tx[1] == 0x52 && a == u16::from_be_bytes([tx[4], tx[5]])) {
                rx[138] ^= 0x01;
            }
            if self.truncate {
                rx.pop();
            }

            Ok(rx)
        }
    }

    fn reader(frame_count: usize) -> MemcardReader<MockBackend> {
        let mut reader = MemcardReader::new(MockBackend::new(frame_count));
        reader.init().unwrap();
        reader
    }

    #[test]
    fn test_init() {
        let mut reader = MemcardReader::new(MockBackend::new(1));
        assert!(!reader.is_initialized());
        assert!(matches!(reader.read_frame(0, CardSlot::One), Err(Error::NotInitialized)));

        reader.init().unwrap();
        reader.init().unwrap();
        assert!(reader.is_initialized());
        assert!(reader.backend().initialized);
    }

    #[test]
    fn test_read_frame() {
        let mut reader = reader(1024);
        let result = reader.read_frame(0x0123, CardSlot::Two).unwrap();

        assert!(result.is_valid());
        assert_eq!(result.address(), 0x0123);
        assert_eq!(&result.data()[..6], &hex!("01 23 DE AD BE EF"));
        assert_eq!(result.card_status(), CardStatus::Good);

        let backend = reader.into_inner();
        assert_eq!(backend.slots, vec![CardSlot::Two]);
        assert_eq!(backend.sent.len(), 1);
        assert_eq!(backend.sent[0].len(), 140);
        assert_eq!(&backend.sent[0][..6], &hex!("81 52 00 00 01 23"));
    }

    #[test]
    fn test_checksum_mismatch_is_not_an_error() {
        let mut reader = reader(1024);
        reader.backend.corrupt_checksum = Some(5);

        let result = reader.read_frame(5, CardSlot::One).unwrap();
        assert!(!result.is_valid());
        assert!(matches!(
            result.diagnostics(),
            [Diagnostic::ChecksumMismatch { .. }]
        ));
        assert_eq!(&result.data()[..2], &[0x00, 0x05]);
    }

    #[test]
    fn test_idempotent() {
        let mut reader = reader(1024);
        let first = reader.read_frame(42, CardSlot::One).unwrap();
        let second = reader.read_frame(42, CardSlot::One).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_address_out_of_card() {
        let mut reader = MemcardReader::with_config(
            MockBackend::new(16),
            ReaderConfig { frame_count: 16, verify_header: true },
        );
        reader.init().unwrap();

        let err = reader.read_frame(16, CardSlot::One).unwrap_err();
        assert!(matches!(err, Error::InvalidAddress { address: 16, limit: 15 }));

        let err = reader.read_frame(0x1_0000, CardSlot::One).unwrap_err();
        assert!(matches!(err, Error::InvalidAddress { address: 0x1_0000, .. }));

        // Nothing went on the wire
        assert!(reader.backend().sent.is_empty());
    }

    #[test]
    fn test_malformed_response() {
        let mut reader = reader(4);
        reader.backend.truncate = true;

        let err = reader.read_frame(0, CardSlot::One).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { expected: 140, actual: 139 }));
    }

    #[test]
    fn test_transport_error() {
        let mut reader = reader(4);
        reader.backend.fail = true;

        let err = reader.read_frame(0, CardSlot::One).unwrap_err();
        match err {
            Error::Transport(TransportError::Io(cause)) => {
                assert_eq!(cause.kind(), std::io::ErrorKind::TimedOut);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_read_sector_without_engine() {
        let mut backend = MockBackend::new(8);
        let result = read_sector(&mut backend, 7, CardSlot::One).unwrap();
        assert!(result.is_valid());
        assert_eq!(&result.data()[..2], &[0x00, 0x07]);

        // Beyond this card, still representable: the card answers bad sector
        let result = read_sector(&mut backend, 0x0400, CardSlot::One).unwrap();
        assert_eq!(result.diagnostics(), &[Diagnostic::CardStatusError { status: 0xFF }]);

        assert!(matches!(
            read_sector(&mut backend, 0x1_0000, CardSlot::One),
            Err(Error::InvalidAddress { .. })
        ));
        assert_eq!(backend.sent.len(), 2);
    }

    #[test]
    fn test_borrowed_backend() {
        let mut backend = MockBackend::new(2);
        {
            let mut reader = MemcardReader::new(&mut backend);
            reader.init().unwrap();
            assert!(reader.read_frame(1, CardSlot::One).unwrap().is_valid());
        }
        assert!(backend.initialized);
        assert_eq!(backend.sent.len(), 1);
    }

    #[test]
    fn test_read_id() {
        let mut reader = reader(1);
        let id = reader.read_id(CardSlot::One).unwrap();
        assert!(id.is_valid());
        assert_eq!(id.bytes(), hex!("04 00 00 80"));
        assert_eq!(reader.backend().sent[0], hex!("81 53 00 00 00 00 00 00 00 00").to_vec());
    }

    #[test]
    fn test_read_card() {
        let mut reader = MemcardReader::with_config(
            MockBackend::new(128),
            ReaderConfig { frame_count: 128, verify_header: true },
        );
        reader.init().unwrap();
        reader.backend.corrupt_checksum = Some(70);

        let mut image = reader.read_card(CardSlot::One).unwrap();
        assert_eq!(image.len(), 127);
        assert_eq!(image.next_missing(), Some(70));
        assert_eq!(image.frame(3).unwrap()[..2], [0x00, 0x03]);

        reader.backend.corrupt_checksum = None;
        let added = reader.read_missing(&mut image, CardSlot::One).unwrap();
        assert_eq!(added, 1);
        assert!(image.is_full());
        assert_eq!(reader.backend().sent.len(), 129);

        let bytes = image.to_bytes();
        assert_eq!(bytes.len(), 128 * 128);
        assert_eq!(&bytes[70 * 128..70 * 128 + 2], &[0x00, 70]);
    }

    #[test]
    fn test_image_larger_than_card() {
        let mut reader = MemcardReader::with_config(
            MockBackend::new(16),
            ReaderConfig { frame_count: 16, verify_header: false },
        );
        reader.init().unwrap();

        let mut image = CardImage::new();
        let added = reader.read_missing(&mut image, CardSlot::One).unwrap();
        assert_eq!(added, 16);
        assert_eq!(image.len(), 16);
        assert_eq!(image.next_missing(), Some(16));
        assert_eq!(reader.backend().sent.len(), 16);
    }

    #[test]
    fn test_whole_address_space() {
        let mut reader = MemcardReader::with_config(
            MockBackend::new(4),
            ReaderConfig { frame_count: 0x1_0000, verify_header: false },
        );
        reader.init().unwrap();

        let result = reader.read_frame(0xFFFF, CardSlot::One).unwrap();
        assert_eq!(result.address(), 0xFFFF);
        assert_eq!(&reader.backend().sent[0][4..6], &[0xFF, 0xFF]);

        assert!(matches!(
            reader.read_frame(0x1_0000, CardSlot::One),
            Err(Error::InvalidAddress { address: 0x1_0000, .. })
        ));
    }
}
