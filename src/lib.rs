pub mod error;
pub mod spi;

pub use embedded_hal::spi as eh_spi;
pub use error::{Error, TransportError};
pub use spi::backend::{BitOrder, BusConfig, SpiBackend, SpiMode};
pub use spi::card_image::CardImage;
pub use spi::memcard_reader::{read_sector, MemcardReader, ReaderConfig};
pub use spi::protocol::commands::{CardSlot, CardStatus};
pub use spi::protocol::frame::{CardId, CommandFrame, IdFrame};
pub use spi::protocol::response::{CardIdentity, Diagnostic, ReadResult};

#[cfg(feature = "ftdi")]
pub use libftd2xx::{Ft4232h, FtdiCommon};
