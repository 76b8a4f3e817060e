pub mod backend;
pub mod card_image;
pub mod memcard_reader;
pub mod protocol;
