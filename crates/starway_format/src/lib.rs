pub mod compressed;
pub mod entry;
pub mod montyformat;

pub use compressed::{CompressedBoard, COMPRESSED_BOARD_SIZE};
pub use entry::{DataEntry, ENTRY_SIZE};
pub use montyformat::{GameReader, PlyHeader};
