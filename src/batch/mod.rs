pub mod codec;
pub mod layout;

pub use codec::{read_batch, write_batch, BatchError};
pub use layout::{BatchFile, DumpLayout};
