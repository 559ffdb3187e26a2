//! Write-ahead log: checksum-framed batch records, an append-only
//! writer gated by `DurabilityMode`, and a replay-on-open reader.

pub mod reader;
pub mod record;
pub mod writer;

pub use reader::replay;
pub use writer::WalWriter;
