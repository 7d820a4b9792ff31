/// Default number of bytes per DRAM column cell
pub const DEFAULT_CELL_SIZE: u32 = 8;
/// Default baseline byte written to victim rows (all ones)
pub const DEFAULT_BASELINE: u8 = 0xFF;

/// Magic number at the start of every binary fliptable
pub const FLIPTBL_FILE_MAGIC: u32 = 0xf11b_7ab1;
/// Alignment of every section in a binary fliptable
pub const FLIPTBL_FILE_ALIGN: u64 = 0x80;
