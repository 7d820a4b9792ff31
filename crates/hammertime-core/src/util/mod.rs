//! Utility functions and constants used throughout the crate.
//!
//! - Constants for the data model ([`DEFAULT_CELL_SIZE`], [`DEFAULT_BASELINE`])
//! - Binary fliptable constants ([`FLIPTBL_FILE_MAGIC`], [`FLIPTBL_FILE_ALIGN`])
//! - [`align_up`] for section placement

mod constants;

pub use self::constants::*;

/// Rounds `n` up to the next multiple of `align`.
///
/// `align` must be a power of two.
///
/// # Examples
///
/// ```
/// use hammertime_core::util::align_up;
///
/// assert_eq!(align_up(0, 128), 0);
/// assert_eq!(align_up(56, 128), 128);
/// assert_eq!(align_up(256, 128), 256);
/// ```
pub const fn align_up(n: u64, align: u64) -> u64 {
    (n + align - 1) & !(align - 1)
}

/// Iterates over the indices of all set bits of `mask`, lowest first.
pub fn set_bits(mask: u8) -> impl Iterator<Item = u8> {
    (0..8u8).filter(move |b| mask & (1 << b) != 0)
}

#[cfg(test)]
mod tests {
    use super::{align_up, set_bits};

    #[test]
    fn align() {
        assert_eq!(align_up(1, 128), 128);
        assert_eq!(align_up(129, 128), 256);
    }

    #[test]
    fn bits() {
        assert_eq!(set_bits(0).count(), 0);
        assert_eq!(set_bits(0b1000_0101).collect::<Vec<_>>(), vec![0, 2, 7]);
    }
}
