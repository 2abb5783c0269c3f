//! Bit-field codec.
//!
//! Every entry address and physical address computed by the walker is one `select`
//! (lift a field out of a word) followed by one `install` (place it into another word).
//!
//! Bit ranges are inclusive on both ends and must satisfy `low <= high <= 63`.

#[must_use]
#[inline]
const fn mask(low: u32, high: u32) -> u64 {
    debug_assert!(low <= high && high <= 63, "Invalid bit range");
    u64::MAX >> (63 - (high - low))
}

#[must_use]
#[inline]
/// Returns bits `low..=high` of `x`, right-justified.
pub const fn select(x: u64, low: u32, high: u32) -> u64 {
    (x >> low) & mask(low, high)
}

#[must_use]
#[inline]
/// Returns `x` with bits `low..=high` replaced by the low `high - low + 1` bits of `value`.
///
/// Bits of `x` outside of the range are left untouched.
pub const fn install(value: u64, x: u64, low: u32, high: u32) -> u64 {
    let mask = mask(low, high);
    (x & !(mask << low)) | ((value & mask) << low)
}
