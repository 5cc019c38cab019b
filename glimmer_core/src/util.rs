/// Creates a boxed array of the given element without building it on the stack first.
pub fn boxed_array<T, const LEN: usize>(value: T) -> Box<[T; LEN]>
where
    T: Clone,
{
    let boxed_slice = vec![value; LEN].into_boxed_slice();
    debug_assert_eq!(boxed_slice.len(), LEN);

    // SAFETY: the slice has exactly LEN elements, so it has the same layout as [T; LEN]
    unsafe { Box::from_raw(Box::into_raw(boxed_slice).cast::<[T; LEN]>()) }
}

/// Splits a 128-bit value into its 32-bit lanes, lowest lane first.
#[inline(always)]
pub const fn words(value: u128) -> [u32; 4] {
    [
        value as u32,
        (value >> 32) as u32,
        (value >> 64) as u32,
        (value >> 96) as u32,
    ]
}

/// Joins 32-bit lanes, lowest lane first, into a 128-bit value.
#[inline(always)]
pub const fn from_words(words: [u32; 4]) -> u128 {
    (words[0] as u128)
        | ((words[1] as u128) << 32)
        | ((words[2] as u128) << 64)
        | ((words[3] as u128) << 96)
}

/// Splits a 128-bit value into its 16-bit lanes, lowest lane first.
#[inline(always)]
pub fn halfwords(value: u128) -> [u16; 8] {
    std::array::from_fn(|i| (value >> (16 * i)) as u16)
}

/// Joins 16-bit lanes, lowest lane first, into a 128-bit value.
#[inline(always)]
pub fn from_halfwords(halfwords: [u16; 8]) -> u128 {
    halfwords
        .iter()
        .enumerate()
        .fold(0, |acc, (i, &h)| acc | (u128::from(h) << (16 * i)))
}

/// Splits a 128-bit value into its bytes, lowest lane first.
#[inline(always)]
pub const fn bytes(value: u128) -> [u8; 16] {
    value.to_le_bytes()
}

/// Joins bytes, lowest lane first, into a 128-bit value.
#[inline(always)]
pub const fn from_bytes(bytes: [u8; 16]) -> u128 {
    u128::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lanes_are_little_endian() {
        let value = 0x0000_0004_0000_0003_0000_0002_0000_0001u128;
        assert_eq!(words(value), [1, 2, 3, 4]);
        assert_eq!(from_words([1, 2, 3, 4]), value);
        assert_eq!(halfwords(value)[2], 2);
        assert_eq!(from_halfwords(halfwords(value)), value);
        assert_eq!(from_bytes(bytes(value)), value);
    }

    #[test]
    fn boxed_array_is_filled() {
        let array = boxed_array::<u8, 4096>(0xAB);
        assert!(array.iter().all(|&b| b == 0xAB));
    }
}
