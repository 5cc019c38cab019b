use zerocopy::{FromBytes, IntoBytes};

/// Trait for memory primitives.
///
/// A primitive is an integer the EE can move in a single access: a byte, half-word, word,
/// double-word or quad-word. That is, [`u8`], [`u16`], [`u32`], [`u64`], [`u128`] and their
/// signed counterparts.
pub trait Primitive:
    Copy
    + Default
    + std::fmt::Debug
    + std::fmt::UpperHex
    + Send
    + Sync
    + 'static
{
    /// The alignment of this primitive.
    const ALIGNMENT: u32;

    /// Reads a little endian value of this primitive from a buffer. If `buf` does not contain
    /// enough data, it's going to be completed with zeros.
    fn read_le(buf: &[u8]) -> Self;

    /// Writes this primitive to the given buffer in little endian. If `buf` is not big enough,
    /// remaining bytes are going to be silently dropped.
    fn write_le(self, buf: &mut [u8]);
}

macro_rules! impl_primitive {
    ($($type:ty),*) => {
        $(
            impl Primitive for $type {
                const ALIGNMENT: u32 = size_of::<Self>() as u32;

                #[inline(always)]
                fn read_le(buf: &[u8]) -> Self {
                    /// Unhappy path for when `buf` is too small.
                    #[cold]
                    #[inline(never)]
                    fn read_unhappy(buf: &[u8]) -> $type {
                        let mut read_buf = [0u8; size_of::<$type>()];
                        read_buf[..buf.len()].copy_from_slice(buf);
                        <$type>::from_le_bytes(read_buf)
                    }

                    match <$type>::read_from_prefix(buf) {
                        Ok((value, _)) => <$type>::from_le(value),
                        Err(_) => read_unhappy(buf),
                    }
                }

                #[inline]
                fn write_le(self, buf: &mut [u8]) {
                    /// Unhappy path for when `buf` is too small.
                    #[cold]
                    #[inline(never)]
                    fn write_unhappy(value: $type, buf: &mut [u8]) {
                        let bytes = value.to_le_bytes();
                        let len = buf.len();
                        buf.copy_from_slice(&bytes[..len]);
                    }

                    if self.to_le().write_to_prefix(buf).is_err() {
                        write_unhappy(self, buf);
                    }
                }
            }
        )*
    };
}

impl_primitive! {
    u8,
    u16,
    u32,
    u64,
    u128,
    i8,
    i16,
    i32,
    i64
}

pub trait PrimitiveRw<P>
where
    P: Primitive,
{
    fn read(&self) -> P;
    fn write(&mut self, value: P);
}

impl<P> PrimitiveRw<P> for [u8]
where
    P: Primitive,
{
    fn read(&self) -> P {
        P::read_le(self)
    }

    fn write(&mut self, value: P) {
        value.write_le(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_little_endian() {
        let buf = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(<[u8] as PrimitiveRw<u32>>::read(&buf), 0x0403_0201);
        assert_eq!(<[u8] as PrimitiveRw<u64>>::read(&buf), 0x0807_0605_0403_0201);
    }

    #[test]
    fn short_buffers() {
        let buf = [0xAA, 0xBB];
        assert_eq!(<[u8] as PrimitiveRw<u32>>::read(&buf), 0xBBAA);

        let mut buf = [0u8; 3];
        buf.write(0x1122_3344u32);
        assert_eq!(buf, [0x44, 0x33, 0x22]);
    }

    #[test]
    fn quadword_write() {
        let mut buf = [0u8; 16];
        buf.write(u128::MAX - 1);
        assert_eq!(buf[0], 0xFE);
        assert!(buf[1..].iter().all(|&b| b == 0xFF));
    }
}
