use crate::TypeDescriptor;

/// A Rust primitive that can live on the untyped data stack.
///
/// There are no runtime type tags: a value is just `SIZE` native-endian
/// bytes, and well-typedness is established entirely by the compiler before
/// execution starts. The codec is the only place the byte layout is defined.
pub trait StackValue: Copy + Default + PartialEq + std::fmt::Debug + 'static {
    /// The descriptor this primitive corresponds to in the type system.
    const TYPE: TypeDescriptor;
    /// Exact byte footprint on the data stack.
    const SIZE: usize;

    /// Encode into the first `SIZE` bytes of `buf`. Caller guarantees
    /// `buf.len() >= SIZE`.
    fn write_to(self, buf: &mut [u8]);

    /// Decode from the first `SIZE` bytes of `buf`. Caller guarantees
    /// `buf.len() >= SIZE`.
    fn read_from(buf: &[u8]) -> Self;
}

macro_rules! impl_stack_value {
    ($($t:ty => $td:ident),* $(,)?) => {$(
        impl StackValue for $t {
            const TYPE: TypeDescriptor = TypeDescriptor::$td;
            const SIZE: usize = std::mem::size_of::<$t>();

            #[inline(always)]
            fn write_to(self, buf: &mut [u8]) {
                buf[..Self::SIZE].copy_from_slice(&self.to_ne_bytes());
            }

            #[inline(always)]
            fn read_from(buf: &[u8]) -> Self {
                let mut bytes = [0u8; std::mem::size_of::<$t>()];
                bytes.copy_from_slice(&buf[..Self::SIZE]);
                <$t>::from_ne_bytes(bytes)
            }
        }
    )*};
}

impl_stack_value! {
    f64 => Float64,
    f32 => Float32,
    u64 => UInt64,
    i64 => Int64,
    u32 => UInt32,
    i32 => Int32,
    u16 => UInt16,
    i16 => Int16,
    u8  => UInt8,
    i8  => Int8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_round_trip() {
        let mut buf = [0u8; 8];
        3.25f64.write_to(&mut buf);
        assert_eq!(f64::read_from(&buf), 3.25);

        (-7i16).write_to(&mut buf);
        assert_eq!(i16::read_from(&buf), -7);

        0xABu8.write_to(&mut buf);
        assert_eq!(u8::read_from(&buf), 0xAB);
    }

    #[test]
    fn sizes_match_descriptors() {
        assert_eq!(<f32 as StackValue>::SIZE, TypeDescriptor::Float32.storage_size());
        assert_eq!(<u64 as StackValue>::SIZE, TypeDescriptor::UInt64.storage_size());
        assert_eq!(<i8 as StackValue>::SIZE, TypeDescriptor::Int8.storage_size());
    }
}
