/// Parses `Self` from the front of a little-endian byte stream, consuming
/// exactly as many bytes as the on-disk representation occupies.
pub trait FromBytesLE<It>: Sized
where
    It: Iterator<Item = u8>,
{
    fn from_bytes_le(data: &mut It) -> Option<Self>;
}

/// Big-endian counterpart of [`FromBytesLE`]; used only where the on-disk
/// format mandates big-endian (the LZ4 compressed-length prefix).
pub trait FromBytesBE<It>: Sized
where
    It: Iterator<Item = u8>,
{
    fn from_bytes_be(data: &mut It) -> Option<Self>;
}

macro_rules! impl_from_bytes_for_int {
    ($t:ty, $read_le:ident, $read_be:ident) => {
        impl<It> FromBytesLE<It> for $t
        where
            It: Iterator<Item = u8>,
        {
            fn from_bytes_le(data: &mut It) -> Option<Self> {
                data.$read_le()
            }
        }

        impl<It> FromBytesBE<It> for $t
        where
            It: Iterator<Item = u8>,
        {
            fn from_bytes_be(data: &mut It) -> Option<Self> {
                data.$read_be()
            }
        }
    };
}

impl_from_bytes_for_int!(u16, read_u16_le, read_u16_be);
impl_from_bytes_for_int!(u32, read_u32_le, read_u32_be);
impl_from_bytes_for_int!(u64, read_u64_le, read_u64_be);
impl_from_bytes_for_int!(i16, read_i16_le, read_i16_be);
impl_from_bytes_for_int!(i32, read_i32_le, read_i32_be);
impl_from_bytes_for_int!(i64, read_i64_le, read_i64_be);

impl<It> FromBytesLE<It> for u8
where
    It: Iterator<Item = u8>,
{
    fn from_bytes_le(data: &mut It) -> Option<Self> {
        data.read_u8()
    }
}

pub trait ByteIter {
    fn read_u8(&mut self) -> Option<u8>;
    fn read_i16_be(&mut self) -> Option<i16>;
    fn read_i16_le(&mut self) -> Option<i16>;
    fn read_i32_be(&mut self) -> Option<i32>;
    fn read_i32_le(&mut self) -> Option<i32>;
    fn read_i64_be(&mut self) -> Option<i64>;
    fn read_i64_le(&mut self) -> Option<i64>;

    fn read_u16_be(&mut self) -> Option<u16>;
    fn read_u16_le(&mut self) -> Option<u16>;
    fn read_u32_be(&mut self) -> Option<u32>;
    fn read_u32_le(&mut self) -> Option<u32>;
    fn read_u64_be(&mut self) -> Option<u64>;
    fn read_u64_le(&mut self) -> Option<u64>;

    #[must_use]
    fn skip_n_bytes(&mut self, n_bytes: usize) -> Option<()>;
}

impl<T> ByteIter for T
where
    T: Iterator<Item = u8>,
{
    fn skip_n_bytes(&mut self, n_bytes: usize) -> Option<()> {
        if n_bytes > 0 {
            self.nth(n_bytes-1)?;
        }    
        Some(())
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.next()
    }

    fn read_i16_be(&mut self) -> Option<i16> {
        Some(i16::from_be_bytes([self.next()?, self.next()?]))
    }

    fn read_u16_be(&mut self) -> Option<u16> {
        Some(u16::from_be_bytes([self.next()?, self.next()?]))
    }

    fn read_i32_be(&mut self) -> Option<i32> {
        Some(i32::from_be_bytes([
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
        ]))
    }

    fn read_u32_be(&mut self) -> Option<u32> {
        Some(u32::from_be_bytes([
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
        ]))
    }

    fn read_i64_be(&mut self) -> Option<i64> {
        Some(i64::from_be_bytes([
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
        ]))
    }

    fn read_u64_be(&mut self) -> Option<u64> {
        Some(u64::from_be_bytes([
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
        ]))
    }

    fn read_i16_le(&mut self) -> Option<i16> {
        Some(i16::from_le_bytes([self.next()?, self.next()?]))
    }

    fn read_u16_le(&mut self) -> Option<u16> {
        Some(u16::from_le_bytes([self.next()?, self.next()?]))
    }

    fn read_i32_le(&mut self) -> Option<i32> {
        Some(i32::from_le_bytes([
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
        ]))
    }

    fn read_u32_le(&mut self) -> Option<u32> {
        Some(u32::from_le_bytes([
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
        ]))
    }

    fn read_i64_le(&mut self) -> Option<i64> {
        Some(i64::from_le_bytes([
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
        ]))
    }

    fn read_u64_le(&mut self) -> Option<u64> {
        Some(u64::from_le_bytes([
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
            self.next()?,
        ]))
    }
}
