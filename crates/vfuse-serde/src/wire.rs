use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("insufficient data: need {need} bytes but only {have} remain")]
    InsufficientData { need: usize, have: usize },
    #[error("invalid enum variant for {enum_name}: {value}")]
    InvalidEnumVariant {
        enum_name: &'static str,
        value: u64,
    },
    #[error("invalid UTF-8 string")]
    InvalidUtf8,
    #[error("data too large: {size} bytes")]
    DataTooLarge { size: usize },
    #[error("{trailing} trailing bytes after decoded value")]
    TrailingBytes { trailing: usize },
}

pub trait WireSerialize {
    fn wire_serialize(&self, buf: &mut Vec<u8>) -> Result<(), WireError>;
}

pub trait WireDeserialize: Sized {
    fn wire_deserialize(buf: &[u8], offset: &mut usize) -> Result<Self, WireError>;
}

/// Encode `val` into a fresh buffer.
pub fn to_bytes<T: WireSerialize + ?Sized>(val: &T) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::new();
    val.wire_serialize(&mut buf)?;
    Ok(buf)
}

/// Decode a value that must occupy the whole of `buf`.
pub fn from_bytes<T: WireDeserialize>(buf: &[u8]) -> Result<T, WireError> {
    let mut offset = 0;
    let val = T::wire_deserialize(buf, &mut offset)?;
    if offset != buf.len() {
        return Err(WireError::TrailingBytes {
            trailing: buf.len() - offset,
        });
    }
    Ok(val)
}

fn read_bytes<'a>(buf: &'a [u8], offset: &mut usize, n: usize) -> Result<&'a [u8], WireError> {
    let have = buf.len().saturating_sub(*offset);
    if have < n {
        return Err(WireError::InsufficientData { need: n, have });
    }
    let slice = &buf[*offset..*offset + n];
    *offset += n;
    Ok(slice)
}

/// Length prefix shared by strings, byte buffers and sequences.
fn write_len(len: usize, buf: &mut Vec<u8>) -> Result<(), WireError> {
    let len = u32::try_from(len).map_err(|_| WireError::DataTooLarge { size: len })?;
    len.wire_serialize(buf)
}

fn read_len(buf: &[u8], offset: &mut usize) -> Result<usize, WireError> {
    Ok(u32::wire_deserialize(buf, offset)? as usize)
}

// ---------------------------------------------------------------------------
// Integer types
// ---------------------------------------------------------------------------

macro_rules! impl_wire_for_int {
    ($ty:ty, $size:expr, $read:ident, $write:ident) => {
        impl WireSerialize for $ty {
            fn wire_serialize(&self, buf: &mut Vec<u8>) -> Result<(), WireError> {
                let mut tmp = [0u8; $size];
                LittleEndian::$write(&mut tmp, *self);
                buf.extend_from_slice(&tmp);
                Ok(())
            }
        }

        impl WireDeserialize for $ty {
            fn wire_deserialize(buf: &[u8], offset: &mut usize) -> Result<Self, WireError> {
                let bytes = read_bytes(buf, offset, $size)?;
                Ok(LittleEndian::$read(bytes))
            }
        }
    };
}

impl_wire_for_int!(u16, 2, read_u16, write_u16);
impl_wire_for_int!(u32, 4, read_u32, write_u32);
impl_wire_for_int!(u64, 8, read_u64, write_u64);
impl_wire_for_int!(i32, 4, read_i32, write_i32);
impl_wire_for_int!(i64, 8, read_i64, write_i64);

impl WireSerialize for u8 {
    fn wire_serialize(&self, buf: &mut Vec<u8>) -> Result<(), WireError> {
        buf.push(*self);
        Ok(())
    }
}

impl WireDeserialize for u8 {
    fn wire_deserialize(buf: &[u8], offset: &mut usize) -> Result<Self, WireError> {
        Ok(read_bytes(buf, offset, 1)?[0])
    }
}

impl WireSerialize for bool {
    fn wire_serialize(&self, buf: &mut Vec<u8>) -> Result<(), WireError> {
        buf.push(u8::from(*self));
        Ok(())
    }
}

impl WireDeserialize for bool {
    fn wire_deserialize(buf: &[u8], offset: &mut usize) -> Result<Self, WireError> {
        match u8::wire_deserialize(buf, offset)? {
            0 => Ok(false),
            1 => Ok(true),
            v => Err(WireError::InvalidEnumVariant {
                enum_name: "bool",
                value: v as u64,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Strings and byte buffers
// ---------------------------------------------------------------------------

impl WireSerialize for String {
    fn wire_serialize(&self, buf: &mut Vec<u8>) -> Result<(), WireError> {
        self.as_str().wire_serialize(buf)
    }
}

impl WireSerialize for str {
    fn wire_serialize(&self, buf: &mut Vec<u8>) -> Result<(), WireError> {
        write_len(self.len(), buf)?;
        buf.extend_from_slice(self.as_bytes());
        Ok(())
    }
}

impl WireDeserialize for String {
    fn wire_deserialize(buf: &[u8], offset: &mut usize) -> Result<Self, WireError> {
        let len = read_len(buf, offset)?;
        let bytes = read_bytes(buf, offset, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidUtf8)
    }
}

impl WireSerialize for bytes::Bytes {
    fn wire_serialize(&self, buf: &mut Vec<u8>) -> Result<(), WireError> {
        write_len(self.len(), buf)?;
        buf.extend_from_slice(self);
        Ok(())
    }
}

impl WireDeserialize for bytes::Bytes {
    fn wire_deserialize(buf: &[u8], offset: &mut usize) -> Result<Self, WireError> {
        let len = read_len(buf, offset)?;
        let bytes = read_bytes(buf, offset, len)?;
        Ok(bytes::Bytes::copy_from_slice(bytes))
    }
}

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

impl<T: WireSerialize> WireSerialize for Vec<T> {
    fn wire_serialize(&self, buf: &mut Vec<u8>) -> Result<(), WireError> {
        write_len(self.len(), buf)?;
        for item in self {
            item.wire_serialize(buf)?;
        }
        Ok(())
    }
}

impl<T: WireDeserialize> WireDeserialize for Vec<T> {
    fn wire_deserialize(buf: &[u8], offset: &mut usize) -> Result<Self, WireError> {
        let len = read_len(buf, offset)?;
        // Each element takes at least one byte; cap the reservation by what is left.
        let mut result = Vec::with_capacity(len.min(buf.len().saturating_sub(*offset)));
        for _ in 0..len {
            result.push(T::wire_deserialize(buf, offset)?);
        }
        Ok(result)
    }
}

impl<T: WireSerialize> WireSerialize for Option<T> {
    fn wire_serialize(&self, buf: &mut Vec<u8>) -> Result<(), WireError> {
        match self {
            None => 0u8.wire_serialize(buf),
            Some(val) => {
                1u8.wire_serialize(buf)?;
                val.wire_serialize(buf)
            }
        }
    }
}

impl<T: WireDeserialize> WireDeserialize for Option<T> {
    fn wire_deserialize(buf: &[u8], offset: &mut usize) -> Result<Self, WireError> {
        match u8::wire_deserialize(buf, offset)? {
            0 => Ok(None),
            1 => Ok(Some(T::wire_deserialize(buf, offset)?)),
            v => Err(WireError::InvalidEnumVariant {
                enum_name: "Option",
                value: v as u64,
            }),
        }
    }
}

impl<T: WireSerialize + ?Sized> WireSerialize for &T {
    fn wire_serialize(&self, buf: &mut Vec<u8>) -> Result<(), WireError> {
        (**self).wire_serialize(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_layout() {
        let buf = to_bytes(&0x0403_0201u32).unwrap();
        assert_eq!(buf, vec![0x01, 0x02, 0x03, 0x04]);

        let buf = to_bytes(&-2i64).unwrap();
        assert_eq!(buf, vec![0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_string_is_length_prefixed() {
        let buf = to_bytes("ab").unwrap();
        assert_eq!(buf, vec![2, 0, 0, 0, b'a', b'b']);
        assert_eq!(from_bytes::<String>(&buf).unwrap(), "ab");
    }

    #[test]
    fn test_bytes_keeps_payload() {
        let data = bytes::Bytes::from_static(b"hello\0world");
        let buf = to_bytes(&data).unwrap();
        assert_eq!(buf.len(), 4 + data.len());
        assert_eq!(from_bytes::<bytes::Bytes>(&buf).unwrap(), data);
    }

    #[test]
    fn test_option_tags() {
        assert_eq!(to_bytes(&None::<u32>).unwrap(), vec![0]);
        assert_eq!(to_bytes(&Some(7u8)).unwrap(), vec![1, 7]);
        assert_eq!(from_bytes::<Option<u8>>(&[1, 7]).unwrap(), Some(7));
        assert!(matches!(
            from_bytes::<Option<u8>>(&[9, 7]),
            Err(WireError::InvalidEnumVariant { enum_name: "Option", value: 9 })
        ));
    }

    #[test]
    fn test_vec_of_strings_keeps_order() {
        let v = vec!["b".to_string(), "a".to_string()];
        let buf = to_bytes(&v).unwrap();
        assert_eq!(from_bytes::<Vec<String>>(&buf).unwrap(), v);
    }

    #[test]
    fn test_bool_rejects_garbage() {
        assert!(from_bytes::<bool>(&[1]).unwrap());
        assert!(from_bytes::<bool>(&[2]).is_err());
    }

    #[test]
    fn test_insufficient_data() {
        match from_bytes::<u32>(&[0, 0]) {
            Err(WireError::InsufficientData { need, have }) => {
                assert_eq!(need, 4);
                assert_eq!(have, 2);
            }
            other => panic!("expected InsufficientData, got {:?}", other),
        }
    }

    #[test]
    fn test_huge_length_prefix_fails_cleanly() {
        let buf = to_bytes(&u32::MAX).unwrap();
        assert!(matches!(
            from_bytes::<Vec<u64>>(&buf),
            Err(WireError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut buf = to_bytes(&2u32).unwrap();
        buf.extend_from_slice(&[0xFF, 0xFE]);
        assert!(matches!(from_bytes::<String>(&buf), Err(WireError::InvalidUtf8)));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        assert!(matches!(
            from_bytes::<u16>(&[1, 0, 0]),
            Err(WireError::TrailingBytes { trailing: 1 })
        ));
    }
}
