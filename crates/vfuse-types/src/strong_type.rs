/// Macro to create a strongly-typed newtype wrapper around a primitive.
///
/// The generated type implements:
/// - `Deref` to the inner type
/// - `From<inner>` and `Into<inner>`
/// - `Display`, `Debug`, `Clone`, `Copy`, `Eq`, `Hash`, `Ord`, `Default`
/// - `serde` (transparent) and the wire codec (encoded as the inner value)
#[macro_export]
macro_rules! strong_type {
    ($name:ident, $inner:ty) => {
        #[derive(
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Default,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        #[repr(transparent)]
        pub struct $name(pub $inner);

        impl ::std::ops::Deref for $name {
            type Target = $inner;

            #[inline]
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            #[inline]
            fn from(val: $inner) -> Self {
                Self(val)
            }
        }

        impl From<$name> for $inner {
            #[inline]
            fn from(val: $name) -> Self {
                val.0
            }
        }

        impl vfuse_serde::WireSerialize for $name {
            fn wire_serialize(&self, buf: &mut Vec<u8>) -> Result<(), vfuse_serde::WireError> {
                self.0.wire_serialize(buf)
            }
        }

        impl vfuse_serde::WireDeserialize for $name {
            fn wire_deserialize(
                buf: &[u8],
                offset: &mut usize,
            ) -> Result<Self, vfuse_serde::WireError> {
                Ok(Self(<$inner as vfuse_serde::WireDeserialize>::wire_deserialize(
                    buf, offset,
                )?))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use vfuse_serde::WireSerialize;

    strong_type!(TestId, u64);

    #[test]
    fn test_strong_type_deref_and_from() {
        let id: TestId = 100u64.into();
        assert_eq!(*id, 100);
        let raw: u64 = id.into();
        assert_eq!(raw, 100);
    }

    #[test]
    fn test_strong_type_display_debug() {
        let id = TestId(7);
        assert_eq!(format!("{}", id), "7");
        assert_eq!(format!("{:?}", id), "TestId(7)");
    }

    #[test]
    fn test_strong_type_hash_ord() {
        let mut set = HashSet::new();
        set.insert(TestId(1));
        set.insert(TestId(2));
        set.insert(TestId(1));
        assert_eq!(set.len(), 2);
        assert!(TestId(1) < TestId(2));
    }

    #[test]
    fn test_strong_type_serde() {
        let json = serde_json::to_string(&TestId(42)).unwrap();
        assert_eq!(json, "42");
        let parsed: TestId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, TestId(42));
    }

    #[test]
    fn test_strong_type_wire_matches_inner() {
        let mut a = Vec::new();
        TestId(0xABCD).wire_serialize(&mut a).unwrap();
        assert_eq!(a, vfuse_serde::to_bytes(&0xABCDu64).unwrap());
        assert_eq!(vfuse_serde::from_bytes::<TestId>(&a).unwrap(), TestId(0xABCD));
    }
}
