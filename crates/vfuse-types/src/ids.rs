strong_type!(RequestId, u64);
strong_type!(FileHandle, u64);

impl RequestId {
    /// The id following this one. Correlation ids are never reused on a
    /// connection, so wrapping is not expected in practice.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl FileHandle {
    /// The peer never hands out handle 0; seeing it means the open failed.
    pub const INVALID: FileHandle = FileHandle(0);

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_next() {
        let id = RequestId::default();
        assert_eq!(id, RequestId(0));
        assert_eq!(id.next(), RequestId(1));
        assert_eq!(format!("{:?}", id.next()), "RequestId(1)");
    }

    #[test]
    fn test_file_handle_validity() {
        assert!(!FileHandle(0).is_valid());
        assert!(!FileHandle::default().is_valid());
        assert!(FileHandle(42).is_valid());
    }

    #[test]
    fn test_file_handle_serde() {
        let json = serde_json::to_string(&FileHandle(9)).unwrap();
        assert_eq!(json, "9");
    }
}
