//! Transfer metadata exchanged once per session, before any DATA flows.
//!
//! The META packet payload holds four NUL-terminated UTF-8 fields, in order:
//! short file name, extension (no leading dot), decimal file size in bytes,
//! decimal total packet count.

use crate::packet::MAX_DATA;

/// Parsed contents of a META payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferMetadata {
    /// File name without directory components or extension.
    pub name: String,
    /// Extension without the leading dot; `"bin"` when the path has none.
    pub extension: String,
    /// Total file length in bytes.
    pub file_size: u64,
    /// Number of DATA packets the transfer will comprise.
    pub total_packets: u64,
}

impl TransferMetadata {
    /// Derive metadata for `path` given the file's size and the chunk size
    /// the sender will stream with.
    pub fn for_file(path: &str, file_size: u64, chunk_size: usize) -> Self {
        let base = path.rsplit(['/', '\\']).next().unwrap_or(path);
        let (name, extension) = match base.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), ext.to_string()),
            _ => (base.to_string(), "bin".to_string()),
        };
        let total_packets = file_size.div_ceil(chunk_size as u64);
        Self {
            name,
            extension,
            file_size,
            total_packets,
        }
    }

    /// Serialise into a META payload: four NUL-terminated fields.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.name.len() + self.extension.len() + 48);
        for field in [
            self.name.as_str(),
            self.extension.as_str(),
            &self.file_size.to_string(),
            &self.total_packets.to_string(),
        ] {
            buf.extend_from_slice(field.as_bytes());
            buf.push(0);
        }
        debug_assert!(buf.len() <= MAX_DATA);
        buf
    }

    /// Parse a META payload produced by [`TransferMetadata::encode`].
    pub fn decode(payload: &[u8]) -> Result<Self, MetadataError> {
        let mut fields = payload.split(|&b| b == 0);
        let mut next = || -> Result<&[u8], MetadataError> {
            fields.next().ok_or(MetadataError::MissingField)
        };

        let name = std::str::from_utf8(next()?)
            .map_err(|_| MetadataError::InvalidUtf8)?
            .to_string();
        let extension = std::str::from_utf8(next()?)
            .map_err(|_| MetadataError::InvalidUtf8)?
            .to_string();
        let file_size = parse_decimal(next()?)?;
        let total_packets = parse_decimal(next()?)?;

        if name.is_empty() {
            return Err(MetadataError::MissingField);
        }

        Ok(Self {
            name,
            extension,
            file_size,
            total_packets,
        })
    }

    /// Output file name the receiver reconstructs the transfer under.
    pub fn output_name(&self) -> String {
        format!("{}.{}", self.name, self.extension)
    }
}

fn parse_decimal(bytes: &[u8]) -> Result<u64, MetadataError> {
    std::str::from_utf8(bytes)
        .map_err(|_| MetadataError::InvalidUtf8)?
        .parse()
        .map_err(|_| MetadataError::InvalidNumber)
}

/// Errors raised while parsing a META payload.
#[derive(Debug, PartialEq, Eq)]
pub enum MetadataError {
    /// Fewer than four NUL-terminated fields, or an empty file name.
    MissingField,
    /// A field is not valid UTF-8.
    InvalidUtf8,
    /// Size or packet-count field is not a decimal integer.
    InvalidNumber,
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::MissingField => write!(f, "metadata payload is missing a field"),
            MetadataError::InvalidUtf8 => write!(f, "metadata field is not valid UTF-8"),
            MetadataError::InvalidNumber => write!(f, "metadata numeric field failed to parse"),
        }
    }
}

impl std::error::Error for MetadataError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let meta = TransferMetadata {
            name: "report".into(),
            extension: "pdf".into(),
            file_size: 10_000,
            total_packets: 10,
        };
        assert_eq!(TransferMetadata::decode(&meta.encode()).unwrap(), meta);
    }

    #[test]
    fn for_file_splits_name_and_extension() {
        let meta = TransferMetadata::for_file("dir/sub/archive.tar.gz", 5000, 1000);
        assert_eq!(meta.name, "archive.tar");
        assert_eq!(meta.extension, "gz");
        assert_eq!(meta.total_packets, 5);
        assert_eq!(meta.output_name(), "archive.tar.gz");
    }

    #[test]
    fn for_file_without_extension_defaults_to_bin() {
        let meta = TransferMetadata::for_file("Makefile", 100, 1000);
        assert_eq!(meta.name, "Makefile");
        assert_eq!(meta.extension, "bin");
        assert_eq!(meta.total_packets, 1);
    }

    #[test]
    fn total_packets_rounds_up() {
        assert_eq!(TransferMetadata::for_file("a.txt", 10_000, 1000).total_packets, 10);
        assert_eq!(TransferMetadata::for_file("a.txt", 10_001, 1000).total_packets, 11);
        assert_eq!(TransferMetadata::for_file("a.txt", 0, 1000).total_packets, 0);
    }

    #[test]
    fn decode_rejects_missing_fields() {
        assert_eq!(
            TransferMetadata::decode(b"name\0txt\0"),
            Err(MetadataError::MissingField)
        );
    }

    #[test]
    fn decode_rejects_non_numeric_size() {
        assert_eq!(
            TransferMetadata::decode(b"name\0txt\0big\00\0"),
            Err(MetadataError::InvalidNumber)
        );
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        assert_eq!(
            TransferMetadata::decode(b"\xFF\xFE\0txt\0100\01\0"),
            Err(MetadataError::InvalidUtf8)
        );
    }
}
