use crate::event::StorageKey;

/// Output of a generation strategy. The variant decides the topology: bytes
/// are persisted inline, a remote reference is handed to a separate stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedImage {
    Bytes {
        data: Vec<u8>,
        content_type: &'static str,
    },
    Remote {
        url: String,
    },
}

impl GeneratedImage {
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let content_type = sniff_content_type(&data);
        Self::Bytes { data, content_type }
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self::Remote { url: url.into() }
    }
}

/// A durably persisted image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub storage_key: StorageKey,
    pub public_url: String,
}

/// Bucket and region that public URLs are derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactTarget {
    pub bucket: String,
    pub region: String,
}

impl ArtifactTarget {
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
        }
    }

    /// Virtual-hosted-style URL of an object. Existing links depend on this
    /// exact shape.
    pub fn public_url(&self, key: &StorageKey) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            self.bucket, self.region, key
        )
    }
}

const OCTET_STREAM: &str = "application/octet-stream";

/// Infer a MIME type from the leading bytes of an image payload.
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"BM", "image/bmp"),
        (b"\x00\x00\x01\x00", "image/x-icon"),
        (b"\x00\x00\x02\x00", "image/x-icon"),
    ];

    if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return "image/webp";
    }

    SIGNATURES
        .iter()
        .find(|(magic, _)| data.starts_with(magic))
        .map(|(_, mime)| *mime)
        .unwrap_or(OCTET_STREAM)
}
