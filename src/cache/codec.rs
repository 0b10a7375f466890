//! Remote-blob wire format.
//!
//! Each stored value is a self-describing byte blob:
//!
//! ```text
//! | flags (1B) | length (4B BE) | payload (length B) |
//! ```
//!
//! Flags bit0 = zlib-compressed, bit1 = Fernet-encrypted. Encode order is
//! serialize → compress → encrypt; decode reverses: un-Fernet → un-zlib →
//! parse. The length prefix covers the payload as written (post-compression,
//! post-encryption) and is verified on read.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use super::error::{CacheError, CacheResult};

const FLAG_COMPRESSED: u8 = 0b0000_0001;
const FLAG_ENCRYPTED: u8 = 0b0000_0010;

/// Encodes and decodes remote cache blobs.
pub struct Codec {
    /// Payloads at or above this size are compressed. `None` disables
    /// compression.
    compression_threshold: Option<usize>,
    compression_level: u32,
    encryptor: Option<fernet::Fernet>,
}

/// Outcome of encoding, so the facade can meter compressions.
pub struct EncodedBlob {
    pub bytes: Vec<u8>,
    pub compressed: bool,
    pub encrypted: bool,
}

impl Codec {
    /// Build a codec. `encryption_key` must already be validated as a
    /// Fernet key by config resolution.
    pub fn new(
        compression_threshold: Option<usize>,
        compression_level: u32,
        encryption_key: Option<&str>,
    ) -> CacheResult<Self> {
        let encryptor = match encryption_key {
            Some(key) => Some(fernet::Fernet::new(key).ok_or_else(|| {
                CacheError::Internal("invalid Fernet encryption key".to_string())
            })?),
            None => None,
        };
        Ok(Self {
            compression_threshold,
            compression_level: compression_level.clamp(1, 9),
            encryptor,
        })
    }

    /// Encode a serialized JSON payload into a wire blob.
    pub fn encode(&self, payload: &[u8]) -> CacheResult<EncodedBlob> {
        let mut flags = 0u8;
        let mut body = payload.to_vec();

        if let Some(threshold) = self.compression_threshold
            && body.len() >= threshold
        {
            let mut encoder =
                ZlibEncoder::new(Vec::new(), Compression::new(self.compression_level));
            encoder
                .write_all(&body)
                .and_then(|_| encoder.finish())
                .map(|compressed| {
                    body = compressed;
                    flags |= FLAG_COMPRESSED;
                })
                .map_err(|e| CacheError::Serialization(format!("zlib: {e}")))?;
        }

        if let Some(encryptor) = &self.encryptor {
            body = encryptor.encrypt(&body).into_bytes();
            flags |= FLAG_ENCRYPTED;
        }

        let len = u32::try_from(body.len())
            .map_err(|_| CacheError::Serialization("payload exceeds 4GiB".to_string()))?;

        let mut bytes = Vec::with_capacity(5 + body.len());
        bytes.push(flags);
        bytes.extend_from_slice(&len.to_be_bytes());
        bytes.extend_from_slice(&body);

        Ok(EncodedBlob {
            bytes,
            compressed: flags & FLAG_COMPRESSED != 0,
            encrypted: flags & FLAG_ENCRYPTED != 0,
        })
    }

    /// Decode a wire blob back to the serialized JSON payload.
    pub fn decode(&self, blob: &[u8]) -> CacheResult<Vec<u8>> {
        if blob.len() < 5 {
            return Err(CacheError::Deserialization(
                "blob shorter than header".to_string(),
            ));
        }
        let flags = blob[0];
        let len = u32::from_be_bytes([blob[1], blob[2], blob[3], blob[4]]) as usize;
        let payload = &blob[5..];
        if payload.len() != len {
            return Err(CacheError::Deserialization(format!(
                "length prefix {len} does not match payload length {}",
                payload.len()
            )));
        }

        let mut body = payload.to_vec();

        if flags & FLAG_ENCRYPTED != 0 {
            let encryptor = self.encryptor.as_ref().ok_or_else(|| {
                CacheError::Decryption("entry is encrypted but no key is configured".to_string())
            })?;
            let token = std::str::from_utf8(&body)
                .map_err(|_| CacheError::Decryption("token is not valid UTF-8".to_string()))?;
            body = encryptor
                .decrypt(token)
                .map_err(|e| CacheError::Decryption(e.to_string()))?;
        }

        if flags & FLAG_COMPRESSED != 0 {
            let mut decoder = ZlibDecoder::new(body.as_slice());
            let mut decompressed = Vec::new();
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| CacheError::Deserialization(format!("zlib: {e}")))?;
            body = decompressed;
        }

        Ok(body)
    }
}
