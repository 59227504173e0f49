use sha2::{Digest, Sha256};

use crate::error::CoreError;
use crate::models::MediaDescriptor;

/// Checks downloaded plaintext against the length and SHA-256 the sender
/// advertised. Empty descriptor fields are not checked.
pub fn verify_plaintext(descriptor: &MediaDescriptor, bytes: &[u8]) -> Result<(), CoreError> {
    if descriptor.file_length != 0 && descriptor.file_length != bytes.len() as u64 {
        return Err(CoreError::MediaMismatch(format!(
            "expected {} bytes, got {}",
            descriptor.file_length,
            bytes.len()
        )));
    }
    if !descriptor.file_sha256.is_empty() {
        let digest = Sha256::digest(bytes);
        if digest.as_slice() != descriptor.file_sha256.as_slice() {
            return Err(CoreError::MediaMismatch(format!(
                "sha256 {} does not match expected {}",
                hex::encode(digest),
                hex::encode(&descriptor.file_sha256)
            )));
        }
    }
    Ok(())
}

/// File name to save a media message under when the sender gave none.
pub fn fallback_filename(descriptor: &MediaDescriptor, message_id: &str) -> String {
    if !descriptor.filename.is_empty() {
        return descriptor.filename.clone();
    }
    let ext = match descriptor.media_type.as_str() {
        "image" => "jpg",
        "video" => "mp4",
        "audio" => "ogg",
        "sticker" => "webp",
        _ => "bin",
    };
    format!("{}_{}.{}", descriptor.media_type, message_id, ext)
}
