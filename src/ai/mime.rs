/// Sniff an image MIME type from magic bytes.
pub fn detect_image_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [0x89, 0x50, 0x4E, 0x47, ..] => "image/png",
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => "image/webp",
        _ => {
            tracing::warn!(
                "Unrecognized image format (first 4 bytes: {:02X?}), falling back to image/png",
                &bytes[..bytes.len().min(4)]
            );
            "image/png"
        }
    }
}

/// Prefer the provider-reported type, sniffing only when it is missing or
/// not an image type.
pub fn resolve_image_mime(reported: &str, bytes: &[u8]) -> String {
    let reported = reported.trim();
    if reported.starts_with("image/") {
        reported.to_ascii_lowercase()
    } else {
        detect_image_mime(bytes).to_string()
    }
}
