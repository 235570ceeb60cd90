// src/formatting.rs

use crate::transport::Multipart;

/// Renders a received message as `topic sequence hex-body`.
///
/// The sequence is decoded from the trailing little-endian `u32` part. Parts
/// that do not fit the `[topic, body, sequence]` layout are shown as hex.
pub fn format_message(message: &Multipart) -> String {
    match message.as_slice() {
        [topic, body, sequence] if sequence.len() == 4 => {
            let mut seq = [0u8; 4];
            seq.copy_from_slice(sequence);
            format!(
                "{} {} {}",
                String::from_utf8_lossy(topic),
                u32::from_le_bytes(seq),
                hex::encode(body)
            )
        }
        parts => parts.iter().map(hex::encode).collect::<Vec<_>>().join(" "),
    }
}

/// The topic of a received message, if it has one.
pub fn topic(message: &Multipart) -> Option<&str> {
    message.first().and_then(|t| std::str::from_utf8(t).ok())
}
