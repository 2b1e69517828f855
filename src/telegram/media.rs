//! Opaque photo references.
//!
//! A photo received from Telegram is identified by an id, an access
//! hash and a server-issued file reference. The store only ever sees
//! the flattened `id:access_hash:base64(file_reference)` string; this
//! module converts between the two shapes.

use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use grammers_tl_types as tl;
use thiserror::Error;

/// Errors that can occur when decoding a stored photo reference.
#[derive(Debug, Error)]
pub enum ParsePhotoRefError {
    #[error("Photo reference must have the shape id:access_hash:file_reference")]
    WrongShape,

    #[error("Invalid number in photo reference: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),

    #[error("Invalid file reference encoding: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
}

/// The parts of a Telegram photo needed to send it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRef {
    pub id: i64,
    pub access_hash: i64,
    pub file_reference: Vec<u8>,
}

impl PhotoRef {
    /// Extracts a reference from a received photo.
    #[must_use]
    pub fn from_photo(photo: &tl::types::Photo) -> Self {
        Self {
            id: photo.id,
            access_hash: photo.access_hash,
            file_reference: photo.file_reference.clone(),
        }
    }

    /// Builds the media payload for re-sending this photo.
    #[must_use]
    pub fn to_input_media(&self) -> tl::enums::InputMedia {
        tl::enums::InputMedia::Photo(tl::types::InputMediaPhoto {
            spoiler: false,
            live_photo: false,
            id: tl::enums::InputPhoto::Photo(tl::types::InputPhoto {
                id: self.id,
                access_hash: self.access_hash,
                file_reference: self.file_reference.clone(),
            }),
            ttl_seconds: None,
            video: None,
        })
    }
}

impl fmt::Display for PhotoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.id,
            self.access_hash,
            BASE64.encode(&self.file_reference)
        )
    }
}

impl FromStr for PhotoRef {
    type Err = ParsePhotoRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (Some(id), Some(access_hash), Some(file_reference)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(ParsePhotoRefError::WrongShape);
        };

        Ok(Self {
            id: id.parse()?,
            access_hash: access_hash.parse()?,
            file_reference: BASE64.decode(file_reference)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_parse_round_trip() {
        let photo = PhotoRef {
            id: 123_456,
            access_hash: -987_654,
            file_reference: vec![1, 2, 3, 255],
        };
        let encoded = photo.to_string();
        assert_eq!(encoded.parse::<PhotoRef>().unwrap(), photo);
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        assert!(matches!(
            "123:456".parse::<PhotoRef>(),
            Err(ParsePhotoRefError::WrongShape)
        ));
    }

    #[test]
    fn test_parse_rejects_bad_numbers() {
        assert!(matches!(
            "abc:456:AQID".parse::<PhotoRef>(),
            Err(ParsePhotoRefError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_parse_rejects_bad_base64() {
        assert!(matches!(
            "1:2:%%%".parse::<PhotoRef>(),
            Err(ParsePhotoRefError::InvalidEncoding(_))
        ));
    }
}
