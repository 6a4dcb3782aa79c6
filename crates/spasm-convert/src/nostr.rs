//! Nostr note identifier decoding.

use crate::error::ConvertError;

/// Length of a bech32 `note1…` encoding of a 32-byte event id.
pub const NOTE_ID_LENGTH: usize = 63;

const NOTE_HRP: &str = "note";

/// Whether `candidate` has the shape of a bech32 Nostr note id.
///
/// Only the length and prefix are checked; [`note_to_hex`] validates the
/// checksum.
pub fn is_note_id(candidate: &str) -> bool {
    candidate.len() == NOTE_ID_LENGTH && candidate.starts_with(NOTE_HRP)
}

/// Decodes a `note1…` identifier into the lowercase hex event id.
///
/// # Errors
///
/// Returns `ConvertError::InvalidNoteId` for malformed bech32 and
/// `ConvertError::UnexpectedPrefix` for other human-readable parts
/// (`npub`, `nevent`, ...).
pub fn note_to_hex(note: &str) -> Result<String, ConvertError> {
    let (hrp, data) =
        bech32::decode(note).map_err(|e| ConvertError::InvalidNoteId(e.to_string()))?;

    let hrp = hrp.to_string().to_ascii_lowercase();
    if hrp != NOTE_HRP {
        return Err(ConvertError::UnexpectedPrefix(hrp));
    }

    Ok(hex::encode(data))
}
