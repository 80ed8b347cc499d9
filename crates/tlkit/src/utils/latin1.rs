//! ISO-8859-1 conversion.
//!
//! Strings in the game files are raw bytes. Mapping every byte to the code
//! point of the same value gives a lossless `String` view of them.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Character {ch:?} at index {index} is outside the Latin-1 range")]
pub struct NotLatin1 {
    pub ch: char,
    pub index: usize,
}

#[must_use]
pub fn decode(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}

pub fn encode(text: &str) -> Result<Vec<u8>, NotLatin1> {
    text.chars()
        .enumerate()
        .map(|(index, ch)| u8::try_from(ch).map_err(|_| NotLatin1 { ch, index }))
        .collect()
}
