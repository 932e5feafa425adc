//! Frame marker bytes
//!
//! The first byte of every frame decides how the rest is read. Two values are
//! reserved for length-prefixed binary frames; any other byte starts a text
//! frame. JSON text always begins with `{`, `[`, whitespace, a digit or a
//! quote, so it can never collide with a reserved marker.

/// Reserved marker for a binary frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameMarker {
    /// Emoji image attachment
    Emoji = 0x01,
    /// File upload, download or private transfer
    File = 0x02,
}

impl FrameMarker {
    /// Classify a leading byte; `None` means the text path
    #[must_use]
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Emoji),
            0x02 => Some(Self::File),
            _ => None,
        }
    }

    /// Get the raw byte value
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Check whether a byte is one of the reserved markers
    #[must_use]
    pub const fn is_reserved(value: u8) -> bool {
        matches!(value, 0x01 | 0x02)
    }

    /// Get the name of this marker
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Emoji => "emoji",
            Self::File => "file",
        }
    }
}

impl std::fmt::Display for FrameMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:#04x})", self.name(), self.as_byte())
    }
}
