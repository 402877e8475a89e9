//! Unique identifier minting.
//!
//! Two canonical textual encodings exist:
//!
//! - [`IdentifierKind::General`]: 36 characters, random UUID-v4 text
//!   (`xxxxxxxx-xxxx-4xxx-yxxx-xxxxxxxxxxxx`)
//! - [`IdentifierKind::ArrayMedia`]: 54 characters, five zero-padded
//!   10-digit decimal fields joined by `-`
//!   (`0000027696-1179523014-0000013966-0000021724-0000016941`): process id,
//!   UTC epoch seconds, a per-process sequence number, then two random draws
//!
//! General identifiers carry 122 bits of OS-seeded randomness. Array-media
//! identifiers are distinct within a process through the sequence field and
//! across processes through the random fields. Nothing is cached or
//! deduplicated.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

const GENERAL_LEN: usize = 36;
const FIELD_LEN: usize = 10;
const FIELDS: usize = 5;
const ARRAY_MEDIA_LEN: usize = FIELDS * FIELD_LEN + FIELDS - 1;
const HYPHENS: [usize; 4] = [8, 13, 18, 23];

/// Sequence field of array-media identifiers, starting at a random value.
fn sequence() -> &'static AtomicU32 {
    static SEQUENCE: OnceLock<AtomicU32> = OnceLock::new();
    SEQUENCE.get_or_init(|| AtomicU32::new(rand::thread_rng().gen()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentifierKind {
    /// File identifiers and other general-purpose tokens
    General,
    /// Identifiers stamped onto array media (barcoded plates and chips)
    ArrayMedia,
}

/// A generated identifier in one of the canonical encodings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Mint a fresh identifier.
    pub fn generate(kind: IdentifierKind) -> Self {
        match kind {
            IdentifierKind::General => Identifier(random_guid()),
            IdentifierKind::ArrayMedia => {
                let mut rng = rand::thread_rng();
                // Seconds past 9_999_999_999 would overflow the field
                let seconds = Utc::now().timestamp().clamp(0, 9_999_999_999) as u64;
                let fields = [
                    u64::from(std::process::id()),
                    seconds,
                    u64::from(sequence().fetch_add(1, Ordering::Relaxed)),
                    u64::from(rng.gen::<u32>()),
                    u64::from(rng.gen::<u32>()),
                ];
                let text = fields
                    .iter()
                    .map(|f| format!("{:010}", f))
                    .collect::<Vec<_>>()
                    .join("-");
                Identifier(text)
            }
        }
    }

    /// Canonical length in characters for `kind`.
    pub fn len(kind: IdentifierKind) -> usize {
        match kind {
            IdentifierKind::General => GENERAL_LEN,
            IdentifierKind::ArrayMedia => ARRAY_MEDIA_LEN,
        }
    }

    /// Check whether `text` is in either canonical encoding.
    pub fn is_well_formed(text: &str) -> bool {
        match text.len() {
            GENERAL_LEN => is_guid(text),
            ARRAY_MEDIA_LEN => {
                let fields: Vec<&str> = text.split('-').collect();
                fields.len() == FIELDS
                    && fields
                        .iter()
                        .all(|f| f.len() == FIELD_LEN && f.bytes().all(|b| b.is_ascii_digit()))
            }
            _ => false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

fn random_guid() -> String {
    let mut bytes: [u8; 16] = rand::thread_rng().gen();
    // Version 4, RFC 4122 variant
    bytes[6] = (bytes[6] & 0x0F) | 0x40;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;

    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

fn is_guid(text: &str) -> bool {
    text.len() == GENERAL_LEN
        && text.bytes().enumerate().all(|(i, b)| {
            if HYPHENS.contains(&i) {
                b == b'-'
            } else {
                b.is_ascii_hexdigit()
            }
        })
}
