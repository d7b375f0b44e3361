//! Gamedata system for loading signatures and offsets from JSON
//!
//! Signatures are loaded from a gamedata.json file deployed with the plugin.
//! This allows updating signatures after a host patch without recompiling.
//!
//! ```json
//! {
//!     "ChangeCustomize": { "signatures": { "pattern": "E8 ?? ?? ?? ?? 41 0F B6 C5" } },
//!     "GameObject.DrawObject": { "offsets": { "value": 256 } }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading gamedata or resolving signatures
#[derive(Debug, Error)]
pub enum GamedataError {
    #[error("Failed to read gamedata file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse gamedata JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Gamedata not initialized")]
    NotInitialized,

    #[error("Signature not found: {0}")]
    SignatureNotFound(String),

    #[error("Offset not found: {0}")]
    OffsetNotFound(String),

    #[error("Invalid signature format: {0}")]
    InvalidSignature(String),

    #[error("Signature '{0}' matched nothing in the host module")]
    ScanFailed(String),

    #[error("Signature '{name}' is ambiguous: {count} matches in the host module")]
    Ambiguous { name: String, count: usize },

    #[error("Signature '{0}' resolved outside the host module")]
    OutOfModule(String),
}

/// Signature entry
#[derive(Debug, Clone, Deserialize)]
pub struct SignatureEntry {
    /// Byte pattern, e.g. "48 89 5C 24 ?? 57"
    pub pattern: String,
}

/// Offset entry
#[derive(Debug, Clone, Deserialize)]
pub struct OffsetEntry {
    /// Byte offset from the start of the containing structure
    pub value: i64,
}

/// Loaded gamedata
#[derive(Debug, Default)]
pub struct Gamedata {
    signatures: HashMap<String, SignatureEntry>,
    offsets: HashMap<String, OffsetEntry>,
}

/// Global gamedata instance
static GAMEDATA: OnceLock<Gamedata> = OnceLock::new();

impl Gamedata {
    /// Load gamedata from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, GamedataError> {
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content)
    }

    /// Load gamedata from a JSON string
    pub fn load_from_str(json: &str) -> Result<Self, GamedataError> {
        let raw: HashMap<String, serde_json::Value> = serde_json::from_str(json)?;

        let mut gamedata = Gamedata::default();

        for (name, value) in raw {
            if let Some(sig) = value.get("signatures") {
                let entry: SignatureEntry = serde_json::from_value(sig.clone())?;
                gamedata.signatures.insert(name, entry);
            } else if let Some(off) = value.get("offsets") {
                let entry: OffsetEntry = serde_json::from_value(off.clone())?;
                gamedata.offsets.insert(name, entry);
            }
            // Shorthand: a bare pattern
            else if value.get("pattern").is_some() {
                let entry: SignatureEntry = serde_json::from_value(value)?;
                gamedata.signatures.insert(name, entry);
            } else {
                tracing::warn!("Ignoring unrecognised gamedata entry '{}'", name);
            }
        }

        tracing::info!(
            "Loaded gamedata: {} signatures, {} offsets",
            gamedata.signatures.len(),
            gamedata.offsets.len()
        );

        Ok(gamedata)
    }

    /// Get a signature pattern by name
    pub fn get_signature(&self, name: &str) -> Result<&str, GamedataError> {
        self.signatures
            .get(name)
            .map(|e| e.pattern.as_str())
            .ok_or_else(|| GamedataError::SignatureNotFound(name.to_string()))
    }

    /// Get an offset by name
    pub fn get_offset(&self, name: &str) -> Result<i64, GamedataError> {
        self.offsets
            .get(name)
            .map(|e| e.value)
            .ok_or_else(|| GamedataError::OffsetNotFound(name.to_string()))
    }

    /// Get an offset by name, falling back to a built-in default
    pub fn offset_or(&self, name: &str, default: i64) -> i64 {
        match self.get_offset(name) {
            Ok(value) => value,
            Err(_) => {
                tracing::debug!("Offset '{}' not in gamedata, using default {:#x}", name, default);
                default
            }
        }
    }
}

/// Initialize global gamedata
pub fn init_gamedata(gd: Gamedata) -> Result<(), GamedataError> {
    GAMEDATA
        .set(gd)
        .map_err(|_| GamedataError::IoError(std::io::Error::other("Gamedata already initialized")))
}

/// Get the global gamedata instance
pub fn gamedata() -> Option<&'static Gamedata> {
    GAMEDATA.get()
}

/// A parsed signature: `None` entries are wildcards
pub type Pattern = Vec<Option<u8>>;

/// Parse a signature pattern string into bytes
///
/// Supports:
/// - Hex bytes: "55 48 89 E5"
/// - Wildcards: "55 ? 89 E5" or "55 ?? 89 E5"
pub fn parse_signature(pattern: &str) -> Result<Pattern, GamedataError> {
    let mut result = Vec::new();

    for part in pattern.split_whitespace() {
        if part == "?" || part == "??" {
            result.push(None);
        } else {
            let byte = u8::from_str_radix(part, 16).map_err(|_| {
                GamedataError::InvalidSignature(format!("Invalid hex byte: {}", part))
            })?;
            result.push(Some(byte));
        }
    }

    if result.is_empty() {
        return Err(GamedataError::InvalidSignature(
            "Empty signature pattern".to_string(),
        ));
    }

    if result[0].is_none() {
        return Err(GamedataError::InvalidSignature(
            "Pattern must not start with a wildcard".to_string(),
        ));
    }

    Ok(result)
}

#[inline]
fn matches_at(haystack: &[u8], offset: usize, pattern: &[Option<u8>]) -> bool {
    pattern
        .iter()
        .enumerate()
        .all(|(i, expected)| expected.map_or(true, |b| haystack[offset + i] == b))
}

/// Find the first match of a pattern
pub fn scan_signature(haystack: &[u8], pattern: &[Option<u8>]) -> Option<usize> {
    if pattern.is_empty() || haystack.len() < pattern.len() {
        return None;
    }

    (0..=haystack.len() - pattern.len()).find(|&offset| matches_at(haystack, offset, pattern))
}

/// Find the single match of a pattern
///
/// Stops scanning at the second match; the error then reports a count of 2.
pub fn scan_unique(name: &str, haystack: &[u8], pattern: &[Option<u8>]) -> Result<usize, GamedataError> {
    let first = scan_signature(haystack, pattern).ok_or_else(|| GamedataError::ScanFailed(name.to_string()))?;

    if let Some(second) = scan_signature(&haystack[first + 1..], pattern) {
        tracing::error!(
            "Signature '{}' matched at +{:x} and +{:x}",
            name,
            first,
            first + 1 + second
        );
        return Err(GamedataError::Ambiguous {
            name: name.to_string(),
            count: 2,
        });
    }

    Ok(first)
}

/// Read the rel32 displacement at `offset` and resolve it against the end of an
/// instruction of `instruction_len` bytes that starts at `instruction_offset`.
fn resolve_rel32(
    haystack: &[u8],
    base: usize,
    instruction_offset: usize,
    disp_offset: usize,
    instruction_len: usize,
) -> Option<usize> {
    let at = instruction_offset + disp_offset;
    let bytes: [u8; 4] = haystack.get(at..at + 4)?.try_into().ok()?;
    let disp = i32::from_le_bytes(bytes) as isize;
    let next = base + instruction_offset + instruction_len;
    Some(next.wrapping_add_signed(disp))
}

/// Resolve a function signature to an absolute address within `haystack`
///
/// A pattern that begins at a `call rel32` (E8) or `jmp rel32` (E9) resolves to
/// the branch target rather than the branch itself.
pub fn resolve_function(
    name: &str,
    haystack: &[u8],
    base: usize,
    pattern: &[Option<u8>],
) -> Result<usize, GamedataError> {
    let offset = scan_unique(name, haystack, pattern)?;

    let address = match pattern[0] {
        Some(0xE8) | Some(0xE9) => resolve_rel32(haystack, base, offset, 1, 5)
            .ok_or_else(|| GamedataError::OutOfModule(name.to_string()))?,
        _ => base + offset,
    };

    if address < base || address >= base + haystack.len() {
        return Err(GamedataError::OutOfModule(name.to_string()));
    }

    Ok(address)
}

/// Resolve a static-data signature (`mov reg, [rip+disp32]` / `lea reg, [rip+disp32]`)
///
/// The pattern must start at an instruction with a REX prefix, opcode and
/// ModRM byte followed by the displacement (seven bytes in total).
pub fn resolve_static_address(
    name: &str,
    haystack: &[u8],
    base: usize,
    pattern: &[Option<u8>],
) -> Result<usize, GamedataError> {
    let offset = scan_unique(name, haystack, pattern)?;
    resolve_rel32(haystack, base, offset, 3, 7).ok_or_else(|| GamedataError::OutOfModule(name.to_string()))
}

/// Find a function address by signature name in the host module
pub fn find_function(name: &str) -> Result<usize, GamedataError> {
    let gd = gamedata().ok_or(GamedataError::NotInitialized)?;
    let host = xivmod_engine::try_host().ok_or(GamedataError::NotInitialized)?;
    let pattern = parse_signature(gd.get_signature(name)?)?;
    resolve_function(name, host.module.bytes(), host.module.base(), &pattern)
}

/// Find a static data address by signature name in the host module
pub fn find_static(name: &str) -> Result<usize, GamedataError> {
    let gd = gamedata().ok_or(GamedataError::NotInitialized)?;
    let host = xivmod_engine::try_host().ok_or(GamedataError::NotInitialized)?;
    let pattern = parse_signature(gd.get_signature(name)?)?;
    resolve_static_address(name, host.module.bytes(), host.module.base(), &pattern)
}
