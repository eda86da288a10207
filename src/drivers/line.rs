//! Physical output line ownership
//!
//! A process-wide registry records which converter owns each output line.
//! A [`LineClaim`] holds its lines until it is dropped.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::constants::MAX_OUTPUT_LINES;
use crate::error::ConverterError;

/// Output line identifier (pin number)
pub type LineId = u32;

fn registry() -> &'static DashMap<LineId, Uuid> {
    static REGISTRY: OnceLock<DashMap<LineId, Uuid>> = OnceLock::new();
    REGISTRY.get_or_init(DashMap::new)
}

/// One or two output lines requested by a caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLines(Vec<LineId>);

impl OutputLines {
    /// Get the requested lines
    pub fn as_slice(&self) -> &[LineId] {
        &self.0
    }

    /// Get number of requested lines
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<LineId> for OutputLines {
    fn from(line: LineId) -> Self {
        Self(vec![line])
    }
}

impl From<Vec<LineId>> for OutputLines {
    fn from(lines: Vec<LineId>) -> Self {
        Self(lines)
    }
}

impl From<&[LineId]> for OutputLines {
    fn from(lines: &[LineId]) -> Self {
        Self(lines.to_vec())
    }
}

impl<const N: usize> From<[LineId; N]> for OutputLines {
    fn from(lines: [LineId; N]) -> Self {
        Self(lines.to_vec())
    }
}

/// Exclusive ownership of a set of output lines
#[derive(Debug)]
pub struct LineClaim {
    owner: Uuid,
    lines: Vec<LineId>,
}

impl LineClaim {
    /// Claim every line or none of them
    pub fn acquire(owner: Uuid, lines: &OutputLines) -> Result<Self, ConverterError> {
        match lines.len() {
            0 => return Err(ConverterError::NoLines),
            n if n > MAX_OUTPUT_LINES => return Err(ConverterError::TooManyLines(n)),
            _ => {}
        }

        let mut claim = LineClaim {
            owner,
            lines: Vec::with_capacity(lines.len()),
        };
        for &line in lines.as_slice() {
            let inserted = match registry().entry(line) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(owner);
                    true
                }
            };
            if !inserted {
                // Dropping `claim` releases the lines taken so far.
                return Err(ConverterError::LineInUse(line));
            }
            claim.lines.push(line);
        }

        tracing::debug!("Lines {:?} claimed by {}", claim.lines, owner);
        Ok(claim)
    }

    /// Get the claimed lines
    pub fn lines(&self) -> &[LineId] {
        &self.lines
    }

    /// Get the owning converter id
    pub fn owner(&self) -> Uuid {
        self.owner
    }
}

impl Drop for LineClaim {
    fn drop(&mut self) {
        for line in &self.lines {
            registry().remove_if(line, |_, owner| *owner == self.owner);
        }
        if !self.lines.is_empty() {
            tracing::debug!("Lines {:?} released by {}", self.lines, self.owner);
        }
    }
}

/// Whether some converter currently owns `line`
pub fn is_claimed(line: LineId) -> bool {
    registry().contains_key(&line)
}
