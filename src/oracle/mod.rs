//! Content-generation oracle
//!
//! The oracle turns a description of a region into a grid of tile indices.
//! It is usually an LLM and therefore fallible in every way a network call
//! and a free-text reply can be; the outcome is a tagged result that callers
//! handle exhaustively. Anything but `Ok` means nothing gets written.

pub mod llm;
pub mod noise;

use serde_json::Value;

use crate::error::RegenError;
use crate::geometry::TileRect;
use crate::tiles::{TileIndex, TileMatrix};

pub use self::llm::{LlmConfig, LlmError, LlmOracle};
pub use self::noise::NoiseOracle;

/// Everything the oracle is told about a region.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionDescription {
    pub bounds: TileRect,
    pub level: i32,
    /// Tiles currently in the region.
    pub prior: TileMatrix,
    /// User instruction, may be empty.
    pub prompt: String,
}

impl RegionDescription {
    /// (width, height) the reply must have.
    pub fn expected_dimensions(&self) -> (usize, usize) {
        (self.bounds.width() as usize, self.bounds.height() as usize)
    }

    /// Turn an oracle outcome for this region into a grid that is safe to
    /// write. A grid of any other size than the region is rejected, whatever
    /// oracle produced it.
    pub fn accept(&self, result: OracleResult) -> Result<TileMatrix, RegenError> {
        let matrix = result.into_result()?;
        let expected = self.expected_dimensions();
        if matrix.dimensions() != expected {
            return Err(RegenError::DimensionMismatch {
                expected,
                actual: matrix.dimensions(),
            });
        }
        Ok(matrix)
    }
}

/// Outcome of one oracle call.
#[derive(Clone, Debug, PartialEq)]
pub enum OracleResult {
    Ok(TileMatrix),
    ParseError(String),
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    OracleError(String),
}

impl OracleResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, OracleResult::Ok(_))
    }

    pub fn into_result(self) -> Result<TileMatrix, RegenError> {
        match self {
            OracleResult::Ok(matrix) => Ok(matrix),
            OracleResult::ParseError(e) => Err(RegenError::Parse(e)),
            OracleResult::DimensionMismatch { expected, actual } => {
                Err(RegenError::DimensionMismatch { expected, actual })
            }
            OracleResult::OracleError(e) => Err(RegenError::Oracle(e)),
        }
    }
}

pub trait Oracle {
    fn generate(&self, description: &RegionDescription) -> OracleResult;
}

impl<F> Oracle for F
where
    F: Fn(&RegionDescription) -> OracleResult,
{
    fn generate(&self, description: &RegionDescription) -> OracleResult {
        self(description)
    }
}

/// Pull a tile grid out of a free-text reply.
///
/// Accepts a bare JSON array of rows or an object with a `tiles` field,
/// optionally wrapped in prose or a fenced code block. `null` and negative
/// entries mean "no tile". The grid must be `expected` = (width, height).
pub fn parse_tile_matrix(reply: &str, expected: (usize, usize)) -> OracleResult {
    let value = match extract_json(reply) {
        Some(v) => v,
        None => return OracleResult::ParseError("no JSON tile grid in reply".to_string()),
    };

    let rows_value = match &value {
        Value::Array(_) => &value,
        Value::Object(map) => match map.get("tiles") {
            Some(tiles) => tiles,
            None => return OracleResult::ParseError("object reply without `tiles` field".to_string()),
        },
        other => return OracleResult::ParseError(format!("expected array of rows, got {}", other)),
    };

    let Some(rows) = rows_value.as_array() else {
        return OracleResult::ParseError("`tiles` is not an array".to_string());
    };

    let mut parsed: Vec<Vec<Option<TileIndex>>> = Vec::with_capacity(rows.len());
    for (r, row) in rows.iter().enumerate() {
        let Some(cells) = row.as_array() else {
            return OracleResult::ParseError(format!("row {} is not an array", r));
        };
        let mut out = Vec::with_capacity(cells.len());
        for cell in cells {
            match cell {
                Value::Null => out.push(None),
                Value::Number(n) => {
                    if let Some(i) = n.as_u64() {
                        match TileIndex::try_from(i) {
                            Ok(tile) => out.push(Some(tile)),
                            Err(_) => {
                                return OracleResult::ParseError(format!("tile index {} out of range", i))
                            }
                        }
                    } else if n.as_i64().is_some_and(|i| i < 0) {
                        out.push(None);
                    } else {
                        return OracleResult::ParseError(format!("non-integer tile {}", n));
                    }
                }
                other => return OracleResult::ParseError(format!("unexpected cell {}", other)),
            }
        }
        parsed.push(out);
    }

    let height = parsed.len();
    let width = parsed.first().map_or(0, |r| r.len());
    if parsed.iter().any(|r| r.len() != width) {
        return OracleResult::ParseError("rows have different lengths".to_string());
    }
    if (width, height) != expected {
        return OracleResult::DimensionMismatch {
            expected,
            actual: (width, height),
        };
    }

    match TileMatrix::from_rows(parsed) {
        Some(matrix) => OracleResult::Ok(matrix),
        None => OracleResult::ParseError("ragged tile grid".to_string()),
    }
}

/// Find the JSON payload in a reply: the whole text, the inside of a code
/// fence, or the outermost bracketed span.
fn extract_json(reply: &str) -> Option<Value> {
    let trimmed = reply.trim();
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        // Skip a language tag such as ```json
        let body_start = after.find('\n').map_or(0, |i| i + 1);
        let body = &after[body_start..];
        if let Some(end) = body.find("```") {
            if let Ok(v) = serde_json::from_str::<Value>(body[..end].trim()) {
                return Some(v);
            }
        }
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
            if start < end {
                if let Ok(v) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                    return Some(v);
                }
            }
        }
    }
    None
}
