//! Content codec between live documents and the stored transport blob.
//!
//! # Responsibility
//! - Encode an `EditorDocument` into the raw JSON block format.
//! - Decode stored blobs back into documents, treating absent content as
//!   "nothing written yet".
//!
//! # Invariants
//! - `decode(Some(&encode(doc)?))? == Some(doc)` for every document.
//! - Decoding never yields a document with out-of-range style runs.
//!
//! Blob shape:
//! `{"blocks":[{"key","text","type","depth","inlineStyleRanges":[{"offset","length","style"}]}],"entityMap":{}}`

use crate::model::document::{Block, BlockKind, EditError, EditorDocument, InlineStyle, StyleRange};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Serialize, Deserialize)]
struct RawContent {
    blocks: Vec<RawBlock>,
    #[serde(rename = "entityMap", default)]
    entity_map: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawBlock {
    key: String,
    text: String,
    #[serde(rename = "type", default)]
    kind: BlockKind,
    #[serde(default)]
    depth: u8,
    #[serde(rename = "inlineStyleRanges", default)]
    inline_style_ranges: Vec<RawStyleRange>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawStyleRange {
    offset: usize,
    length: usize,
    style: InlineStyle,
}

/// Codec failures. Absent content is not an error.
#[derive(Debug)]
pub enum CodecError {
    /// Blob is not valid JSON in the raw block shape.
    Malformed(serde_json::Error),
    /// Blob parsed but describes an invalid block.
    InvalidBlock { key: String, source: EditError },
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(err) => write!(f, "malformed content blob: {err}"),
            Self::InvalidBlock { key, source } => {
                write!(f, "invalid block `{key}` in content blob: {source}")
            }
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Malformed(err) => Some(err),
            Self::InvalidBlock { source, .. } => Some(source),
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(value: serde_json::Error) -> Self {
        Self::Malformed(value)
    }
}

/// Encodes a document into its transport blob.
pub fn encode(document: &EditorDocument) -> Result<String, CodecError> {
    let raw = RawContent {
        blocks: document.blocks().iter().map(to_raw_block).collect(),
        entity_map: serde_json::Map::new(),
    };
    Ok(serde_json::to_string(&raw)?)
}

/// Decodes a transport blob.
///
/// Returns `Ok(None)` when `blob` is absent or blank.
pub fn decode(blob: Option<&str>) -> Result<Option<EditorDocument>, CodecError> {
    let Some(blob) = blob.filter(|value| !value.trim().is_empty()) else {
        return Ok(None);
    };

    let raw: RawContent = serde_json::from_str(blob)?;
    let mut blocks = Vec::with_capacity(raw.blocks.len());
    for raw_block in raw.blocks {
        let ranges: Vec<StyleRange> = raw_block
            .inline_style_ranges
            .iter()
            .map(|range| StyleRange {
                offset: range.offset,
                length: range.length,
                style: range.style,
            })
            .collect();
        let block = Block::from_parts(
            raw_block.key.as_str(),
            raw_block.kind,
            raw_block.text,
            raw_block.depth,
            &ranges,
        )
        .map_err(|source| CodecError::InvalidBlock {
            key: raw_block.key.clone(),
            source,
        })?;
        blocks.push(block);
    }

    Ok(Some(EditorDocument::from_blocks(blocks)))
}

fn to_raw_block(block: &Block) -> RawBlock {
    RawBlock {
        key: block.key().to_string(),
        text: block.text().to_string(),
        kind: block.kind(),
        depth: block.depth(),
        inline_style_ranges: block
            .inline_styles()
            .iter()
            .map(|range| RawStyleRange {
                offset: range.offset,
                length: range.length,
                style: range.style,
            })
            .collect(),
    }
}
