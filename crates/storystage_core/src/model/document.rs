//! Rich-text editor document model.
//!
//! # Responsibility
//! - Hold the block/inline-style structure of one article page.
//! - Apply user edits with value semantics: every edit yields a new document.
//!
//! # Invariants
//! - A document always contains at least one block.
//! - Offsets are counted in `char`s of the block text.
//! - Style ranges are normalized: per style, maximal non-overlapping runs
//!   ordered by style then offset. Two documents with the same visible
//!   styling therefore compare equal.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const BLOCK_KEY_LEN: usize = 5;

/// Structural kind of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlockKind {
    #[default]
    #[serde(rename = "unstyled")]
    Unstyled,
    #[serde(rename = "header-one")]
    HeaderOne,
    #[serde(rename = "header-two")]
    HeaderTwo,
    #[serde(rename = "header-three")]
    HeaderThree,
    #[serde(rename = "blockquote")]
    Blockquote,
    #[serde(rename = "unordered-list-item")]
    UnorderedListItem,
    #[serde(rename = "ordered-list-item")]
    OrderedListItem,
    #[serde(rename = "code-block")]
    CodeBlock,
}

impl BlockKind {
    /// Whether the block created by splitting this one keeps its kind.
    ///
    /// Headers end at the split; lists, quotes and code continue.
    fn continues_on_split(self) -> bool {
        matches!(
            self,
            Self::Blockquote | Self::UnorderedListItem | Self::OrderedListItem | Self::CodeBlock
        )
    }
}

/// Inline character style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InlineStyle {
    Bold,
    Italic,
    Underline,
    Code,
    Strikethrough,
}

impl InlineStyle {
    pub const ALL: [InlineStyle; 5] = [
        InlineStyle::Bold,
        InlineStyle::Italic,
        InlineStyle::Underline,
        InlineStyle::Code,
        InlineStyle::Strikethrough,
    ];

    fn bit(self) -> u8 {
        match self {
            Self::Bold => 1,
            Self::Italic => 1 << 1,
            Self::Underline => 1 << 2,
            Self::Code => 1 << 3,
            Self::Strikethrough => 1 << 4,
        }
    }
}

/// One styled run inside a block, in `char` units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StyleRange {
    pub offset: usize,
    pub length: usize,
    pub style: InlineStyle,
}

/// One paragraph-level block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    key: String,
    kind: BlockKind,
    text: String,
    depth: u8,
    inline_styles: Vec<StyleRange>,
}

impl Block {
    /// Creates an unstyled-text block with a generated key.
    pub fn new(kind: BlockKind, text: impl Into<String>) -> Self {
        Self {
            key: generate_block_key(),
            kind,
            text: text.into(),
            depth: 0,
            inline_styles: Vec::new(),
        }
    }

    /// Rebuilds a block from its stored parts, validating and normalizing
    /// the style ranges.
    pub fn from_parts(
        key: impl Into<String>,
        kind: BlockKind,
        text: impl Into<String>,
        depth: u8,
        ranges: &[StyleRange],
    ) -> Result<Self, EditError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(EditError::EmptyBlockKey);
        }
        let text = text.into();
        let len = text.chars().count();
        let mut mask = vec![0_u8; len];
        for range in ranges {
            let end = range.offset.checked_add(range.length);
            match end {
                Some(end) if end <= len => {
                    for slot in &mut mask[range.offset..end] {
                        *slot |= range.style.bit();
                    }
                }
                _ => {
                    return Err(EditError::InvalidStyleRange {
                        offset: range.offset,
                        length: range.length,
                        text_len: len,
                    })
                }
            }
        }
        Ok(Self::from_mask(key, kind, text, depth, &mask))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn inline_styles(&self) -> &[StyleRange] {
        &self.inline_styles
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Returns the styles active on the char at `offset`.
    pub fn styles_at(&self, offset: usize) -> Vec<InlineStyle> {
        self.inline_styles
            .iter()
            .filter(|range| offset >= range.offset && offset < range.offset + range.length)
            .map(|range| range.style)
            .collect()
    }

    fn style_mask(&self) -> Vec<u8> {
        let mut mask = vec![0_u8; self.char_len()];
        for range in &self.inline_styles {
            for slot in &mut mask[range.offset..range.offset + range.length] {
                *slot |= range.style.bit();
            }
        }
        mask
    }

    fn from_mask(key: String, kind: BlockKind, text: String, depth: u8, mask: &[u8]) -> Self {
        Self {
            key,
            kind,
            text,
            depth,
            inline_styles: ranges_from_mask(mask),
        }
    }
}

/// A single user edit against a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEdit {
    /// Inserts `text` at `offset`; inserted chars take the style of the
    /// preceding char.
    InsertText {
        block: usize,
        offset: usize,
        text: String,
    },
    /// Removes chars in `start..end`.
    DeleteRange {
        block: usize,
        start: usize,
        end: usize,
    },
    /// Splits the block at `offset` (Enter key).
    SplitBlock { block: usize, offset: usize },
    /// Joins the block onto the previous one (Backspace at block start).
    MergeWithPrevious { block: usize },
    SetBlockKind { block: usize, kind: BlockKind },
    ApplyStyle {
        block: usize,
        start: usize,
        end: usize,
        style: InlineStyle,
    },
    RemoveStyle {
        block: usize,
        start: usize,
        end: usize,
        style: InlineStyle,
    },
    /// Replaces the whole document with unstyled paragraphs, one per line.
    ReplaceAll { text: String },
}

/// Errors from applying an edit or rebuilding a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    BlockOutOfRange { block: usize, block_count: usize },
    OffsetOutOfRange { block: usize, offset: usize, text_len: usize },
    ReversedRange { start: usize, end: usize },
    NoPreviousBlock,
    InvalidStyleRange { offset: usize, length: usize, text_len: usize },
    EmptyBlockKey,
}

impl Display for EditError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlockOutOfRange { block, block_count } => {
                write!(f, "block {block} out of range (document has {block_count})")
            }
            Self::OffsetOutOfRange {
                block,
                offset,
                text_len,
            } => write!(
                f,
                "offset {offset} out of range for block {block} of length {text_len}"
            ),
            Self::ReversedRange { start, end } => {
                write!(f, "range start {start} is after end {end}")
            }
            Self::NoPreviousBlock => write!(f, "first block has no previous block to merge into"),
            Self::InvalidStyleRange {
                offset,
                length,
                text_len,
            } => write!(
                f,
                "style range {offset}+{length} exceeds block text length {text_len}"
            ),
            Self::EmptyBlockKey => write!(f, "block key must not be empty"),
        }
    }
}

impl Error for EditError {}

/// Immutable rich-text document for one article page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorDocument {
    blocks: Vec<Block>,
}

impl Default for EditorDocument {
    fn default() -> Self {
        Self::empty()
    }
}

impl EditorDocument {
    /// Creates a document holding one empty unstyled block.
    pub fn empty() -> Self {
        Self {
            blocks: vec![Block::new(BlockKind::Unstyled, "")],
        }
    }

    /// Creates a document from blocks; an empty list yields `empty()`.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        if blocks.is_empty() {
            return Self::empty();
        }
        Self { blocks }
    }

    /// Creates unstyled paragraphs, one per line of `text`.
    pub fn from_plain_text(text: &str) -> Self {
        Self::from_blocks(
            text.lines()
                .map(|line| Block::new(BlockKind::Unstyled, line))
                .collect(),
        )
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns block texts joined with `\n`.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(Block::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Returns whether the document has no text at all.
    pub fn is_blank(&self) -> bool {
        self.blocks.iter().all(|block| block.text.is_empty())
    }

    /// Returns a new document reflecting `edit`. `self` is left untouched.
    pub fn apply(&self, edit: &UserEdit) -> Result<EditorDocument, EditError> {
        match edit {
            UserEdit::InsertText {
                block,
                offset,
                text,
            } => {
                let target = self.block_at(*block)?;
                let (mut chars, mut mask) = split_chars(target);
                check_offset(*block, *offset, chars.len())?;
                let inherited = if *offset > 0 { mask[*offset - 1] } else { 0 };
                let inserted: Vec<char> = text.chars().collect();
                let count = inserted.len();
                chars.splice(*offset..*offset, inserted);
                mask.splice(*offset..*offset, std::iter::repeat(inherited).take(count));
                Ok(self.replace_block(*block, rebuild(target, chars, &mask)))
            }
            UserEdit::DeleteRange { block, start, end } => {
                let target = self.block_at(*block)?;
                let (mut chars, mut mask) = split_chars(target);
                check_range(*block, *start, *end, chars.len())?;
                chars.drain(*start..*end);
                mask.drain(*start..*end);
                Ok(self.replace_block(*block, rebuild(target, chars, &mask)))
            }
            UserEdit::SplitBlock { block, offset } => {
                let target = self.block_at(*block)?;
                let (mut chars, mut mask) = split_chars(target);
                check_offset(*block, *offset, chars.len())?;
                let tail_chars = chars.split_off(*offset);
                let tail_mask = mask.split_off(*offset);
                let (tail_kind, tail_depth) = if target.kind.continues_on_split() {
                    (target.kind, target.depth)
                } else {
                    (BlockKind::Unstyled, 0)
                };
                let head = rebuild(target, chars, &mask);
                let tail = Block::from_mask(
                    generate_block_key(),
                    tail_kind,
                    tail_chars.into_iter().collect(),
                    tail_depth,
                    &tail_mask,
                );
                let mut blocks = self.blocks.clone();
                blocks[*block] = head;
                blocks.insert(*block + 1, tail);
                Ok(Self { blocks })
            }
            UserEdit::MergeWithPrevious { block } => {
                let target = self.block_at(*block)?;
                if *block == 0 {
                    return Err(EditError::NoPreviousBlock);
                }
                let previous = &self.blocks[*block - 1];
                let (mut chars, mut mask) = split_chars(previous);
                let (tail_chars, tail_mask) = split_chars(target);
                chars.extend(tail_chars);
                mask.extend(tail_mask);
                let mut blocks = self.blocks.clone();
                blocks[*block - 1] = rebuild(previous, chars, &mask);
                blocks.remove(*block);
                Ok(Self { blocks })
            }
            UserEdit::SetBlockKind { block, kind } => {
                let mut updated = self.block_at(*block)?.clone();
                updated.kind = *kind;
                Ok(self.replace_block(*block, updated))
            }
            UserEdit::ApplyStyle {
                block,
                start,
                end,
                style,
            } => self.restyle(*block, *start, *end, |slot| *slot |= style.bit()),
            UserEdit::RemoveStyle {
                block,
                start,
                end,
                style,
            } => self.restyle(*block, *start, *end, |slot| *slot &= !style.bit()),
            UserEdit::ReplaceAll { text } => Ok(Self::from_plain_text(text)),
        }
    }

    fn block_at(&self, index: usize) -> Result<&Block, EditError> {
        self.blocks.get(index).ok_or(EditError::BlockOutOfRange {
            block: index,
            block_count: self.blocks.len(),
        })
    }

    fn replace_block(&self, index: usize, block: Block) -> Self {
        let mut blocks = self.blocks.clone();
        blocks[index] = block;
        Self { blocks }
    }

    fn restyle(
        &self,
        block: usize,
        start: usize,
        end: usize,
        mut update: impl FnMut(&mut u8),
    ) -> Result<Self, EditError> {
        let target = self.block_at(block)?;
        let (chars, mut mask) = split_chars(target);
        check_range(block, start, end, chars.len())?;
        mask[start..end].iter_mut().for_each(&mut update);
        Ok(self.replace_block(block, rebuild(target, chars, &mask)))
    }
}

fn split_chars(block: &Block) -> (Vec<char>, Vec<u8>) {
    (block.text.chars().collect(), block.style_mask())
}

fn rebuild(template: &Block, chars: Vec<char>, mask: &[u8]) -> Block {
    Block::from_mask(
        template.key.clone(),
        template.kind,
        chars.into_iter().collect(),
        template.depth,
        mask,
    )
}

fn check_offset(block: usize, offset: usize, text_len: usize) -> Result<(), EditError> {
    if offset > text_len {
        return Err(EditError::OffsetOutOfRange {
            block,
            offset,
            text_len,
        });
    }
    Ok(())
}

fn check_range(block: usize, start: usize, end: usize, text_len: usize) -> Result<(), EditError> {
    if start > end {
        return Err(EditError::ReversedRange { start, end });
    }
    check_offset(block, end, text_len)
}

fn ranges_from_mask(mask: &[u8]) -> Vec<StyleRange> {
    let mut ranges = Vec::new();
    for style in InlineStyle::ALL {
        let bit = style.bit();
        let mut run_start: Option<usize> = None;
        for (index, slot) in mask.iter().enumerate() {
            match (slot & bit != 0, run_start) {
                (true, None) => run_start = Some(index),
                (false, Some(start)) => {
                    ranges.push(StyleRange {
                        offset: start,
                        length: index - start,
                        style,
                    });
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(start) = run_start {
            ranges.push(StyleRange {
                offset: start,
                length: mask.len() - start,
                style,
            });
        }
    }
    ranges
}

fn generate_block_key() -> String {
    let mut key = Uuid::new_v4().simple().to_string();
    key.truncate(BLOCK_KEY_LEN);
    key
}

#[cfg(test)]
mod tests {
    use super::{Block, BlockKind, EditError, EditorDocument, InlineStyle, StyleRange, UserEdit};

    fn insert(block: usize, offset: usize, text: &str) -> UserEdit {
        UserEdit::InsertText {
            block,
            offset,
            text: text.to_string(),
        }
    }

    #[test]
    fn empty_document_has_one_blank_block() {
        let doc = EditorDocument::empty();
        assert_eq!(doc.block_count(), 1);
        assert!(doc.is_blank());
    }

    #[test]
    fn apply_leaves_previous_snapshot_untouched() {
        let first = EditorDocument::empty();
        let second = first.apply(&insert(0, 0, "hello")).unwrap();

        assert!(first.is_blank());
        assert_eq!(second.plain_text(), "hello");
        assert_eq!(first.blocks()[0].key(), second.blocks()[0].key());
    }

    #[test]
    fn insert_inherits_preceding_style() {
        let doc = EditorDocument::from_plain_text("ab");
        let doc = doc
            .apply(&UserEdit::ApplyStyle {
                block: 0,
                start: 0,
                end: 2,
                style: InlineStyle::Bold,
            })
            .unwrap();
        let doc = doc.apply(&insert(0, 2, "c")).unwrap();

        assert_eq!(
            doc.blocks()[0].inline_styles(),
            &[StyleRange {
                offset: 0,
                length: 3,
                style: InlineStyle::Bold
            }]
        );
    }

    #[test]
    fn delete_shrinks_style_ranges() {
        let doc = EditorDocument::from_plain_text("hello world")
            .apply(&UserEdit::ApplyStyle {
                block: 0,
                start: 6,
                end: 11,
                style: InlineStyle::Italic,
            })
            .unwrap()
            .apply(&UserEdit::DeleteRange {
                block: 0,
                start: 0,
                end: 6,
            })
            .unwrap();

        assert_eq!(doc.plain_text(), "world");
        assert_eq!(doc.blocks()[0].styles_at(0), vec![InlineStyle::Italic]);
        assert_eq!(doc.blocks()[0].inline_styles()[0].length, 5);
    }

    #[test]
    fn split_and_merge_restore_text() {
        let doc = EditorDocument::from_plain_text("headline body");
        let doc = doc
            .apply(&UserEdit::SetBlockKind {
                block: 0,
                kind: BlockKind::HeaderOne,
            })
            .unwrap();
        let split = doc.apply(&UserEdit::SplitBlock { block: 0, offset: 8 }).unwrap();

        assert_eq!(split.block_count(), 2);
        assert_eq!(split.blocks()[0].text(), "headline");
        assert_eq!(split.blocks()[1].text(), " body");
        assert_eq!(split.blocks()[1].kind(), BlockKind::Unstyled);

        let merged = split.apply(&UserEdit::MergeWithPrevious { block: 1 }).unwrap();
        assert_eq!(merged.plain_text(), "headline body");
        assert_eq!(merged.blocks()[0].kind(), BlockKind::HeaderOne);
    }

    #[test]
    fn list_items_continue_on_split() {
        let doc = EditorDocument::from_plain_text("item")
            .apply(&UserEdit::SetBlockKind {
                block: 0,
                kind: BlockKind::UnorderedListItem,
            })
            .unwrap()
            .apply(&UserEdit::SplitBlock { block: 0, offset: 4 })
            .unwrap();
        assert_eq!(doc.blocks()[1].kind(), BlockKind::UnorderedListItem);
    }

    #[test]
    fn remove_style_splits_range() {
        let doc = EditorDocument::from_plain_text("abcdef")
            .apply(&UserEdit::ApplyStyle {
                block: 0,
                start: 0,
                end: 6,
                style: InlineStyle::Underline,
            })
            .unwrap()
            .apply(&UserEdit::RemoveStyle {
                block: 0,
                start: 2,
                end: 4,
                style: InlineStyle::Underline,
            })
            .unwrap();
        let ranges = doc.blocks()[0].inline_styles();
        assert_eq!(ranges.len(), 2);
        assert_eq!((ranges[0].offset, ranges[0].length), (0, 2));
        assert_eq!((ranges[1].offset, ranges[1].length), (4, 2));
    }

    #[test]
    fn invalid_edits_are_rejected() {
        let doc = EditorDocument::from_plain_text("abc");
        assert_eq!(
            doc.apply(&insert(3, 0, "x")).unwrap_err(),
            EditError::BlockOutOfRange {
                block: 3,
                block_count: 1
            }
        );
        assert!(matches!(
            doc.apply(&insert(0, 9, "x")).unwrap_err(),
            EditError::OffsetOutOfRange { .. }
        ));
        assert_eq!(
            doc.apply(&UserEdit::MergeWithPrevious { block: 0 })
                .unwrap_err(),
            EditError::NoPreviousBlock
        );
        assert!(matches!(
            doc.apply(&UserEdit::DeleteRange {
                block: 0,
                start: 2,
                end: 1
            })
            .unwrap_err(),
            EditError::ReversedRange { .. }
        ));
    }

    #[test]
    fn from_parts_normalizes_overlapping_ranges() {
        let block = Block::from_parts(
            "k1",
            BlockKind::Unstyled,
            "abcd",
            0,
            &[
                StyleRange {
                    offset: 0,
                    length: 2,
                    style: InlineStyle::Bold,
                },
                StyleRange {
                    offset: 1,
                    length: 3,
                    style: InlineStyle::Bold,
                },
            ],
        )
        .unwrap();
        assert_eq!(
            block.inline_styles(),
            &[StyleRange {
                offset: 0,
                length: 4,
                style: InlineStyle::Bold
            }]
        );
    }

    #[test]
    fn from_parts_rejects_range_past_text() {
        let err = Block::from_parts(
            "k1",
            BlockKind::Unstyled,
            "ab",
            0,
            &[StyleRange {
                offset: 1,
                length: 5,
                style: InlineStyle::Code,
            }],
        )
        .unwrap_err();
        assert!(matches!(err, EditError::InvalidStyleRange { .. }));
    }
}
