use std::fmt::{Debug, Display, Formatter};

/// A unique identifier for a source file, assigned by the external lexer.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Default, serde::Serialize)]
pub struct FileId(pub u32);

impl Display for FileId {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> std::fmt::Result {
        write!(fmt, "FileId({})", self.0)
    }
}

/// A single compressed source location (file id + byte offset).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, serde::Serialize)]
pub struct SourceLocation(u32);

impl SourceLocation {
    const OFFSET_BITS: u32 = 22; // 4 MB max per file
    const OFFSET_MASK: u32 = (1 << Self::OFFSET_BITS) - 1;

    #[inline(always)]
    pub fn new(file_id: FileId, offset: u32) -> Self {
        assert!(
            file_id.0 < (1 << (32 - Self::OFFSET_BITS)),
            "file_id overflow"
        );
        assert!(offset < (1 << Self::OFFSET_BITS), "offset overflow");
        Self((file_id.0 << Self::OFFSET_BITS) | (offset & Self::OFFSET_MASK))
    }

    #[inline(always)]
    pub fn file_id(&self) -> FileId {
        FileId(self.0 >> Self::OFFSET_BITS)
    }

    #[inline(always)]
    pub fn offset(&self) -> u32 {
        self.0 & Self::OFFSET_MASK
    }
}

/// A half-open span in a source file.
#[derive(Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct SourceSpan {
    pub start: SourceLocation,
    pub end: SourceLocation,
}

impl SourceSpan {
    pub fn new(start: SourceLocation, end: SourceLocation) -> Self {
        Self { start, end }
    }

    /// A span that points nowhere. Used when a diagnostic has no anchor.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn file_id(&self) -> FileId {
        self.start.file_id()
    }
}

impl Debug for SourceSpan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SourceSpan(file={}, {}..{})",
            self.start.file_id().0,
            self.start.offset(),
            self.end.offset()
        )
    }
}

impl Display for SourceSpan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start.offset(), self.end.offset())
    }
}
