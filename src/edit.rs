use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The fundamental edit primitive: byte-span replacement with
/// verification.
///
/// Every mutating operation in the engine — surgery, templates,
/// fragments, legacy operators — compiles down to one or more of these.
/// Intelligence lives in span acquisition (the locator layer), not in
/// application.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Edit does nothing until applied"]
pub struct Edit {
    pub file: PathBuf,
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// New text to insert at [byte_start, byte_end)
    pub new_text: String,
    /// Verification of what we expect to find before applying
    pub expected_before: EditVerification,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (faster for large spans)
    Hash(u64),
}

impl EditVerification {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using a hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("before-text verification failed at {file}:{byte_start}")]
    BeforeTextMismatch {
        file: PathBuf,
        byte_start: usize,
        byte_end: usize,
        found: String,
    },

    #[error("invalid byte range: [{byte_start}, {byte_end}) in content of length {len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        len: usize,
    },

    #[error("edit range does not fall on UTF-8 character boundaries")]
    NotCharBoundary,

    #[error("overlapping edits: [{a_start}, {a_end}) and [{b_start}, {b_end})")]
    OverlappingEdits {
        a_start: usize,
        a_end: usize,
        b_start: usize,
        b_end: usize,
    },

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Edit {
    /// Create a new edit with automatic verification generation.
    pub fn new(
        file: impl Into<PathBuf>,
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: impl Into<String>,
    ) -> Self {
        let expected = expected_before.into();
        Self {
            file: file.into(),
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(&expected),
        }
    }

    fn check(&self, content: &str) -> Result<(), EditError> {
        if self.byte_start > self.byte_end || self.byte_end > content.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                len: content.len(),
            });
        }
        if !content.is_char_boundary(self.byte_start) || !content.is_char_boundary(self.byte_end) {
            return Err(EditError::NotCharBoundary);
        }
        let current = &content[self.byte_start..self.byte_end];
        if current != self.new_text && !self.expected_before.matches(current) {
            return Err(EditError::BeforeTextMismatch {
                file: self.file.clone(),
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                found: current.to_string(),
            });
        }
        Ok(())
    }

    /// Splice this edit into an in-memory copy of the content.
    pub fn apply_to(&self, content: &str) -> Result<String, EditError> {
        self.check(content)?;
        let mut out = String::with_capacity(
            content.len() + self.new_text.len() - (self.byte_end - self.byte_start),
        );
        out.push_str(&content[..self.byte_start]);
        out.push_str(&self.new_text);
        out.push_str(&content[self.byte_end..]);
        Ok(out)
    }
}

/// Apply several edits to one content string. Edits are sorted by start
/// byte descending and applied bottom-to-top so earlier offsets stay
/// valid; overlapping spans are rejected.
pub fn apply_all(content: &str, mut edits: Vec<Edit>) -> Result<String, EditError> {
    edits.sort_by(|a, b| b.byte_start.cmp(&a.byte_start));

    for window in edits.windows(2) {
        let (later, earlier) = (&window[0], &window[1]);
        if earlier.byte_end > later.byte_start {
            return Err(EditError::OverlappingEdits {
                a_start: earlier.byte_start,
                a_end: earlier.byte_end,
                b_start: later.byte_start,
                b_end: later.byte_end,
            });
        }
    }

    let mut result = content.to_string();
    for edit in &edits {
        result = edit.apply_to(&result)?;
    }
    Ok(result)
}

/// Atomic file write: tempfile in the same directory + fsync + rename.
/// Either the full write succeeds or the original file is untouched.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    let parent = path.parent().ok_or_else(|| {
        EditError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "path has no parent directory",
        ))
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    // Bump mtime so incremental build tools notice the change.
    let now = filetime::FileTime::now();
    filetime::set_file_mtime(path, now)?;

    Ok(())
}

/// Byte snapshot of a file, held for the duration of one step. Restoring
/// writes the original bytes back atomically; dropping without restoring
/// discards it.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    path: PathBuf,
    original: Vec<u8>,
}

impl FileSnapshot {
    pub fn capture(path: impl Into<PathBuf>) -> Result<Self, EditError> {
        let path = path.into();
        let original = fs::read(&path)?;
        Ok(Self { path, original })
    }

    pub fn original_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.original)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Restore the file to its captured bytes.
    pub fn restore(&self) -> Result<(), EditError> {
        atomic_write(&self.path, &self.original)
    }

    /// True if the file currently differs from the snapshot.
    pub fn is_dirty(&self) -> Result<bool, EditError> {
        Ok(fs::read(&self.path)? != self.original)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_exact_and_hash() {
        let verify = EditVerification::ExactMatch("hello".into());
        assert!(verify.matches("hello"));
        assert!(!verify.matches("world"));

        let hash = EditVerification::Hash(xxh3_64(b"hello"));
        assert!(hash.matches("hello"));
        assert!(!hash.matches("world"));
    }

    #[test]
    fn verification_from_text_picks_strategy() {
        assert!(matches!(
            EditVerification::from_text("small"),
            EditVerification::ExactMatch(_)
        ));
        assert!(matches!(
            EditVerification::from_text(&"x".repeat(2000)),
            EditVerification::Hash(_)
        ));
    }

    #[test]
    fn apply_to_splices() {
        let edit = Edit::new("test.py", 0, 5, "howdy", "hello");
        assert_eq!(edit.apply_to("hello world").unwrap(), "howdy world");
    }

    #[test]
    fn apply_to_rejects_mismatch() {
        let edit = Edit::new("test.py", 0, 5, "howdy", "other");
        assert!(matches!(
            edit.apply_to("hello world"),
            Err(EditError::BeforeTextMismatch { .. })
        ));
    }

    #[test]
    fn apply_to_rejects_bad_range() {
        let edit = Edit::new("test.py", 5, 50, "x", "");
        assert!(matches!(
            edit.apply_to("hello"),
            Err(EditError::InvalidByteRange { .. })
        ));
        let inverted = Edit::new("test.py", 5, 2, "x", "llo");
        assert!(matches!(
            inverted.apply_to("hello"),
            Err(EditError::InvalidByteRange { .. })
        ));
    }

    #[test]
    fn apply_all_descending_keeps_offsets_valid() {
        let content = "aaa bbb ccc";
        let edits = vec![
            Edit::new("t", 0, 3, "AAA", "aaa"),
            Edit::new("t", 8, 11, "CCC", "ccc"),
            Edit::new("t", 4, 7, "BBB", "bbb"),
        ];
        assert_eq!(apply_all(content, edits).unwrap(), "AAA BBB CCC");
    }

    #[test]
    fn apply_all_rejects_overlap() {
        let content = "abcdef";
        let edits = vec![
            Edit::new("t", 0, 4, "x", "abcd"),
            Edit::new("t", 2, 6, "y", "cdef"),
        ];
        assert!(matches!(
            apply_all(content, edits),
            Err(EditError::OverlappingEdits { .. })
        ));
    }

    #[test]
    fn atomic_write_and_snapshot_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.py");
        fs::write(&path, "original\n").unwrap();

        let snapshot = FileSnapshot::capture(&path).unwrap();
        atomic_write(&path, b"modified\n").unwrap();
        assert!(snapshot.is_dirty().unwrap());

        snapshot.restore().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "original\n");
        assert!(!snapshot.is_dirty().unwrap());
    }
}
