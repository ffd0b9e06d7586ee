// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Unified diff blocks.
//!
//! A [`DiffBlock`] holds the raw diff text of one file. It is only split into
//! lines when consumed through [`DiffBlock::into_lines`], which hands out each
//! line exactly once. Every line gets a fresh [`DiffLineId`] that has nothing to
//! do with its content, so two identical lines in one block are still told
//! apart by position.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

static NEXT_LINE_ID: AtomicU64 = AtomicU64::new(0);

/// Raw unified diff of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffBlock {
    file: PathBuf,
    raw: String,
}

impl DiffBlock {
    pub fn new(file: impl Into<PathBuf>, raw: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            raw: raw.into(),
        }
    }

    /// File the diff belongs to, relative to repository root.
    pub fn file(&self) -> &Path {
        self.file.as_path()
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Check if Git reported no difference at all.
    pub fn is_empty(&self) -> bool {
        self.raw.trim().is_empty()
    }

    /// Decompose block into its lines.
    pub fn into_lines(self) -> DiffLines {
        DiffLines {
            raw: self.raw,
            offset: 0,
            in_hunk: false,
        }
    }
}

/// Lazy, single pass iterator over the lines of a [`DiffBlock`].
#[derive(Debug)]
pub struct DiffLines {
    raw: String,
    offset: usize,
    in_hunk: bool,
}

impl Iterator for DiffLines {
    type Item = DiffLine;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.raw.len() {
            return None;
        }

        let rest = &self.raw[self.offset..];
        let (text, consumed) = match rest.find('\n') {
            Some(end) => (&rest[..end], end + 1),
            None => (rest, rest.len()),
        };
        self.offset += consumed;

        let text = text.strip_suffix('\r').unwrap_or(text);
        let kind = LineKind::classify(text, &mut self.in_hunk);

        Some(DiffLine {
            id: DiffLineId::next(),
            text: text.to_string(),
            kind,
        })
    }
}

/// Opaque, process-wide unique identifier of a diff line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiffLineId(u64);

impl DiffLineId {
    fn next() -> Self {
        Self(NEXT_LINE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// One line of a unified diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    id: DiffLineId,
    text: String,
    kind: LineKind,
}

impl DiffLine {
    pub fn id(&self) -> DiffLineId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> LineKind {
        self.kind
    }
}

impl Display for DiffLine {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.text)
    }
}

/// Role of a line inside a unified diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    /// File header, e.g., `diff --git`, `index`, `---`, `+++`.
    Header,

    /// Hunk header starting with `@@`.
    Hunk,

    Added,
    Removed,
    Context,
}

impl LineKind {
    fn classify(text: &str, in_hunk: &mut bool) -> Self {
        if text.starts_with("diff ") {
            *in_hunk = false;
            return Self::Header;
        }

        if text.starts_with("@@") {
            *in_hunk = true;
            return Self::Hunk;
        }

        // INVARIANT: "---" and "+++" are file headers until first hunk starts.
        if !*in_hunk {
            return Self::Header;
        }

        match text.chars().next() {
            Some('+') => Self::Added,
            Some('-') => Self::Removed,
            _ => Self::Context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    const DIFF: &str = indoc! {r#"
        diff --git a/src/lib.rs b/src/lib.rs
        index 3b18e51..a5c1966 100644
        --- a/src/lib.rs
        +++ b/src/lib.rs
        @@ -1,3 +1,3 @@
         fn main() {
        -    println!("hello");
        +    println!("hello world");
         }
    "#};

    #[test]
    fn lines_are_classified_in_order() {
        let lines = DiffBlock::new("src/lib.rs", DIFF).into_lines().collect::<Vec<_>>();

        let result = lines.iter().map(DiffLine::kind).collect::<Vec<_>>();
        let expect = vec![
            LineKind::Header,
            LineKind::Header,
            LineKind::Header,
            LineKind::Header,
            LineKind::Hunk,
            LineKind::Context,
            LineKind::Removed,
            LineKind::Added,
            LineKind::Context,
        ];
        assert_eq!(result, expect);
        assert_eq!(lines[7].text(), "+    println!(\"hello world\");");
    }

    #[test]
    fn identical_lines_get_distinct_ids() {
        let block = DiffBlock::new("a.txt", "@@ -1 +1 @@\n same\n same\n");
        let lines = block.into_lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].text(), lines[2].text());
        assert_ne!(lines[1].id(), lines[2].id());
        assert!(lines[1].id() < lines[2].id());
    }

    #[test]
    fn iterator_is_exhausted_after_one_pass() {
        let mut lines = DiffBlock::new("a.txt", "no trailing newline").into_lines();
        assert_eq!(
            lines.next().map(|line| line.text().to_string()),
            Some("no trailing newline".into())
        );
        assert_eq!(lines.next(), None);
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn empty_block() {
        let block = DiffBlock::new("a.txt", "");
        assert!(block.is_empty());
        assert_eq!(block.into_lines().count(), 0);
    }
}
