//! PatchApplier - exact-line replacement edits

use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Replace the first line equal to `old_line` with `new_line`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Patch {
    pub old_line: String,
    pub new_line: String,
}

impl Patch {
    pub fn new(old_line: impl Into<String>, new_line: impl Into<String>) -> Self {
        Self {
            old_line: old_line.into(),
            new_line: new_line.into(),
        }
    }

    /// Read one element of a `patches` argument
    ///
    /// Returns `None` when either field is missing or not a string; such an
    /// element still counts toward the total.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        let old_line = value.get("old_line")?.as_str()?;
        let new_line = value.get("new_line")?.as_str()?;
        Some(Self::new(old_line, new_line))
    }
}

/// How many patches were applied out of how many were given
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchOutcome {
    pub applied: usize,
    pub total: usize,
}

impl PatchOutcome {
    /// Some patches found no matching line
    pub fn is_partial(&self) -> bool {
        self.applied < self.total
    }
}

/// File contents split into lines, remembering how to write them back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLines {
    pub lines: Vec<String>,
    line_ending: &'static str,
    trailing_newline: bool,
}

impl FileLines {
    pub fn parse(content: &str) -> Self {
        let line_ending = if content.contains("\r\n") { "\r\n" } else { "\n" };
        Self {
            lines: content.lines().map(str::to_string).collect(),
            line_ending,
            trailing_newline: content.ends_with('\n'),
        }
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join(self.line_ending);
        if self.trailing_newline {
            out.push_str(self.line_ending);
        }
        out
    }
}

/// Applies patches sequentially; each patch sees the result of the previous ones
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchApplier;

impl PatchApplier {
    /// Apply `patches` to `lines` in order
    ///
    /// Each valid patch replaces the first line exactly equal to its
    /// `old_line`. Unmatched patches are skipped.
    pub fn apply(&self, lines: &mut [String], patches: &[Option<Patch>]) -> PatchOutcome {
        debug!(line_count = %lines.len(), patch_count = %patches.len(), "PatchApplier::apply: called");
        let mut applied = 0;

        for patch in patches {
            let Some(patch) = patch else {
                debug!("PatchApplier::apply: malformed patch skipped");
                continue;
            };
            match lines.iter().position(|line| *line == patch.old_line) {
                Some(idx) => {
                    debug!(%idx, "PatchApplier::apply: patch matched");
                    lines[idx] = patch.new_line.clone();
                    applied += 1;
                }
                None => {
                    debug!(old_line = %patch.old_line, "PatchApplier::apply: no matching line");
                }
            }
        }

        PatchOutcome {
            applied,
            total: patches.len(),
        }
    }

    /// Read `path`, apply `patches`, and write the result back
    ///
    /// The file is rewritten even when nothing matched.
    pub async fn apply_to_file(&self, path: &Path, patches: &[Option<Patch>]) -> std::io::Result<PatchOutcome> {
        debug!(?path, "PatchApplier::apply_to_file: called");
        let content = tokio::fs::read_to_string(path).await?;
        let mut file = FileLines::parse(&content);
        let outcome = self.apply(&mut file.lines, patches);
        tokio::fs::write(path, file.render()).await?;
        debug!(?outcome, "PatchApplier::apply_to_file: written");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_single_replacement() {
        let mut content = lines("print(1)");
        let outcome = PatchApplier.apply(&mut content, &[Some(Patch::new("print(1)", "print(2)"))]);

        assert_eq!(content, vec!["print(2)"]);
        assert_eq!(outcome, PatchOutcome { applied: 1, total: 1 });
    }

    #[test]
    fn test_noop_patch_counts_as_applied() {
        let mut content = lines("x = 1\ny = 2");
        let outcome = PatchApplier.apply(&mut content, &[Some(Patch::new("x = 1", "x = 1"))]);

        assert_eq!(content, lines("x = 1\ny = 2"));
        assert!(!outcome.is_partial());
    }

    #[test]
    fn test_unmatched_patch_is_skipped() {
        let mut content = lines("a\nb");
        let outcome = PatchApplier.apply(
            &mut content,
            &[Some(Patch::new("missing", "z")), Some(Patch::new("b", "c"))],
        );

        assert_eq!(content, lines("a\nc"));
        assert_eq!(outcome, PatchOutcome { applied: 1, total: 2 });
        assert!(outcome.is_partial());
    }

    #[test]
    fn test_first_occurrence_wins() {
        let mut content = lines("dup\ndup");
        PatchApplier.apply(&mut content, &[Some(Patch::new("dup", "one"))]);
        assert_eq!(content, lines("one\ndup"));
    }

    #[test]
    fn test_patches_are_sequential() {
        let mut content = lines("a");
        let outcome = PatchApplier.apply(
            &mut content,
            &[Some(Patch::new("a", "b")), Some(Patch::new("b", "c"))],
        );
        assert_eq!(content, lines("c"));
        assert_eq!(outcome.applied, 2);
    }

    #[test]
    fn test_malformed_patch_counts_toward_total() {
        let values = vec![
            serde_json::json!({"old_line": "a", "new_line": "b"}),
            serde_json::json!({"old_line": "a"}),
            serde_json::json!("not an object"),
        ];
        let patches: Vec<Option<Patch>> = values.iter().map(Patch::from_value).collect();

        let mut content = lines("a");
        let outcome = PatchApplier.apply(&mut content, &patches);
        assert_eq!(outcome, PatchOutcome { applied: 1, total: 3 });
    }

    #[test]
    fn test_file_lines_preserve_endings() {
        let crlf = "one\r\ntwo\r\n";
        let parsed = FileLines::parse(crlf);
        assert_eq!(parsed.lines, vec!["one", "two"]);
        assert_eq!(parsed.render(), crlf);

        let no_trailing = "one\ntwo";
        assert_eq!(FileLines::parse(no_trailing).render(), no_trailing);

        assert_eq!(FileLines::parse("").render(), "");
    }

    #[tokio::test]
    async fn test_apply_to_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("app.py");
        std::fs::write(&path, "import os\nprint(1)\n").unwrap();

        let outcome = PatchApplier
            .apply_to_file(&path, &[Some(Patch::new("print(1)", "print(2)"))])
            .await
            .unwrap();

        assert_eq!(outcome.applied, 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "import os\nprint(2)\n");
    }

    #[tokio::test]
    async fn test_apply_to_missing_file() {
        let temp = tempdir().unwrap();
        let result = PatchApplier.apply_to_file(&temp.path().join("nope.py"), &[]).await;
        assert!(result.is_err());
    }
}
