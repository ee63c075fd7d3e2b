//! Unified-diff grammar shared by the synthesizer and the validator.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::{DEV_NULL, FileDiff, HunkLine, LineKind, Patch, PatchHunk};

static HUNK_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@ ?(.*)$").unwrap()
});

/// Parsed `@@ -a,b +c,d @@ heading` line. Omitted counts are 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub heading: String,
}

pub fn parse_hunk_header(line: &str) -> Option<HunkHeader> {
    let caps = HUNK_HEADER_RE.captures(line)?;
    let number = |index: usize| -> Option<usize> {
        match caps.get(index) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(1),
        }
    };
    Some(HunkHeader {
        old_start: number(1)?,
        old_count: number(2)?,
        new_start: number(3)?,
        new_count: number(4)?,
        heading: caps
            .get(5)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
    })
}

pub fn is_old_header(line: &str) -> bool {
    line.starts_with("--- ")
}

pub fn is_new_header(line: &str) -> bool {
    line.starts_with("+++ ")
}

/// True when `lines[index]` opens a `--- ` / `+++ ` header pair.
pub fn is_header_pair(lines: &[&str], index: usize) -> bool {
    is_old_header(lines[index])
        && lines
            .get(index + 1)
            .is_some_and(|next| is_new_header(next))
}

/// Logical path of a `--- ` / `+++ ` line.
///
/// Drops the marker, any tab-separated timestamp, surrounding quotes and the
/// `a/` / `b/` prefix. `/dev/null` is returned as is.
pub fn header_path(line: &str) -> String {
    let rest = line
        .strip_prefix("--- ")
        .or_else(|| line.strip_prefix("+++ "))
        .unwrap_or(line);
    let rest = rest.split('\t').next().unwrap_or_default().trim();
    let rest = rest.trim_matches('"');
    if rest == DEV_NULL {
        return DEV_NULL.to_string();
    }
    rest.strip_prefix("a/")
        .or_else(|| rest.strip_prefix("b/"))
        .unwrap_or(rest)
        .to_string()
}

/// Parse a well-formed unified diff into a [`Patch`].
///
/// Bodies are read by the header counts, so a patch whose counts disagree
/// with its bodies is rejected. Lines outside file sections (`diff --git`,
/// `index`, prose) are skipped.
pub fn parse_patch(text: &str) -> Result<Patch, String> {
    let lines: Vec<&str> = text.lines().collect();
    let mut files = Vec::new();
    let mut index = 0;

    while index < lines.len() {
        if !is_header_pair(&lines, index) {
            index += 1;
            continue;
        }
        let mut file = FileDiff {
            old_path: header_path(lines[index]),
            new_path: header_path(lines[index + 1]),
            hunks: Vec::new(),
        };
        index += 2;

        while index < lines.len() && lines[index].starts_with("@@") {
            let header = parse_hunk_header(lines[index]).ok_or_else(|| {
                format!("malformed hunk header on line {}: {}", index + 1, lines[index])
            })?;
            index += 1;
            let (hunk, next) = read_hunk_body(&lines, index, header)?;
            file.hunks.push(hunk);
            index = next;
        }

        if file.hunks.is_empty() {
            return Err(format!("file section for {} has no hunks", file.new_path));
        }
        files.push(file);
    }

    Ok(Patch { files })
}

fn read_hunk_body(
    lines: &[&str],
    mut index: usize,
    header: HunkHeader,
) -> Result<(PatchHunk, usize), String> {
    let mut old_left = header.old_count;
    let mut new_left = header.new_count;
    let mut body: Vec<HunkLine> = Vec::new();

    while old_left > 0 || new_left > 0 {
        let Some(line) = lines.get(index) else {
            return Err(format!(
                "hunk @@ -{},{} +{},{} @@ ends before its declared line counts",
                header.old_start, header.old_count, header.new_start, header.new_count
            ));
        };
        index += 1;

        if line.starts_with('\\') {
            if let Some(last) = body.last_mut() {
                last.missing_newline = true;
            }
            continue;
        }

        let (kind, text) = match line.chars().next() {
            None => (LineKind::Context, ""),
            Some(marker) => {
                let kind = LineKind::from_marker(marker).ok_or_else(|| {
                    format!("unexpected line {index} inside hunk body: {line}")
                })?;
                (kind, &line[1..])
            }
        };

        let fits = match kind {
            LineKind::Context => old_left > 0 && new_left > 0,
            LineKind::Remove => old_left > 0,
            LineKind::Add => new_left > 0,
        };
        if !fits {
            return Err(format!(
                "hunk body on line {index} exceeds its declared line counts"
            ));
        }
        if kind != LineKind::Add {
            old_left -= 1;
        }
        if kind != LineKind::Remove {
            new_left -= 1;
        }
        body.push(HunkLine::new(kind, text));
    }

    while let Some(line) = lines.get(index) {
        if !line.starts_with('\\') {
            break;
        }
        if let Some(last) = body.last_mut() {
            last.missing_newline = true;
        }
        index += 1;
    }

    let hunk = PatchHunk {
        old_start: header.old_start,
        old_count: header.old_count,
        new_start: header.new_start,
        new_count: header.new_count,
        heading: header.heading,
        lines: body,
    };
    Ok((hunk, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hunk_header_defaults_missing_counts_to_one() {
        let header = parse_hunk_header("@@ -3 +4,2 @@ impl Foo").expect("header");
        assert_eq!(header.old_start, 3);
        assert_eq!(header.old_count, 1);
        assert_eq!(header.new_start, 4);
        assert_eq!(header.new_count, 2);
        assert_eq!(header.heading, "impl Foo");
    }

    #[test]
    fn malformed_hunk_headers_do_not_parse() {
        assert!(parse_hunk_header("@@ -a,1 +1 @@").is_none());
        assert!(parse_hunk_header("@@ -1,1 +1,1").is_none());
        assert!(parse_hunk_header("@@@ -1 +1 @@@").is_none());
    }

    #[test]
    fn header_path_strips_prefix_and_timestamp() {
        assert_eq!(header_path("--- a/src/lib.rs"), "src/lib.rs");
        assert_eq!(
            header_path("+++ b/src/lib.rs\t2024-01-01 00:00:00.000000000 +0000"),
            "src/lib.rs"
        );
        assert_eq!(header_path("--- /dev/null"), DEV_NULL);
        assert_eq!(header_path("+++ \"b/with space.txt\""), "with space.txt");
    }

    #[test]
    fn parses_git_style_patch() {
        let text = "diff --git a/x.txt b/x.txt\n\
                    index 1111111..2222222 100644\n\
                    --- a/x.txt\n\
                    +++ b/x.txt\n\
                    @@ -1,3 +1,3 @@\n \
                    one\n\
                    -two\n\
                    +TWO\n \
                    three\n";
        let patch = parse_patch(text).expect("parse");
        assert_eq!(patch.files.len(), 1);
        let file = &patch.files[0];
        assert_eq!(file.old_path, "x.txt");
        assert_eq!(file.new_path, "x.txt");
        assert_eq!(file.hunks.len(), 1);
        assert!(file.hunks[0].is_balanced());
        assert_eq!(file.stats(), (1, 1));
    }

    #[test]
    fn records_missing_newline_markers() {
        let text = "--- a/x\n+++ b/x\n@@ -1 +1 @@\n-old\n\\ No newline at end of file\n+new\n\\ No newline at end of file\n";
        let patch = parse_patch(text).expect("parse");
        let lines = &patch.files[0].hunks[0].lines;
        assert!(lines[0].missing_newline);
        assert!(lines[1].missing_newline);
    }

    #[test]
    fn short_body_is_rejected() {
        let err = parse_patch("--- a/x\n+++ b/x\n@@ -1,2 +1,2 @@\n a\n").expect_err("short");
        assert!(err.contains("ends before"));
    }

    #[test]
    fn render_then_parse_preserves_paths() {
        let text = "--- /dev/null\n+++ b/new.txt\n@@ -0,0 +1,2 @@\n+a\n+b\n";
        let patch = parse_patch(text).expect("parse");
        let reparsed = parse_patch(&patch.render()).expect("reparse");
        assert_eq!(patch, reparsed);
        assert!(reparsed.files[0].is_creation());
    }
}
