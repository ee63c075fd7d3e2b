//! Markdown code-fence scanning for LLM responses.
//!
//! A fence line starts at column 0 with three backticks. Indented backticks
//! (for example a diff context line ` ``` `) never open or close a fence.

/// One fenced block. Body excludes the delimiter lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FenceBlock {
    pub info: String,
    pub body: String,
    /// False when the document ended before a closing fence.
    pub closed: bool,
}

pub fn is_fence_line(line: &str) -> bool {
    line.starts_with("```")
}

/// Split `text` (already LF-normalized) into its fenced blocks, in order.
pub fn find_fences(text: &str) -> Vec<FenceBlock> {
    let mut blocks = Vec::new();
    let mut open: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        match open.take() {
            None => {
                if is_fence_line(line) {
                    let info = line.trim_start_matches('`').trim().to_string();
                    open = Some((info, Vec::new()));
                }
            }
            Some((info, mut body)) => {
                if is_fence_line(line) {
                    blocks.push(FenceBlock {
                        info,
                        body: join_lines(&body),
                        closed: true,
                    });
                } else {
                    body.push(line);
                    open = Some((info, body));
                }
            }
        }
    }

    if let Some((info, body)) = open {
        blocks.push(FenceBlock {
            info,
            body: join_lines(&body),
            closed: false,
        });
    }

    blocks
}

fn join_lines(lines: &[&str]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_blocks_with_info_strings() {
        let text = "intro\n```diff\n--- a/x\n```\nmiddle\n```\nsecond\n```\n";
        let blocks = find_fences(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].info, "diff");
        assert_eq!(blocks[0].body, "--- a/x\n");
        assert_eq!(blocks[1].info, "");
        assert_eq!(blocks[1].body, "second\n");
        assert!(blocks.iter().all(|block| block.closed));
    }

    #[test]
    fn unclosed_fence_runs_to_end() {
        let blocks = find_fences("```\nFILE: a\nbody\n");
        assert_eq!(blocks.len(), 1);
        assert!(!blocks[0].closed);
        assert_eq!(blocks[0].body, "FILE: a\nbody\n");
    }

    #[test]
    fn indented_backticks_are_content() {
        let text = "```diff\n@@ -1,2 +1,2 @@\n ```\n-old\n+new\n```\n";
        let blocks = find_fences(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].body, "@@ -1,2 +1,2 @@\n ```\n-old\n+new\n");
    }
}
