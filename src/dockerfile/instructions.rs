//! Logical-instruction tokenizer for Dockerfile text

/// One logical instruction after joining line continuations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Upper-cased instruction keyword (`FROM`, `RUN`, ...)
    pub keyword: String,
    /// Everything after the keyword, continuation lines joined by a single space
    pub value: String,
    /// 1-based line number where the instruction starts
    pub line: usize,
}

impl Instruction {
    pub fn is(&self, keyword: &str) -> bool {
        self.keyword == keyword
    }

    fn from_logical_line(text: &str, line: usize) -> Option<Self> {
        let text = text.trim();
        let (keyword, value) = match text.split_once(char::is_whitespace) {
            Some((keyword, value)) => (keyword, value.trim()),
            None => (text, ""),
        };
        if keyword.is_empty() {
            return None;
        }
        Some(Self {
            keyword: keyword.to_ascii_uppercase(),
            value: value.to_string(),
            line,
        })
    }
}

/// Splits Dockerfile text into logical instructions.
///
/// Blank lines and `#` comment lines are dropped, also inside a backslash
/// continuation. CRLF line endings are accepted. Never fails: anything that
/// does not look like an instruction is skipped.
pub fn parse_instructions(text: &str) -> Vec<Instruction> {
    let mut instructions = Vec::new();
    let mut pending: Option<(usize, Vec<String>)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (segment, continues) = match trimmed.strip_suffix('\\') {
            Some(rest) => (rest.trim_end(), true),
            None => (trimmed, false),
        };

        let (start, parts) = pending.get_or_insert_with(|| (idx + 1, Vec::new()));
        if !segment.is_empty() {
            parts.push(segment.to_string());
        }

        if !continues {
            if let Some(instruction) = Instruction::from_logical_line(&parts.join(" "), *start) {
                instructions.push(instruction);
            }
            pending = None;
        }
    }

    // Trailing backslash on the last line
    if let Some((start, parts)) = pending {
        if let Some(instruction) = Instruction::from_logical_line(&parts.join(" "), start) {
            instructions.push(instruction);
        }
    }

    instructions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_instructions() {
        let instructions = parse_instructions("FROM alpine:3.19\nWORKDIR /app\nCMD [\"sh\"]\n");

        assert_eq!(instructions.len(), 3);
        assert_eq!(instructions[0].keyword, "FROM");
        assert_eq!(instructions[0].value, "alpine:3.19");
        assert_eq!(instructions[0].line, 1);
        assert_eq!(instructions[2].value, "[\"sh\"]");
    }

    #[test]
    fn test_keyword_is_upper_cased() {
        let instructions = parse_instructions("from node:18 as base\nrun npm ci");
        assert_eq!(instructions[0].keyword, "FROM");
        assert_eq!(instructions[0].value, "node:18 as base");
        assert!(instructions[1].is("RUN"));
    }

    #[test]
    fn test_line_continuations_are_joined() {
        let text = "HEALTHCHECK --interval=30s --timeout=3s \\\n  CMD node healthcheck.js\n";
        let instructions = parse_instructions(text);

        assert_eq!(instructions.len(), 1);
        assert_eq!(
            instructions[0].value,
            "--interval=30s --timeout=3s CMD node healthcheck.js"
        );
    }

    #[test]
    fn test_comments_inside_continuation_are_skipped() {
        let text = "RUN apk add \\\n# build tools\n    curl \\\n    git\nWORKDIR /app";
        let instructions = parse_instructions(text);

        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0].value, "apk add curl git");
        assert_eq!(instructions[1].line, 5);
    }

    #[test]
    fn test_crlf_line_endings() {
        let instructions = parse_instructions("FROM alpine:3.22.1\r\nWORKDIR /app\r\n");
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0].value, "alpine:3.22.1");
        assert_eq!(instructions[1].value, "/app");
    }

    #[test]
    fn test_trailing_backslash_at_eof() {
        let instructions = parse_instructions("RUN echo hi \\");
        assert_eq!(instructions.len(), 1);
        assert_eq!(instructions[0].value, "echo hi");
    }

    #[test]
    fn test_empty_and_comment_only() {
        assert!(parse_instructions("").is_empty());
        assert!(parse_instructions("   \n\t\n").is_empty());
        assert!(parse_instructions("# one\n# FROM commented:out\n").is_empty());
    }

    #[test]
    fn test_keyword_without_value() {
        let instructions = parse_instructions("FROM\n");
        assert_eq!(instructions.len(), 1);
        assert_eq!(instructions[0].keyword, "FROM");
        assert_eq!(instructions[0].value, "");
    }
}
