//! Splitting an input line into pipeline stages.
//!
//! The scanner walks the line once, tracking whether it is inside a quoted
//! region. A `|` outside quotes ends the current stage; inside quotes it is
//! ordinary content. The quote characters themselves are stripped, their
//! content kept verbatim.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Unquoted,
    SingleQuoted,
    DoubleQuoted,
}

struct StageScanner {
    state: ScanState,
    current: String,
    stages: Vec<String>,
}

impl StageScanner {
    fn new() -> Self {
        StageScanner {
            state: ScanState::Unquoted,
            current: String::new(),
            stages: Vec::new(),
        }
    }

    fn scan(mut self, line: &str) -> Vec<String> {
        for ch in line.chars() {
            match (self.state, ch) {
                (ScanState::Unquoted, '|') => self.finish_stage(),
                (ScanState::Unquoted, '\'') => self.state = ScanState::SingleQuoted,
                (ScanState::Unquoted, '"') => self.state = ScanState::DoubleQuoted,
                (ScanState::SingleQuoted, '\'') => self.state = ScanState::Unquoted,
                (ScanState::DoubleQuoted, '"') => self.state = ScanState::Unquoted,
                (_, c) => self.current.push(c),
            }
        }
        // An unterminated quote simply runs to the end of the line.
        self.finish_stage();
        self.stages
    }

    /// Trim the accumulated segment and keep it if anything remains.
    /// Dropping empty segments tolerates adjacent and trailing pipes.
    fn finish_stage(&mut self) {
        let stage = self.current.trim();
        if !stage.is_empty() {
            self.stages.push(stage.to_string());
        }
        self.current.clear();
    }
}

/// Split one raw input line into trimmed, non-empty stage strings.
///
/// A blank or whitespace-only line yields an empty vector, which callers
/// treat as a no-op.
pub fn split_into_stages(line: &str) -> Vec<String> {
    StageScanner::new().scan(line)
}
