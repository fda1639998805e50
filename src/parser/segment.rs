use crate::error::ErrorKind;
use once_cell::unsync::OnceCell;

/// Phrase the harness prints at the start of every sub-test run.
pub const TEST_DELIMITER: &str = "Starting Test";

/// Phrase printed when the device never reached the test servers.
pub const CONNECTIVITY_FAILED: &str = "Connectivity Test Failed";

/// Outcome of splitting a whole file into sub-test chunks
#[derive(Debug, Clone, PartialEq)]
pub enum Segmentation {
    Chunks(Vec<String>),
    /// Nothing could be segmented; the file gets this error instead of tests.
    Failed(ErrorKind),
}

/// Split a file on [`TEST_DELIMITER`], dropping the preamble and
/// re-prepending the delimiter to every chunk.
pub fn split_into_test_chunks(text: &str) -> Segmentation {
    if text.contains(CONNECTIVITY_FAILED) && !text.contains(TEST_DELIMITER) {
        return Segmentation::Failed(ErrorKind::ConnectivityFailed);
    }

    let chunks = split_keeping_marker(text, TEST_DELIMITER);
    if chunks.is_empty() {
        Segmentation::Failed(ErrorKind::NoTestsFound)
    } else {
        Segmentation::Chunks(chunks)
    }
}

/// Every piece of `text` that follows an occurrence of `marker`, with the
/// marker put back in front. Text before the first marker is discarded.
pub fn split_keeping_marker(text: &str, marker: &str) -> Vec<String> {
    text.split(marker)
        .skip(1)
        .map(|part| format!("{}{}", marker, part))
        .collect()
}

/// Groups of consecutive non-blank lines, trimmed, in file order.
pub fn split_on_blank_line_groups(text: &str) -> Vec<String> {
    let mut groups = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                groups.push(current.join("\n").trim().to_string());
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        groups.push(current.join("\n").trim().to_string());
    }

    groups
}

/// A file's text together with its lazily computed test chunks, so the
/// split happens at most once per file.
pub struct LogText {
    text: String,
    chunks: OnceCell<Segmentation>,
}

impl LogText {
    /// Takes ownership of the raw text, normalising line endings.
    pub fn new(text: &str) -> Self {
        Self {
            text: text.replace("\r\n", "\n"),
            chunks: OnceCell::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn test_chunks(&self) -> &Segmentation {
        self.chunks.get_or_init(|| split_into_test_chunks(&self.text))
    }
}
