use crate::error::{ParserError, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

static EMBEDDED: Lazy<Arc<TesterTable>> = Lazy::new(|| {
    let table = TesterTable::parse(include_str!("../data/device_testers.csv")).unwrap_or_else(|e| {
        log::error!("embedded tester table: {}", e);
        TesterTable::default()
    });
    Arc::new(table)
});

#[derive(Debug, Deserialize)]
struct TesterRow {
    device_id: String,
    tester: String,
}

/// Device id to tester name pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TesterTable {
    entries: Vec<(String, String)>,
}

impl TesterTable {
    /// Parse a `device_id,tester` CSV with a header row. Rows with an empty
    /// id or tester are skipped; a row that does not fit the two columns is
    /// an error.
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let mut entries = Vec::new();
        for row in reader.deserialize::<TesterRow>() {
            let row = row.map_err(|e| ParserError::Config(format!("tester table: {}", e)))?;
            if row.device_id.is_empty() || row.tester.is_empty() {
                continue;
            }
            entries.push((row.device_id, row.tester));
        }
        Ok(Self { entries })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let table = Self::parse(&text)?;
        if table.is_empty() {
            return Err(ParserError::Config(format!(
                "no device/tester pairs in {}",
                path.display()
            )));
        }
        Ok(table)
    }

    /// The table shipped with the crate.
    pub fn embedded() -> &'static TesterTable {
        &EMBEDDED
    }

    /// Shared handle to the built-in table; loaded once per process.
    pub fn shared() -> Arc<TesterTable> {
        Arc::clone(&EMBEDDED)
    }

    /// First tester whose recorded id contains `device_id`.
    pub fn lookup(&self, device_id: &str) -> Option<&str> {
        if device_id.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(id, _)| id.contains(device_id))
            .map(|(_, tester)| tester.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// iPhones report no stable id; the tester is encoded in the digits of
/// the configured device name.
pub fn iphone_tester(device_id: &str) -> Option<String> {
    let digits: String = device_id.chars().filter(|c| c.is_ascii_digit()).collect();
    let number = digits.trim_start_matches('0');
    if number.is_empty() {
        None
    } else {
        Some(format!("Tester {}", number))
    }
}
