use crate::error::{ParserError, Result};
use std::io::{BufRead, Seek, SeekFrom};

/// Every line containing `phrase`, scanning from the start of the stream.
/// The stream position is restored afterwards.
pub fn find_lines_containing<R: BufRead + Seek>(reader: &mut R, phrase: &str) -> Result<Vec<String>> {
    let saved = reader.stream_position()?;
    reader.seek(SeekFrom::Start(0))?;

    let mut found = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        if line.contains(phrase) {
            found.push(line.trim_end_matches(['\r', '\n']).to_string());
        }
    }

    reader.seek(SeekFrom::Start(saved))?;
    Ok(found)
}

/// The trimmed text after `delimiter` on the first line containing it.
/// `None` when no line matches; `Some("")` when the label has no value.
pub fn extract_labeled_value<R: BufRead + Seek>(reader: &mut R, delimiter: &str) -> Result<Option<String>> {
    let lines = find_lines_containing(reader, delimiter)?;
    Ok(lines.first().map(|line| value_after(line, delimiter).to_string()))
}

/// One scan per delimiter, for records whose parts are labelled
/// differently (e.g. `Name = x, Architecture = y, Version = z`).
/// Each value stops at the next comma.
pub fn extract_multi_labeled_values<R: BufRead + Seek>(
    reader: &mut R,
    delimiters: &[&str],
    field_names: &[&str],
) -> Result<Vec<(String, Option<String>)>> {
    if delimiters.len() != field_names.len() {
        return Err(ParserError::InvalidArgument(format!(
            "{} delimiters given for {} fields",
            delimiters.len(),
            field_names.len()
        )));
    }

    let mut values = Vec::with_capacity(delimiters.len());
    for (delimiter, field) in delimiters.iter().zip(field_names) {
        let value = extract_labeled_value(reader, delimiter)?
            .map(|v| v.split(',').next().unwrap_or_default().trim().to_string());
        values.push((field.to_string(), value));
    }
    Ok(values)
}

/// Text after the first occurrence of `delimiter`, trimmed.
pub fn value_after<'a>(line: &'a str, delimiter: &str) -> &'a str {
    line.split_once(delimiter)
        .map(|(_, rest)| rest.trim())
        .unwrap_or_default()
}
