use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;

/// Mobile apps: `Testing started at Mon Jun 09 10:21:55 PDT 2014`
static STARTED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)Testing started at\s*(?P<ts>.+?)\s*$").unwrap()
});

static CLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{1,2}:\d{2}:\d{2}").unwrap()
});

static YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:19|20)\d{2}\b").unwrap()
});

/// Netbook harness: `06/09/2014 10:21:55` near the top of the file
static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<ts>\d{2}/\d{2}/\d{4}\s+\d{1,2}:\d{2}:\d{2})").unwrap()
});

/// Lines searched for the numeric timestamp form.
const NUMERIC_SEARCH_LINES: usize = 5;

/// Parse the body of a `Testing started at` line. The time-zone token is
/// dropped; the result is the local wall time the device reported.
pub fn parse_started_at(ts: &str) -> Option<NaiveDateTime> {
    let clock = CLOCK_RE.find(ts)?;
    let year = YEAR_RE.find_at(ts, clock.end())?;
    let cleaned = format!("{} {}", &ts[..clock.end()], year.as_str());
    NaiveDateTime::parse_from_str(cleaned.trim(), "%a %b %d %H:%M:%S %Y").ok()
}

fn parse_numeric(ts: &str) -> Option<NaiveDateTime> {
    let normalized = ts.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&normalized, "%m/%d/%Y %H:%M:%S").ok()
}

/// Header timestamp of a log file, in either of the two forms the
/// harnesses write. `None` when neither is present or parseable.
pub fn parse_header_timestamp(text: &str) -> Option<NaiveDateTime> {
    if let Some(cap) = STARTED_RE.captures(text) {
        let parsed = parse_started_at(&cap["ts"]);
        if parsed.is_none() {
            log::debug!("unreadable start time {:?}", &cap["ts"]);
        }
        return parsed;
    }

    text.lines()
        .take(NUMERIC_SEARCH_LINES)
        .find_map(|line| NUMERIC_RE.captures(line))
        .and_then(|cap| parse_numeric(&cap["ts"]))
}

/// `MM/DD/YYYY`
pub fn format_date(ts: &NaiveDateTime) -> String {
    ts.format("%m/%d/%Y").to_string()
}

/// `HH:MM:SS`
pub fn format_time(ts: &NaiveDateTime) -> String {
    ts.format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_started_at_drops_zone() {
        let text = "CPUC Tester Beta v2.1\nTesting started at Mon Jun 09 10:21:55 PDT 2014\n";
        assert_eq!(parse_header_timestamp(text), Some(at(2014, 6, 9, 10, 21, 55)));
    }

    #[test]
    fn test_started_at_without_zone() {
        assert_eq!(
            parse_started_at("Tue Nov 04 08:00:01 2014"),
            Some(at(2014, 11, 4, 8, 0, 1))
        );
    }

    #[test]
    fn test_numeric_form_in_first_lines() {
        let text = "CPUC Tester Netbook\n06/09/2014 10:21:55 PDT\nStarting Test 1\n";
        assert_eq!(parse_header_timestamp(text), Some(at(2014, 6, 9, 10, 21, 55)));

        let late = "a\nb\nc\nd\ne\n06/09/2014 10:21:55\n";
        assert_eq!(parse_header_timestamp(late), None);
    }

    #[test]
    fn test_unreadable_start_line() {
        assert_eq!(parse_header_timestamp("Testing started at sometime\n"), None);
        assert_eq!(parse_header_timestamp(""), None);
    }

    #[test]
    fn test_formatting() {
        let ts = at(2014, 6, 9, 7, 5, 3);
        assert_eq!(format_date(&ts), "06/09/2014");
        assert_eq!(format_time(&ts), "07:05:03");
    }
}
