pub mod dedup;
pub mod mapper;
pub mod processor;
pub mod validator;

pub use processor::{CsvProcessor, ProcessOutcome};

use std::collections::HashMap;

/// One parsed CSV line: raw header -> raw cell value.
pub type RawRow = HashMap<String, String>;

/// A row after field mapping: canonical field -> value. Required fields the
/// file never supplied are present with `None` so validation sees a uniform
/// key set.
pub type CanonicalRow = HashMap<String, Option<String>>;

/// Read just the header row from raw CSV bytes.
pub fn read_columns(bytes: &[u8]) -> Result<Vec<String>, csv::Error> {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers = reader.headers()?;
    Ok(headers.iter().map(|h| h.to_string()).collect())
}

/// Parse raw CSV bytes into headers plus one `RawRow` per data line.
pub fn read_rows(bytes: &[u8]) -> Result<(Vec<String>, Vec<RawRow>), csv::Error> {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: RawRow = headers
            .iter()
            .cloned()
            .zip(record.iter().map(|v| v.to_string()))
            .collect();
        rows.push(row);
    }
    Ok((headers, rows))
}

/// Count data rows without materializing them.
pub fn count_rows(bytes: &[u8]) -> Result<u64, csv::Error> {
    let mut reader = csv::Reader::from_reader(bytes);
    let mut count = 0u64;
    for record in reader.records() {
        record?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"name,email\nAda,ada@example.com\nGrace,grace@example.com\n";

    #[test]
    fn reads_headers_and_rows() {
        let (headers, rows) = read_rows(SAMPLE).unwrap();
        assert_eq!(headers, vec!["name", "email"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("email").unwrap(), "ada@example.com");
    }

    #[test]
    fn counts_data_rows_only() {
        assert_eq!(count_rows(SAMPLE).unwrap(), 2);
        assert_eq!(count_rows(b"name,email\n").unwrap(), 0);
    }
}
