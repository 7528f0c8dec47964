// CSV to record conversion
//
// The first row names the fields; every following row becomes one record
// mapping field name to the raw cell text. No type coercion happens here.

use std::collections::BTreeMap;
use std::io::Read;

use crate::error::Result;

/// One CSV data row keyed by header field name.
pub type Record = BTreeMap<String, String>;

/// Parse header-delimited CSV into records.
///
/// Rows whose field count differs from the header are rejected.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let mut records = Vec::new();

    for row in reader.records() {
        let row = row?;
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(field, value)| (field.to_string(), value.to_string()))
            .collect();
        records.push(record);
    }

    tracing::debug!(
        fields = headers.len(),
        rows = records.len(),
        "Converted CSV to records"
    );
    Ok(records)
}
