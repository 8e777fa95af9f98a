//! Annotated-ledger CSV export: source columns plus the two engine-owned
//! fields.

use cohort_recon::model::Ledger;

/// Render the annotated ledger as CSV: the original header order followed by
/// `canceled_quantity` and `cancel_timestamp`. Timestamps use the same
/// format the ledger was parsed with.
pub fn annotated_csv(ledger: &Ledger, timestamp_format: &str) -> Result<String, String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<&str> = ledger.headers.iter().map(String::as_str).collect();
    header.push("canceled_quantity");
    header.push("cancel_timestamp");
    writer.write_record(&header).map_err(|e| e.to_string())?;

    for record in &ledger.records {
        let mut row: Vec<String> = ledger
            .headers
            .iter()
            .map(|h| record.raw_fields.get(h).cloned().unwrap_or_default())
            .collect();
        row.push(record.canceled_quantity.to_string());
        row.push(
            record
                .cancel_timestamp
                .map(|ts| ts.format(timestamp_format).to_string())
                .unwrap_or_default(),
        );
        writer.write_record(&row).map_err(|e| e.to_string())?;
    }

    let bytes = writer.into_inner().map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}
