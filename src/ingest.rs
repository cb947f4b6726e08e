//! Customer list ingestion: CSV uploads and the built-in sample list.

use crate::errors::AppError;
use crate::models::{CustomerListResponse, CustomerRecord, FieldValue};

/// Rows beyond this are dropped and the response is marked truncated.
pub const MAX_CSV_ROWS: usize = 500;

/// Parses a CSV customer list with a header row.
///
/// Cells are kept as strings; empty cells are left out of the record. Records
/// without `customer_id` or `id` get a generated `customer_id`.
pub fn parse_csv(input: &str) -> Result<CustomerListResponse, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::InvalidInput(format!("Invalid CSV header: {}", e)))?
        .iter()
        .map(normalize_header)
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(AppError::InvalidInput(
            "CSV must start with a header row".to_string(),
        ));
    }

    let mut customers = Vec::new();
    let mut truncated = false;

    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| {
            AppError::InvalidInput(format!("Invalid CSV row {}: {}", line + 2, e))
        })?;

        let mut record: CustomerRecord = headers
            .iter()
            .zip(row.iter())
            .filter(|(header, cell)| !header.is_empty() && !cell.is_empty())
            .map(|(header, cell)| (header.clone(), FieldValue::from(cell)))
            .collect();
        if record.is_empty() {
            continue;
        }

        if customers.len() == MAX_CSV_ROWS {
            truncated = true;
            break;
        }
        record.ensure_identifier();
        customers.push(record);
    }

    tracing::info!(
        "Parsed {} customers from CSV{}",
        customers.len(),
        if truncated { " (truncated)" } else { "" }
    );

    Ok(CustomerListResponse {
        customers,
        truncated,
    })
}

/// `First Name` → `first_name`
fn normalize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}')
        .trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Eight demo customers for a coffee-shop walkthrough.
pub fn sample_customers() -> Vec<CustomerRecord> {
    const SAMPLES: [(&str, &str, &str, &str, &str, &str, i64, &str, &str); 8] = [
        ("CUST_0001", "Sarah", "Johnson", "sarah.johnson@gmail.com", "Seattle", "WA", 34, "$75,000-$99,999", "Completed College"),
        ("CUST_0002", "Michael", "Chen", "michael.chen@outlook.com", "Portland", "OR", 42, "$100,000-$149,999", "Completed Graduate School"),
        ("CUST_0003", "Emily", "Davis", "emily.davis@yahoo.com", "San Francisco", "CA", 28, "$60,000-$74,999", "Completed College"),
        ("CUST_0004", "David", "Williams", "david.williams@gmail.com", "Denver", "CO", 51, "$150,000-$174,999", "Completed High School"),
        ("CUST_0005", "Jessica", "Brown", "jessica.brown@hotmail.com", "Seattle", "WA", 39, "$100,000-$149,999", "Completed College"),
        ("CUST_0006", "Robert", "Miller", "robert.miller@gmail.com", "Portland", "OR", 45, "$75,000-$99,999", "Some College"),
        ("CUST_0007", "Amanda", "Wilson", "amanda.wilson@outlook.com", "San Francisco", "CA", 33, "$200,000-$249,999", "Completed Graduate School"),
        ("CUST_0008", "James", "Taylor", "james.taylor@gmail.com", "Denver", "CO", 47, "$100,000-$149,999", "Completed College"),
    ];

    SAMPLES
        .iter()
        .map(|(id, first, last, email, city, state, age, income, education)| {
            let mut record = CustomerRecord::new();
            record.insert("customer_id", *id);
            record.insert("first_name", *first);
            record.insert("last_name", *last);
            record.insert("email", *email);
            record.insert("city", *city);
            record.insert("state", *state);
            record.insert("age", *age);
            record.insert("income", *income);
            record.insert("education", *education);
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_keeps_strings_and_skips_empty_cells() {
        let csv = "Customer ID,First Name,last_name,email,age\n\
                   C1,Sarah,Johnson,sarah@example.com,34\n\
                   ,Mike,,mike@example.com,\n";
        let parsed = parse_csv(csv).unwrap();

        assert_eq!(parsed.customers.len(), 2);
        assert!(!parsed.truncated);

        let first = &parsed.customers[0];
        assert_eq!(first.identifier().as_deref(), Some("C1"));
        assert_eq!(first.get("age"), Some(&FieldValue::from("34")));

        let second = &parsed.customers[1];
        assert!(second.get("last_name").is_none());
        assert!(second.identifier().is_some());
    }

    #[test]
    fn test_parse_csv_truncates() {
        let mut csv = String::from("email\n");
        for i in 0..(MAX_CSV_ROWS + 3) {
            csv.push_str(&format!("user{}@example.com\n", i));
        }
        let parsed = parse_csv(&csv).unwrap();
        assert_eq!(parsed.customers.len(), MAX_CSV_ROWS);
        assert!(parsed.truncated);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(parse_csv("").is_err());
    }

    #[test]
    fn test_sample_customers() {
        let samples = sample_customers();
        assert_eq!(samples.len(), 8);
        assert!(samples.iter().all(|r| r.identifier().is_some()));
        assert_eq!(samples[0].get("age"), Some(&FieldValue::Number(34.0)));
    }
}
