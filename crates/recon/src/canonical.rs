//! Raw storage records → canonical invoice / statement line shapes.
//!
//! This is the only place that knows storage-layer column names. Each
//! canonical field accepts a short list of aliases; the first alias present
//! with a non-null value wins.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::{ReconError, RecordSide, ShapeError};
use crate::model::{CanonicalInvoice, CanonicalStatementLine, RawRecord};

const INVOICE_DOC: &[&str] = &["doc_number", "invoice_num", "invoice_number", "number"];
const INVOICE_AMOUNT: &[&str] = &["total_amount", "amount", "total"];
const INVOICE_DATE: &[&str] = &["invoice_date", "date", "issued_on"];

const LINE_DOC: &[&str] = &["doc_number", "doc", "reference", "invoice_num"];
const LINE_AMOUNT: &[&str] = &["amount", "total_amount"];
const LINE_DATE: &[&str] = &["date", "line_date", "transaction_date"];

/// Largest accepted amount magnitude (10^15). Sums of a full group plus
/// tolerance slack stay far inside `Decimal` range.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA4C6_8000, 0x0003_8D7E, 0, false, 0);

pub fn canonicalize_invoice(raw: &RawRecord) -> Result<CanonicalInvoice, ShapeError> {
    let id = required_id(raw, "id")?;
    let total_amount = required_amount(raw, INVOICE_AMOUNT, "total_amount")?;
    if total_amount < Decimal::ZERO {
        return Err(ShapeError::InvalidValue {
            field: "total_amount",
            value: total_amount.to_string(),
        });
    }

    Ok(CanonicalInvoice {
        id,
        doc_number: doc_number(raw, INVOICE_DOC)?,
        total_amount,
        currency: required_currency(raw)?,
        invoice_date: optional_date(raw, INVOICE_DATE, "invoice_date")?,
        vendor_id: optional_id(raw, "vendor_id")?,
        company_id: optional_id(raw, "company_id")?,
    })
}

pub fn canonicalize_statement_line(raw: &RawRecord) -> Result<CanonicalStatementLine, ShapeError> {
    Ok(CanonicalStatementLine {
        id: required_id(raw, "id")?,
        doc_number: doc_number(raw, LINE_DOC)?,
        amount: required_amount(raw, LINE_AMOUNT, "amount")?,
        currency: required_currency(raw)?,
        date: optional_date(raw, LINE_DATE, "date")?,
    })
}

/// Canonicalize a whole batch, failing on the first malformed record.
/// Ids must be unique within the batch.
pub fn canonicalize_statement_lines(
    raws: &[RawRecord],
) -> Result<Vec<CanonicalStatementLine>, ReconError> {
    canonicalize_batch(raws, RecordSide::StatementLine, canonicalize_statement_line, |l| &l.id)
}

pub fn canonicalize_invoices(raws: &[RawRecord]) -> Result<Vec<CanonicalInvoice>, ReconError> {
    canonicalize_batch(raws, RecordSide::Invoice, canonicalize_invoice, |i| &i.id)
}

fn canonicalize_batch<T>(
    raws: &[RawRecord],
    side: RecordSide,
    convert: fn(&RawRecord) -> Result<T, ShapeError>,
    id_of: fn(&T) -> &String,
) -> Result<Vec<T>, ReconError> {
    let mut seen: HashMap<String, usize> = HashMap::with_capacity(raws.len());
    let mut out = Vec::with_capacity(raws.len());

    for (index, raw) in raws.iter().enumerate() {
        let shape_err = |source| ReconError::Shape {
            side,
            index,
            record_id: peek_id(raw),
            source,
        };
        let record = convert(raw).map_err(shape_err)?;
        if let Some(&first_index) = seen.get(id_of(&record)) {
            return Err(shape_err(ShapeError::DuplicateId { first_index }));
        }
        seen.insert(id_of(&record).clone(), index);
        out.push(record);
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn lookup<'a>(raw: &'a RawRecord, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|name| raw.get(*name))
        .find(|v| !v.is_null())
}

fn peek_id(raw: &RawRecord) -> Option<String> {
    match raw.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn id_value(value: &Value, field: &'static str) -> Result<String, ShapeError> {
    match value {
        Value::String(s) if s.trim().is_empty() => Err(ShapeError::InvalidValue {
            field,
            value: s.clone(),
        }),
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        _ => Err(ShapeError::WrongType {
            field,
            expected: "string or integer",
        }),
    }
}

fn required_id(raw: &RawRecord, field: &'static str) -> Result<String, ShapeError> {
    let value = lookup(raw, &[field]).ok_or(ShapeError::MissingField { field })?;
    id_value(value, field)
}

fn optional_id(raw: &RawRecord, field: &'static str) -> Result<Option<String>, ShapeError> {
    match lookup(raw, &[field]) {
        None => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(value) => id_value(value, field).map(Some),
    }
}

fn required_amount(
    raw: &RawRecord,
    aliases: &[&str],
    field: &'static str,
) -> Result<Decimal, ShapeError> {
    let value = lookup(raw, aliases).ok_or(ShapeError::MissingField { field })?;
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => {
            return Err(ShapeError::WrongType {
                field,
                expected: "number or decimal string",
            })
        }
    };
    let amount = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| ShapeError::InvalidValue {
            field,
            value: text.clone(),
        })?;
    if amount.abs() > MAX_AMOUNT {
        return Err(ShapeError::InvalidValue { field, value: text });
    }
    Ok(amount)
}

fn required_currency(raw: &RawRecord) -> Result<String, ShapeError> {
    let field = "currency";
    let value = lookup(raw, &[field]).ok_or(ShapeError::MissingField { field })?;
    let Value::String(s) = value else {
        return Err(ShapeError::WrongType {
            field,
            expected: "string",
        });
    };
    let code = s.trim().to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ShapeError::InvalidValue {
            field,
            value: s.clone(),
        });
    }
    Ok(code)
}

fn doc_number(raw: &RawRecord, aliases: &[&str]) -> Result<String, ShapeError> {
    match lookup(raw, aliases) {
        None => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        Some(_) => Err(ShapeError::WrongType {
            field: "doc_number",
            expected: "string",
        }),
    }
}

fn optional_date(
    raw: &RawRecord,
    aliases: &[&str],
    field: &'static str,
) -> Result<Option<NaiveDate>, ShapeError> {
    let text = match lookup(raw, aliases) {
        None => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim(),
        Some(_) => {
            return Err(ShapeError::WrongType {
                field,
                expected: "date string",
            })
        }
    };

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(Some(date));
    }
    chrono::DateTime::parse_from_rfc3339(text)
        .map(|dt| Some(dt.date_naive()))
        .map_err(|_| ShapeError::InvalidValue {
            field,
            value: text.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn invoice_canonical_names() {
        let inv = canonicalize_invoice(&record(json!({
            "id": "inv-1",
            "doc_number": "INV-001",
            "total_amount": "1000.00",
            "currency": "usd",
            "invoice_date": "2025-01-01",
            "vendor_id": "v-9",
            "company_id": 42
        })))
        .unwrap();
        assert_eq!(inv.id, "inv-1");
        assert_eq!(inv.doc_number, "INV-001");
        assert_eq!(inv.total_amount, dec("1000.00"));
        assert_eq!(inv.currency, "USD");
        assert_eq!(inv.invoice_date, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(inv.vendor_id.as_deref(), Some("v-9"));
        assert_eq!(inv.company_id.as_deref(), Some("42"));
    }

    #[test]
    fn invoice_storage_aliases() {
        let inv = canonicalize_invoice(&record(json!({
            "id": 17,
            "invoice_num": "A/17",
            "amount": 250.5,
            "currency": "EUR",
            "issued_on": "2025-03-04T10:15:00Z"
        })))
        .unwrap();
        assert_eq!(inv.id, "17");
        assert_eq!(inv.doc_number, "A/17");
        assert_eq!(inv.total_amount, dec("250.5"));
        assert_eq!(inv.invoice_date, NaiveDate::from_ymd_opt(2025, 3, 4));
        assert!(inv.vendor_id.is_none());
    }

    #[test]
    fn canonical_name_wins_over_alias() {
        let inv = canonicalize_invoice(&record(json!({
            "id": "i",
            "total_amount": "10",
            "amount": "99",
            "currency": "USD"
        })))
        .unwrap();
        assert_eq!(inv.total_amount, dec("10"));
    }

    #[test]
    fn invoice_missing_amount() {
        let err = canonicalize_invoice(&record(json!({"id": "i", "currency": "USD"}))).unwrap_err();
        assert_eq!(err, ShapeError::MissingField { field: "total_amount" });
    }

    #[test]
    fn invoice_negative_amount_rejected() {
        let err = canonicalize_invoice(&record(json!({
            "id": "i", "total_amount": "-1", "currency": "USD"
        })))
        .unwrap_err();
        assert!(matches!(err, ShapeError::InvalidValue { field: "total_amount", .. }));
    }

    #[test]
    fn amounts_beyond_bound_rejected() {
        assert_eq!(MAX_AMOUNT, dec("1000000000000000"));

        let line = canonicalize_statement_line(&record(json!({
            "id": "l", "amount": "-1000000000000000", "currency": "USD"
        })))
        .unwrap();
        assert_eq!(line.amount, -MAX_AMOUNT);

        let err = canonicalize_statement_line(&record(json!({
            "id": "l", "amount": "-79228162514264337593543950335", "currency": "USD"
        })))
        .unwrap_err();
        assert!(matches!(err, ShapeError::InvalidValue { field: "amount", .. }));

        let err = canonicalize_invoice(&record(json!({
            "id": "i", "total_amount": "1000000000000000.01", "currency": "USD"
        })))
        .unwrap_err();
        assert!(matches!(err, ShapeError::InvalidValue { field: "total_amount", .. }));
    }

    #[test]
    fn null_counts_as_missing() {
        let err = canonicalize_statement_line(&record(json!({
            "id": null, "amount": "5", "currency": "USD"
        })))
        .unwrap_err();
        assert_eq!(err, ShapeError::MissingField { field: "id" });
    }

    #[test]
    fn line_without_date_or_doc() {
        let line = canonicalize_statement_line(&record(json!({
            "id": "l1", "amount": 12, "currency": "GBP"
        })))
        .unwrap();
        assert_eq!(line.doc_number, "");
        assert!(line.date.is_none());
        assert_eq!(line.amount, dec("12"));
    }

    #[test]
    fn line_aliases_and_empty_date() {
        let line = canonicalize_statement_line(&record(json!({
            "id": "l1", "doc": "inv001", "amount": "-3.50", "currency": " usd ", "date": ""
        })))
        .unwrap();
        assert_eq!(line.doc_number, "inv001");
        assert_eq!(line.amount, dec("-3.50"));
        assert_eq!(line.currency, "USD");
        assert!(line.date.is_none());
    }

    #[test]
    fn wrong_types_rejected() {
        let err = canonicalize_statement_line(&record(json!({
            "id": "l1", "amount": true, "currency": "USD"
        })))
        .unwrap_err();
        assert!(matches!(err, ShapeError::WrongType { field: "amount", .. }));

        let err = canonicalize_statement_line(&record(json!({
            "id": ["x"], "amount": 1, "currency": "USD"
        })))
        .unwrap_err();
        assert!(matches!(err, ShapeError::WrongType { field: "id", .. }));

        let err = canonicalize_statement_line(&record(json!({
            "id": "l", "amount": 1, "currency": 840
        })))
        .unwrap_err();
        assert!(matches!(err, ShapeError::WrongType { field: "currency", .. }));
    }

    #[test]
    fn bad_values_rejected() {
        let err = canonicalize_statement_line(&record(json!({
            "id": "l", "amount": "12,00", "currency": "USD"
        })))
        .unwrap_err();
        assert!(matches!(err, ShapeError::InvalidValue { field: "amount", .. }));

        let err = canonicalize_statement_line(&record(json!({
            "id": "l", "amount": "1", "currency": "US Dollar"
        })))
        .unwrap_err();
        assert!(matches!(err, ShapeError::InvalidValue { field: "currency", .. }));

        let err = canonicalize_statement_line(&record(json!({
            "id": "l", "amount": "1", "currency": "USD", "date": "01/02/2025"
        })))
        .unwrap_err();
        assert!(matches!(err, ShapeError::InvalidValue { field: "date", .. }));
    }

    #[test]
    fn batch_reports_index_and_id() {
        let raws = vec![
            record(json!({"id": "a", "amount": "1", "currency": "USD"})),
            record(json!({"id": "b", "amount": "1"})),
        ];
        let err = canonicalize_statement_lines(&raws).unwrap_err();
        match err {
            ReconError::Shape {
                side,
                index,
                record_id,
                source,
            } => {
                assert_eq!(side, RecordSide::StatementLine);
                assert_eq!(index, 1);
                assert_eq!(record_id.as_deref(), Some("b"));
                assert_eq!(source, ShapeError::MissingField { field: "currency" });
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn batch_rejects_duplicate_ids() {
        let raws = vec![
            record(json!({"id": 7, "total_amount": "1", "currency": "USD"})),
            record(json!({"id": "8", "total_amount": "1", "currency": "USD"})),
            record(json!({"id": "7", "total_amount": "2", "currency": "USD"})),
        ];
        let err = canonicalize_invoices(&raws).unwrap_err();
        assert!(matches!(
            err,
            ReconError::Shape {
                side: RecordSide::Invoice,
                index: 2,
                source: ShapeError::DuplicateId { first_index: 0 },
                ..
            }
        ));
    }
}
