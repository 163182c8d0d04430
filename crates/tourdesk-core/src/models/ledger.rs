//! Compensation ledger
//!
//! One normalized row per reservation cancelled by a deletion, and the CSV
//! rendering handed to the actor who triggered it.

use super::{Excursion, Reservation, Session};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Serialize;

/// Column separator, spreadsheet friendly for ru/eu locales
pub const CSV_DELIMITER: char = ';';

/// UTF-8 byte order mark so spreadsheet apps detect the encoding
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const CSV_HEADER: [&str; 12] = [
    "reservation_id",
    "full_name",
    "email",
    "phone_number",
    "participants_count",
    "booked_at",
    "session_start",
    "excursion_title",
    "place",
    "total_cost",
    "is_paid",
    "is_cancelled",
];

const DATETIME_FORMAT: &str = "%d.%m.%Y %H:%M";

/// A cancelled reservation as it appears in the export
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LedgerRow {
    pub reservation_id: i64,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub participants_count: i32,
    pub booked_at: DateTime<Utc>,
    pub session_start: DateTime<Utc>,
    pub excursion_title: String,
    pub place: String,
    pub total_cost: Decimal,
    pub is_paid: bool,
    pub is_cancelled: bool,
}

impl LedgerRow {
    /// Row for `reservation` once it has been cancelled
    pub fn cancelled(reservation: &Reservation, session: &Session, excursion: &Excursion) -> Self {
        Self {
            reservation_id: reservation.id,
            full_name: reservation.contact.full_name.clone(),
            email: reservation.contact.email.clone(),
            phone_number: reservation.contact.phone_number.clone(),
            participants_count: reservation.participants_count,
            booked_at: reservation.booked_at,
            session_start: session.start_at,
            excursion_title: excursion.title.clone(),
            place: excursion.place.clone(),
            total_cost: session
                .cost
                .saturating_mul(Decimal::from(reservation.participants_count)),
            is_paid: reservation.is_paid,
            is_cancelled: true,
        }
    }
}

/// All rows produced by one compensation run
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompensationLedger {
    pub rows: Vec<LedgerRow>,
}

impl CompensationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: LedgerRow) {
        self.rows.push(row);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of `total_cost` over rows that had been paid
    pub fn refunded_total(&self) -> Decimal {
        self.rows
            .iter()
            .filter(|r| r.is_paid)
            .map(|r| r.total_cost)
            .sum()
    }

    /// Render as `;`-separated CSV with a UTF-8 BOM, times shown in `tz`
    pub fn to_csv(&self, tz: Tz) -> Vec<u8> {
        let mut out = Vec::with_capacity(UTF8_BOM.len() + 128 * (self.rows.len() + 1));
        out.extend_from_slice(UTF8_BOM);

        write_record(&mut out, CSV_HEADER.iter().map(|h| h.to_string()));

        for row in &self.rows {
            write_record(
                &mut out,
                [
                    row.reservation_id.to_string(),
                    row.full_name.clone(),
                    row.email.clone(),
                    row.phone_number.clone(),
                    row.participants_count.to_string(),
                    format_local(row.booked_at, tz),
                    format_local(row.session_start, tz),
                    row.excursion_title.clone(),
                    row.place.clone(),
                    format!("{:.2}", row.total_cost),
                    row.is_paid.to_string(),
                    row.is_cancelled.to_string(),
                ]
                .into_iter(),
            );
        }

        out
    }
}

/// Format a UTC instant in `tz` the way people read it in emails and exports
pub fn format_local(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format(DATETIME_FORMAT).to_string()
}

fn write_record(out: &mut Vec<u8>, fields: impl Iterator<Item = String>) {
    let line = fields
        .map(|f| escape_field(&f))
        .collect::<Vec<_>>()
        .join(&CSV_DELIMITER.to_string());
    out.extend_from_slice(line.as_bytes());
    out.extend_from_slice(b"\r\n");
}

/// Quote a field when it contains the delimiter, quotes or line breaks
fn escape_field(field: &str) -> String {
    if field.contains(CSV_DELIMITER)
        || field.contains('"')
        || field.contains('\n')
        || field.contains('\r')
    {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn row(id: i64, name: &str, is_paid: bool, total: Decimal) -> LedgerRow {
        LedgerRow {
            reservation_id: id,
            full_name: name.to_string(),
            email: "guest@example.com".to_string(),
            phone_number: "+79000000000".to_string(),
            participants_count: 2,
            booked_at: Utc.with_ymd_and_hms(2026, 5, 1, 9, 30, 0).unwrap(),
            session_start: Utc.with_ymd_and_hms(2026, 6, 1, 7, 0, 0).unwrap(),
            excursion_title: "Old town walk".to_string(),
            place: "Central square".to_string(),
            total_cost: total,
            is_paid,
            is_cancelled: true,
        }
    }

    #[test]
    fn test_csv_layout() {
        let mut ledger = CompensationLedger::new();
        ledger.push(row(1, "Anna Petrova", true, dec!(3000)));
        ledger.push(row(2, "Ivan Ivanov", false, dec!(0)));

        let csv = ledger.to_csv(chrono_tz::Europe::Moscow);
        assert!(csv.starts_with(UTF8_BOM));

        let text = String::from_utf8(csv[UTF8_BOM.len()..].to_vec()).unwrap();
        let lines: Vec<&str> = text.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].split(';').count(), 12);
        assert_eq!(
            lines[1],
            "1;Anna Petrova;guest@example.com;+79000000000;2;01.05.2026 12:30;01.06.2026 10:00;Old town walk;Central square;3000.00;true;true"
        );
        assert!(lines[2].ends_with("0.00;false;true"));
    }

    #[test]
    fn test_csv_quotes_special_fields() {
        let mut ledger = CompensationLedger::new();
        ledger.push(row(7, "O\"Neil; Jr", true, dec!(10)));

        let csv = ledger.to_csv(chrono_tz::UTC);
        let text = String::from_utf8(csv).unwrap();
        assert!(text.contains("7;\"O\"\"Neil; Jr\";"));
    }

    #[test]
    fn test_refunded_total() {
        let mut ledger = CompensationLedger::new();
        ledger.push(row(1, "A", true, dec!(1500)));
        ledger.push(row(2, "B", false, dec!(0)));
        ledger.push(row(3, "C", true, dec!(750.50)));
        assert_eq!(ledger.refunded_total(), dec!(2250.50));
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn test_empty_ledger_has_header_only() {
        let csv = CompensationLedger::new().to_csv(chrono_tz::UTC);
        let text = String::from_utf8(csv).unwrap();
        assert_eq!(text.matches("\r\n").count(), 1);
    }
}
