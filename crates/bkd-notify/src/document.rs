//! Document rendering collaborator.
//!
//! Renders invoices and monthly summaries behind a trait; the daemon only
//! ever sees opaque bytes plus a filename and content type. This module is
//! also the presentation boundary for dates — the only place the legacy
//! MM-DD-YYYY display format is produced.

use bkd_schemas::{Cents, Reservation, ReservationPayment};
use chrono::{DateTime, Utc};

/// Format a timestamp for human-facing documents.
pub fn display_date(ts: DateTime<Utc>) -> String {
    ts.format("%m-%d-%Y %H:%M").to_string()
}

/// A rendered document ready to download or attach.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Month selector for summary documents.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MonthRef {
    pub year: i32,
    pub month: u32,
}

impl MonthRef {
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

pub trait DocumentRenderer: Send + Sync {
    fn render_invoice(&self, reservation: &Reservation, payments: &[ReservationPayment])
        -> Document;

    fn render_monthly_summary(&self, month: MonthRef, rows: &[Reservation]) -> Document;
}

// ---------------------------------------------------------------------------
// Plain-text renderer
// ---------------------------------------------------------------------------

/// Monospace plain-text documents. The file-format internals are not part
/// of the engine's contract; callers treat the output as opaque bytes.
#[derive(Default)]
pub struct TextRenderer;

impl TextRenderer {
    pub fn new() -> Self {
        Self
    }
}

fn money_line(label: &str, amount: Option<Cents>) -> String {
    match amount {
        Some(a) => format!("{label:<22} ${a}\n"),
        None => format!("{label:<22} -\n"),
    }
}

impl DocumentRenderer for TextRenderer {
    fn render_invoice(
        &self,
        r: &Reservation,
        payments: &[ReservationPayment],
    ) -> Document {
        let mut out = String::new();
        out.push_str("BOOKDESK INVOICE\n");
        out.push_str("================\n\n");
        out.push_str(&format!("Reservation: {}\n", r.id));
        if let (Some(first), Some(last)) = (&r.client_name, &r.client_lastname) {
            out.push_str(&format!("Guest:       {first} {last}\n"));
        }
        if let Some(address) = &r.apartment_address {
            out.push_str(&format!("Property:    {address}\n"));
        }
        if let Some(ci) = r.check_in {
            out.push_str(&format!("Check-in:    {}\n", display_date(ci)));
        }
        if let Some(co) = r.check_out {
            out.push_str(&format!("Check-out:   {}\n", display_date(co)));
        }
        out.push('\n');

        if let (Some(nights), Some(price)) = (r.nights, r.price_per_night) {
            out.push_str(&format!("{:<22} {nights} x ${price}\n", "Nights"));
        }
        out.push_str(&money_line("Cleaning fee", r.cleaning_fee));
        out.push_str(&money_line("Other expenses", r.other_expenses));
        out.push_str(&money_line("Parking fee", r.parking_fee));
        out.push_str(&money_line("Taxes", r.taxes));
        if let Some(fee) = r.cancellation_fee {
            if fee.is_positive() {
                // Billed separately; never part of the stay total.
                out.push_str(&money_line("Cancellation fee", Some(fee)));
            }
        }
        out.push_str("----------------------------------------\n");
        out.push_str(&money_line("Total", r.total_amount));
        out.push_str(&money_line("Paid", Some(r.amount_paid)));
        out.push_str(&money_line("Balance due", r.amount_due));

        if !payments.is_empty() {
            out.push_str("\nPayments\n--------\n");
            for p in payments {
                out.push_str(&format!(
                    "{}  ${}  {}{}\n",
                    display_date(p.payment_date),
                    p.amount,
                    p.payment_method,
                    p.payment_reference
                        .as_deref()
                        .map(|r| format!(" ({r})"))
                        .unwrap_or_default(),
                ));
            }
        }

        Document {
            filename: format!("invoice-{}.txt", r.id),
            content_type: "text/plain; charset=utf-8",
            bytes: out.into_bytes(),
        }
    }

    fn render_monthly_summary(&self, month: MonthRef, rows: &[Reservation]) -> Document {
        let mut total = Cents::ZERO;
        let mut paid = Cents::ZERO;
        for r in rows {
            if let Some(t) = r.total_amount {
                total = total.saturating_add(t);
            }
            paid = paid.saturating_add(r.amount_paid);
        }

        let mut out = String::new();
        out.push_str(&format!("BOOKDESK MONTHLY SUMMARY — {}\n", month.label()));
        out.push_str("=====================================\n\n");
        out.push_str(&format!("Reservations: {}\n", rows.len()));
        out.push_str(&format!("Billed total: ${total}\n"));
        out.push_str(&format!("Collected:    ${paid}\n\n"));

        for r in rows {
            let guest = match (&r.client_name, &r.client_lastname) {
                (Some(f), Some(l)) => format!("{f} {l}"),
                _ => "-".to_string(),
            };
            out.push_str(&format!(
                "{}  {:<12}  {:<24}  {}\n",
                r.check_in.map(display_date).unwrap_or_else(|| "-".repeat(16)),
                r.status.as_str(),
                guest,
                r.total_amount
                    .map(|t| format!("${t}"))
                    .unwrap_or_else(|| "-".to_string()),
            ));
        }

        Document {
            filename: format!("summary-{}.txt", month.label()),
            content_type: "text/plain; charset=utf-8",
            bytes: out.into_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bkd_schemas::{PaymentStatus, ReservationStatus};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn reservation() -> Reservation {
        Reservation {
            id: Uuid::new_v4(),
            apartment_id: None,
            client_id: None,
            check_in: Some(Utc.with_ymd_and_hms(2025, 6, 10, 14, 0, 0).unwrap()),
            check_out: Some(Utc.with_ymd_and_hms(2025, 6, 13, 10, 0, 0).unwrap()),
            nights: Some(3),
            price_per_night: Some(Cents::new(10_000)),
            cleaning_fee: Some(Cents::new(5_000)),
            cancellation_fee: Some(Cents::ZERO),
            other_expenses: Some(Cents::ZERO),
            parking_fee: Some(Cents::ZERO),
            taxes: Some(Cents::new(1_000)),
            total_amount: Some(Cents::new(36_000)),
            amount_paid: Cents::new(20_000),
            amount_due: Some(Cents::new(16_000)),
            payment_status: PaymentStatus::Partial,
            status: ReservationStatus::Confirmed,
            notes: None,
            version: 2,
            created_at: Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap(),
            client_name: Some("Ana".into()),
            client_lastname: Some("Petrova".into()),
            client_email: Some("ana@example.com".into()),
            apartment_address: Some("12 Seaside Ave".into()),
        }
    }

    #[test]
    fn display_date_uses_legacy_presentation_format() {
        let ts = Utc.with_ymd_and_hms(2025, 6, 10, 14, 30, 0).unwrap();
        assert_eq!(display_date(ts), "06-10-2025 14:30");
    }

    #[test]
    fn invoice_contains_totals_and_guest() {
        let doc = TextRenderer::new().render_invoice(&reservation(), &[]);
        let text = String::from_utf8(doc.bytes).unwrap();
        assert!(text.contains("Ana Petrova"));
        assert!(text.contains("$360.00"));
        assert!(text.contains("$160.00"));
        assert!(text.contains("06-10-2025"));
        assert!(doc.filename.starts_with("invoice-"));
    }

    #[test]
    fn summary_sums_billed_and_collected() {
        let rows = vec![reservation(), reservation()];
        let doc = TextRenderer::new().render_monthly_summary(
            MonthRef {
                year: 2025,
                month: 6,
            },
            &rows,
        );
        let text = String::from_utf8(doc.bytes).unwrap();
        assert!(text.contains("Reservations: 2"));
        assert!(text.contains("Billed total: $720.00"));
        assert!(text.contains("Collected:    $400.00"));
        assert_eq!(doc.filename, "summary-2025-06.txt");
    }
}
