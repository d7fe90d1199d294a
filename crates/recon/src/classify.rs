use std::collections::{BTreeSet, HashSet};

use rust_decimal::Decimal;

use crate::matcher::{MatchContext, PassTrace};
use crate::model::{Discrepancy, DiscrepancyType, Severity};
use crate::normalize::{amounts_exact, amounts_within_tolerance, comparison_scale, dates_within};
use crate::pool::Pool;

/// Amount deltas above this share of the invoice amount are `High`.
const HIGH_AMOUNT_SHARE: Decimal = Decimal::from_parts(1, 0, 0, false, 1);

/// Explain everything left in the pools after the passes.
///
/// Read-only over the pools. Every rule that fires for a line is emitted;
/// `other` only when nothing more specific applies. Lines are visited in
/// input order, then invoices not already explained by a line discrepancy.
pub fn classify(
    ctx: &MatchContext<'_>,
    lines: &Pool,
    invoices: &Pool,
    trace: &PassTrace,
) -> Vec<Discrepancy> {
    let mut out = Emitter::default();
    let mut explained_invoices: HashSet<usize> = HashSet::new();

    let matched_docs: HashSet<&str> = (0..ctx.lines.len())
        .filter(|&li| !lines.contains(li))
        .map(|li| ctx.line_docs[li].as_str())
        .filter(|doc| !doc.is_empty())
        .collect();
    let all_invoice_docs: HashSet<&str> = ctx.invoice_docs.iter().map(String::as_str).collect();
    let all_invoice_families: HashSet<&str> =
        ctx.invoice_families.iter().map(String::as_str).collect();
    let mut seen_remaining: HashSet<&str> = HashSet::new();

    for li in lines.iter() {
        let line = &ctx.lines[li];
        let doc = ctx.line_docs[li].as_str();

        // An empty doc never matches, so no invoice can be this line's.
        if doc.is_empty() {
            out.push(
                DiscrepancyType::InvoiceNotFound,
                Severity::High,
                Some(li),
                None,
                format!(
                    "no invoice found for statement line '{}': it has no document number",
                    line.id
                ),
                ctx,
            );
            continue;
        }

        let before = out.len();

        // ----- Duplicates -----
        let duplicate_of_matched = matched_docs.contains(doc);
        if duplicate_of_matched || !seen_remaining.insert(doc) {
            let against = if duplicate_of_matched {
                "an already matched line"
            } else {
                "an earlier statement line"
            };
            out.push(
                DiscrepancyType::DuplicateInvoice,
                Severity::Critical,
                Some(li),
                None,
                format!(
                    "statement line '{}' repeats document '{}' of {against}",
                    line.id, line.doc_number
                ),
                ctx,
            );
        }

        // ----- Currency conflicts recorded by the passes -----
        for &(_, ii) in trace.currency_conflicts.range((li, 0)..(li + 1, 0)) {
            let inv = &ctx.invoices[ii];
            explained_invoices.insert(ii);
            out.push(
                DiscrepancyType::CurrencyMismatch,
                Severity::High,
                Some(li),
                Some(ii),
                format!(
                    "statement line '{}' ({} {}) otherwise matches invoice '{}' ({} {})",
                    line.id, line.amount, line.currency, inv.id, inv.total_amount, inv.currency
                ),
                ctx,
            );
        }

        // ----- Amount / date against the same-doc, same-currency invoice -----
        let twin = invoices
            .iter()
            .find(|&ii| ctx.invoice_docs[ii] == doc && ctx.invoices[ii].currency == line.currency);
        if let Some(ii) = twin {
            let inv = &ctx.invoices[ii];
            let config = ctx.config;
            let scale = comparison_scale(&line.currency, &inv.currency);

            if !amounts_exact(line.amount, inv.total_amount, scale)
                && !amounts_within_tolerance(
                    line.amount,
                    inv.total_amount,
                    config.amount_tolerance_abs,
                    config.amount_tolerance_pct,
                )
            {
                let delta = (line.amount - inv.total_amount).abs();
                let severity = if delta > inv.total_amount.abs() * HIGH_AMOUNT_SHARE {
                    Severity::High
                } else {
                    Severity::Medium
                };
                explained_invoices.insert(ii);
                out.push(
                    DiscrepancyType::AmountMismatch,
                    severity,
                    Some(li),
                    Some(ii),
                    format!(
                        "statement line '{}' amount {} differs from invoice '{}' amount {} by {} {}",
                        line.id, line.amount, inv.id, inv.total_amount, delta, line.currency
                    ),
                    ctx,
                );
            }

            if line.date.is_some()
                && inv.invoice_date.is_some()
                && !dates_within(line.date, inv.invoice_date, config.date_tolerance_days)
            {
                explained_invoices.insert(ii);
                out.push(
                    DiscrepancyType::DateMismatch,
                    Severity::Low,
                    Some(li),
                    Some(ii),
                    format!(
                        "statement line '{}' dated {} is more than {} days from invoice '{}' dated {}",
                        line.id,
                        fmt_date(line.date),
                        config.date_tolerance_days,
                        inv.id,
                        fmt_date(inv.invoice_date)
                    ),
                    ctx,
                );
            }
        }

        // ----- No invoice anywhere, not even by family -----
        let family = ctx.line_families[li].as_str();
        if !all_invoice_docs.contains(doc) && !all_invoice_families.contains(family) {
            out.push(
                DiscrepancyType::InvoiceNotFound,
                Severity::High,
                Some(li),
                None,
                format!(
                    "no invoice found for statement line '{}' (document '{}')",
                    line.id, line.doc_number
                ),
                ctx,
            );
        }

        if out.len() == before {
            let (related, reason) = residual_reason(ctx, li, invoices);
            if let Some(ii) = related {
                explained_invoices.insert(ii);
            }
            out.push(
                DiscrepancyType::Other,
                Severity::Low,
                Some(li),
                related,
                format!("statement line '{}' unmatched: {reason}", line.id),
                ctx,
            );
        }
    }

    // ----- Invoices -----
    let all_line_docs: HashSet<&str> = ctx.line_docs.iter().map(String::as_str).collect();
    for ii in invoices.iter() {
        if explained_invoices.contains(&ii) {
            continue;
        }
        let inv = &ctx.invoices[ii];
        let doc = ctx.invoice_docs[ii].as_str();

        if doc.is_empty() || !all_line_docs.contains(doc) {
            out.push(
                DiscrepancyType::MissingSoaItem,
                Severity::Medium,
                None,
                Some(ii),
                format!(
                    "invoice '{}' ({} {}) does not appear on the statement",
                    inv.id, inv.total_amount, inv.currency
                ),
                ctx,
            );
        } else {
            out.push(
                DiscrepancyType::Other,
                Severity::Low,
                None,
                Some(ii),
                format!(
                    "invoice '{}' unmatched: its document number appears on the statement but no line was paired with it",
                    inv.id
                ),
                ctx,
            );
        }
    }

    out.finish()
}

/// Best explanation for a line no specific rule covers.
fn residual_reason(ctx: &MatchContext<'_>, li: usize, invoices: &Pool) -> (Option<usize>, String) {
    let line = &ctx.lines[li];
    let doc = &ctx.line_docs[li];

    if let Some(ii) = invoices.iter().find(|&ii| ctx.invoice_docs[ii] == *doc) {
        let inv = &ctx.invoices[ii];
        return (
            Some(ii),
            format!(
                "invoice '{}' has the same document number but is in {} ({} vs {} {})",
                inv.id, inv.currency, inv.total_amount, line.amount, line.currency
            ),
        );
    }

    let taken: Vec<&str> = (0..ctx.invoices.len())
        .filter(|&ii| !invoices.contains(ii) && ctx.invoice_docs[ii] == *doc)
        .map(|ii| ctx.invoices[ii].id.as_str())
        .collect();
    if !taken.is_empty() {
        return (
            None,
            format!("invoice(s) {} with this document number are already matched", quoted(&taken)),
        );
    }

    let family = &ctx.line_families[li];
    let relatives: BTreeSet<&str> = (0..ctx.invoices.len())
        .filter(|&ii| ctx.invoice_families[ii] == *family)
        .map(|ii| ctx.invoices[ii].id.as_str())
        .collect();
    let relatives: Vec<&str> = relatives.into_iter().collect();
    (
        None,
        format!(
            "no invoice with this document number; related invoice(s) {} share its family '{family}'",
            quoted(&relatives)
        ),
    )
}

fn quoted(ids: &[&str]) -> String {
    ids.iter()
        .map(|id| format!("'{id}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn fmt_date(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_default()
}

/// Accumulates discrepancies and numbers them in emission order.
#[derive(Default)]
struct Emitter {
    out: Vec<Discrepancy>,
}

impl Emitter {
    fn len(&self) -> usize {
        self.out.len()
    }

    fn push(
        &mut self,
        kind: DiscrepancyType,
        severity: Severity,
        line: Option<usize>,
        invoice: Option<usize>,
        description: String,
        ctx: &MatchContext<'_>,
    ) {
        self.out.push(Discrepancy {
            id: format!("D-{:04}", self.out.len() + 1),
            kind,
            severity,
            related_statement_line_id: line.map(|li| ctx.lines[li].id.clone()),
            related_invoice_id: invoice.map(|ii| ctx.invoices[ii].id.clone()),
            description,
        });
    }

    fn finish(self) -> Vec<Discrepancy> {
        self.out
    }
}
