use std::collections::BTreeSet;

use crate::evidence::compute_summary;
use crate::matcher::{MatchContext, PassTrace};
use crate::model::{CanonicalInvoice, CanonicalStatementLine, Discrepancy, ReconciliationResult};
use crate::pool::Pool;

/// Assemble the result from the final pool state.
///
/// Unmatched records are reported in input order, straight from the pools.
pub fn build_result(
    ctx: &MatchContext<'_>,
    lines: &Pool,
    invoices: &Pool,
    trace: PassTrace,
    discrepancies: Vec<Discrepancy>,
) -> ReconciliationResult {
    let unmatched_lines: Vec<CanonicalStatementLine> =
        lines.iter().map(|li| ctx.lines[li].clone()).collect();
    let unmatched_invoices: Vec<CanonicalInvoice> =
        invoices.iter().map(|ii| ctx.invoices[ii].clone()).collect();

    let summary = compute_summary(
        ctx.lines.len(),
        ctx.invoices.len(),
        &trace.matches,
        &discrepancies,
    );

    ReconciliationResult {
        matches: trace.matches,
        unmatched_lines,
        unmatched_invoices,
        discrepancies,
        summary,
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Every input record is either matched or unmatched, never both, never neither.
pub fn partition_holds(
    result: &ReconciliationResult,
    lines: &[CanonicalStatementLine],
    invoices: &[CanonicalInvoice],
) -> bool {
    let matched_lines: BTreeSet<&str> = result.matches.iter().map(|m| m.statement_line_id.as_str()).collect();
    let matched_invoices: BTreeSet<&str> = result.matches.iter().map(|m| m.invoice_id.as_str()).collect();

    let lines_ok = is_exact_partition(
        lines.iter().map(|l| l.id.as_str()),
        &matched_lines,
        result.unmatched_lines.iter().map(|l| l.id.as_str()),
    );
    let invoices_ok = is_exact_partition(
        invoices.iter().map(|i| i.id.as_str()),
        &matched_invoices,
        result.unmatched_invoices.iter().map(|i| i.id.as_str()),
    );
    lines_ok && invoices_ok
}

fn is_exact_partition<'a>(
    all: impl Iterator<Item = &'a str>,
    matched: &BTreeSet<&'a str>,
    unmatched: impl Iterator<Item = &'a str>,
) -> bool {
    let all: BTreeSet<&str> = all.collect();
    let mut unmatched_set = BTreeSet::new();
    for id in unmatched {
        if matched.contains(id) || !unmatched_set.insert(id) {
            return false;
        }
    }
    let union: BTreeSet<&str> = matched.union(&unmatched_set).copied().collect();
    union == all
}
