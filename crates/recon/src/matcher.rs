use std::collections::BTreeSet;

use crate::config::MatchConfig;
use crate::model::{CanonicalInvoice, CanonicalStatementLine, MatchPair};
use crate::normalize::{
    amounts_exact, amounts_within_tolerance, comparison_scale, date_offset, dates_within,
    doc_family, normalize_doc_number,
};
use crate::pool::Pool;

// ---------------------------------------------------------------------------
// Passes
// ---------------------------------------------------------------------------

/// The matching cascade, strictest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Pass {
    StrictExact,
    DateTolerance,
    FuzzyDoc,
    AmountTolerance,
    Group,
}

impl Pass {
    pub const ALL: [Pass; 5] = [
        Self::StrictExact,
        Self::DateTolerance,
        Self::FuzzyDoc,
        Self::AmountTolerance,
        Self::Group,
    ];

    pub fn number(&self) -> u8 {
        match self {
            Self::StrictExact => 1,
            Self::DateTolerance => 2,
            Self::FuzzyDoc => 3,
            Self::AmountTolerance => 4,
            Self::Group => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::StrictExact => "strict_exact",
            Self::DateTolerance => "date_tolerance",
            Self::FuzzyDoc => "fuzzy_doc",
            Self::AmountTolerance => "amount_tolerance",
            Self::Group => "group",
        }
    }

    /// Passes that run under `config`, in execution order.
    pub fn enabled(config: &MatchConfig) -> Vec<Pass> {
        Self::ALL
            .into_iter()
            .filter(|p| *p != Self::Group || config.allow_partial)
            .collect()
    }

    fn rule_description(&self, config: &MatchConfig) -> String {
        match self {
            Self::StrictExact => "exact doc+amount+date".into(),
            Self::DateTolerance => format!(
                "exact doc+amount, date within {} days",
                config.date_tolerance_days
            ),
            Self::FuzzyDoc => "normalized doc+exact amount, date ignored".into(),
            Self::AmountTolerance => format!(
                "exact doc, amount within tolerance (abs {}, pct {})",
                config.amount_tolerance_abs, config.amount_tolerance_pct
            ),
            Self::Group => "group sum".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Canonical inputs plus keys derived from them once per run.
pub struct MatchContext<'a> {
    pub lines: &'a [CanonicalStatementLine],
    pub invoices: &'a [CanonicalInvoice],
    pub config: &'a MatchConfig,
    pub line_docs: Vec<String>,
    pub invoice_docs: Vec<String>,
    pub line_families: Vec<String>,
    pub invoice_families: Vec<String>,
}

impl<'a> MatchContext<'a> {
    pub fn new(
        lines: &'a [CanonicalStatementLine],
        invoices: &'a [CanonicalInvoice],
        config: &'a MatchConfig,
    ) -> Self {
        Self {
            lines,
            invoices,
            config,
            line_docs: lines.iter().map(|l| normalize_doc_number(&l.doc_number)).collect(),
            invoice_docs: invoices.iter().map(|i| normalize_doc_number(&i.doc_number)).collect(),
            line_families: lines.iter().map(|l| doc_family(&l.doc_number)).collect(),
            invoice_families: invoices.iter().map(|i| doc_family(&i.doc_number)).collect(),
        }
    }

    pub(crate) fn pair(
        &self,
        line: usize,
        invoice: usize,
        pass: Pass,
        rule_description: String,
        group_id: Option<String>,
        amount_delta: rust_decimal::Decimal,
    ) -> MatchPair {
        let l = &self.lines[line];
        let inv = &self.invoices[invoice];
        MatchPair {
            statement_line_id: l.id.clone(),
            invoice_id: inv.id.clone(),
            pass_number: pass.number(),
            rule_description,
            group_id,
            amount_delta,
            date_offset_days: date_offset(l.date, inv.invoice_date),
        }
    }
}

/// Everything the passes produce besides the shrinking pools.
#[derive(Debug, Default)]
pub struct PassTrace {
    pub matches: Vec<MatchPair>,
    /// (line, invoice) positions that satisfied a pass predicate except for
    /// currency. Never matched; reported as currency mismatches.
    pub currency_conflicts: BTreeSet<(usize, usize)>,
    pub groups_formed: usize,
}

// ---------------------------------------------------------------------------
// Pairwise predicates (passes 1-4)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Match,
    /// Would match if the currencies agreed.
    CurrencyOnly,
    Reject,
}

pub fn evaluate(pass: Pass, ctx: &MatchContext<'_>, line: usize, invoice: usize) -> Verdict {
    let doc = &ctx.line_docs[line];
    if doc.is_empty() || *doc != ctx.invoice_docs[invoice] {
        return Verdict::Reject;
    }

    let l = &ctx.lines[line];
    let inv = &ctx.invoices[invoice];
    let config = ctx.config;
    let exact = || {
        amounts_exact(
            l.amount,
            inv.total_amount,
            comparison_scale(&l.currency, &inv.currency),
        )
    };

    let admitted = match pass {
        Pass::StrictExact => {
            l.date.is_some() && inv.invoice_date.is_some() && l.date == inv.invoice_date && exact()
        }
        Pass::DateTolerance => {
            exact() && dates_within(l.date, inv.invoice_date, config.date_tolerance_days)
        }
        Pass::FuzzyDoc => exact(),
        Pass::AmountTolerance => amounts_within_tolerance(
            l.amount,
            inv.total_amount,
            config.amount_tolerance_abs,
            config.amount_tolerance_pct,
        ),
        Pass::Group => false,
    };

    if !admitted {
        Verdict::Reject
    } else if l.currency != inv.currency {
        Verdict::CurrencyOnly
    } else {
        Verdict::Match
    }
}

/// Run one pairwise pass: each remaining line (input order) claims the
/// first remaining invoice (input order) the pass admits.
pub fn run_pairwise_pass(
    pass: Pass,
    ctx: &MatchContext<'_>,
    lines: &mut Pool,
    invoices: &mut Pool,
    trace: &mut PassTrace,
) {
    debug_assert!(pass != Pass::Group, "group pass is not pairwise");
    let description = pass.rule_description(ctx.config);

    for li in lines.indices() {
        let mut claimed = None;
        for ii in invoices.iter() {
            match evaluate(pass, ctx, li, ii) {
                Verdict::Match => {
                    claimed = Some(ii);
                    break;
                }
                Verdict::CurrencyOnly => {
                    trace.currency_conflicts.insert((li, ii));
                }
                Verdict::Reject => {}
            }
        }

        if let Some(ii) = claimed {
            lines.take(li);
            invoices.take(ii);
            let delta = ctx.lines[li].amount - ctx.invoices[ii].total_amount;
            trace
                .matches
                .push(ctx.pair(li, ii, pass, description.clone(), None, delta));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn line(id: &str, doc: &str, amount: &str, cur: &str, date: Option<&str>) -> CanonicalStatementLine {
        CanonicalStatementLine {
            id: id.into(),
            doc_number: doc.into(),
            amount: Decimal::from_str(amount).unwrap(),
            currency: cur.into(),
            date: date.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()),
        }
    }

    fn inv(id: &str, doc: &str, amount: &str, cur: &str, date: Option<&str>) -> CanonicalInvoice {
        CanonicalInvoice {
            id: id.into(),
            doc_number: doc.into(),
            total_amount: Decimal::from_str(amount).unwrap(),
            currency: cur.into(),
            invoice_date: date.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()),
            vendor_id: None,
            company_id: None,
        }
    }

    fn run_pass(
        pass: Pass,
        lines: &[CanonicalStatementLine],
        invoices: &[CanonicalInvoice],
        config: &MatchConfig,
    ) -> (PassTrace, Pool, Pool) {
        let ctx = MatchContext::new(lines, invoices, config);
        let mut lp = Pool::new(lines.len());
        let mut ip = Pool::new(invoices.len());
        let mut trace = PassTrace::default();
        run_pairwise_pass(pass, &ctx, &mut lp, &mut ip, &mut trace);
        (trace, lp, ip)
    }

    #[test]
    fn enabled_passes_gate_group() {
        let mut config = MatchConfig::default();
        assert_eq!(Pass::enabled(&config).len(), 4);
        assert!(!Pass::enabled(&config).contains(&Pass::Group));
        config.allow_partial = true;
        assert_eq!(Pass::enabled(&config), Pass::ALL.to_vec());
    }

    #[test]
    fn strict_exact_requires_dates() {
        let config = MatchConfig::default();
        let lines = [line("l1", "INV-001", "1000.00", "USD", None)];
        let invoices = [inv("i1", "INV-001", "1000.00", "USD", Some("2025-01-01"))];
        let ctx = MatchContext::new(&lines, &invoices, &config);
        assert_eq!(evaluate(Pass::StrictExact, &ctx, 0, 0), Verdict::Reject);
        assert_eq!(evaluate(Pass::DateTolerance, &ctx, 0, 0), Verdict::Reject);
        assert_eq!(evaluate(Pass::FuzzyDoc, &ctx, 0, 0), Verdict::Match);
    }

    #[test]
    fn date_tolerance_window() {
        let config = MatchConfig::default();
        let lines = [
            line("l1", "INV-002", "10", "USD", Some("2025-01-08")),
            line("l2", "INV-002", "10", "USD", Some("2025-01-10")),
        ];
        let invoices = [inv("i1", "INV-002", "10", "USD", Some("2025-01-01"))];
        let ctx = MatchContext::new(&lines, &invoices, &config);
        assert_eq!(evaluate(Pass::DateTolerance, &ctx, 0, 0), Verdict::Match);
        assert_eq!(evaluate(Pass::DateTolerance, &ctx, 1, 0), Verdict::Reject);
    }

    #[test]
    fn empty_doc_never_matches() {
        let config = MatchConfig::default();
        let lines = [line("l1", "", "10", "USD", Some("2025-01-01"))];
        let invoices = [inv("i1", "", "10", "USD", Some("2025-01-01"))];
        let ctx = MatchContext::new(&lines, &invoices, &config);
        for pass in [Pass::StrictExact, Pass::DateTolerance, Pass::FuzzyDoc, Pass::AmountTolerance] {
            assert_eq!(evaluate(pass, &ctx, 0, 0), Verdict::Reject);
        }
    }

    #[test]
    fn amount_tolerance_admits_small_delta() {
        let config = MatchConfig::default();
        let lines = [line("l1", "INV-9", "1000.80", "USD", None)];
        let invoices = [inv("i1", "inv9", "1000.00", "USD", None)];
        let ctx = MatchContext::new(&lines, &invoices, &config);
        assert_eq!(evaluate(Pass::FuzzyDoc, &ctx, 0, 0), Verdict::Reject);
        assert_eq!(evaluate(Pass::AmountTolerance, &ctx, 0, 0), Verdict::Match);
    }

    #[test]
    fn first_invoice_in_input_order_wins() {
        let config = MatchConfig::default();
        let lines = [line("l1", "INV-5", "50", "USD", None)];
        let invoices = [
            inv("i1", "INV-4", "50", "USD", None),
            inv("i2", "INV-5", "50", "USD", None),
            inv("i3", "INV-005", "50", "USD", None),
        ];
        let (trace, lp, ip) = run_pass(Pass::FuzzyDoc, &lines, &invoices, &config);
        assert_eq!(trace.matches.len(), 1);
        assert_eq!(trace.matches[0].invoice_id, "i2");
        assert_eq!(trace.matches[0].pass_number, 3);
        assert!(lp.is_empty());
        assert_eq!(ip.indices(), vec![0, 2]);
    }

    #[test]
    fn matched_invoice_is_consumed() {
        let config = MatchConfig::default();
        let lines = [
            line("l1", "INV-7", "70", "USD", None),
            line("l2", "INV-7", "70", "USD", None),
        ];
        let invoices = [inv("i1", "INV-7", "70", "USD", None)];
        let (trace, lp, ip) = run_pass(Pass::FuzzyDoc, &lines, &invoices, &config);
        assert_eq!(trace.matches.len(), 1);
        assert_eq!(trace.matches[0].statement_line_id, "l1");
        assert_eq!(lp.indices(), vec![1]);
        assert!(ip.is_empty());
    }

    #[test]
    fn currency_conflict_recorded_not_matched() {
        let config = MatchConfig::default();
        let lines = [line("l1", "INV-8", "80", "USD", None)];
        let invoices = [inv("i1", "INV-8", "80", "EUR", None)];
        let (trace, lp, ip) = run_pass(Pass::FuzzyDoc, &lines, &invoices, &config);
        assert!(trace.matches.is_empty());
        assert!(trace.currency_conflicts.contains(&(0, 0)));
        assert_eq!(lp.len(), 1);
        assert_eq!(ip.len(), 1);
    }

    #[test]
    fn pair_carries_delta_and_offset() {
        let config = MatchConfig::default();
        let lines = [line("l1", "INV-3", "100.50", "USD", Some("2025-02-03"))];
        let invoices = [inv("i1", "INV-3", "100.00", "USD", Some("2025-02-01"))];
        let (trace, _, _) = run_pass(Pass::AmountTolerance, &lines, &invoices, &config);
        let pair = &trace.matches[0];
        assert_eq!(pair.amount_delta, Decimal::from_str("0.50").unwrap());
        assert_eq!(pair.date_offset_days, Some(2));
        assert!(pair.group_id.is_none());
    }
}
