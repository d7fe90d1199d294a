//! Pass 5: one record on one side equals the sum of a small group on the
//! other side, within amount tolerance.
//!
//! Candidates must share the target's doc-number family and currency and
//! carry the same sign. Group sizes are tried smallest first (2 up to
//! `MAX_GROUP_SIZE`); the first size with any admissible subset wins, then
//! the smallest delta, then the lexicographically first index set. A search
//! that exhausts `MAX_SEARCH_NODES` is abandoned without a match.

use rust_decimal::Decimal;

use crate::config::{MatchConfig, MAX_GROUP_SIZE, MAX_SEARCH_NODES};
use crate::matcher::{MatchContext, Pass, PassTrace};
use crate::normalize::amounts_within_tolerance;
use crate::pool::Pool;

pub fn run_group_pass(
    ctx: &MatchContext<'_>,
    lines: &mut Pool,
    invoices: &mut Pool,
    trace: &mut PassTrace,
) {
    // ----- One line = sum of several invoices -----
    for li in lines.indices() {
        let line = &ctx.lines[li];
        let family = &ctx.line_families[li];
        if family.is_empty() || line.amount.is_zero() {
            continue;
        }

        let candidates: Vec<usize> = invoices
            .iter()
            .filter(|&ii| {
                let inv = &ctx.invoices[ii];
                ctx.invoice_families[ii] == *family
                    && inv.currency == line.currency
                    && same_sign(inv.total_amount, line.amount)
            })
            .collect();
        if candidates.len() < 2 {
            continue;
        }

        let amounts: Vec<Decimal> = candidates.iter().map(|&ii| ctx.invoices[ii].total_amount).collect();
        let search = subset_sum_search(&amounts, line.amount, ctx.config);
        if search.cap_hit {
            tracing::warn!(
                "pass 5: search for statement line '{}' hit the {} node cap; left unmatched",
                line.id,
                MAX_SEARCH_NODES
            );
            continue;
        }
        let Some(best) = search.best else { continue };

        let chosen: Vec<usize> = best.iter().map(|&k| candidates[k]).collect();
        let group_sum: Decimal = chosen.iter().map(|&ii| ctx.invoices[ii].total_amount).sum();
        let delta = line.amount - group_sum;
        let group_id = next_group_id(trace);
        let description = format!("group sum: 1 statement line = {} invoices", chosen.len());

        lines.take(li);
        for &ii in &chosen {
            invoices.take(ii);
            trace.matches.push(ctx.pair(
                li,
                ii,
                Pass::Group,
                description.clone(),
                Some(group_id.clone()),
                delta,
            ));
        }
        tracing::debug!(
            "pass 5: {group_id} statement line '{}' = {} invoices (delta {delta}, {} nodes)",
            line.id,
            chosen.len(),
            search.nodes_visited
        );
    }

    // ----- One invoice = sum of several lines -----
    for ii in invoices.indices() {
        let inv = &ctx.invoices[ii];
        let family = &ctx.invoice_families[ii];
        if family.is_empty() || inv.total_amount.is_zero() {
            continue;
        }

        let candidates: Vec<usize> = lines
            .iter()
            .filter(|&li| {
                let line = &ctx.lines[li];
                ctx.line_families[li] == *family
                    && line.currency == inv.currency
                    && same_sign(line.amount, inv.total_amount)
            })
            .collect();
        if candidates.len() < 2 {
            continue;
        }

        let amounts: Vec<Decimal> = candidates.iter().map(|&li| ctx.lines[li].amount).collect();
        let search = subset_sum_search(&amounts, inv.total_amount, ctx.config);
        if search.cap_hit {
            tracing::warn!(
                "pass 5: search for invoice '{}' hit the {} node cap; left unmatched",
                inv.id,
                MAX_SEARCH_NODES
            );
            continue;
        }
        let Some(best) = search.best else { continue };

        let chosen: Vec<usize> = best.iter().map(|&k| candidates[k]).collect();
        let group_sum: Decimal = chosen.iter().map(|&li| ctx.lines[li].amount).sum();
        let delta = group_sum - inv.total_amount;
        let group_id = next_group_id(trace);
        let description = format!("group sum: {} statement lines = 1 invoice", chosen.len());

        invoices.take(ii);
        for &li in &chosen {
            lines.take(li);
            trace.matches.push(ctx.pair(
                li,
                ii,
                Pass::Group,
                description.clone(),
                Some(group_id.clone()),
                delta,
            ));
        }
        tracing::debug!(
            "pass 5: {group_id} invoice '{}' = {} statement lines (delta {delta}, {} nodes)",
            inv.id,
            chosen.len(),
            search.nodes_visited
        );
    }
}

fn next_group_id(trace: &mut PassTrace) -> String {
    trace.groups_formed += 1;
    format!("G-{:03}", trace.groups_formed)
}

fn same_sign(a: Decimal, b: Decimal) -> bool {
    !a.is_zero() && !b.is_zero() && a.is_sign_negative() == b.is_sign_negative()
}

// ---------------------------------------------------------------------------
// Bounded subset-sum search
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SearchResult {
    /// Positions into the candidate slice, ascending.
    pub best: Option<Vec<usize>>,
    pub nodes_visited: u64,
    pub nodes_pruned: u64,
    pub cap_hit: bool,
}

struct Search<'a> {
    amounts: &'a [Decimal],
    target: Decimal,
    config: &'a MatchConfig,
    /// Magnitude beyond which no extension can come back within tolerance.
    ceiling: Decimal,
    size: usize,
    best: Option<(Decimal, Vec<usize>)>,
    nodes_visited: u64,
    nodes_pruned: u64,
    cap_hit: bool,
}

impl Search<'_> {
    fn dfs(&mut self, start: usize, sum: Decimal, stack: &mut Vec<usize>) {
        self.nodes_visited += 1;
        if self.nodes_visited > MAX_SEARCH_NODES {
            self.cap_hit = true;
            return;
        }

        if stack.len() == self.size {
            if amounts_within_tolerance(
                sum,
                self.target,
                self.config.amount_tolerance_abs,
                self.config.amount_tolerance_pct,
            ) {
                let delta = (sum - self.target).abs();
                let better = match &self.best {
                    Some((best_delta, _)) => delta < *best_delta,
                    None => true,
                };
                if better {
                    self.best = Some((delta, stack.clone()));
                }
            }
            return;
        }

        for i in start..self.amounts.len() {
            if stack.len() + (self.amounts.len() - i) < self.size {
                break;
            }
            let Some(next) = sum.checked_add(self.amounts[i]) else {
                self.nodes_pruned += 1;
                continue;
            };
            if next.abs() > self.ceiling {
                self.nodes_pruned += 1;
                continue;
            }
            stack.push(i);
            self.dfs(i + 1, next, stack);
            stack.pop();
            if self.cap_hit {
                return;
            }
        }
    }
}

/// Smallest group (size >= 2) of `amounts` whose sum is within tolerance of
/// `target`. All amounts are expected to share the target's sign.
pub fn subset_sum_search(amounts: &[Decimal], target: Decimal, config: &MatchConfig) -> SearchResult {
    let slack = config
        .amount_tolerance_abs
        .max(config.amount_tolerance_pct * target.abs());
    let mut search = Search {
        amounts,
        target,
        config,
        ceiling: target.abs().saturating_add(slack),
        size: 2,
        best: None,
        nodes_visited: 0,
        nodes_pruned: 0,
        cap_hit: false,
    };

    let max_size = MAX_GROUP_SIZE.min(amounts.len());
    for size in 2..=max_size {
        search.size = size;
        let mut stack = Vec::with_capacity(size);
        search.dfs(0, Decimal::ZERO, &mut stack);
        if search.cap_hit || search.best.is_some() {
            break;
        }
    }

    SearchResult {
        best: if search.cap_hit {
            None
        } else {
            search.best.map(|(_, indices)| indices)
        },
        nodes_visited: search.nodes_visited,
        nodes_pruned: search.nodes_pruned,
        cap_hit: search.cap_hit,
    }
}
