use crate::builder::{build_result, partition_holds};
use crate::canonical::{canonicalize_invoices, canonicalize_statement_lines};
use crate::classify::classify;
use crate::config::MatchConfig;
use crate::error::ReconError;
use crate::group::run_group_pass;
use crate::matcher::{run_pairwise_pass, MatchContext, Pass, PassTrace};
use crate::model::{
    CanonicalInvoice, CanonicalStatementLine, RawRecord, ReconciliationResult, ReconciliationRun,
};
use crate::pool::Pool;

/// Reconcile raw statement lines against raw invoice candidates.
///
/// Validates the config and canonicalizes both batches before any pass
/// runs; a malformed record aborts the whole run.
pub fn run_reconciliation(
    statement_lines: &[RawRecord],
    invoice_candidates: &[RawRecord],
    config: &MatchConfig,
) -> Result<ReconciliationResult, ReconError> {
    Ok(ReconciliationRun::execute(statement_lines, invoice_candidates, config)?.result)
}

impl ReconciliationRun {
    /// Like [`run_reconciliation`], but keeps the canonical inputs and config
    /// alongside the result.
    pub fn execute(
        statement_lines: &[RawRecord],
        invoice_candidates: &[RawRecord],
        config: &MatchConfig,
    ) -> Result<Self, ReconError> {
        config.validate()?;
        let lines = canonicalize_statement_lines(statement_lines)?;
        let invoices = canonicalize_invoices(invoice_candidates)?;
        let result = reconcile(&lines, &invoices, config);

        Ok(Self {
            statement_lines: lines,
            invoice_candidates: invoices,
            config: config.clone(),
            result,
        })
    }
}

/// Run the pass cascade, classifier and builder over canonical records.
///
/// Callers go through [`ReconciliationRun::execute`], which has already
/// validated the config and rejected duplicate ids.
pub(crate) fn reconcile(
    lines: &[CanonicalStatementLine],
    invoices: &[CanonicalInvoice],
    config: &MatchConfig,
) -> ReconciliationResult {
    let ctx = MatchContext::new(lines, invoices, config);
    let mut line_pool = Pool::new(lines.len());
    let mut invoice_pool = Pool::new(invoices.len());
    let mut trace = PassTrace::default();

    for pass in Pass::enabled(config) {
        let before = trace.matches.len();
        match pass {
            Pass::Group => run_group_pass(&ctx, &mut line_pool, &mut invoice_pool, &mut trace),
            _ => run_pairwise_pass(pass, &ctx, &mut line_pool, &mut invoice_pool, &mut trace),
        }
        tracing::debug!(
            "pass {} ({}): {} pairs, {} lines / {} invoices remaining",
            pass.number(),
            pass.name(),
            trace.matches.len() - before,
            line_pool.len(),
            invoice_pool.len()
        );
    }

    let discrepancies = classify(&ctx, &line_pool, &invoice_pool, &trace);
    let result = build_result(&ctx, &line_pool, &invoice_pool, trace, discrepancies);
    debug_assert!(partition_holds(&result, lines, invoices));

    tracing::info!(
        "reconciled {} lines against {} invoices: {} pairs, {} discrepancies",
        lines.len(),
        invoices.len(),
        result.matches.len(),
        result.discrepancies.len()
    );
    result
}

/// Parse a JSON array of objects into raw records.
pub fn load_json_records(json: &str) -> Result<Vec<RawRecord>, ReconError> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| ReconError::Load(format!("invalid JSON: {e}")))?;
    let serde_json::Value::Array(items) = value else {
        return Err(ReconError::Load("expected a JSON array of records".into()));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(ReconError::Load(format!("record #{i} is not a JSON object"))),
        })
        .collect()
}

/// Read headed CSV into raw records, one per row. All values are strings;
/// empty cells are left out so they read as absent.
pub fn load_csv_records(csv_data: &str) -> Result<Vec<RawRecord>, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ReconError::Load(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| ReconError::Load(e.to_string()))?;
        let mut record = RawRecord::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            if !cell.is_empty() {
                record.insert(header.clone(), serde_json::Value::String(cell.to_string()));
            }
        }
        records.push(record);
    }

    Ok(records)
}
