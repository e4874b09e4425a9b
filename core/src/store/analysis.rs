use super::{now_rfc3339, AnalysisStore};
use crate::{error::TwinResult, pipeline::AnalysisReport};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredAnalysis {
    pub entry_id: String,
    pub call_id: String,
    pub recorded_at: String,
    pub report: AnalysisReport,
}

/// Supervisor dashboard numbers across every stored analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AggregatedStats {
    pub total_calls: i64,
    pub flagged_calls: i64,
    /// Issue name -> number of findings.
    pub issue_counts: BTreeMap<String, i64>,
    /// Mean wait reduction of the best option, over every analysis.
    pub avg_wait_reduction_pct: f64,
}

impl AggregatedStats {
    pub fn flagged_share_pct(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.flagged_calls as f64 / self.total_calls as f64 * 100.0
        }
    }
}

fn stored_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

impl AnalysisStore {
    // ── Analysis log ───────────────────────────────────────────────

    /// Append one report and its findings. Returns the new entry id.
    pub fn append_analysis(&self, report: &AnalysisReport) -> TwinResult<String> {
        let entry_id = uuid::Uuid::new_v4().to_string();
        let top_issue = report.qa.top_finding().map(|f| f.issue.as_str());
        let wait_reduction_pct = report
            .comparison
            .best_improvement()
            .map_or(0.0, |i| i.wait_reduction_pct);

        // The log row and its findings land together or not at all.
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO analysis_log (
                entry_id, call_id, recorded_at, decision_type, matched_rule,
                issue_detected, top_issue, best_option, best_is_actual,
                wait_reduction_pct, report_json
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                &entry_id,
                &report.call_id,
                now_rfc3339(),
                report.decision.decision_type.as_str(),
                &report.decision.matched_rule,
                if report.flagged() { 1i32 } else { 0i32 },
                top_issue,
                &report.comparison.best_outcome().option,
                if report.comparison.best_is_actual() { 1i32 } else { 0i32 },
                wait_reduction_pct,
                serde_json::to_string(report)?,
            ],
        )?;

        for finding in &report.qa.findings {
            tx.execute(
                "INSERT INTO qa_finding (entry_id, issue, confidence, reason)
                 VALUES (?1, ?2, ?3, ?4)",
                params![&entry_id, finding.issue.as_str(), finding.confidence, &finding.reason],
            )?;
        }
        tx.commit()?;

        log::debug!("store: analysis {entry_id} for call {}", report.call_id);
        Ok(entry_id)
    }

    /// Every analysis of one call, oldest first.
    pub fn analyses_for_call(&self, call_id: &str) -> TwinResult<Vec<StoredAnalysis>> {
        let mut stmt = self.conn.prepare(
            "SELECT entry_id, call_id, recorded_at, report_json
             FROM analysis_log WHERE call_id = ?1
             ORDER BY rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![call_id], stored_row_mapper)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(entry_id, call_id, recorded_at, json)| -> TwinResult<StoredAnalysis> {
                Ok(StoredAnalysis {
                    entry_id,
                    call_id,
                    recorded_at,
                    report: serde_json::from_str(&json)?,
                })
            })
            .collect()
    }

    /// Distinct ids of calls with at least one flagged analysis.
    pub fn flagged_calls(&self) -> TwinResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT call_id FROM analysis_log
             WHERE issue_detected = 1
             ORDER BY call_id ASC",
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    pub fn aggregated_stats(&self) -> TwinResult<AggregatedStats> {
        let (total_calls, flagged_calls, avg_wait_reduction_pct) = self.conn.query_row(
            "SELECT
                COUNT(DISTINCT call_id),
                COUNT(DISTINCT CASE WHEN issue_detected = 1 THEN call_id END),
                COALESCE(AVG(wait_reduction_pct), 0.0)
             FROM analysis_log",
            [],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, f64>(2)?)),
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT issue, COUNT(*) FROM qa_finding GROUP BY issue ORDER BY issue",
        )?;
        let issue_counts = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(AggregatedStats {
            total_calls,
            flagged_calls,
            issue_counts,
            avg_wait_reduction_pct,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::TwinConfig, pipeline::Pipeline, station::StationRegistry, transcript::Transcript,
    };
    use std::sync::Arc;

    fn flagged_report() -> AnalysisReport {
        let config = TwinConfig::default_test();
        let registry = StationRegistry::new(config.stations).unwrap();
        let pipeline = Pipeline::with_rules(Arc::new(registry), config.rules);
        let transcript = Transcript::parse(
            "Driver: I need a swap.
             Agent: Please go to Station A.",
        );
        let report = pipeline.analyze(&transcript, "call-tx", None).unwrap();
        assert!(!report.qa.findings.is_empty());
        report
    }

    #[test]
    fn failed_finding_insert_leaves_no_log_row() {
        let store = AnalysisStore::in_memory().unwrap();
        store.migrate().unwrap();
        store.conn.execute_batch("DROP TABLE qa_finding;").unwrap();

        assert!(store.append_analysis(&flagged_report()).is_err());

        let rows: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM analysis_log", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 0);
    }
}
