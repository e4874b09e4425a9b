use super::{now_rfc3339, AnalysisStore};
use crate::{error::TwinResult, intervention::Intervention, snapshot::NetworkSimulationResult};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

/// Headline numbers of a saved network run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkRunRecord {
    pub run_id: String,
    pub recorded_at: String,
    pub seed: u64,
    pub total_swaps: u64,
    pub total_lost_swaps: u64,
    pub avg_wait_minutes: f64,
    pub interventions: Vec<Intervention>,
}

impl AnalysisStore {
    // ── Network runs ───────────────────────────────────────────────

    pub fn save_network_run(
        &self,
        result: &NetworkSimulationResult,
        interventions: &[Intervention],
    ) -> TwinResult<()> {
        self.conn.execute(
            "INSERT INTO network_run (
                run_id, recorded_at, seed, total_swaps, total_lost_swaps,
                avg_wait_minutes, interventions_json, result_json
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &result.run_id,
                now_rfc3339(),
                result.seed as i64,
                result.total_swaps as i64,
                result.total_lost_swaps as i64,
                result.avg_wait_minutes,
                serde_json::to_string(interventions)?,
                serde_json::to_string(result)?,
            ],
        )?;
        Ok(())
    }

    pub fn network_run_count(&self) -> TwinResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM network_run", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn network_run(&self, run_id: &str) -> TwinResult<Option<NetworkRunRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT run_id, recorded_at, seed, total_swaps, total_lost_swaps,
                        avg_wait_minutes, interventions_json
                 FROM network_run WHERE run_id = ?1",
                params![run_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, f64>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((run_id, recorded_at, seed, swaps, lost, wait, interventions_json)) = row else {
            return Ok(None);
        };
        Ok(Some(NetworkRunRecord {
            run_id,
            recorded_at,
            seed: seed as u64,
            total_swaps: swaps as u64,
            total_lost_swaps: lost as u64,
            avg_wait_minutes: wait,
            interventions: serde_json::from_str(&interventions_json)?,
        }))
    }
}
