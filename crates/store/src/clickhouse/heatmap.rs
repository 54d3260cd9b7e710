//! Heatmap store on ClickHouse.
//!
//! Each batch is written as delta rows; SummingMergeTree folds them
//! together in the background and reads sum over whatever is unmerged.

use ::clickhouse::Row;
use async_trait::async_trait;
use engine_core::{
    scroll_bucket, CursorPoint, HeatmapBatch, HeatmapSnapshot, Result, ScrollPoint,
};
use serde::{Deserialize, Serialize};

use super::client::ClickHouseClient;
use super::store_error;
use crate::HeatmapStore;

#[derive(Debug, Clone, Row, Serialize)]
struct CellDeltaRow {
    path: String,
    x: i64,
    y: i64,
    hits: u64,
}

#[derive(Debug, Clone, Row, Serialize)]
struct ScrollDeltaRow {
    path: String,
    depth: u8,
    sessions: u64,
    dwell_ms: u64,
}

#[derive(Debug, Clone, Row, Deserialize)]
struct CellTotalRow {
    x: i64,
    y: i64,
    hits: u64,
}

#[derive(Debug, Clone, Row, Deserialize)]
struct ScrollTotalRow {
    depth: u8,
    sessions: u64,
    dwell_ms: u64,
}

/// `HeatmapStore` over the `heatmap_cells` and `heatmap_scroll` tables.
#[derive(Clone)]
pub struct ClickHouseHeatmapStore {
    client: ClickHouseClient,
}

impl ClickHouseHeatmapStore {
    pub fn new(client: ClickHouseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HeatmapStore for ClickHouseHeatmapStore {
    async fn merge_batch(&self, batch: &HeatmapBatch) -> Result<usize> {
        let cells = batch.cells();

        if !cells.is_empty() {
            let mut insert = self
                .client
                .inner()
                .insert("heatmap_cells")
                .map_err(store_error("insert heatmap cells"))?;
            for (cell, hits) in &cells {
                let row = CellDeltaRow {
                    path: batch.path.clone(),
                    x: cell.x,
                    y: cell.y,
                    hits: *hits,
                };
                insert
                    .write(&row)
                    .await
                    .map_err(store_error("insert heatmap cells"))?;
            }
            insert.end().await.map_err(store_error("insert heatmap cells"))?;
        }

        let mut insert = self
            .client
            .inner()
            .insert("heatmap_scroll")
            .map_err(store_error("insert scroll depth"))?;
        insert
            .write(&ScrollDeltaRow {
                path: batch.path.clone(),
                depth: scroll_bucket(batch.max_scroll),
                sessions: 1,
                dwell_ms: batch.dwell_ms,
            })
            .await
            .map_err(store_error("insert scroll depth"))?;
        insert.end().await.map_err(store_error("insert scroll depth"))?;

        Ok(cells.len())
    }

    async fn snapshot(&self, path: &str) -> Result<HeatmapSnapshot> {
        let cells: Vec<CellTotalRow> = self
            .client
            .inner()
            .query(
                "SELECT x, y, sum(hits) AS hits FROM heatmap_cells \
                 WHERE path = ? GROUP BY x, y ORDER BY x, y",
            )
            .bind(path)
            .fetch_all()
            .await
            .map_err(store_error("select heatmap cells"))?;

        let scroll: Vec<ScrollTotalRow> = self
            .client
            .inner()
            .query(
                "SELECT depth, sum(sessions) AS sessions, sum(dwell_ms) AS dwell_ms \
                 FROM heatmap_scroll WHERE path = ? GROUP BY depth ORDER BY depth",
            )
            .bind(path)
            .fetch_all()
            .await
            .map_err(store_error("select scroll depth"))?;

        Ok(HeatmapSnapshot {
            path: path.to_string(),
            total_sessions: scroll.iter().map(|s| s.sessions).sum(),
            cursor_map: cells
                .into_iter()
                .map(|c| CursorPoint {
                    x: c.x,
                    y: c.y,
                    value: c.hits,
                })
                .collect(),
            scroll_map: scroll
                .into_iter()
                .map(|s| ScrollPoint {
                    depth: s.depth,
                    count: s.sessions,
                    dwell_time: s.dwell_ms,
                })
                .collect(),
        })
    }
}
