//! Heatmap wire types.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::limits::{MAX_HEATMAP_BATCH_CELLS, SCROLL_DEPTH_STEP};

/// Grid cell coordinates. Serialized as `"x,y"` in batch maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellKey {
    pub x: i64,
    pub y: i64,
}

impl CellKey {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Quantizes a pointer position. `y` is relative to the viewport, so the
    /// scroll offset is added to place the cell on the document.
    pub fn from_pointer(x: f64, y: f64, scroll_offset: f64, cell_size: u32) -> Self {
        let cell = f64::from(cell_size.max(1));
        Self {
            x: (x / cell).floor() as i64,
            y: ((y + scroll_offset) / cell).floor() as i64,
        }
    }
}

impl std::fmt::Display for CellKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl FromStr for CellKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| Error::validation(format!("cell key '{}' is not 'x,y'", s)))?;
        let x = x
            .trim()
            .parse()
            .map_err(|_| Error::validation(format!("cell key '{}' has a bad x", s)))?;
        let y = y
            .trim()
            .parse()
            .map_err(|_| Error::validation(format!("cell key '{}' has a bad y", s)))?;
        Ok(Self { x, y })
    }
}

/// One flush from a client collector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapBatch {
    pub path: String,
    /// `"x,y"` → hit count since the previous flush
    #[serde(default)]
    pub grid: HashMap<String, u64>,
    /// Deepest scroll position seen on this page view, 0..=1
    #[serde(default)]
    pub max_scroll: f64,
    /// Time on page since the previous flush
    #[serde(default)]
    pub dwell_ms: u64,
}

impl HeatmapBatch {
    /// Parsed cells. Unparseable keys and zero counts are skipped, and at
    /// most `MAX_HEATMAP_BATCH_CELLS` cells are kept.
    pub fn cells(&self) -> Vec<(CellKey, u64)> {
        let mut cells: Vec<(CellKey, u64)> = self
            .grid
            .iter()
            .filter(|(_, count)| **count > 0)
            .filter_map(|(key, &count)| key.parse::<CellKey>().ok().map(|cell| (cell, count)))
            .collect();
        cells.sort_unstable();
        cells.truncate(MAX_HEATMAP_BATCH_CELLS);
        cells
    }
}

/// Maps a scroll fraction onto its bucket (0, 10, ..., 100).
pub fn scroll_bucket(max_scroll: f64) -> u8 {
    if !max_scroll.is_finite() {
        return 0;
    }
    let percent = (max_scroll.clamp(0.0, 1.0) * 100.0).floor() as u8;
    percent / SCROLL_DEPTH_STEP * SCROLL_DEPTH_STEP
}

/// Accumulated scroll-depth statistics for one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollDepthBucket {
    pub depth_percent: u8,
    pub session_count: u64,
    pub cumulative_dwell_ms: u64,
}

/// One heatmap cell in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPoint {
    pub x: i64,
    pub y: i64,
    pub value: u64,
}

/// One scroll bucket in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollPoint {
    pub depth: u8,
    pub count: u64,
    pub dwell_time: u64,
}

impl From<ScrollDepthBucket> for ScrollPoint {
    fn from(bucket: ScrollDepthBucket) -> Self {
        Self {
            depth: bucket.depth_percent,
            count: bucket.session_count,
            dwell_time: bucket.cumulative_dwell_ms,
        }
    }
}

/// Merged heatmap for one page path. Cells sorted by (x, y), scroll
/// buckets by depth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapSnapshot {
    pub path: String,
    pub total_sessions: u64,
    pub cursor_map: Vec<CursorPoint>,
    pub scroll_map: Vec<ScrollPoint>,
}

impl HeatmapSnapshot {
    pub fn empty(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// Running counters for one path. Merging is plain addition, so the order
/// in which batches arrive does not matter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathHeatmap {
    cells: BTreeMap<CellKey, u64>,
    scroll: BTreeMap<u8, ScrollDepthBucket>,
}

impl PathHeatmap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one batch. Returns the number of cells touched.
    pub fn merge(&mut self, batch: &HeatmapBatch) -> usize {
        let cells = batch.cells();
        for (cell, count) in &cells {
            let hits = self.cells.entry(*cell).or_insert(0);
            *hits = hits.saturating_add(*count);
        }

        let depth = scroll_bucket(batch.max_scroll);
        let bucket = self.scroll.entry(depth).or_insert(ScrollDepthBucket {
            depth_percent: depth,
            ..Default::default()
        });
        bucket.session_count += 1;
        bucket.cumulative_dwell_ms = bucket.cumulative_dwell_ms.saturating_add(batch.dwell_ms);

        cells.len()
    }

    pub fn hit_count(&self, cell: CellKey) -> u64 {
        self.cells.get(&cell).copied().unwrap_or(0)
    }

    pub fn snapshot(&self, path: &str) -> HeatmapSnapshot {
        HeatmapSnapshot {
            path: path.to_string(),
            total_sessions: self.scroll.values().map(|b| b.session_count).sum(),
            cursor_map: self
                .cells
                .iter()
                .map(|(cell, &value)| CursorPoint {
                    x: cell.x,
                    y: cell.y,
                    value,
                })
                .collect(),
            scroll_map: self.scroll.values().copied().map(ScrollPoint::from).collect(),
        }
    }
}
