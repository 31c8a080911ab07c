//! Streaming collection of decoded samples across the source tables.
//!
//! The collector scans tables in catalog order and rows in storage order,
//! decoding blobs as it goes. Reaching the result cap stops the scan on the
//! spot, so a capped result is an arbitrary cap-sized subset in scan order,
//! not the cap most recent samples overall. Both exit paths return the
//! accumulated set sorted by timestamp descending.

use crate::error::ServiceError;
use crate::metrics::{self, Sample};
use crate::storage::{self, SOURCE_TABLES};
use log::debug;
use rusqlite::Connection;
use std::ops::ControlFlow;

/// Inputs for one collection pass. Bounds are inclusive; absent means
/// unbounded. Package and uid filter by exact string match.
#[derive(Debug, Clone, Default)]
pub struct SampleQuery {
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
    pub limit: usize,
    pub package_name: Option<String>,
    pub uid: Option<String>,
}

impl SampleQuery {
    /// Structural precondition check, done before any scan work.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if let (Some(start_ms), Some(end_ms)) = (self.start_ms, self.end_ms) {
            if start_ms > end_ms {
                return Err(ServiceError::InvalidRange { start_ms, end_ms });
            }
        }
        Ok(())
    }

    /// Cheap pre-decode row filter.
    fn row_matches(&self, package_name: &str, uid: &str) -> bool {
        if let Some(want) = &self.package_name {
            if package_name != want {
                return false;
            }
        }
        if let Some(want) = &self.uid {
            if uid != want {
                return false;
            }
        }
        true
    }

    fn in_range(&self, ts: i64) -> bool {
        self.start_ms.map_or(true, |s| ts >= s) && self.end_ms.map_or(true, |e| ts <= e)
    }
}

/// Accumulator with an explicit cap. `try_add` reports `Break` the moment
/// the cap is reached so callers stop scanning immediately.
pub struct BoundedCollector {
    cap: usize,
    samples: Vec<Sample>,
}

impl BoundedCollector {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            samples: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.cap
    }

    pub fn try_add(&mut self, sample: Sample) -> ControlFlow<()> {
        if self.samples.len() < self.cap {
            self.samples.push(sample);
        }
        if self.samples.len() >= self.cap {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    /// Finish the pass: newest first.
    pub fn into_sorted(mut self) -> Vec<Sample> {
        self.samples.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        self.samples
    }
}

/// Run one collection pass over the active database. Absent source tables
/// are skipped; zero matches is a valid empty result here, not an error.
pub fn collect(conn: &Connection, query: &SampleQuery) -> Result<Vec<Sample>, ServiceError> {
    query.validate()?;

    let mut acc = BoundedCollector::new(query.limit);
    for table in SOURCE_TABLES {
        if acc.is_full() {
            break;
        }
        if !storage::table_exists(conn, table)? {
            debug!("source table {} absent, skipping", table);
            continue;
        }
        let flow = storage::scan_rows(conn, table, |row| {
            if !query.row_matches(&row.package_name, &row.uid) {
                return ControlFlow::Continue(());
            }
            for sample in metrics::decode_blob(&row.metrics_blob, &row.package_name, &row.uid) {
                if !query.in_range(sample.timestamp) {
                    continue;
                }
                if acc.try_add(sample).is_break() {
                    return ControlFlow::Break(());
                }
            }
            ControlFlow::Continue(())
        })?;
        if flow.is_break() {
            debug!("result cap {} reached in table {}, stopping scan", query.limit, table);
            break;
        }
    }
    Ok(acc.into_sorted())
}
