//! Hourly series and their timestamp-aligned tables.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A single hourly reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Named series of observations, ascending by timestamp with no duplicates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    name: String,
    points: Vec<Observation>,
}

impl TimeSeries {
    /// Build a series from unordered pairs. Later duplicates replace earlier ones.
    pub fn new(
        name: impl Into<String>,
        points: impl IntoIterator<Item = (DateTime<Utc>, f64)>,
    ) -> Self {
        let by_time: BTreeMap<DateTime<Utc>, f64> = points.into_iter().collect();
        Self {
            name: name.into(),
            points: by_time
                .into_iter()
                .map(|(timestamp, value)| Observation { timestamp, value })
                .collect(),
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Observation] {
        &self.points
    }

    pub fn timestamps(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.points.iter().map(|p| p.timestamp)
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.value)
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.points.first().map(|p| p.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|p| p.timestamp)
    }

    /// Value at an exact timestamp
    pub fn get(&self, timestamp: DateTime<Utc>) -> Option<f64> {
        self.points
            .binary_search_by_key(&timestamp, |p| p.timestamp)
            .ok()
            .map(|i| self.points[i].value)
    }
}

/// Table keyed by unique ascending timestamps with one value column per metric.
///
/// Every row carries a value in every column; rows are never imputed.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AlignedTable {
    timestamps: Vec<DateTime<Utc>>,
    columns: IndexMap<String, Vec<f64>>,
}

impl AlignedTable {
    pub(crate) fn from_parts(
        timestamps: Vec<DateTime<Utc>>,
        columns: IndexMap<String, Vec<f64>>,
    ) -> Self {
        debug_assert!(columns.values().all(|c| c.len() == timestamps.len()));
        Self {
            timestamps,
            columns,
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// No rows. An aligned table with columns but no rows means the inputs
    /// did not share a single hour.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Values of one row in column order
    pub fn row(&self, index: usize) -> Option<(DateTime<Utc>, Vec<f64>)> {
        let timestamp = *self.timestamps.get(index)?;
        let values = self.columns.values().map(|c| c[index]).collect();
        Some((timestamp, values))
    }

    /// Copy of this table with one more column appended (or replaced)
    pub fn with_column(&self, name: impl Into<String>, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), self.len());
        let mut columns = self.columns.clone();
        columns.insert(name.into(), values);
        Self::from_parts(self.timestamps.clone(), columns)
    }

    /// Copy holding only the named columns, in the given order.
    /// Returns the first missing name on failure.
    pub fn select<'a>(&self, names: &[&'a str]) -> Result<Self, &'a str> {
        let mut columns = IndexMap::with_capacity(names.len());
        for &name in names {
            let values = self.columns.get(name).ok_or(name)?;
            columns.insert(name.to_string(), values.clone());
        }
        Ok(Self::from_parts(self.timestamps.clone(), columns))
    }

    /// Last `n` rows
    pub fn tail(&self, n: usize) -> Self {
        let start = self.len().saturating_sub(n);
        let columns = self
            .columns
            .iter()
            .map(|(name, values)| (name.clone(), values[start..].to_vec()))
            .collect();
        Self::from_parts(self.timestamps[start..].to_vec(), columns)
    }
}

/// Inner-join series on their timestamps.
///
/// Only hours present in every input survive; columns follow input order.
/// Empty input yields a table without columns.
pub fn align(series: &[TimeSeries]) -> AlignedTable {
    let mut inputs: Vec<&TimeSeries> = Vec::with_capacity(series.len());
    for s in series {
        if inputs.iter().any(|seen| seen.name() == s.name()) {
            tracing::warn!(column = s.name(), "duplicate column in alignment, keeping the first");
            continue;
        }
        inputs.push(s);
    }

    let Some((first, rest)) = inputs.split_first() else {
        return AlignedTable::default();
    };

    let mut common: BTreeSet<DateTime<Utc>> = first.timestamps().collect();
    for s in rest {
        let other: BTreeSet<DateTime<Utc>> = s.timestamps().collect();
        common = common.intersection(&other).copied().collect();
        if common.is_empty() {
            break;
        }
    }

    let timestamps: Vec<DateTime<Utc>> = common.into_iter().collect();
    let columns = inputs
        .iter()
        .map(|s| {
            // every timestamp is in the intersection, so lookups cannot miss
            let values = timestamps
                .iter()
                .filter_map(|&ts| s.get(ts))
                .collect::<Vec<_>>();
            (s.name().to_string(), values)
        })
        .collect();

    AlignedTable::from_parts(timestamps, columns)
}
