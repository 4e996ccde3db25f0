use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::eia::MetricKind;
use crate::series::AlignedTable;

/// Name of the day-ahead minus real-time column
pub const PRICE_SPREAD: &str = "price_spread";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeriveError {
    #[error("missing column: {column}")]
    MissingColumn { column: String },
}

/// Computed views over an aligned table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Derivation {
    /// Appends `price_spread = day_ahead_price - real_time_price`
    PriceSpread,
    /// Wind, solar and demand columns for a stacked-area view
    RenewableShare,
    /// Net interchange next to the DA-RT spread
    IntertieArbitrage,
}

impl Derivation {
    /// Columns the derivation reads
    pub fn required_columns(self) -> &'static [&'static str] {
        const SPREAD: &[&str] = &[
            MetricKind::DayAheadPrice.canonical_name(),
            MetricKind::RealTimePrice.canonical_name(),
        ];
        const RENEWABLES: &[&str] = &[
            MetricKind::Wind.canonical_name(),
            MetricKind::Solar.canonical_name(),
            MetricKind::Demand.canonical_name(),
        ];
        const INTERTIE: &[&str] = &[
            MetricKind::DayAheadPrice.canonical_name(),
            MetricKind::RealTimePrice.canonical_name(),
            MetricKind::NetInterchange.canonical_name(),
        ];
        match self {
            Derivation::PriceSpread => SPREAD,
            Derivation::RenewableShare => RENEWABLES,
            Derivation::IntertieArbitrage => INTERTIE,
        }
    }
}

/// Apply a derivation, returning a new table. The input is left untouched and
/// nothing is built unless every required column is present.
pub fn derive(table: &AlignedTable, derivation: Derivation) -> Result<AlignedTable, DeriveError> {
    if let Some(missing) = derivation
        .required_columns()
        .iter()
        .find(|name| !table.has_column(name))
    {
        return Err(DeriveError::MissingColumn {
            column: missing.to_string(),
        });
    }

    match derivation {
        Derivation::PriceSpread => Ok(with_price_spread(table)),
        Derivation::RenewableShare => select(table, derivation.required_columns()),
        Derivation::IntertieArbitrage => select(
            &with_price_spread(table),
            &[MetricKind::NetInterchange.canonical_name(), PRICE_SPREAD],
        ),
    }
}

fn with_price_spread(table: &AlignedTable) -> AlignedTable {
    let da = table
        .column(MetricKind::DayAheadPrice.canonical_name())
        .unwrap_or_default();
    let rt = table
        .column(MetricKind::RealTimePrice.canonical_name())
        .unwrap_or_default();
    let spread = da.iter().zip(rt).map(|(da, rt)| da - rt).collect();
    table.with_column(PRICE_SPREAD, spread)
}

fn select(table: &AlignedTable, columns: &[&str]) -> Result<AlignedTable, DeriveError> {
    table
        .select(columns)
        .map_err(|column| DeriveError::MissingColumn {
            column: column.to_string(),
        })
}
