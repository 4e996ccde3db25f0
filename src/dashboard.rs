//! Panels of the market dashboard for one balancing authority.
//!
//! Every panel degrades on its own: a failed or empty fetch hides the panels
//! that need it and leaves the others intact.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::analysis::{Derivation, derive};
use crate::eia::{EiaClient, FetchError, MetricKind, TimeWindow};
use crate::forecast::{EtsForecaster, Forecast, ForecastAdapter, ForecastError, Forecaster};
use crate::series::{AlignedTable, TimeSeries, align};

/// Rows of the intertie table shown alongside the chart
pub const INTERTIE_TAIL_ROWS: usize = 24;

const PLAN: [MetricKind; 6] = [
    MetricKind::Demand,
    MetricKind::Wind,
    MetricKind::Solar,
    MetricKind::NetInterchange,
    MetricKind::DayAheadPrice,
    MetricKind::RealTimePrice,
];

/// Outcome of a single panel
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Panel<T> {
    Ready { data: T },
    InsufficientData { reason: String },
    Unavailable { reason: String },
}

impl<T> Panel<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Panel::Ready { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Panel::Ready { data } => Some(data),
            _ => None,
        }
    }

    fn from_fetch_error(err: &FetchError) -> Self {
        if err.is_no_data() {
            Panel::InsufficientData {
                reason: err.to_string(),
            }
        } else {
            Panel::Unavailable {
                reason: err.to_string(),
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadPanel {
    pub history: TimeSeries,
    pub forecast: Panel<Forecast>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntertiePanel {
    /// Net interchange against the price spread
    pub table: AlignedTable,
    /// Last rows of both prices, net interchange and the spread
    pub recent: AlignedTable,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub region: String,
    pub region_name: String,
    pub window: TimeWindow,
    pub load: Panel<LoadPanel>,
    pub renewables: Panel<AlignedTable>,
    pub intertie: Panel<IntertiePanel>,
}

pub struct Dashboard<F = EtsForecaster> {
    client: EiaClient,
    forecaster: Arc<ForecastAdapter<F>>,
    horizon_hours: usize,
}

impl<F: Forecaster + Send + Sync + 'static> Dashboard<F> {
    pub fn new(client: EiaClient, forecaster: ForecastAdapter<F>, horizon_hours: usize) -> Self {
        Self {
            client,
            forecaster: Arc::new(forecaster),
            horizon_hours,
        }
    }

    pub fn client(&self) -> &EiaClient {
        &self.client
    }

    pub fn horizon_hours(&self) -> usize {
        self.horizon_hours
    }

    /// Fit and predict on tokio's blocking pool.
    pub async fn forecast(&self, history: &TimeSeries, hours: usize) -> Result<Forecast, ForecastError> {
        let adapter = Arc::clone(&self.forecaster);
        let history = history.clone();
        tokio::task::spawn_blocking(move || adapter.forecast(&history, hours))
            .await
            .map_err(|e| ForecastError::Model(format!("forecast task failed: {e}")))?
    }

    /// Fetch everything the dashboard shows and assemble its panels.
    ///
    /// Only an unknown region fails the whole render.
    pub async fn render(
        &self,
        region: &str,
        window: Option<TimeWindow>,
    ) -> Result<DashboardReport, FetchError> {
        let ba = self
            .client
            .regions()
            .get(region)
            .cloned()
            .ok_or_else(|| FetchError::UnknownRegion(region.to_string()))?;
        let window = window.unwrap_or_else(|| self.client.default_window());

        let fetched: HashMap<MetricKind, Result<TimeSeries, FetchError>> = self
            .client
            .fetch_many(&ba.code, &PLAN, Some(window))
            .await
            .into_iter()
            .collect();

        for (metric, result) in &fetched {
            if let Err(e) = result {
                tracing::warn!(region = %ba.code, %metric, error = %e, "series unavailable");
            }
        }

        let load = self.load_panel(&fetched).await;
        let renewables = renewables_panel(&fetched);
        let intertie = intertie_panel(&fetched);

        Ok(DashboardReport {
            region: ba.code,
            region_name: ba.name,
            window,
            load,
            renewables,
            intertie,
        })
    }

    async fn load_panel(&self, fetched: &HashMap<MetricKind, Result<TimeSeries, FetchError>>) -> Panel<LoadPanel> {
        let demand = match fetched.get(&MetricKind::Demand) {
            Some(Ok(series)) => series,
            Some(Err(e)) => return Panel::from_fetch_error(e),
            None => {
                return Panel::Unavailable {
                    reason: "demand was not requested".to_string(),
                };
            }
        };

        let forecast = match self.forecast(demand, self.horizon_hours).await {
            Ok(forecast) => Panel::Ready { data: forecast },
            Err(e @ ForecastError::InsufficientHistory { .. }) => Panel::InsufficientData {
                reason: e.to_string(),
            },
            Err(e) => {
                tracing::warn!(error = %e, "load forecast failed");
                Panel::Unavailable {
                    reason: e.to_string(),
                }
            }
        };

        Panel::Ready {
            data: LoadPanel {
                history: demand.clone(),
                forecast,
            },
        }
    }
}

/// Series for `metrics`; NoData counts as an empty series, other failures
/// make the panel unavailable.
fn gather(
    fetched: &HashMap<MetricKind, Result<TimeSeries, FetchError>>,
    metrics: &[MetricKind],
) -> Result<Vec<TimeSeries>, String> {
    metrics
        .iter()
        .map(|&metric| match fetched.get(&metric) {
            Some(Ok(series)) => Ok(series.clone()),
            Some(Err(e)) if e.is_no_data() => Ok(TimeSeries::empty(metric.canonical_name())),
            Some(Err(e)) => Err(e.to_string()),
            None => Err(format!("{metric} was not requested")),
        })
        .collect()
}

/// Why a panel could not be built
enum Degraded {
    Insufficient(String),
    Unavailable(String),
}

impl<T> From<Degraded> for Panel<T> {
    fn from(degraded: Degraded) -> Self {
        match degraded {
            Degraded::Insufficient(reason) => Panel::InsufficientData { reason },
            Degraded::Unavailable(reason) => Panel::Unavailable { reason },
        }
    }
}

fn aligned_for(
    fetched: &HashMap<MetricKind, Result<TimeSeries, FetchError>>,
    metrics: &[MetricKind],
) -> Result<AlignedTable, Degraded> {
    let series = gather(fetched, metrics).map_err(Degraded::Unavailable)?;
    let table = align(&series);
    if table.is_empty() {
        let names: Vec<_> = metrics.iter().map(|m| m.canonical_name()).collect();
        return Err(Degraded::Insufficient(format!(
            "no hours with {} all reported",
            names.join(", ")
        )));
    }
    Ok(table)
}

fn renewables_panel(fetched: &HashMap<MetricKind, Result<TimeSeries, FetchError>>) -> Panel<AlignedTable> {
    let table = match aligned_for(fetched, &[MetricKind::Demand, MetricKind::Wind, MetricKind::Solar]) {
        Ok(table) => table,
        Err(degraded) => return degraded.into(),
    };
    match derive(&table, Derivation::RenewableShare) {
        Ok(data) => Panel::Ready { data },
        Err(e) => Panel::Unavailable {
            reason: e.to_string(),
        },
    }
}

fn intertie_panel(fetched: &HashMap<MetricKind, Result<TimeSeries, FetchError>>) -> Panel<IntertiePanel> {
    let table = match aligned_for(
        fetched,
        &[
            MetricKind::DayAheadPrice,
            MetricKind::RealTimePrice,
            MetricKind::NetInterchange,
        ],
    ) {
        Ok(table) => table,
        Err(degraded) => return degraded.into(),
    };
    let view = derive(&table, Derivation::IntertieArbitrage);
    let with_spread = derive(&table, Derivation::PriceSpread);
    match (view, with_spread) {
        (Ok(view), Ok(with_spread)) => Panel::Ready {
            data: IntertiePanel {
                recent: with_spread.tail(INTERTIE_TAIL_ROWS),
                table: view,
            },
        },
        (Err(e), _) | (_, Err(e)) => Panel::Unavailable {
            reason: e.to_string(),
        },
    }
}
