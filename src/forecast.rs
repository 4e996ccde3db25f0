//! Load forecasting behind a black-box model seam.
//!
//! The adapter reshapes a domain series into the generic `ds`/`y` frame a
//! model expects, runs fit-then-predict, and maps the model's `yhat` columns
//! back to forward-looking forecast points.

use augurs_core::{Fit, Predict};
use augurs_ets::AutoETS;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::series::TimeSeries;

/// Minimum number of hourly observations the default model fits on.
pub const DEFAULT_MIN_HISTORY: usize = 24;

/// Longest horizon a forecast may ask for, two weeks of hours.
pub const DEFAULT_MAX_HORIZON_HOURS: usize = 14 * 24;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    #[error("need at least {required} observations to forecast, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },
    #[error("forecast horizon must be between 1 and {max} hours, got {requested}")]
    InvalidHorizon { requested: usize, max: usize },
    #[error("forecast model failed: {0}")]
    Model(String),
}

/// Model input: timestamps and observed values
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFrame {
    pub ds: Vec<DateTime<Utc>>,
    pub y: Vec<f64>,
}

impl ModelFrame {
    fn last_ds(&self) -> Option<DateTime<Utc>> {
        self.ds.last().copied()
    }
}

/// Model output. May include fitted rows for the history as well as the horizon.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelForecast {
    pub ds: Vec<DateTime<Utc>>,
    pub yhat: Vec<f64>,
    pub yhat_lower: Vec<f64>,
    pub yhat_upper: Vec<f64>,
}

/// A fit-then-predict time-series model.
pub trait Forecaster {
    /// Shortest history the model accepts
    fn min_history(&self) -> usize;

    /// Fit on `frame` and predict `horizon` hourly steps past its last row
    fn fit_predict(&self, frame: &ModelFrame, horizon: usize) -> Result<ModelForecast, ForecastError>;
}

/// Automatic ETS model with prediction intervals.
#[derive(Debug, Clone)]
pub struct EtsForecaster {
    pub confidence_level: f64,
    pub min_history: usize,
    /// Seasonal period in hours, 1 for non-seasonal
    pub season_length: usize,
}

impl Default for EtsForecaster {
    fn default() -> Self {
        Self {
            confidence_level: 0.8,
            min_history: DEFAULT_MIN_HISTORY,
            season_length: 1,
        }
    }
}

impl Forecaster for EtsForecaster {
    fn min_history(&self) -> usize {
        self.min_history
    }

    fn fit_predict(&self, frame: &ModelFrame, horizon: usize) -> Result<ModelForecast, ForecastError> {
        let last = frame
            .last_ds()
            .ok_or_else(|| ForecastError::Model("empty model frame".to_string()))?;

        let model = if self.season_length > 1 {
            AutoETS::new(self.season_length, "ZZZ")
                .map_err(|e| ForecastError::Model(format!("seasonal ETS setup failed: {e}")))?
        } else {
            AutoETS::non_seasonal()
        };
        let fitted = model
            .fit(&frame.y)
            .map_err(|e| ForecastError::Model(format!("ETS fitting failed: {e}")))?;
        let forecast = fitted
            .predict(horizon, self.confidence_level)
            .map_err(|e| ForecastError::Model(format!("ETS prediction failed: {e}")))?;

        // no interval available: collapse the band onto the point forecast
        let (yhat_lower, yhat_upper) = match forecast.intervals {
            Some(intervals) => (intervals.lower, intervals.upper),
            None => (forecast.point.clone(), forecast.point.clone()),
        };

        Ok(ModelForecast {
            ds: hours_after(last).take(horizon).collect(),
            yhat: forecast.point,
            yhat_lower,
            yhat_upper,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Forward-looking hourly predictions for one series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub name: String,
    pub points: Vec<ForecastPoint>,
}

impl Forecast {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Consecutive hourly timestamps starting one hour after `last`
fn hours_after(last: DateTime<Utc>) -> impl Iterator<Item = DateTime<Utc>> {
    std::iter::successors(Some(last + Duration::hours(1)), |t| Some(*t + Duration::hours(1)))
}

pub struct ForecastAdapter<F = EtsForecaster> {
    model: F,
    max_horizon_hours: usize,
}

impl<F: Forecaster> ForecastAdapter<F> {
    pub fn new(model: F) -> Self {
        Self {
            model,
            max_horizon_hours: DEFAULT_MAX_HORIZON_HOURS,
        }
    }

    pub fn with_max_horizon(mut self, hours: usize) -> Self {
        self.max_horizon_hours = hours;
        self
    }

    pub fn max_horizon_hours(&self) -> usize {
        self.max_horizon_hours
    }

    /// Predict `horizon_hours` hourly points following the last observation.
    pub fn forecast(&self, series: &TimeSeries, horizon_hours: usize) -> Result<Forecast, ForecastError> {
        if horizon_hours == 0 || horizon_hours > self.max_horizon_hours {
            return Err(ForecastError::InvalidHorizon {
                requested: horizon_hours,
                max: self.max_horizon_hours,
            });
        }
        let required = self.model.min_history().max(1);
        let last = match series.last_timestamp() {
            Some(last) if series.len() >= required => last,
            _ => {
                return Err(ForecastError::InsufficientHistory {
                    required,
                    actual: series.len(),
                });
            }
        };

        let frame = ModelFrame {
            ds: series.timestamps().collect(),
            y: series.values().collect(),
        };
        let output = self.model.fit_predict(&frame, horizon_hours)?;

        let rows = output.ds.len();
        if output.yhat.len() != rows || output.yhat_lower.len() != rows || output.yhat_upper.len() != rows {
            return Err(ForecastError::Model("model returned ragged columns".to_string()));
        }

        // keep only the forward horizon, keyed by timestamp
        let future: BTreeMap<DateTime<Utc>, usize> = output
            .ds
            .iter()
            .enumerate()
            .filter(|(_, ds)| **ds > last)
            .map(|(i, ds)| (*ds, i))
            .collect();

        let points = hours_after(last)
            .take(horizon_hours)
            .map(|timestamp| {
                let i = *future.get(&timestamp).ok_or_else(|| {
                    ForecastError::Model(format!("model output does not cover {timestamp}"))
                })?;
                let estimate = output.yhat[i];
                Ok(ForecastPoint {
                    timestamp,
                    estimate,
                    lower: output.yhat_lower[i].min(estimate),
                    upper: output.yhat_upper[i].max(estimate),
                })
            })
            .collect::<Result<Vec<_>, ForecastError>>()?;

        Ok(Forecast {
            name: series.name().to_string(),
            points,
        })
    }
}

impl Default for ForecastAdapter<EtsForecaster> {
    fn default() -> Self {
        Self::new(EtsForecaster::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hourly_load(hours: usize) -> TimeSeries {
        let start = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        TimeSeries::new(
            "demand",
            (0..hours).map(|h| {
                let phase = (h % 24) as f64 / 24.0 * std::f64::consts::TAU;
                let noise = ((h * 7919) % 13) as f64 * 35.0;
                (
                    start + Duration::hours(h as i64),
                    28_000.0 + 4_000.0 * phase.sin() + noise + h as f64 * 2.5,
                )
            }),
        )
    }

    /// Echoes the history as fitted values and extends the last value forward.
    struct Naive {
        with_history: bool,
    }

    impl Forecaster for Naive {
        fn min_history(&self) -> usize {
            3
        }

        fn fit_predict(&self, frame: &ModelFrame, horizon: usize) -> Result<ModelForecast, ForecastError> {
            let last = *frame.ds.last().unwrap();
            let level = *frame.y.last().unwrap();
            let mut out = ModelForecast::default();
            if self.with_history {
                for (ds, y) in frame.ds.iter().zip(&frame.y) {
                    out.ds.push(*ds);
                    out.yhat.push(*y);
                    out.yhat_lower.push(*y - 1.0);
                    out.yhat_upper.push(*y + 1.0);
                }
            }
            for timestamp in hours_after(last).take(horizon) {
                out.ds.push(timestamp);
                out.yhat.push(level);
                // deliberately inverted band
                out.yhat_lower.push(level + 5.0);
                out.yhat_upper.push(level - 5.0);
            }
            Ok(out)
        }
    }

    #[test]
    fn ets_forecast_covers_horizon() {
        let series = hourly_load(168);
        let forecast = ForecastAdapter::default().forecast(&series, 48).unwrap();

        assert_eq!(forecast.name, "demand");
        assert_eq!(forecast.len(), 48);
        let last = series.last_timestamp().unwrap();
        for (i, point) in forecast.points.iter().enumerate() {
            assert_eq!(point.timestamp, last + Duration::hours(i as i64 + 1));
            assert!(point.lower <= point.estimate, "{point:?}");
            assert!(point.estimate <= point.upper, "{point:?}");
            assert!(point.estimate.is_finite());
        }
    }

    #[test]
    fn short_history_is_rejected() {
        let err = ForecastAdapter::default()
            .forecast(&hourly_load(10), 48)
            .unwrap_err();
        assert_eq!(
            err,
            ForecastError::InsufficientHistory {
                required: DEFAULT_MIN_HISTORY,
                actual: 10
            }
        );
    }

    #[test]
    fn empty_series_is_insufficient() {
        let err = ForecastAdapter::new(Naive { with_history: false })
            .forecast(&TimeSeries::empty("demand"), 4)
            .unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientHistory { actual: 0, .. }));
    }

    #[test]
    fn zero_horizon_is_rejected() {
        let err = ForecastAdapter::default()
            .forecast(&hourly_load(48), 0)
            .unwrap_err();
        assert_eq!(
            err,
            ForecastError::InvalidHorizon {
                requested: 0,
                max: DEFAULT_MAX_HORIZON_HOURS
            }
        );
    }

    #[test]
    fn horizon_beyond_limit_never_reaches_the_model() {
        struct Unreachable;

        impl Forecaster for Unreachable {
            fn min_history(&self) -> usize {
                1
            }

            fn fit_predict(&self, _: &ModelFrame, _: usize) -> Result<ModelForecast, ForecastError> {
                panic!("model must not run for an out-of-range horizon");
            }
        }

        let adapter = ForecastAdapter::new(Unreachable).with_max_horizon(72);
        for hours in [73, 100_000_000, usize::MAX] {
            let err = adapter.forecast(&hourly_load(48), hours).unwrap_err();
            assert_eq!(
                err,
                ForecastError::InvalidHorizon {
                    requested: hours,
                    max: 72
                }
            );
        }
    }

    #[test]
    fn fitted_history_is_dropped_and_band_ordered() {
        let series = hourly_load(30);
        let adapter = ForecastAdapter::new(Naive { with_history: true });
        let forecast = adapter.forecast(&series, 6).unwrap();

        assert_eq!(forecast.len(), 6);
        let last = series.last_timestamp().unwrap();
        assert_eq!(forecast.points[0].timestamp, last + Duration::hours(1));
        for point in &forecast.points {
            assert!(point.lower <= point.estimate && point.estimate <= point.upper);
        }
    }

    /// Returns fewer rows than asked for.
    struct Short;

    impl Forecaster for Short {
        fn min_history(&self) -> usize {
            1
        }

        fn fit_predict(&self, frame: &ModelFrame, _horizon: usize) -> Result<ModelForecast, ForecastError> {
            let last = *frame.ds.last().unwrap();
            Ok(ModelForecast {
                ds: vec![last + Duration::hours(1)],
                yhat: vec![1.0],
                yhat_lower: vec![0.0],
                yhat_upper: vec![2.0],
            })
        }
    }

    #[test]
    fn incomplete_model_output_is_an_error() {
        let err = ForecastAdapter::new(Short)
            .forecast(&hourly_load(5), 3)
            .unwrap_err();
        assert!(matches!(err, ForecastError::Model(_)));
    }
}
