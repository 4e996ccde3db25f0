//! Application configuration.
//!
//! Values are layered with increasing precedence: built-in defaults, an
//! optional TOML file, then `GRIDPULSE_<SECTION>__<KEY>` environment
//! variables. The EIA key may also come from `EIA_API_KEY`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::eia::regions::{BalancingAuthority, DEFAULT_AUTHORITIES};
use crate::eia::{DEFAULT_BASE_URL, EiaClient, RegionCatalog, RetryPolicy};
use crate::forecast::{DEFAULT_MAX_HORIZON_HOURS, DEFAULT_MIN_HISTORY, EtsForecaster, ForecastAdapter};

/// Key EIA accepts for low-volume anonymous use
pub const DEMO_API_KEY: &str = "DEMO_KEY";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub eia: EiaConfig,
    pub forecast: ForecastConfig,
    pub server: ServerConfig,
    /// Balancing authorities on offer; empty means the built-in list
    pub regions: Vec<BalancingAuthority>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EiaConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Span of the rolling window ending now
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    pub retries: u32,
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
}

impl Default for EiaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: DEMO_API_KEY.to_string(),
            request_timeout: Duration::from_secs(30),
            window: Duration::from_secs(7 * 24 * 3600),
            retries: 1,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ForecastConfig {
    pub horizon_hours: usize,
    /// Upper bound on any requested horizon, including `?hours=` on the API
    pub max_horizon_hours: usize,
    pub confidence_level: f64,
    pub min_history: usize,
    pub season_length: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon_hours: 48,
            max_horizon_hours: DEFAULT_MAX_HORIZON_HOURS,
            confidence_level: 0.8,
            min_history: DEFAULT_MIN_HISTORY,
            season_length: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3044".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, `path` (if any) and the environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            if !path.exists() {
                anyhow::bail!("config file {} does not exist", path.display());
            }
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("GRIDPULSE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut loaded: Self = builder.build()?.try_deserialize()?;
        if let Ok(key) = std::env::var("EIA_API_KEY") {
            if !key.is_empty() && loaded.eia.api_key == DEMO_API_KEY {
                loaded.eia.api_key = key;
            }
        }
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.forecast.horizon_hours == 0 {
            anyhow::bail!("forecast.horizon_hours must be positive");
        }
        if self.forecast.horizon_hours > self.forecast.max_horizon_hours {
            anyhow::bail!(
                "forecast.horizon_hours ({}) exceeds forecast.max_horizon_hours ({})",
                self.forecast.horizon_hours,
                self.forecast.max_horizon_hours
            );
        }
        if !(self.forecast.confidence_level > 0.0 && self.forecast.confidence_level < 1.0) {
            anyhow::bail!("forecast.confidence_level must be between 0 and 1 (exclusive)");
        }
        if self.eia.window.is_zero() {
            anyhow::bail!("eia.window must be positive");
        }
        Ok(())
    }

    pub fn region_catalog(&self) -> RegionCatalog {
        if self.regions.is_empty() {
            RegionCatalog::new(DEFAULT_AUTHORITIES.clone())
        } else {
            RegionCatalog::new(self.regions.clone())
        }
    }

    pub fn eia_client(&self) -> anyhow::Result<EiaClient> {
        EiaClient::builder(self.eia.api_key.clone())
            .base_url(self.eia.base_url.clone())
            .regions(self.region_catalog())
            .timeout(self.eia.request_timeout)
            .window_span(chrono::Duration::from_std(self.eia.window)?)
            .retry(RetryPolicy {
                retries: self.eia.retries,
                backoff: self.eia.retry_backoff,
            })
            .build()
    }

    pub fn forecaster(&self) -> ForecastAdapter<EtsForecaster> {
        ForecastAdapter::new(EtsForecaster {
            confidence_level: self.forecast.confidence_level,
            min_history: self.forecast.min_history,
            season_length: self.forecast.season_length,
        })
        .with_max_horizon(self.forecast.max_horizon_hours)
    }
}
