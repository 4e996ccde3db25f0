//! Hourly electricity-market series for US balancing authorities.
//!
//! Series are fetched from the EIA v2 region-data API ([`eia`]), joined on
//! their hourly timestamps ([`series::align`]), turned into dashboard views
//! ([`analysis::derive`]) and extended with a load forecast
//! ([`forecast::ForecastAdapter`]).

pub mod analysis;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod eia;
pub mod forecast;
pub mod series;
pub mod server;

pub use config::AppConfig;
