use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::eia::FetchError;

/// Hourly series the region-data endpoint can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Demand,
    NetGeneration,
    Wind,
    Solar,
    NetInterchange,
    DayAheadPrice,
    RealTimePrice,
}

impl MetricKind {
    pub const ALL: [MetricKind; 7] = [
        MetricKind::Demand,
        MetricKind::NetGeneration,
        MetricKind::Wind,
        MetricKind::Solar,
        MetricKind::NetInterchange,
        MetricKind::DayAheadPrice,
        MetricKind::RealTimePrice,
    ];

    /// Column name used for this metric throughout the pipeline
    pub const fn canonical_name(self) -> &'static str {
        match self {
            MetricKind::Demand => "demand",
            MetricKind::NetGeneration => "net_generation",
            MetricKind::Wind => "wind",
            MetricKind::Solar => "solar",
            MetricKind::NetInterchange => "net_interchange",
            MetricKind::DayAheadPrice => "day_ahead_price",
            MetricKind::RealTimePrice => "real_time_price",
        }
    }

    /// Value of the upstream `facets[metric][]` selector
    pub const fn facet(self) -> &'static str {
        match self {
            MetricKind::Demand => "D",
            MetricKind::NetGeneration => "NG",
            MetricKind::Wind => "NG.WND",
            MetricKind::Solar => "NG.SUN",
            MetricKind::NetInterchange => "NI",
            MetricKind::DayAheadPrice => "LMP_DA",
            MetricKind::RealTimePrice => "LMP_RT",
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            MetricKind::DayAheadPrice | MetricKind::RealTimePrice => "$/MWh",
            _ => "MW",
        }
    }
}

impl FromStr for MetricKind {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "demand" => Ok(MetricKind::Demand),
            "net_generation" => Ok(MetricKind::NetGeneration),
            "wind" => Ok(MetricKind::Wind),
            "solar" => Ok(MetricKind::Solar),
            "net_interchange" => Ok(MetricKind::NetInterchange),
            "day_ahead_price" | "lmp_da" => Ok(MetricKind::DayAheadPrice),
            "real_time_price" | "lmp_rt" => Ok(MetricKind::RealTimePrice),
            other => Err(FetchError::UnsupportedMetric(other.to_string())),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("demand", MetricKind::Demand, "D")]
    #[case("net_generation", MetricKind::NetGeneration, "NG")]
    #[case("wind", MetricKind::Wind, "NG.WND")]
    #[case("solar", MetricKind::Solar, "NG.SUN")]
    #[case("net_interchange", MetricKind::NetInterchange, "NI")]
    #[case("day_ahead_price", MetricKind::DayAheadPrice, "LMP_DA")]
    #[case("lmp_rt", MetricKind::RealTimePrice, "LMP_RT")]
    fn parses_names_and_maps_facets(
        #[case] name: &str,
        #[case] kind: MetricKind,
        #[case] facet: &str,
    ) {
        let parsed: MetricKind = name.parse().unwrap();
        assert_eq!(parsed, kind);
        assert_eq!(parsed.facet(), facet);
    }

    #[rstest]
    #[case("Demand")]
    #[case("load")]
    #[case("")]
    fn rejects_unknown_names(#[case] name: &str) {
        let err = name.parse::<MetricKind>().unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedMetric(ref m) if m == name));
    }

    #[test]
    fn prices_and_quantities_have_distinct_units() {
        assert_eq!(MetricKind::Demand.unit(), "MW");
        assert_eq!(MetricKind::NetInterchange.unit(), "MW");
        assert_eq!(MetricKind::DayAheadPrice.unit(), "$/MWh");
        assert_eq!(MetricKind::RealTimePrice.unit(), "$/MWh");
    }

    #[test]
    fn canonical_names_round_trip() {
        for kind in MetricKind::ALL {
            assert_eq!(kind.canonical_name().parse::<MetricKind>().unwrap(), kind);
        }
    }
}
