use anyhow::Result;
use gridpulse::analysis::PRICE_SPREAD;
use gridpulse::cli::{Cli, Command};
use gridpulse::dashboard::{Dashboard, DashboardReport, Panel};
use gridpulse::eia::MetricKind;
use gridpulse::series::AlignedTable;
use gridpulse::server::{AppState, start_server};
use gridpulse::AppConfig;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::import()?;
    let config = AppConfig::load(cli.config.as_deref())?;

    let dashboard = Dashboard::new(
        config.eia_client()?,
        config.forecaster(),
        config.forecast.horizon_hours,
    );

    match cli.command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or(config.server.bind_address);
            start_server(&bind, AppState::new(dashboard)).await?;
        }
        Command::Report { region, rows } => {
            let report = dashboard.render(&region, None).await?;
            print_report(&report, rows);
        }
        Command::Regions => {
            for ba in dashboard.client().regions().iter() {
                println!("{:<6} {}", ba.code, ba.name);
            }
        }
    }

    Ok(())
}

fn print_report(report: &DashboardReport, rows: usize) {
    println!("=== {} ({}) ===", report.region_name, report.region);
    println!(
        "Window: {} .. {}\n",
        report.window.start.format("%Y-%m-%d %H:%M UTC"),
        report.window.end.format("%Y-%m-%d %H:%M UTC")
    );

    println!("=== Hourly Load and Forecast ===");
    match &report.load {
        Panel::Ready { data } => {
            println!("Observed hours: {}", data.history.len());
            match &data.forecast {
                Panel::Ready { data: forecast } => {
                    let unit = MetricKind::Demand.unit();
                    println!("Timestamp,Forecast ({unit}),Lower ({unit}),Upper ({unit})");
                    for point in forecast.points.iter().take(rows) {
                        println!(
                            "{},{:.2},{:.2},{:.2}",
                            point.timestamp.to_rfc3339(),
                            point.estimate,
                            point.lower,
                            point.upper
                        );
                    }
                }
                Panel::InsufficientData { reason } | Panel::Unavailable { reason } => {
                    println!("  forecast skipped: {reason}");
                }
            }
        }
        Panel::InsufficientData { reason } | Panel::Unavailable { reason } => {
            println!("  skipped: {reason}");
        }
    }

    println!("\n=== Renewable Integration: Wind + Solar vs Load ===");
    match &report.renewables {
        Panel::Ready { data } => print_table(data, rows),
        Panel::InsufficientData { reason } | Panel::Unavailable { reason } => {
            println!("  skipped: {reason}");
        }
    }

    println!("\n=== Net Interchange vs DA-RT Price Spread ===");
    match &report.intertie {
        Panel::Ready { data } => {
            if let Some(spread) = data.table.column(PRICE_SPREAD) {
                let mean = spread.iter().sum::<f64>() / spread.len() as f64;
                println!(
                    "Mean spread: {mean:+.2} {} over {} hours",
                    MetricKind::DayAheadPrice.unit(),
                    spread.len()
                );
            }
            print_table(&data.recent, rows);
        }
        Panel::InsufficientData { reason } | Panel::Unavailable { reason } => {
            println!("  skipped: {reason}");
        }
    }
}

fn print_table(table: &AlignedTable, rows: usize) {
    let header: Vec<String> = table.column_names().map(column_label).collect();
    println!("Timestamp,{}", header.join(","));
    let start = table.len().saturating_sub(rows);
    for i in start..table.len() {
        if let Some((timestamp, values)) = table.row(i) {
            let cells: Vec<String> = values.iter().map(|v| format!("{v:.2}")).collect();
            println!("{},{}", timestamp.format("%Y-%m-%d %H:%M"), cells.join(","));
        }
    }
}

/// Column name with its unit, e.g. `demand (MW)`
fn column_label(name: &str) -> String {
    let unit = match name.parse::<MetricKind>() {
        Ok(metric) => metric.unit(),
        Err(_) if name == PRICE_SPREAD => MetricKind::DayAheadPrice.unit(),
        Err(_) => return name.to_string(),
    };
    format!("{name} ({unit})")
}
