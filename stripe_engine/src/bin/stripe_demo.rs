//! A standalone CLI that drives the engine against an in-process synthetic
//! upstream, useful for eyeballing tile output and queue/cache stats without
//! a real time-series API.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use shared_utils::clock::{Clock, SystemClock};

use stripe_engine::config::Config;
use stripe_engine::datekit::CalendarDay;
use stripe_engine::engine::Engine;
use stripe_engine::models::{DataPoint, UnitSeries, YearPayload};
use stripe_engine::navigator::{Key, KeyCommand};
use stripe_engine::request_queue::BoxFuture;
use stripe_engine::year_vendor::YearSource;

#[derive(Parser)]
#[command(version, about = "Renders a demo frame of the stripe engine against synthetic data")]
struct Cli {
    #[arg(long, default_value = "DEMO_FACILITY")]
    facility: String,

    #[arg(long, default_value_t = 2023)]
    year: i32,

    #[arg(long, default_value_t = 730)]
    container_width_px: u32,

    #[arg(long)]
    config: Option<String>,
}

/// Deterministic synthetic data: capacity factor oscillates with day-of-year,
/// with a run of missing days near the start of each year to exercise the
/// "missing" rendering path.
struct SyntheticSource {
    facility: String,
}

impl YearSource for SyntheticSource {
    fn fetch_year(&self, year: i32) -> BoxFuture<YearPayload> {
        let facility = self.facility.clone();
        Box::pin(async move {
            let len = CalendarDay::days_in_year(year) as usize;
            let data = (0..len)
                .map(|day| {
                    if day < 5 {
                        DataPoint::Missing
                    } else {
                        let phase = (day as f64 / len as f64) * std::f64::consts::TAU;
                        DataPoint::Percent(((phase.sin() + 1.0) * 50.0).clamp(0.0, 100.0) as f32)
                    }
                })
                .collect();

            Ok(YearPayload::new(
                year,
                std::time::SystemTime::now(),
                vec![UnitSeries {
                    unit_id: format!("{facility}-U1"),
                    facility_id: facility.clone(),
                    facility_name: facility.clone(),
                    region: "NSW1".into(),
                    network: "NEM".into(),
                    capacity_mw: 250.0,
                    year,
                    data,
                }],
            ))
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            toml::from_str(&text)?
        }
        None => Config::default(),
    };

    let epoch_year = cli.year - 1;
    let offset_days = CalendarDay::jan1(epoch_year).days_until(&CalendarDay::jan1(cli.year));
    let max_offset = offset_days + 2 * 365;

    let engine = Engine::new(
        config,
        epoch_year,
        0,
        max_offset,
        offset_days,
        cli.container_width_px as f64 / 365.0,
        Arc::new(SyntheticSource {
            facility: cli.facility.clone(),
        }),
    );

    let frame = engine
        .composite(&[(cli.facility.clone(), 20)], cli.container_width_px)
        .await;

    for row in &frame.rows {
        let lit = row.pixels.chunks(4).filter(|px| px != &[0, 0, 0, 0]).count();
        println!(
            "facility={} width={} height={} rendered_px={lit}",
            row.facility_id, row.width, row.height
        );
    }

    // Drive a keyboard-triggered pan to "today" and tick it to completion,
    // using the real wall clock rather than the frame timestamps the host
    // would normally supply.
    let clock = SystemClock;
    let start = clock.now();
    engine.on_key(
        KeyCommand {
            key: Key::Home,
            shift: false,
            cmd_or_ctrl: false,
        },
        elapsed_ms(start, clock.now()),
    );
    loop {
        let now = clock.now();
        engine.tick(elapsed_ms(start, now), 16);
        if engine.stats().await.navigator.is_idle {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(16)).await;
    }
    println!("settled at offset_days={}", engine.offset_days());

    let stats = engine.stats().await;
    println!("{stats:#?}");

    Ok(())
}

fn elapsed_ms(start: Instant, now: Instant) -> i64 {
    now.saturating_duration_since(start).as_millis() as i64
}
