use std::time::Duration;

use sl_departures::board::{BoardConfig, DepartureBoard};
use sl_departures::filter::FilterSpec;
use sl_departures::transport::{TransportClient, TransportConfig};
use sl_departures::view::{ViewAttributes, slot_label};

/// Stockholm City station, a sensible default site.
const DEFAULT_SITE_ID: &str = "1080";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Target configuration from the environment
    let site_id = std::env::var("SL_SITE_ID").unwrap_or_else(|_| {
        eprintln!("SL_SITE_ID not set, using {DEFAULT_SITE_ID} (Stockholm City)");
        DEFAULT_SITE_ID.to_string()
    });

    let mut spec = FilterSpec::default();
    if let Ok(lines) = std::env::var("SL_LINES") {
        spec = spec.with_lines(&lines);
    }
    if let Ok(direction) = std::env::var("SL_DIRECTION") {
        spec = spec.with_direction(direction);
    }

    let scan_interval = std::env::var("SL_SCAN_INTERVAL")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(60));

    let client =
        TransportClient::new(TransportConfig::new()).expect("Failed to create transport client");

    println!("Fetching departures for site {site_id}...");
    let config = BoardConfig::new(&site_id)
        .with_spec(spec)
        .with_scan_interval(scan_interval);
    let board = DepartureBoard::start(client, config)
        .await
        .expect("First refresh failed");

    print_board(&board);

    // Reprint on every refresh cycle
    let mut updates = board.subscribe();
    loop {
        if updates.changed().await.is_err() {
            break;
        }
        print_board(&board);
    }
}

fn print_board(board: &DepartureBoard) {
    println!();
    println!("Departures for site {}:", board.site_id());

    for (index, slot) in board.slot_states().iter().enumerate() {
        let label = slot_label(index);
        match &slot.attributes {
            ViewAttributes::Slot(Some(info)) => {
                println!(
                    "  {label:>4}: {} line {} to {} ({} min, delay {})",
                    slot.value.as_deref().unwrap_or("-"),
                    info.line.as_deref().unwrap_or("?"),
                    info.destination.as_deref().unwrap_or("?"),
                    info.minutes_until,
                    info.delay_minutes,
                );
            }
            _ => println!("  {label:>4}: no data"),
        }
    }

    let next_active = board.next_active();
    println!(
        "  Next active departure: {}",
        next_active.value.as_deref().unwrap_or("-")
    );

    if let Some(error) = board.last_error() {
        println!("  Last refresh failed: {error}");
    }
}
