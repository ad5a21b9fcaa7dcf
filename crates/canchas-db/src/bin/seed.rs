//! # Seed Data Generator
//!
//! Populates a database with demo establishments: one closed caja with a
//! day of movements, one open caja, and a week of bookings in mixed states.
//!
//! ## Usage
//! ```bash
//! cargo run -p canchas-db --bin seed
//! cargo run -p canchas-db --bin seed -- --db ./data/canchas.db --days 14
//! RUST_LOG=canchas_db=debug cargo run -p canchas-db --bin seed
//! ```

use chrono::{Duration, NaiveTime, Utc};
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use canchas_core::{
    BookingStatus, Money, MovementKind, NewBooking, PaymentMethod, PaymentStatus,
    ReservationDetails,
};
use canchas_db::{Database, DbConfig, DbResult};

/// (establishment id, display name, sports)
const ESTABLISHMENTS: &[(&str, &str, &[&str])] = &[
    ("est-norte", "Complejo Norte", &["futbol5", "padel"]),
    ("est-sur", "Club Sur Tenis", &["tenis", "padel"]),
];

const PLAYERS: &[&str] = &["player-ana", "player-bruno", "player-carla", "player-diego"];

/// (kind, method, cents, description)
const MOVEMENTS: &[(MovementKind, PaymentMethod, i64, &str)] = &[
    (MovementKind::Sale, PaymentMethod::Cash, 2_000_000, "Cancha 1 - 19hs"),
    (MovementKind::Sale, PaymentMethod::MercadoPago, 2_400_000, "Cancha 2 - 20hs"),
    (MovementKind::Sale, PaymentMethod::Card, 350_000, "Bebidas"),
    (MovementKind::Sale, PaymentMethod::Transfer, 2_000_000, "Cancha 1 - 21hs"),
    (MovementKind::Expense, PaymentMethod::Cash, 180_000, "Artículos de limpieza"),
    (MovementKind::Expense, PaymentMethod::Cash, 90_000, "Hielo"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./canchas_dev.db");
    let mut days: i64 = 7;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if let Some(path) = args.get(i + 1) {
                    db_path = path.clone();
                    i += 1;
                }
            }
            "--days" => {
                if let Some(n) = args.get(i + 1) {
                    days = n.parse().unwrap_or(7);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Mis Canchas Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./canchas_dev.db)");
                println!("      --days <N>     Days of bookings to generate (default: 7)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let db = Database::new(DbConfig::new(&db_path)).await?;
    info!(path = %db_path, "Connected, migrations applied");

    for (establishment_id, name, sports) in ESTABLISHMENTS {
        if db.cash_registers().get_active(establishment_id).await?.is_some() {
            warn!(establishment_id, "Already seeded, skipping");
            continue;
        }
        seed_registers(&db, establishment_id).await?;
        let created = seed_bookings(&db, establishment_id, name, sports, days).await?;
        info!(establishment_id, bookings = created, "Establishment seeded");
    }

    db.close().await;
    info!("Seed complete");
    Ok(())
}

/// `RUST_LOG` wins; otherwise info for everything, debug for our crates.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,canchas_db=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Yesterday's shift (closed, 500 short) and today's (still open).
async fn seed_registers(db: &Database, establishment_id: &str) -> DbResult<()> {
    let registers = db.cash_registers();

    let yesterday = registers
        .open(establishment_id, "staff-1", Money::from_cents(500_000), Some("Turno noche"))
        .await?;
    for (kind, method, cents, description) in MOVEMENTS {
        registers
            .record_movement(&yesterday.id, *kind, *method, Money::from_cents(*cents), Some(*description))
            .await?;
    }
    let expected = registers
        .get_by_id(&yesterday.id)
        .await?
        .map(|r| r.expected_cash())
        .unwrap_or_default();
    registers
        .close(&yesterday.id, expected - Money::from_cents(500), Some("Faltante chico"))
        .await?;

    registers
        .open(establishment_id, "staff-2", Money::from_cents(300_000), None)
        .await?;
    Ok(())
}

async fn seed_bookings(
    db: &Database,
    establishment_id: &str,
    facility_name: &str,
    sports: &[&str],
    days: i64,
) -> DbResult<usize> {
    let bookings = db.bookings();
    let today = Utc::now().date_naive();
    let mut created = 0;

    for day in 0..days {
        let date = today + Duration::days(day);
        for (slot, hour) in [18u32, 19, 20, 21].into_iter().enumerate() {
            let seed = day as usize * 4 + slot;
            let req = NewBooking {
                court_id: format!("{establishment_id}-court-{}", slot % 2 + 1),
                establishment_id: establishment_id.to_string(),
                facility_name: facility_name.to_string(),
                sport: sports[seed % sports.len()].to_string(),
                user_id: PLAYERS[seed % PLAYERS.len()].to_string(),
                date,
                start_time: hour_of(hour),
                end_time: hour_of(hour + 1),
                price_cents: 1_800_000 + (slot as i64) * 200_000,
                participants: vec![],
            };

            // Every fourth slot is booked by staff at the front desk.
            if seed % 4 == 3 {
                let details = ReservationDetails {
                    deposit_cents: 500_000,
                    deposit_paid: seed % 2 == 1,
                    payment_provider: Some(PaymentMethod::Cash),
                    customer_name: Some(format!("Cliente {seed}")),
                    ..Default::default()
                };
                bookings.create_admin_reservation(req, details).await?;
                created += 1;
                continue;
            }

            let booking = bookings.create(req).await?;
            match seed % 5 {
                0 => {}
                1 => {
                    bookings.transition(&booking.id, BookingStatus::Confirmed).await?;
                    bookings.set_payment_status(&booking.id, PaymentStatus::Paid).await?;
                }
                2 => {
                    bookings.set_payment_status(&booking.id, PaymentStatus::Paid).await?;
                    bookings.cancel(&booking.id).await?;
                }
                3 => {
                    bookings.set_payment_status(&booking.id, PaymentStatus::Failed).await?;
                }
                _ => {
                    bookings.transition(&booking.id, BookingStatus::Confirmed).await?;
                }
            }
            created += 1;
        }
    }

    Ok(created)
}

fn hour_of(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN)
}
