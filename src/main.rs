use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

use freightline::config::load_config;
use freightline::{
    FreightDb, FreightError, MissionFilter, MissionId, MissionStatus, Result, TrackingSample,
};

#[derive(Parser)]
#[command(name = "freightline")]
#[command(about = "Freightline - PostgreSQL-backed freight matching marketplace")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (default: .freightline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize database schema
    InitDb,

    /// List missions open for carrier bidding
    Missions {
        /// Filter by status (e.g. SEARCHING_CARRIER)
        #[arg(short, long)]
        status: Option<String>,

        /// Search pickup city, delivery city or shipper name
        #[arg(short, long)]
        query: Option<String>,

        /// Page number (1-based)
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Page size
        #[arg(short, long, default_value = "10")]
        limit: u32,

        /// Emit the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a single mission
    Show {
        /// Mission ID
        mission: String,

        /// Emit the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the audit timeline for a mission
    Timeline {
        /// Mission ID
        mission: String,

        /// Emit the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record a GPS position for a mission
    Track {
        /// Mission ID
        mission: String,

        #[arg(long)]
        lat: f64,

        #[arg(long)]
        lon: f64,

        /// Speed in m/s
        #[arg(long)]
        speed: Option<f64>,

        /// Heading in degrees (0-360)
        #[arg(long)]
        heading: Option<f64>,
    },

    /// Print the recorded route for a mission
    Route {
        /// Mission ID
        mission: String,
    },
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        error!("{} [{}]", e, e.code());
        std::process::exit(e.exit_code());
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let db = connect(cli.config).await?;
            db.setup_schema().await?;
            println!("Database schema is up to date");
            Ok(())
        }

        Commands::Missions {
            status,
            query,
            page,
            limit,
            json,
        } => {
            let db = connect(cli.config).await?;
            let status = status
                .as_deref()
                .map(MissionStatus::try_from)
                .transpose()
                .map_err(FreightError::ValidationFailed)?;
            let filter = MissionFilter {
                status,
                query,
                page: Some(page),
                limit: Some(limit),
            };

            let result = db.list_available_missions(&filter).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }
            if result.items.is_empty() {
                println!("\nNo missions match\n");
                return Ok(());
            }

            println!(
                "\n{:<38} {:<12} {:<14} {:<14} {:>10}",
                "MISSION", "CLASS", "FROM", "TO", "PRICE"
            );
            println!("{}", "-".repeat(92));
            for mission in &result.items {
                println!(
                    "{:<38} {:<12} {:<14} {:<14} {:>10.2}",
                    mission.id,
                    mission.shipment_class.as_str(),
                    truncate(&mission.pickup.city, 14),
                    truncate(&mission.delivery.city, 14),
                    mission.pricing.final_price,
                );
            }
            println!(
                "\nPage {}/{} ({} missions)\n",
                result.pagination.current_page,
                result.pagination.total_pages,
                result.pagination.total
            );
            Ok(())
        }

        Commands::Show { mission, json } => {
            let db = connect(cli.config).await?;
            let mission = db.get_mission(parse_mission_id(&mission)?).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&mission)?);
                return Ok(());
            }

            println!("\nMission {}", mission.id);
            println!("  Status:    {}", mission.status);
            println!("  Class:     {}", mission.shipment_class.as_str());
            println!(
                "  Route:     {} -> {} ({} km)",
                mission.pickup.city, mission.delivery.city, mission.distance_km
            );
            println!(
                "  Cargo:     {} ({} kg)",
                mission.cargo.goods_type, mission.cargo.weight_kg
            );
            println!(
                "  Price:     {:.2} (base {:.2}, commission {:.2}, VAT {:.2})",
                mission.pricing.final_price,
                mission.pricing.base_price,
                mission.pricing.commission_amount,
                mission.pricing.vat_amount
            );
            if let Some(carrier) = mission.carrier_id {
                println!("  Carrier:   {carrier}");
            }
            println!();
            Ok(())
        }

        Commands::Timeline { mission, json } => {
            let db = connect(cli.config).await?;
            let entries = db.get_timeline(parse_mission_id(&mission)?).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }

            if entries.is_empty() {
                println!("\nNo timeline entries\n");
                return Ok(());
            }

            println!();
            for entry in entries {
                println!(
                    "{}  {:<18} {}",
                    entry.created_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.event,
                    entry.description.as_deref().unwrap_or("-")
                );
            }
            println!();
            Ok(())
        }

        Commands::Track {
            mission,
            lat,
            lon,
            speed,
            heading,
        } => {
            let db = connect(cli.config).await?;
            let sample = TrackingSample {
                latitude: lat,
                longitude: lon,
                speed,
                heading,
                accuracy: None,
            };
            let position = db
                .record_tracking_point(parse_mission_id(&mission)?, &sample)
                .await?;
            println!("Position recorded: {}", position.maps_link);
            Ok(())
        }

        Commands::Route { mission } => {
            let db = connect(cli.config).await?;
            let points = db.get_tracking_points(parse_mission_id(&mission)?).await?;

            if points.is_empty() {
                println!("\nNo positions recorded\n");
                return Ok(());
            }

            println!();
            for point in points {
                println!(
                    "{}  {:>10.6}, {:>11.6}  {}",
                    point.created_at.format("%Y-%m-%d %H:%M:%S"),
                    point.latitude,
                    point.longitude,
                    point.maps_link()
                );
            }
            println!();
            Ok(())
        }
    }
}

async fn connect(config_path: Option<PathBuf>) -> Result<FreightDb> {
    let config = load_config(config_path).await?;
    let url = config.resolve_database_url().ok_or_else(|| {
        FreightError::ConfigError(
            "No database URL configured; set DATABASE_URL or database_url in the config file"
                .to_string(),
        )
    })?;
    FreightDb::new_with_config(&url, &config).await
}

fn parse_mission_id(input: &str) -> Result<MissionId> {
    MissionId::parse(input).map_err(FreightError::ValidationFailed)
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
