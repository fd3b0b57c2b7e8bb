// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use bitjita_sync::workbook::write_inventory_csv;
use bitjita_sync::{
    aggregate_inventory, begin_run, insert_inventory, open_database, record_players,
    summarize_player, update_workbook, BitjitaClient, Config, LevelingTable, SkillRegistry,
    SkillSummary,
};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "bitjita-sync")]
#[command(about = "Bitjita player data → skill levels, inventory ledgers, CSV workbooks", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: ./bitjita-sync.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Update every sheet in a workbook directory
    Sync {
        /// Directory of .csv sheets
        dir: PathBuf,

        /// Also record snapshots for every player touched
        #[arg(long)]
        record: bool,
    },

    /// Print skill levels for one or more players
    Levels {
        #[arg(required = true)]
        usernames: Vec<String>,
    },

    /// Aggregate a player's inventory ledger
    Inventory {
        username: String,

        /// Export the ledger to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Record a snapshot in the database
        #[arg(long)]
        record: bool,
    },

    /// Print the leveling table
    Table,

    /// Browse a player's ledger and skills in the terminal
    View { username: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync { dir, record } => run_sync(&config, &dir, record),
        Commands::Levels { usernames } => run_levels(&config, &usernames),
        Commands::Inventory { username, csv, record } => {
            run_inventory(&config, &username, csv.as_deref(), record)
        }
        Commands::Table => run_table(&config),
        Commands::View { username } => run_view(&config, &username),
    }
}

fn load_registry(config: &Config) -> Result<SkillRegistry> {
    match &config.storage.skills_file {
        Some(path) => SkillRegistry::from_json_file(path),
        None => Ok(SkillRegistry::new()),
    }
}

fn load_table(config: &Config) -> Result<LevelingTable> {
    LevelingTable::build(config.leveling.max_level).context("Invalid leveling configuration")
}

fn open_store(config: &Config) -> Result<Connection> {
    println!("🔧 Opening database: {}", config.storage.database.display());
    open_database(&config.storage.database)
}

fn run_sync(config: &Config, dir: &Path, record: bool) -> Result<()> {
    println!("📒 Workbook Sync - {}", dir.display());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let registry = load_registry(config)?;
    let table = load_table(config)?;
    let mut client = BitjitaClient::from_config(&config.api)?;

    println!("\n🔄 Updating sheets...");
    let report = update_workbook(dir, &mut client, &registry, &table)
        .with_context(|| format!("Failed to read workbook: {}", dir.display()))?;

    for (name, kind, rows) in &report.updated {
        println!("✓ {} ({}): {} rows", name, kind, rows);
    }
    for (name, reason) in &report.skipped {
        println!("⚠️  {} skipped: {}", name, reason);
    }

    if record {
        let conn = open_store(config)?;
        let run = begin_run(&conn, "sync")?;

        println!("\n💾 Recording {} players (run {})...", report.players.len(), run.run_uuid);
        let stats = record_players(&conn, &run, &mut client, &report.players, &registry, &table);
        println!("✓ {} recorded", stats.recorded);
        for player_id in &stats.failed {
            println!("⚠️  {} not recorded (see log)", player_id);
        }
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "✅ Sync complete: {} updated, {} skipped",
        report.updated.len(),
        report.skipped.len()
    );

    Ok(())
}

fn print_summary(username: &str, summary: &SkillSummary) {
    println!("\n👤 {}", summary.username.as_deref().unwrap_or(username));
    for skill in &summary.levels {
        println!(
            "   {:<16} {:<11} lvl {:>3}  ({} xp)",
            skill.name,
            skill.category.as_str(),
            skill.level,
            skill.experience
        );
    }
    println!("   Total Lvl: {}  Total Exp: {}", summary.total_level, summary.total_exp);
}

fn run_levels(config: &Config, usernames: &[String]) -> Result<()> {
    let registry = load_registry(config)?;
    let table = load_table(config)?;
    let mut client = BitjitaClient::from_config(&config.api)?;

    for username in usernames {
        let Some(player_id) = client.resolve_player_id(username) else {
            println!("\n❌ No player found: {}", username);
            continue;
        };

        match client
            .player(&player_id)
            .and_then(|payload| summarize_player(&payload, &registry, &table))
        {
            Some(summary) => print_summary(username, &summary),
            None => println!("\n❌ No skill data for {} ({})", username, player_id),
        }
    }

    Ok(())
}

fn run_inventory(config: &Config, username: &str, csv: Option<&Path>, record: bool) -> Result<()> {
    let mut client = BitjitaClient::from_config(&config.api)?;

    let player_id = client
        .resolve_player_id(username)
        .with_context(|| format!("No player found: {}", username))?;

    println!("📦 Collecting inventory for {} ({})...", username, player_id);
    let sources = client.collect_sources(&player_id);
    let report = aggregate_inventory(&sources);

    println!(
        "✓ {} lines, {} items total ({} merged, {} sources skipped)",
        report.records.len(),
        report.total_quantity(),
        report.stats.merged,
        report.skipped_sources
    );

    if let Some(path) = csv {
        write_inventory_csv(path, &report.records)?;
        println!("✓ Exported to {}", path.display());
    } else {
        for record in &report.records {
            println!(
                "   {:>6} × {:<32} [{}] {}",
                record.quantity, record.item_name, record.kind, record.container_name
            );
        }
    }

    if record {
        let conn = open_store(config)?;
        let run = begin_run(&conn, "inventory")?;
        insert_inventory(&conn, &run, &player_id, &report.records)?;
        println!("💾 Snapshot recorded (run {})", run.run_uuid);
    }

    Ok(())
}

fn run_table(config: &Config) -> Result<()> {
    let table = load_table(config)?;

    println!("📈 Leveling table (max level {})", table.max_level());
    for (level, threshold) in table.iter() {
        println!("   {:>3}  {:>12}", level, threshold);
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_view(config: &Config, username: &str) -> Result<()> {
    println!("🖥️  Loading {}...\n", username);

    let registry = load_registry(config)?;
    let table = load_table(config)?;
    let mut client = BitjitaClient::from_config(&config.api)?;

    let player_id = client
        .resolve_player_id(username)
        .with_context(|| format!("No player found: {}", username))?;

    let report = aggregate_inventory(&client.collect_sources(&player_id));
    let skills = client
        .player(&player_id)
        .and_then(|payload| summarize_player(&payload, &registry, &table));

    println!("✓ Loaded {} ledger lines", report.records.len());
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(username, report.records, skills);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_view(_config: &Config, _username: &str) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin bitjita-server --features server");
    std::process::exit(1);
}
