// 🗄️ Snapshot Store
// SQLite history of sync runs: skill levels, totals and inventory ledgers per player

use crate::aggregation::{aggregate_inventory, summarize_player, SkillLevel, SkillSummary};
use crate::client::{BitjitaClient, PlayerDataSource};
use crate::leveling::LevelingTable;
use crate::normalizer::{CanonicalItemRecord, ItemKind};
use crate::skills::{SkillCategory, SkillRegistry};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// One sync pass. Every snapshot row points back to the run that wrote it.
#[derive(Debug, Clone, Serialize)]
pub struct SyncRun {
    pub id: i64,
    pub run_uuid: String,
    pub started_at: DateTime<Utc>,
    pub source: String,
}

/// Latest known state of a player, for listings
#[derive(Debug, Clone, Serialize)]
pub struct PlayerListing {
    pub player_id: String,
    pub username: Option<String>,
    pub total_level: Option<i64>,
    pub total_exp: Option<i64>,
    pub last_seen: String,
}

pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Sync runs
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sync_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_uuid TEXT UNIQUE NOT NULL,
            started_at TEXT NOT NULL,
            source TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Skill snapshots (one row per skill per player per run)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS skill_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id INTEGER NOT NULL REFERENCES sync_runs(id),
            player_id TEXT NOT NULL,
            skill_id INTEGER NOT NULL,
            skill_name TEXT NOT NULL,
            category TEXT NOT NULL,
            level INTEGER NOT NULL,
            experience INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS player_totals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id INTEGER NOT NULL REFERENCES sync_runs(id),
            player_id TEXT NOT NULL,
            username TEXT,
            total_level INTEGER NOT NULL,
            total_exp INTEGER NOT NULL,
            UNIQUE(run_id, player_id)
        )",
        [],
    )?;

    // ==========================================================================
    // Inventory snapshots (flattened ledger, position keeps ledger order)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS inventory_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id INTEGER NOT NULL REFERENCES sync_runs(id),
            player_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            item_name TEXT NOT NULL,
            rarity TEXT NOT NULL,
            tag TEXT NOT NULL,
            tier INTEGER,
            quantity INTEGER NOT NULL,
            container_name TEXT NOT NULL,
            claim_name TEXT NOT NULL,
            region_id TEXT NOT NULL,
            container_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            item_id TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_skill_player ON skill_snapshots(player_id, run_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_totals_player ON player_totals(player_id, run_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_inventory_player ON inventory_snapshots(player_id, run_id)",
        [],
    )?;

    Ok(())
}

/// Open a new sync run; `source` says what triggered it (e.g. "sync", "inventory")
pub fn begin_run(conn: &Connection, source: &str) -> Result<SyncRun> {
    let run_uuid = uuid::Uuid::new_v4().to_string();
    let started_at = Utc::now();

    conn.execute(
        "INSERT INTO sync_runs (run_uuid, started_at, source) VALUES (?1, ?2, ?3)",
        params![run_uuid, started_at.to_rfc3339(), source],
    )?;

    Ok(SyncRun {
        id: conn.last_insert_rowid(),
        run_uuid,
        started_at,
        source: source.to_string(),
    })
}

pub fn insert_skill_summary(
    conn: &Connection,
    run: &SyncRun,
    player_id: &str,
    summary: &SkillSummary,
) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO skill_snapshots (
            run_id, player_id, skill_id, skill_name, category, level, experience
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;

    let mut inserted = 0;
    for skill in &summary.levels {
        stmt.execute(params![
            run.id,
            player_id,
            skill.skill_id,
            skill.name,
            skill.category.as_str(),
            skill.level,
            skill.experience as i64,
        ])?;
        inserted += 1;
    }

    // Re-recording the same player in one run replaces the totals
    conn.execute(
        "INSERT OR REPLACE INTO player_totals (
            run_id, player_id, username, total_level, total_exp
        ) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            run.id,
            player_id,
            summary.username,
            i64::try_from(summary.total_level).unwrap_or(i64::MAX),
            i64::try_from(summary.total_exp).unwrap_or(i64::MAX),
        ],
    )?;

    Ok(inserted)
}

pub fn insert_inventory(
    conn: &Connection,
    run: &SyncRun,
    player_id: &str,
    records: &[CanonicalItemRecord],
) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO inventory_snapshots (
            run_id, player_id, position, item_name, rarity, tag, tier, quantity,
            container_name, claim_name, region_id, container_id, kind, item_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
    )?;

    for (position, record) in records.iter().enumerate() {
        stmt.execute(params![
            run.id,
            player_id,
            position as i64,
            record.item_name,
            record.rarity,
            record.tag,
            record.tier,
            record.quantity as i64,
            record.container_name,
            record.claim_name,
            record.region_id,
            record.container_id,
            record.kind.as_str(),
            record.item_id,
        ])?;
    }

    Ok(records.len())
}

/// Snapshot one player's skills and ledger inside a single transaction.
///
/// Payloads come from the client cache when it is warm. Nothing is kept for
/// the player if any insert fails.
pub fn record_player<S: PlayerDataSource>(
    conn: &Connection,
    run: &SyncRun,
    client: &mut BitjitaClient<S>,
    player_id: &str,
    registry: &SkillRegistry,
    table: &LevelingTable,
) -> Result<()> {
    let summary = client
        .player(player_id)
        .and_then(|payload| summarize_player(&payload, registry, table));
    let report = aggregate_inventory(&client.collect_sources(player_id));

    let tx = conn.unchecked_transaction()?;
    if let Some(summary) = &summary {
        insert_skill_summary(&tx, run, player_id, summary)?;
    }
    insert_inventory(&tx, run, player_id, &report.records)?;
    tx.commit()?;

    Ok(())
}

/// Outcome of recording a batch of players
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordStats {
    pub recorded: usize,
    pub failed: Vec<String>,
}

/// Record every player; a failure is logged and the batch moves on
pub fn record_players<S: PlayerDataSource>(
    conn: &Connection,
    run: &SyncRun,
    client: &mut BitjitaClient<S>,
    player_ids: &[String],
    registry: &SkillRegistry,
    table: &LevelingTable,
) -> RecordStats {
    let mut stats = RecordStats::default();

    for player_id in player_ids {
        match record_player(conn, run, client, player_id, registry, table) {
            Ok(()) => stats.recorded += 1,
            Err(e) => {
                warn!(player_id = %player_id, "failed to record player: {:#}", e);
                stats.failed.push(player_id.clone());
            }
        }
    }

    info!(
        run = %run.run_uuid,
        recorded = stats.recorded,
        failed = stats.failed.len(),
        "recorded players"
    );
    stats
}

/// Ledger from the most recent run that recorded this player's inventory
pub fn latest_inventory(conn: &Connection, player_id: &str) -> Result<Vec<CanonicalItemRecord>> {
    let mut stmt = conn.prepare(
        "SELECT item_name, rarity, tag, tier, quantity, container_name,
                claim_name, region_id, container_id, kind, item_id
         FROM inventory_snapshots
         WHERE player_id = ?1
           AND run_id = (SELECT MAX(run_id) FROM inventory_snapshots WHERE player_id = ?1)
         ORDER BY position",
    )?;

    let records = stmt
        .query_map([player_id], |row| {
            let kind_str: String = row.get(9)?;
            let kind = ItemKind::parse(&kind_str).ok_or_else(|| {
                rusqlite::Error::InvalidColumnType(9, "kind".to_string(), rusqlite::types::Type::Text)
            })?;
            let quantity: i64 = row.get(4)?;

            Ok(CanonicalItemRecord {
                item_name: row.get(0)?,
                rarity: row.get(1)?,
                tag: row.get(2)?,
                tier: row.get(3)?,
                quantity: quantity.max(0) as u64,
                container_name: row.get(5)?,
                claim_name: row.get(6)?,
                region_id: row.get(7)?,
                container_id: row.get(8)?,
                kind,
                item_id: row.get(10)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

/// Skill summary from the most recent run that recorded this player's skills
pub fn latest_skill_summary(conn: &Connection, player_id: &str) -> Result<Option<SkillSummary>> {
    let totals = conn
        .query_row(
            "SELECT run_id, username, total_level, total_exp
             FROM player_totals
             WHERE player_id = ?1
             ORDER BY run_id DESC
             LIMIT 1",
            [player_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )
        .optional()?;

    let Some((run_id, username, total_level, total_exp)) = totals else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT skill_id, skill_name, category, level, experience
         FROM skill_snapshots
         WHERE player_id = ?1 AND run_id = ?2
         ORDER BY id",
    )?;

    let levels = stmt
        .query_map(params![player_id, run_id], |row| {
            let category: String = row.get(2)?;
            let experience: i64 = row.get(4)?;
            Ok(SkillLevel {
                skill_id: row.get(0)?,
                name: row.get(1)?,
                category: SkillCategory::parse(&category),
                level: row.get(3)?,
                experience: experience.max(0) as u64,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(SkillSummary {
        username,
        levels,
        total_level: total_level.max(0) as u64,
        total_exp: total_exp.max(0) as u64,
    }))
}

/// Every player with any snapshot, most recently seen first
pub fn list_players(conn: &Connection) -> Result<Vec<PlayerListing>> {
    let mut stmt = conn.prepare(
        "SELECT s.player_id, MAX(r.started_at) AS last_seen,
                (SELECT t.username FROM player_totals t
                 WHERE t.player_id = s.player_id ORDER BY t.run_id DESC LIMIT 1),
                (SELECT t.total_level FROM player_totals t
                 WHERE t.player_id = s.player_id ORDER BY t.run_id DESC LIMIT 1),
                (SELECT t.total_exp FROM player_totals t
                 WHERE t.player_id = s.player_id ORDER BY t.run_id DESC LIMIT 1)
         FROM (
            SELECT player_id, run_id FROM player_totals
            UNION
            SELECT player_id, run_id FROM inventory_snapshots
         ) s
         JOIN sync_runs r ON r.id = s.run_id
         GROUP BY s.player_id
         ORDER BY last_seen DESC, s.player_id",
    )?;

    let players = stmt
        .query_map([], |row| {
            Ok(PlayerListing {
                player_id: row.get(0)?,
                last_seen: row.get(1)?,
                username: row.get(2)?,
                total_level: row.get(3)?,
                total_exp: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(players)
}

pub fn count_runs(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM sync_runs", [], |row| row.get(0))?;

    Ok(count)
}
