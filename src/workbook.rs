// 📒 Workbook Sink
// A directory of CSV sheets, updated in place
//
// Sheet layouts:
// - Inventory:   A1 = "player_username", B1 = username, row 2 = headers, rows 3.. = ledger
// - Stat levels: row 1 = headers (D1 = "Total Exp"), one player per row, A = username, B = player id

use crate::aggregation::{aggregate_inventory, summarize_player};
use crate::client::{BitjitaClient, PlayerDataSource};
use crate::leveling::LevelingTable;
use crate::normalizer::CanonicalItemRecord;
use crate::skills::SkillRegistry;
use csv::{ReaderBuilder, WriterBuilder};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

pub const INVENTORY_MARKER: &str = "player_username";
pub const STAT_LEVELS_MARKER: &str = "Total Exp";

pub const INVENTORY_HEADERS: [&str; 10] = [
    "Item Name",
    "Rarity",
    "Tag",
    "Tier",
    "Quantity",
    "Inventory Name",
    "Claim Name",
    "Claim Region",
    "Inventory ID",
    "Item Type",
];

const COL_PLAYER_NAME: &str = "Player Name";
const COL_PLAYER_ID: &str = "Player ID";
const COL_TOTAL_LVL: &str = "Total Lvl";
const COL_TOTAL_EXP: &str = "Total Exp";

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown sheet kind: {0}")]
    UnknownKind(String),
}

// ============================================================================
// SHEET KIND
// ============================================================================

/// Which update routine a sheet gets. Chosen by the caller, never inside the runners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    Inventory,
    StatLevels,
}

impl SheetKind {
    /// Header-cell routing: A1 marks inventory sheets, D1 marks stat sheets
    pub fn detect(a1: &str, d1: &str) -> Option<SheetKind> {
        if a1.trim() == INVENTORY_MARKER {
            Some(SheetKind::Inventory)
        } else if d1.trim() == STAT_LEVELS_MARKER {
            Some(SheetKind::StatLevels)
        } else {
            None
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SheetKind::Inventory => "inventory",
            SheetKind::StatLevels => "stat-levels",
        }
    }
}

impl FromStr for SheetKind {
    type Err = SheetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inventory" => Ok(SheetKind::Inventory),
            "stat-levels" | "stats" | "levels" => Ok(SheetKind::StatLevels),
            other => Err(SheetError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for SheetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// SHEET GRID
// ============================================================================

/// A CSV file as a grid of cells (0-based row/column)
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub path: PathBuf,
    rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(path: &Path) -> Self {
        Sheet {
            path: path.to_path_buf(),
            rows: Vec::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, SheetError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|source| SheetError::Csv {
                path: path.to_path_buf(),
                source,
            })?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|source| SheetError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Sheet {
            path: path.to_path_buf(),
            rows,
        })
    }

    /// Write back, padding rows to a rectangle
    pub fn save(&self) -> Result<(), SheetError> {
        let width = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        let csv_error = |source| SheetError::Csv {
            path: self.path.clone(),
            source,
        };

        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_path(&self.path)
            .map_err(csv_error)?;

        for row in &self.rows {
            let mut padded = row.clone();
            padded.resize(width, String::new());
            writer.write_record(&padded).map_err(csv_error)?;
        }

        writer.flush().map_err(|source| SheetError::Io {
            path: self.path.clone(),
            source,
        })
    }

    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("sheet")
            .to_string()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn set(&mut self, row: usize, col: usize, value: impl Into<String>) {
        if self.rows.len() <= row {
            self.rows.resize(row + 1, Vec::new());
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, String::new());
        }
        cells[col] = value.into();
    }

    pub fn row(&self, row: usize) -> &[String] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Blank columns `0..width` from `from_row` down; cells further right stay
    pub fn clear_columns(&mut self, from_row: usize, width: usize) {
        for cells in self.rows.iter_mut().skip(from_row) {
            for cell in cells.iter_mut().take(width) {
                cell.clear();
            }
        }
        self.trim_empty_rows();
    }

    /// Drop trailing rows with no content
    pub fn trim_empty_rows(&mut self) {
        while self
            .rows
            .last()
            .is_some_and(|cells| cells.iter().all(|c| c.is_empty()))
        {
            self.rows.pop();
        }
    }

    pub fn detect_kind(&self) -> Option<SheetKind> {
        SheetKind::detect(self.cell(0, 0), self.cell(0, 3))
    }
}

// ============================================================================
// SHEET RUNNERS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetOutcome {
    /// `players` lists the player ids whose data went into the sheet
    Updated { rows: usize, players: Vec<String> },
    Skipped { reason: String },
}

fn inventory_row(record: &CanonicalItemRecord) -> Vec<String> {
    vec![
        record.item_name.clone(),
        record.rarity.clone(),
        record.tag.clone(),
        record.tier.map(|t| t.to_string()).unwrap_or_default(),
        record.quantity.to_string(),
        record.container_name.clone(),
        record.claim_name.clone(),
        record.region_id.clone(),
        record.container_id.clone(),
        record.kind.to_string(),
    ]
}

/// Replace an inventory sheet's ledger with a fresh aggregation for the
/// username in B1.
pub fn update_inventory_sheet<S: PlayerDataSource>(
    sheet: &mut Sheet,
    client: &mut BitjitaClient<S>,
) -> SheetOutcome {
    let username = sheet.cell(0, 1).trim().to_string();
    if username.is_empty() {
        warn!("⚠️ No username found in B1 of {}", sheet.name());
        return SheetOutcome::Skipped {
            reason: "no username in B1".to_string(),
        };
    }

    let Some(player_id) = client.resolve_player_id(&username) else {
        return SheetOutcome::Skipped {
            reason: format!("no player found for {}", username),
        };
    };

    let sources = client.collect_sources(&player_id);
    let report = aggregate_inventory(&sources);

    sheet.clear_columns(2, INVENTORY_HEADERS.len());
    for (col, header) in INVENTORY_HEADERS.iter().enumerate() {
        sheet.set(1, col, *header);
    }
    for (i, record) in report.records.iter().enumerate() {
        for (col, value) in inventory_row(record).into_iter().enumerate() {
            sheet.set(i + 2, col, value);
        }
    }

    info!("✅ Updated sheet: {} with {} rows", sheet.name(), report.records.len());
    SheetOutcome::Updated {
        rows: report.records.len(),
        players: vec![player_id],
    }
}

/// Fill player ids, per-skill levels and totals on a stat sheet.
///
/// Only columns whose header names a skill (or a shorthand for one) are
/// written, but every known skill counts toward the totals.
pub fn update_stat_levels_sheet<S: PlayerDataSource>(
    sheet: &mut Sheet,
    client: &mut BitjitaClient<S>,
    registry: &SkillRegistry,
    table: &LevelingTable,
) -> SheetOutcome {
    let mut columns: HashMap<String, usize> = HashMap::new();
    let mut skill_columns: HashMap<u32, usize> = HashMap::new();

    for (col, header) in sheet.row(0).iter().enumerate() {
        let header = header.trim();
        if header.is_empty() {
            continue;
        }
        columns.insert(header.to_string(), col);
        if let Some(skill) = registry.find_by_name(header) {
            skill_columns.insert(skill.id, col);
        }
    }

    // Resolve missing player ids from the usernames in column A
    for row in 1..sheet.row_count() {
        let username = sheet.cell(row, 0).trim().to_string();
        let existing = sheet.cell(row, 1).trim();
        if !username.is_empty() && existing.is_empty() {
            if let Some(player_id) = client.resolve_player_id(&username) {
                sheet.set(row, 1, player_id);
            }
        }
    }

    let mut players = Vec::new();
    for row in 1..sheet.row_count() {
        let player_id = sheet.cell(row, 1).trim().to_string();
        if player_id.is_empty() {
            continue;
        }

        let Some(payload) = client.player(&player_id) else {
            continue;
        };
        let Some(summary) = summarize_player(&payload, registry, table) else {
            warn!("no player record for {}, leaving row {} untouched", player_id, row + 1);
            continue;
        };

        if let (Some(&col), Some(name)) = (columns.get(COL_PLAYER_NAME), &summary.username) {
            sheet.set(row, col, name.clone());
        }
        if let Some(&col) = columns.get(COL_PLAYER_ID) {
            sheet.set(row, col, player_id.clone());
        }
        for skill in &summary.levels {
            if let Some(&col) = skill_columns.get(&skill.skill_id) {
                sheet.set(row, col, skill.level.to_string());
            }
        }
        if let Some(&col) = columns.get(COL_TOTAL_EXP) {
            sheet.set(row, col, summary.total_exp.to_string());
        }
        if let Some(&col) = columns.get(COL_TOTAL_LVL) {
            sheet.set(row, col, summary.total_level.to_string());
        }

        players.push(player_id);
    }

    info!("✅ Updated sheet: {} with {} players", sheet.name(), players.len());
    SheetOutcome::Updated {
        rows: players.len(),
        players,
    }
}

/// Run the routine for `kind` on `sheet`
pub fn run_sheet<S: PlayerDataSource>(
    sheet: &mut Sheet,
    kind: SheetKind,
    client: &mut BitjitaClient<S>,
    registry: &SkillRegistry,
    table: &LevelingTable,
) -> SheetOutcome {
    match kind {
        SheetKind::Inventory => update_inventory_sheet(sheet, client),
        SheetKind::StatLevels => update_stat_levels_sheet(sheet, client, registry, table),
    }
}

// ============================================================================
// WORKBOOK
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkbookReport {
    pub updated: Vec<(String, SheetKind, usize)>,
    pub skipped: Vec<(String, String)>,
    /// Every player id written anywhere, first-seen order
    pub players: Vec<String>,
}

/// Every `.csv` file in `dir`, sorted by name
pub fn list_sheets(dir: &Path) -> Result<Vec<PathBuf>, SheetError> {
    let entries = fs::read_dir(dir).map_err(|source| SheetError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .collect();

    paths.sort();
    Ok(paths)
}

/// Update every recognizable sheet in `dir`.
///
/// Starts a new batch (cache cleared once). A sheet that fails to load, is
/// unrecognized, or has no data is recorded as skipped; the rest continue.
pub fn update_workbook<S: PlayerDataSource>(
    dir: &Path,
    client: &mut BitjitaClient<S>,
    registry: &SkillRegistry,
    table: &LevelingTable,
) -> Result<WorkbookReport, SheetError> {
    client.clear_cache();

    let paths = list_sheets(dir)?;
    info!("Starting update for {} sheets", paths.len());

    let mut report = WorkbookReport::default();

    for path in paths {
        let mut sheet = match Sheet::load(&path) {
            Ok(sheet) => sheet,
            Err(e) => {
                warn!("{}", e);
                report.skipped.push((path.display().to_string(), e.to_string()));
                continue;
            }
        };
        let name = sheet.name();

        let Some(kind) = sheet.detect_kind() else {
            info!(
                "Could not determine which process to use for sheet {} ({:?} / {:?})",
                name,
                sheet.cell(0, 0),
                sheet.cell(0, 3)
            );
            report.skipped.push((name, "unrecognized layout".to_string()));
            continue;
        };

        info!("Sheet {} is a {} sheet", name, kind);
        match run_sheet(&mut sheet, kind, client, registry, table) {
            SheetOutcome::Updated { rows, players } => {
                if let Err(e) = sheet.save() {
                    warn!("{}", e);
                    report.skipped.push((name, e.to_string()));
                    continue;
                }
                report.updated.push((name, kind, rows));
                for player_id in players {
                    if !report.players.contains(&player_id) {
                        report.players.push(player_id);
                    }
                }
            }
            SheetOutcome::Skipped { reason } => report.skipped.push((name, reason)),
        }
    }

    Ok(report)
}

/// Export a flattened ledger with every column, including item ids
pub fn write_inventory_csv(path: &Path, records: &[CanonicalItemRecord]) -> Result<(), SheetError> {
    let csv_error = |source| SheetError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = WriterBuilder::new().from_path(path).map_err(csv_error)?;
    for record in records {
        writer.serialize(record).map_err(csv_error)?;
    }
    writer.flush().map_err(|source| SheetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ============================================================================
// TESTS
// ============================================================================
