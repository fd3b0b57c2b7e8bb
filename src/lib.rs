// Bitjita Sync - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod leveling;    // Leveling curve + level resolver
pub mod skills;      // Skill reference table
pub mod payloads;    // Wire shapes of the Bitjita API
pub mod normalizer;  // Source payloads → canonical item records
pub mod ledger;      // Merge ledger keyed by (item, kind, container)
pub mod aggregation; // Per-player driver
pub mod client;      // HTTP source + per-batch caches
pub mod workbook;    // CSV sheet sink
pub mod db;          // SQLite snapshot store
pub mod config;

// Re-export commonly used types
pub use leveling::{
    level_from_experience, threshold_for_level, LevelingError, LevelingTable, DEFAULT_MAX_LEVEL,
};
pub use skills::{Skill, SkillCategory, SkillRegistry};
pub use normalizer::{
    get_normalizer, normalize, CanonicalItemRecord, ItemCatalog, ItemKind, OrderSide, RawRecord,
    SourceKind, SourceNormalizer,
};
pub use ledger::{LedgerKey, LedgerStats, MergeLedger, MergeOutcome};
pub use aggregation::{
    aggregate_inventory, summarize_player, summarize_skills, InventoryReport, InventorySources,
    SkillLevel, SkillSummary,
};
pub use client::{BitjitaClient, FetchError, HttpSource, PlayerDataSource};
pub use workbook::{update_workbook, Sheet, SheetError, SheetKind, SheetOutcome, WorkbookReport};
pub use db::{
    begin_run, insert_inventory, insert_skill_summary, latest_inventory, latest_skill_summary,
    list_players, open_database, record_player, record_players, setup_database, PlayerListing,
    RecordStats, SyncRun,
};
pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
