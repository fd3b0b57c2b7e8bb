// 🛠️ Skill Reference Table
// Static id → name/title/category data, loaded once, read-only afterwards
//
// Sheets may use shorthand column headers ("Leatherwork", "Merchant"), so the
// registry also resolves aliases to the canonical skill name.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

// ============================================================================
// SKILL CATEGORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkillCategory {
    Profession,
    Adventure,
    None,
}

impl SkillCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillCategory::Profession => "Profession",
            SkillCategory::Adventure => "Adventure",
            SkillCategory::None => "None",
        }
    }

    /// Inverse of `as_str`; anything unrecognized is `None`
    pub fn parse(s: &str) -> SkillCategory {
        match s {
            "Profession" => SkillCategory::Profession,
            "Adventure" => SkillCategory::Adventure,
            _ => SkillCategory::None,
        }
    }
}

// ============================================================================
// SKILL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "skillCategoryStr", alias = "category")]
    pub category: SkillCategory,
}

impl Skill {
    pub fn new(id: u32, name: &str, title: &str, category: SkillCategory) -> Self {
        Skill {
            id,
            name: name.to_string(),
            title: title.to_string(),
            category,
        }
    }
}

// ============================================================================
// SKILL REGISTRY
// ============================================================================

/// Lookup table for skills by id and by (case-insensitive) name or alias
#[derive(Debug, Clone)]
pub struct SkillRegistry {
    // BTreeMap keeps id order for column layouts and reports
    skills: BTreeMap<u32, Skill>,
    aliases: HashMap<String, u32>,
}

impl SkillRegistry {
    /// Registry with the built-in skill list
    pub fn new() -> Self {
        let mut registry = SkillRegistry::empty();
        registry.register_default_skills();
        registry
    }

    pub fn empty() -> Self {
        SkillRegistry {
            skills: BTreeMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Load a skill list from a JSON file.
    ///
    /// Accepts either an array of skills or an object keyed by id, which is
    /// the shape the game API publishes.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read skills file: {}", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("Failed to parse skills file: {}", path.display()))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum SkillList {
            List(Vec<Skill>),
            Keyed(HashMap<String, Skill>),
        }

        let skills: Vec<Skill> = match serde_json::from_str(content)? {
            SkillList::List(list) => list,
            SkillList::Keyed(map) => map.into_values().collect(),
        };

        let mut registry = SkillRegistry::empty();
        for skill in skills {
            registry.register(skill);
        }
        registry.register_default_aliases();
        Ok(registry)
    }

    fn register_default_skills(&mut self) {
        use SkillCategory::{Adventure, Profession};

        let defaults = [
            (1, "ANY", "", SkillCategory::None),
            (2, "Forestry", "Forester", Profession),
            (3, "Carpentry", "Carpenter", Profession),
            (4, "Masonry", "Mason", Profession),
            (5, "Mining", "Miner", Profession),
            (6, "Smithing", "Smith", Profession),
            (7, "Scholar", "Scholar", Profession),
            (8, "Leatherworking", "Leatherworker", Profession),
            (9, "Hunting", "Hunter", Profession),
            (10, "Tailoring", "Tailor", Profession),
            (11, "Farming", "Farmer", Profession),
            (12, "Fishing", "Fisher", Profession),
            (13, "Cooking", "Cook", Adventure),
            (14, "Foraging", "Forager", Profession),
            (15, "Construction", "Builder", Adventure),
            (17, "Taming", "Tamer", Adventure),
            (18, "Slayer", "Slayer", Adventure),
            (19, "Merchanting", "Merchant", Adventure),
            (21, "Sailing", "Sailor", Adventure),
        ];

        for (id, name, title, category) in defaults {
            self.register(Skill::new(id, name, title, category));
        }

        self.register_default_aliases();
    }

    fn register_default_aliases(&mut self) {
        self.add_alias("Leatherwork", "Leatherworking");
        self.add_alias("Merchant", "Merchanting");
    }

    /// Add or replace a skill
    pub fn register(&mut self, skill: Skill) {
        self.aliases.insert(skill.name.to_lowercase(), skill.id);
        self.skills.insert(skill.id, skill);
    }

    /// Map `alias` to an already registered skill name. Unknown targets are ignored.
    pub fn add_alias(&mut self, alias: &str, skill_name: &str) {
        if let Some(id) = self.aliases.get(&skill_name.to_lowercase()).copied() {
            self.aliases.insert(alias.to_lowercase(), id);
        }
    }

    pub fn get(&self, id: u32) -> Option<&Skill> {
        self.skills.get(&id)
    }

    /// Find by canonical name or alias, ignoring case and surrounding spaces
    pub fn find_by_name(&self, name: &str) -> Option<&Skill> {
        let id = self.aliases.get(&name.trim().to_lowercase())?;
        self.skills.get(id)
    }

    /// All skills in id order
    pub fn all(&self) -> impl Iterator<Item = &Skill> {
        self.skills.values()
    }

    pub fn count(&self) -> usize {
        self.skills.len()
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
