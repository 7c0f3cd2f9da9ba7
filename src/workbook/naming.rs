//! Sheet-name derivation.
//!
//! Sheet names are limited in length. A key (type name, record field-type or
//! relationship identity) is truncated to the limit; when two keys truncate to
//! the same name, the later one gets a `~N` suffix. Every assignment is kept
//! as an alias so an importer can map a key back to its sheet.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Default maximum sheet-name length, in characters.
pub const DEFAULT_SHEET_NAME_LIMIT: usize = 31;

/// What a sheet holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetKind {
    /// One row per object of a type.
    Type,
    /// Field/value pairs of a site-wide singleton.
    Singleton,
    /// Record rows of a field type.
    Records,
    /// Source/target pairs of a relationship.
    Relationship,
}

/// Identity of a sheet before truncation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SheetKey {
    /// What the sheet holds.
    pub kind: SheetKind,
    /// Untruncated key.
    pub key: String,
}

impl SheetKey {
    /// Key of a type sheet.
    #[must_use]
    pub fn object_type(name: impl Into<String>) -> Self {
        Self {
            kind: SheetKind::Type,
            key: name.into(),
        }
    }

    /// Key of a singleton sheet.
    #[must_use]
    pub fn singleton(name: impl Into<String>) -> Self {
        Self {
            kind: SheetKind::Singleton,
            key: name.into(),
        }
    }

    /// Key of a record side-sheet.
    #[must_use]
    pub fn records(key: impl Into<String>) -> Self {
        Self {
            kind: SheetKind::Records,
            key: key.into(),
        }
    }

    /// Key of a relationship side-sheet.
    #[must_use]
    pub fn relationship(key: impl Into<String>) -> Self {
        Self {
            kind: SheetKind::Relationship,
            key: key.into(),
        }
    }
}

/// A persisted key → sheet-name mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetAlias {
    /// What the sheet holds.
    pub kind: SheetKind,
    /// Untruncated key.
    pub key: String,
    /// Assigned sheet name.
    pub sheet: String,
}

/// Outcome of a name assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Assigned sheet name.
    pub name: String,
    /// The truncated name that was already taken, if the key was renamed.
    pub collided_with: Option<String>,
}

/// Truncates to at most `limit` characters.
#[must_use]
pub fn truncate_name(name: &str, limit: usize) -> String {
    name.chars().take(limit).collect()
}

/// Assigns unique, length-limited sheet names.
#[derive(Debug, Clone)]
pub struct SheetNamer {
    limit: usize,
    used: HashSet<String>,
    assigned: HashMap<SheetKey, String>,
    aliases: Vec<SheetAlias>,
}

impl Default for SheetNamer {
    fn default() -> Self {
        Self::new(DEFAULT_SHEET_NAME_LIMIT)
    }
}

impl SheetNamer {
    /// Creates a namer with the given length limit.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            used: HashSet::new(),
            assigned: HashMap::new(),
            aliases: Vec::new(),
        }
    }

    /// Rebuilds a namer from persisted aliases.
    #[must_use]
    pub fn from_aliases(limit: usize, aliases: Vec<SheetAlias>) -> Self {
        let mut namer = Self::new(limit);
        for alias in &aliases {
            namer.used.insert(alias.sheet.clone());
            namer.assigned.insert(
                SheetKey {
                    kind: alias.kind,
                    key: alias.key.clone(),
                },
                alias.sheet.clone(),
            );
        }
        namer.aliases = aliases;
        namer
    }

    /// Returns the length limit.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the recorded aliases in assignment order.
    #[must_use]
    pub fn aliases(&self) -> &[SheetAlias] {
        &self.aliases
    }

    /// Returns the name already assigned to `key`, if any.
    #[must_use]
    pub fn lookup(&self, key: &SheetKey) -> Option<&str> {
        self.assigned.get(key).map(String::as_str)
    }

    /// Returns the name `key` maps to without assigning one.
    ///
    /// Falls back to the plain truncated key for workbooks without aliases.
    #[must_use]
    pub fn resolve(&self, key: &SheetKey) -> String {
        self.lookup(key)
            .map_or_else(|| truncate_name(&key.key, self.limit), str::to_string)
    }

    /// Assigns a name to `key`, or returns the one assigned before.
    pub fn assign(&mut self, key: &SheetKey) -> Assignment {
        if let Some(name) = self.assigned.get(key) {
            return Assignment {
                name: name.clone(),
                collided_with: None,
            };
        }

        let base = truncate_name(&key.key, self.limit);
        let (name, collided_with) = if self.used.contains(&base) {
            (self.disambiguate(&key.key), Some(base))
        } else {
            (base, None)
        };

        self.used.insert(name.clone());
        self.assigned.insert(key.clone(), name.clone());
        self.aliases.push(SheetAlias {
            kind: key.kind,
            key: key.key.clone(),
            sheet: name.clone(),
        });
        Assignment {
            name,
            collided_with,
        }
    }

    fn disambiguate(&self, key: &str) -> String {
        let mut n = 1_usize;
        loop {
            let suffix = format!("~{n}");
            let room = self.limit.saturating_sub(suffix.chars().count());
            let candidate = format!("{}{suffix}", truncate_name(key, room));
            if !self.used.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}
