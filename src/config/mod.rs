//! Configuration management.

use serde::Deserialize;
use std::path::Path;

use crate::archive::DEFAULT_COMPRESSION_LEVEL;
use crate::codec::EnrichmentHook;
use crate::resolve::DEFAULT_CACHE_CAPACITY;
use crate::workbook::DEFAULT_SHEET_NAME_LIMIT;

/// Object types transcoded by default, in import order.
///
/// Referenced types come before the types that point at them where the
/// dependency is one-way; everything else is settled by the finalization pass.
pub const DEFAULT_TYPES: &[&str] = &[
    "Client",
    "Contact",
    "ARPriority",
    "AnalysisProfile",
    "ARTemplate",
    "AnalysisCategory",
    "AnalysisService",
    "AnalysisSpec",
    "AttachmentType",
    "BatchLabel",
    "Calculation",
    "Container",
    "ContainerType",
    "Department",
    "Instrument",
    "InstrumentCalibration",
    "InstrumentCertification",
    "InstrumentMaintenanceTask",
    "InstrumentScheduledTask",
    "InstrumentType",
    "InstrumentValidation",
    "LabContact",
    "LabProduct",
    "Manufacturer",
    "Method",
    "Preservation",
    "ReferenceDefinition",
    "SampleCondition",
    "SampleMatrix",
    "StorageLocation",
    "SamplePoint",
    "SampleType",
    "SamplingDeviation",
    "SRTemplate",
    "SubGroup",
    "Supplier",
    "SupplierContact",
    "WorksheetTemplate",
];

/// Metadata fields never transcoded.
pub const DEFAULT_IGNORE_FIELDS: &[&str] = &[
    "constrainTypesMode",
    "locallyAllowedTypes",
    "immediatelyAddableTypes",
    "subject",
    "relatedItems",
    "location",
    "language",
    "effectiveDate",
    "modification_date",
    "expirationDate",
    "creators",
    "contributors",
    "rights",
    "allowDiscussion",
    "excludeFromNav",
    "nextPreviousEnabled",
];

/// Default workbook entry name inside the archive.
pub const DEFAULT_WORKBOOK_FILE: &str = "setupdata.json";

/// Default acting user.
pub const DEFAULT_ACTOR: &str = "admin";

/// A site-wide object written as a two-column sheet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SingletonSheet {
    /// Sheet key.
    pub sheet: String,
    /// Object type.
    pub type_name: String,
    /// Object path.
    pub path: String,
}

impl SingletonSheet {
    /// Creates a singleton entry.
    #[must_use]
    pub fn new(
        sheet: impl Into<String>,
        type_name: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            sheet: sheet.into(),
            type_name: type_name.into(),
            path: path.into(),
        }
    }

    /// The laboratory and setup singletons.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("Laboratory", "Laboratory", "/bika_setup/laboratory"),
            Self::new("BikaSetup", "BikaSetup", "/bika_setup"),
        ]
    }
}

/// Logging settings as written in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoggingSettings {
    /// Default level or filter directive (e.g. `info`, `labsheet=debug`).
    pub level: Option<String>,
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Log file path; stderr when unset.
    pub file: Option<String>,
}

/// Main configuration for labsheet.
#[derive(Debug, Clone)]
pub struct LabsheetConfig {
    /// Exported types, in import order.
    pub types: Vec<String>,
    /// Singleton sheets, exported and imported before the types.
    pub singletons: Vec<SingletonSheet>,
    /// Field names never transcoded.
    pub ignore_fields: Vec<String>,
    /// Maximum sheet name length.
    pub sheet_name_limit: usize,
    /// Workbook entry name inside the archive.
    pub workbook_file: String,
    /// zstd compression level for archives.
    pub compression_level: i32,
    /// Capacity of the reference lookup cache.
    pub resolve_cache_capacity: usize,
    /// Enrichment hooks for record side-sheets.
    pub hooks: Vec<EnrichmentHook>,
    /// Acting user recorded on each run.
    pub actor: String,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Exported types.
    pub types: Option<Vec<String>>,
    /// Singleton sheets.
    pub singletons: Option<Vec<SingletonSheet>>,
    /// Ignored fields.
    pub ignore_fields: Option<Vec<String>>,
    /// Sheet name limit.
    pub sheet_name_limit: Option<usize>,
    /// Workbook file name.
    pub workbook_file: Option<String>,
    /// Compression level.
    pub compression_level: Option<i32>,
    /// Resolver cache capacity.
    pub resolve_cache_capacity: Option<usize>,
    /// Enrichment hooks; replaces the defaults when present.
    pub hooks: Option<Vec<EnrichmentHook>>,
    /// Acting user.
    pub actor: Option<String>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
}

impl Default for LabsheetConfig {
    fn default() -> Self {
        Self {
            types: DEFAULT_TYPES.iter().map(ToString::to_string).collect(),
            singletons: SingletonSheet::defaults(),
            ignore_fields: DEFAULT_IGNORE_FIELDS.iter().map(ToString::to_string).collect(),
            sheet_name_limit: DEFAULT_SHEET_NAME_LIMIT,
            workbook_file: DEFAULT_WORKBOOK_FILE.to_string(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            resolve_cache_capacity: DEFAULT_CACHE_CAPACITY,
            hooks: EnrichmentHook::defaults(),
            actor: DEFAULT_ACTOR.to_string(),
            logging: LoggingSettings::default(),
        }
    }
}

impl LabsheetConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or holds invalid
    /// values.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::operation("read_config_file", e))?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or holds invalid values.
    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::operation("parse_config_file", e))?;
        let config = Self::from_config_file(file);
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/labsheet/` on macOS)
    /// 2. XDG config dir (`~/.config/labsheet/` for Unix compatibility)
    ///
    /// Returns default configuration if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let platform_config = base_dirs.config_dir().join("labsheet").join("config.toml");
        if platform_config.exists()
            && let Ok(config) = Self::load_from_file(&platform_config)
        {
            return config;
        }

        let xdg_config = base_dirs
            .home_dir()
            .join(".config")
            .join("labsheet")
            .join("config.toml");
        if xdg_config.exists()
            && let Ok(config) = Self::load_from_file(&xdg_config)
        {
            return config;
        }

        Self::default()
    }

    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(types) = file.types {
            config.types = types;
        }
        if let Some(singletons) = file.singletons {
            config.singletons = singletons;
        }
        if let Some(ignore_fields) = file.ignore_fields {
            config.ignore_fields = ignore_fields;
        }
        if let Some(limit) = file.sheet_name_limit {
            config.sheet_name_limit = limit;
        }
        if let Some(workbook_file) = file.workbook_file {
            config.workbook_file = workbook_file;
        }
        if let Some(level) = file.compression_level {
            config.compression_level = level;
        }
        if let Some(capacity) = file.resolve_cache_capacity {
            config.resolve_cache_capacity = capacity;
        }
        if let Some(hooks) = file.hooks {
            config.hooks = hooks;
        }
        if let Some(actor) = file.actor {
            config.actor = actor;
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }

        config
    }

    /// Checks values that would make a run misbehave.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] describing the first bad value.
    pub fn validate(&self) -> crate::Result<()> {
        // `~N` suffixes need room next to at least one name character.
        if self.sheet_name_limit < 4 {
            return Err(crate::Error::InvalidInput(format!(
                "sheet_name_limit must be at least 4, got {}",
                self.sheet_name_limit
            )));
        }
        if !crate::io::is_safe_filename(&self.workbook_file) {
            return Err(crate::Error::InvalidInput(format!(
                "workbook_file '{}' is not a plain file name",
                self.workbook_file
            )));
        }
        let reserved = [crate::codec::ID_COLUMN, crate::codec::FIELD_COLUMN];
        if let Some(hook) = self
            .hooks
            .iter()
            .find(|h| reserved.contains(&h.label_column.as_str()))
        {
            return Err(crate::Error::InvalidInput(format!(
                "hook label column '{}' is reserved",
                hook.label_column
            )));
        }
        Ok(())
    }

    /// Sets the acting user.
    #[must_use]
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    /// Sets the exported types.
    #[must_use]
    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }
}
