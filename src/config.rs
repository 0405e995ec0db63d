use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::discount::{DiscountRule, DiscountRuleTable};
use crate::types::SourceId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub narrative: NarrativeConfig,
    #[serde(default)]
    pub discounts: DiscountsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_source_timeout_secs")]
    pub source_timeout_secs: u64,
    #[serde(default = "default_guests")]
    pub default_guests: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_sources_enabled")]
    pub enabled: Vec<String>,
    #[serde(default)]
    pub catalog_urls: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeConfig {
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default = "default_narrative_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscountsConfig {
    #[serde(default)]
    pub rules: Vec<RuleOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleOverride {
    pub source: String,
    pub code: String,
    pub fraction: f64,
    #[serde(default)]
    pub brands: Option<Vec<String>>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub enabled_sources: Option<Vec<String>>,
    pub db_path: Option<String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/rate-oracle/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(sources) = overrides.enabled_sources {
            self.sources.enabled = sources;
        }
        if let Some(db_path) = overrides.db_path {
            self.storage.db_path = db_path;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.search.source_timeout_secs.max(1))
    }

    /// Enabled sources in registration order. Repeats are dropped and
    /// unknown names are an error.
    pub fn selected_sources(&self) -> Result<Vec<SourceId>> {
        if self.sources.enabled.is_empty() {
            return Ok(SourceId::BUILTIN.to_vec());
        }
        let mut out: Vec<SourceId> = Vec::new();
        for entry in &self.sources.enabled {
            let id = SourceId::from_str(entry)?;
            if !out.contains(&id) {
                out.push(id);
            }
        }
        Ok(out)
    }

    /// Built-in rule tables with `[[discounts.rules]]` layered on top.
    pub fn rule_table(&self) -> Result<DiscountRuleTable> {
        let mut table = DiscountRuleTable::with_defaults();
        for entry in &self.discounts.rules {
            let source = SourceId::from_str(&entry.source)
                .with_context(|| format!("discount rule {} names an unknown source", entry.code))?;
            let mut rule = DiscountRule::new(entry.code.clone(), entry.fraction)?;
            if let Some(brands) = &entry.brands {
                rule = rule.restricted_to(brands.iter().cloned());
            }
            if let Some(label) = &entry.label {
                rule = rule.labelled(label.clone());
            }
            if table.insert(source.clone(), rule).is_some() {
                warn!(source = %source, code = %entry.code, "config overrides built-in discount rule");
            }
        }
        Ok(table)
    }

    pub fn default_template() -> String {
        let template = r#"[search]
# a source slower than this is reported as timed out
source_timeout_secs = 10
default_guests = 1

[sources]
enabled = ["hilton", "marriott"]

# Point a source at a JSON hotel catalog instead of its built-in list.
[sources.catalog_urls]
# hilton = "https://example.com/catalogs/hilton.json"

[storage]
db_path = "~/.local/share/rate-oracle/rates.db"

[narrative]
# empty = built-in template summary only
webhook_url = ""
timeout_secs = 15

# Extra or overriding discount rules.
# [[discounts.rules]]
# source = "hilton"
# code = "0001398"
# fraction = 0.15
# brands = ["Hilton Garden Inn"]
# label = "GE"
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            source_timeout_secs: default_source_timeout_secs(),
            default_guests: default_guests(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            enabled: default_sources_enabled(),
            catalog_urls: BTreeMap::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            timeout_secs: default_narrative_timeout_secs(),
        }
    }
}

fn default_source_timeout_secs() -> u64 {
    10
}

fn default_guests() -> u32 {
    1
}

fn default_sources_enabled() -> Vec<String> {
    vec!["hilton".to_string(), "marriott".to_string()]
}

fn default_db_path() -> String {
    "~/.local/share/rate-oracle/rates.db".to_string()
}

fn default_narrative_timeout_secs() -> u64 {
    15
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use crate::config::{Config, ConfigOverrides};
    use crate::types::SourceId;

    #[test]
    fn template_parses_to_defaults() {
        let parsed: Config = toml::from_str(&Config::default_template()).expect("template");
        assert_eq!(parsed.search.source_timeout_secs, 10);
        assert_eq!(parsed.narrative.timeout_secs, 15);
        assert!(parsed.sources.catalog_urls.is_empty());
        assert_eq!(
            parsed.selected_sources().expect("sources"),
            vec![SourceId::Hilton, SourceId::Marriott]
        );
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().expect("tempdir");
        let config = Config::load(Some(&dir.path().join("absent.toml"))).expect("load");
        assert_eq!(config.sources.enabled, vec!["hilton", "marriott"]);
        assert!(config.storage.db_path.ends_with("rates.db"));
    }

    #[test]
    fn write_template_then_load() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("cfg/config.toml");
        Config::write_template(&path).expect("write");
        let config = Config::load(Some(&path)).expect("load");
        assert_eq!(config.search.default_guests, 1);
    }

    #[test]
    fn overrides_and_selection_order() {
        let mut config = Config::default();
        config.apply_overrides(ConfigOverrides {
            enabled_sources: Some(vec![
                "marriott".to_string(),
                "hilton".to_string(),
                "Marriott".to_string(),
            ]),
            db_path: None,
        });
        assert_eq!(
            config.selected_sources().expect("sources"),
            vec![SourceId::Marriott, SourceId::Hilton]
        );

        config.sources.enabled = vec!["hyatt".to_string()];
        assert!(config.selected_sources().is_err());
    }

    #[test]
    fn rule_overrides_replace_builtins() {
        let config: Config = toml::from_str(
            r#"
[[discounts.rules]]
source = "marriott"
code = "N9880578"
fraction = 0.05
brands = ["W Hotels"]

[[discounts.rules]]
source = "hilton"
code = "0001398"
fraction = 0.2
"#,
        )
        .expect("parse");
        let table = config.rule_table().expect("table");
        assert_eq!(
            table.resolve(&SourceId::Marriott, "W Hotels", "N9880578"),
            Some(0.05)
        );
        assert_eq!(
            table.resolve(&SourceId::Marriott, "Aloft Hotels", "N9880578"),
            None
        );
        assert_eq!(
            table.resolve(&SourceId::Hilton, "Hampton by Hilton", "0001398"),
            Some(0.2)
        );

        let bad: Config = toml::from_str(
            r#"
[[discounts.rules]]
source = "hilton"
code = "X"
fraction = 1.5
"#,
        )
        .expect("parse");
        assert!(bad.rule_table().is_err());
    }
}
