//! Helm settings file and the `key = value` block reader shared by mode and
//! behavior declarations.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    behavior::{BehaviorFactory, BehaviorSet},
    domain::DecisionDomain,
    error::HelmError,
    modes::ModeSet,
};

/// One behavior declaration: registered kind plus its parameter text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorBlock {
    /// Registered behavior kind, e.g. `waypoint`.
    pub kind: String,
    /// Newline-separated `key = value` parameters.
    #[serde(default)]
    pub params: String,
}

/// Settings document loaded at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelmSettings {
    /// Decision domain entries, `name:low:high:count[:optional]`.
    pub domain: Vec<String>,
    /// JSON-lines telemetry log, relative paths resolved against the file.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    /// Backlog of the in-memory decision event bus.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Mode declaration blocks, evaluated in order.
    #[serde(default)]
    pub modes: Vec<String>,
    /// Behavior declarations.
    #[serde(default)]
    pub behaviors: Vec<BehaviorBlock>,
    /// Whether cycles may run before the override variable is first set.
    #[serde(default = "default_start_in_control")]
    pub start_in_control: bool,
    /// Text variable handing control to the helm when set to `false`.
    #[serde(default = "default_override_var")]
    pub override_var: String,
}

const fn default_event_capacity() -> usize {
    256
}

const fn default_start_in_control() -> bool {
    true
}

fn default_override_var() -> String {
    "MANUAL_OVERRIDE".to_string()
}

impl Default for HelmSettings {
    fn default() -> Self {
        Self {
            domain: Vec::new(),
            log_path: None,
            event_capacity: default_event_capacity(),
            modes: Vec::new(),
            behaviors: Vec::new(),
            start_in_control: default_start_in_control(),
            override_var: default_override_var(),
        }
    }
}

impl HelmSettings {
    /// Loads settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading helm settings {}", path.display()))?;
        let mut settings =
            Self::from_toml(&raw).with_context(|| format!("parsing {}", path.display()))?;
        let source_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        if let Some(log_path) = settings.log_path.as_mut() {
            if log_path.is_relative() {
                *log_path = source_dir.join(&*log_path);
            }
        }
        Ok(settings)
    }

    /// Parses settings from TOML text.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let mut settings: Self = toml::from_str(raw).context("decoding helm settings")?;
        if settings.event_capacity == 0 {
            settings.event_capacity = default_event_capacity();
        }
        Ok(settings)
    }

    /// Builds the decision domain.
    pub fn build_domain(&self) -> Result<DecisionDomain, HelmError> {
        let domain = DecisionDomain::parse(&self.domain)?;
        if domain.is_empty() {
            return Err(HelmError::Domain("no axes declared".into()));
        }
        Ok(domain)
    }

    /// Builds the mode set; any malformed block rejects the whole set.
    pub fn build_modes(&self) -> Result<ModeSet, HelmError> {
        let mut modes = ModeSet::new();
        for block in &self.modes {
            modes.add_declaration(block)?;
        }
        Ok(modes)
    }

    /// Builds every declared behavior through the factory.
    pub fn build_behaviors(&self, factory: &BehaviorFactory) -> Result<BehaviorSet, HelmError> {
        let mut set = BehaviorSet::new();
        for block in &self.behaviors {
            set.add(factory.build(&block.kind, &block.params)?)?;
        }
        Ok(set)
    }
}

/// Splits declaration text into trimmed `(key, value)` pairs. Keys are
/// lowercased; values keep their case. Blank lines and `#` or `//` comments
/// are skipped. Only the first `=` separates, so values may hold conditions.
pub fn parse_assignments(text: &str) -> Result<Vec<(String, String)>, HelmError> {
    let mut pairs = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| HelmError::Block(format!("expected `key = value`, got `{line}`")))?;
        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() {
            return Err(HelmError::Block(format!("missing key in `{line}`")));
        }
        pairs.push((key, value.trim().to_string()));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use tempfile::tempdir;

    const SETTINGS: &str = r#"
domain = ["course:0:359:360", "speed:0:5:51"]
log_path = "helm.log"

modes = ["""
var = MODE
value = TRANSIT
condition = DEPLOY = true
elsevalue = PARKED
"""]

[[behaviors]]
kind = "constant_speed"
params = """
name = cruise
speed = 2.5
condition = MODE = TRANSIT
"""
"#;

    #[test]
    fn assignments_keep_later_equals_in_value() {
        let pairs = parse_assignments("# note\n Condition = (A=1) and (B=2)\n\nvalue=x").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("condition".to_string(), "(A=1) and (B=2)".to_string()),
                ("value".to_string(), "x".to_string()),
            ]
        );
        assert!(matches!(
            parse_assignments("novalue"),
            Err(HelmError::Block(_))
        ));
    }

    #[test]
    fn loads_and_resolves_relative_log_path() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("helm.toml");
        fs::write(&path, SETTINGS).unwrap();
        let settings = HelmSettings::load(&path).unwrap();
        assert_eq!(settings.log_path, Some(tmp.path().join("helm.log")));
        assert_eq!(settings.event_capacity, 256);
        assert!(settings.start_in_control);
        assert_eq!(settings.override_var, "MANUAL_OVERRIDE");

        let domain = settings.build_domain().unwrap();
        assert_eq!(domain.names(), vec!["course", "speed"]);
        assert_eq!(settings.build_modes().unwrap().len(), 1);
        let behaviors = settings
            .build_behaviors(&BehaviorFactory::default())
            .unwrap();
        assert_eq!(behaviors.names(), vec!["cruise"]);
    }

    #[test]
    fn bad_blocks_are_config_errors() {
        let mut settings = HelmSettings::from_toml(SETTINGS).unwrap();
        settings.modes.push("var = X\nvalue = Y\ncondition = a=1 or b=2".into());
        assert_eq!(settings.build_modes().unwrap_err().class(), ErrorClass::Config);

        settings.behaviors.push(BehaviorBlock {
            kind: "loiter_forever".into(),
            params: String::new(),
        });
        let err = settings
            .build_behaviors(&BehaviorFactory::default())
            .unwrap_err();
        assert_eq!(err, HelmError::UnknownBehavior("loiter_forever".into()));

        settings.domain = vec!["course:0:359".into()];
        assert_eq!(settings.build_domain().unwrap_err().class(), ErrorClass::Config);
    }

    #[test]
    fn missing_file_reports_context() {
        let err = HelmSettings::load("/nonexistent/helm.toml").unwrap_err();
        assert!(format!("{err:#}").contains("reading helm settings"));
    }
}
