use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_rule_path")]
    pub rule_path: String,
    #[serde(default = "default_file_rule_path")]
    pub file_rule_path: String,
    #[serde(default = "default_registry_base")]
    pub registry_base: String,
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,
    #[serde(default = "default_interval")]
    pub interval: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            rule_path: default_rule_path(),
            file_rule_path: default_file_rule_path(),
            registry_base: default_registry_base(),
            scratch_dir: default_scratch_dir(),
            interval: default_interval(),
        }
    }
}

fn default_rule_path() -> String {
    "./rules".to_string()
}

fn default_file_rule_path() -> String {
    "./file_rules.yml".to_string()
}

fn default_registry_base() -> String {
    "https://pypi.org".to_string()
}

fn default_scratch_dir() -> String {
    "tmp".to_string()
}

fn default_interval() -> String {
    "60s".to_string()
}

/// Load config from ~/.config/repowarden/config.toml, falling back to defaults.
pub fn load_config() -> Config {
    let path = config_path();
    match std::fs::read_to_string(&path) {
        Ok(content) => toml::from_str(&content).unwrap_or_default(),
        Err(_) => Config::default(),
    }
}

fn config_path() -> std::path::PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        std::path::PathBuf::from(xdg).join("repowarden").join("config.toml")
    } else if let Ok(home) = std::env::var("HOME") {
        std::path::PathBuf::from(home)
            .join(".config")
            .join("repowarden")
            .join("config.toml")
    } else {
        std::path::PathBuf::from("/etc/repowarden/config.toml")
    }
}

/// Parses a CLI interval string like "60s", "2m", "1h" into seconds.
/// Returns `None` on an unrecognized suffix or an unparsable number,
/// matching `cli.py`'s invalid-argument -> exit(-2) behavior at the call site.
pub fn parse_interval(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let (num, mult) = match raw.chars().last().unwrap() {
        's' => (&raw[..raw.len() - 1], 1),
        'm' => (&raw[..raw.len() - 1], 60),
        'h' => (&raw[..raw.len() - 1], 3600),
        c if c.is_ascii_digit() => (raw, 1),
        _ => return None,
    };
    num.parse::<u64>().ok().map(|n| n * mult)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffixed_intervals() {
        assert_eq!(parse_interval("60s"), Some(60));
        assert_eq!(parse_interval("2m"), Some(120));
        assert_eq!(parse_interval("1h"), Some(3600));
        assert_eq!(parse_interval("45"), Some(45));
    }

    #[test]
    fn rejects_unknown_suffix() {
        assert_eq!(parse_interval("60x"), None);
        assert_eq!(parse_interval(""), None);
    }
}
