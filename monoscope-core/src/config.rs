use directories::{BaseDirs, ProjectDirs};
use std::collections::BTreeMap;
use std::time::Duration;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_CI_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SCAN_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct MonoscopeConfig {
    pub cache_dir: PathBuf,
    pub data_dir: PathBuf,
    pub ci_cache_ttl: Duration,
    pub scan_cache_ttl: Duration,
    pub workspaces: Vec<String>,
    pub providers: BTreeMap<String, ProviderConfig>,
    pub verbose: bool,
}

impl Default for MonoscopeConfig {
    fn default() -> Self {
        let fallback = PathBuf::from(".monoscope");

        MonoscopeConfig {
            cache_dir: fallback.join("cache"),
            data_dir: fallback.join("data"),
            ci_cache_ttl: DEFAULT_CI_CACHE_TTL,
            scan_cache_ttl: DEFAULT_SCAN_CACHE_TTL,
            workspaces: Vec::new(),
            providers: BTreeMap::new(),
            verbose: false,
        }
    }
}

impl MonoscopeConfig {
    pub fn from_env() -> Self {
        let mut config = MonoscopeConfig::default();

        if let Ok(home) = env::var("MONOSCOPE_HOME") {
            let base = PathBuf::from(home);
            config.cache_dir = base.join("cache");
            config.data_dir = base.join("data");
        } else if let Some(dirs) = ProjectDirs::from("io", "monoscope", "monoscope") {
            config.cache_dir = dirs.cache_dir().to_path_buf();
            config.data_dir = dirs.data_local_dir().to_path_buf();
        }

        // 1) Global rc file in the user's home directory.
        if let Some(base) = BaseDirs::new() {
            config.apply_rc_file(&base.home_dir().join(".monoscoperc"));
        }

        // 2) Repo-level rc file in the current working directory.
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        config.apply_rc_file(&cwd.join(".monoscoperc"));

        // 3) Environment wins over rc files.
        if let Some(ttl) = read_secs_from_env("MONOSCOPE_CI_TTL_SECS") {
            config.ci_cache_ttl = ttl;
        }

        if let Some(ttl) = read_secs_from_env("MONOSCOPE_SCAN_TTL_SECS") {
            config.scan_cache_ttl = ttl;
        }

        if let Ok(value) = env::var("MONOSCOPE_WORKSPACES") {
            let patterns = split_list(&value);
            if !patterns.is_empty() {
                config.workspaces = patterns;
            }
        }

        if let Ok(value) = env::var("MONOSCOPE_VERBOSE") {
            config.verbose = parse_bool(&value).unwrap_or(config.verbose);
        }

        config
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("store.json")
    }

    pub fn apply_rc_file(&mut self, path: &Path) {
        if !path.is_file() {
            return;
        }

        if let Ok(data) = fs::read_to_string(path) {
            self.apply_rc(&data);
        }
    }

    pub fn apply_rc(&mut self, data: &str) {
        for line in data.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            let Some(eq_idx) = trimmed.find('=') else {
                continue;
            };

            let (key, value) = trimmed.split_at(eq_idx);
            let key = key.trim();
            let value = value[1..].trim();

            if value.is_empty() {
                continue;
            }

            match key {
                "ci-cache-ttl" => {
                    if let Ok(secs) = value.parse::<u64>() {
                        self.ci_cache_ttl = Duration::from_secs(secs);
                    }
                }
                "scan-cache-ttl" => {
                    if let Ok(secs) = value.parse::<u64>() {
                        self.scan_cache_ttl = Duration::from_secs(secs);
                    }
                }
                "workspaces" => self.workspaces = split_list(value),
                "verbose" => self.verbose = parse_bool(value).unwrap_or(self.verbose),
                _ => self.apply_provider_key(key, value),
            }
        }
    }

    fn apply_provider_key(&mut self, key: &str, value: &str) {
        let Some(rest) = key.strip_prefix("ci.") else {
            return;
        };

        let Some((name, field)) = rest.rsplit_once('.') else {
            return;
        };

        let name = name.trim();
        if name.is_empty() {
            return;
        }

        let provider = self.providers.entry(name.to_string()).or_default();

        match field {
            "url" => provider.url = Some(value.trim_end_matches('/').to_string()),
            "token" => provider.token = Some(value.to_string()),
            "dir" => provider.dir = Some(PathBuf::from(value)),
            _ => {}
        }
    }
}

fn read_secs_from_env(key: &str) -> Option<Duration> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    trimmed.parse::<u64>().ok().map(Duration::from_secs)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rc_lines_configure_ttls_and_workspaces() {
        let mut config = MonoscopeConfig::default();
        config.apply_rc(
            "# comment\nci-cache-ttl=30\nscan-cache-ttl = 5\nworkspaces=packages/*, apps/*\n; other\n",
        );

        assert_eq!(config.ci_cache_ttl, Duration::from_secs(30));
        assert_eq!(config.scan_cache_ttl, Duration::from_secs(5));
        assert_eq!(config.workspaces, vec!["packages/*", "apps/*"]);
    }

    #[test]
    fn rc_lines_register_providers() {
        let mut config = MonoscopeConfig::default();
        config.apply_rc(
            "ci.github.url=https://ci.example.com/api/\nci.github.token=abc\nci.local.dir=.ci\n",
        );

        let github = config.providers.get("github").unwrap();
        assert_eq!(github.url.as_deref(), Some("https://ci.example.com/api"));
        assert_eq!(github.token.as_deref(), Some("abc"));

        let local = config.providers.get("local").unwrap();
        assert_eq!(local.dir, Some(PathBuf::from(".ci")));
    }

    #[test]
    fn malformed_rc_values_keep_defaults() {
        let mut config = MonoscopeConfig::default();
        config.apply_rc("ci-cache-ttl=soon\nverbose=maybe\nnot a pair\n");

        assert_eq!(config.ci_cache_ttl, DEFAULT_CI_CACHE_TTL);
        assert!(!config.verbose);
    }
}
