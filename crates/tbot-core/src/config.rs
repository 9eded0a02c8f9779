use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, filter::AllowList, Result};

const DEFAULT_CONFIG_FILE: &str = "configfile.ini";
const DEFAULT_SECTION: &str = "DEFAULT";
const USERS_SECTION: &str = "USERNAME";

/// Typed configuration for the bot.
///
/// Read from an INI-style file (`configfile.ini`, or `TBOT_CONFIG`). `TBOT_TOKEN` and
/// `TBOT_STORE_PATH` override the file.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    pub store_path: PathBuf,
    pub allowed_usernames: Vec<String>,
    /// Operator chat notified once on startup.
    pub notify_chat_id: Option<i64>,

    pub poll_timeout: Duration,
    pub error_pause: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = env_path("TBOT_CONFIG").unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let contents = fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let mut cfg = Self::from_ini_str(&contents)?;

        if let Some(token) = env_str("TBOT_TOKEN").and_then(non_empty) {
            cfg.telegram_bot_token = token;
        }
        if let Some(store) = env_path("TBOT_STORE_PATH") {
            cfg.store_path = store;
        }

        cfg.validate_store_path()?;
        Ok(cfg)
    }

    /// Parse and check required keys. Does not touch the filesystem.
    pub fn from_ini_str(contents: &str) -> Result<Self> {
        let ini = parse_ini(contents);
        let defaults = ini.get(DEFAULT_SECTION);
        let get = |key: &str| defaults.and_then(|s| s.get(key)).cloned().and_then(non_empty);

        let Some(telegram_bot_token) = get("token") else {
            return Err(Error::Config(
                "there is no bot token in the config file".to_string(),
            ));
        };
        let Some(store_path) = get("store_path").map(PathBuf::from) else {
            return Err(Error::Config(
                "store_path (where to store torrent files) is not defined".to_string(),
            ));
        };

        let notify_chat_id = match get("chat_id") {
            Some(raw) => Some(raw.trim().parse::<i64>().map_err(|_| {
                Error::Config(format!("chat_id must be a numeric chat id, got {raw:?}"))
            })?),
            None => None,
        };

        let mut allowed_usernames: Vec<String> = ini
            .get(USERS_SECTION)
            .map(|users| users.values().filter_map(|v| non_empty(v.clone())).collect())
            .unwrap_or_default();
        allowed_usernames.sort();
        allowed_usernames.dedup();
        if allowed_usernames.is_empty() {
            tracing::warn!("no [{USERS_SECTION}] entries configured; every sender will be rejected");
        }

        let poll_timeout =
            Duration::from_secs(parse_u64(get("poll_timeout_secs"), "poll_timeout_secs")?.unwrap_or(60));
        let error_pause =
            Duration::from_millis(parse_u64(get("error_pause_ms"), "error_pause_ms")?.unwrap_or(1000));

        Ok(Self {
            telegram_bot_token,
            store_path,
            allowed_usernames,
            notify_chat_id,
            poll_timeout,
            error_pause,
        })
    }

    pub fn allow_list(&self) -> AllowList {
        AllowList::new(&self.allowed_usernames)
    }

    fn validate_store_path(&self) -> Result<()> {
        validate_dir(&self.store_path)
    }
}

fn validate_dir(path: &Path) -> Result<()> {
    match fs::metadata(path) {
        Ok(md) if md.is_dir() => Ok(()),
        Ok(_) => Err(Error::InvalidPath {
            path: path.to_path_buf(),
            reason: "not a directory".to_string(),
        }),
        Err(e) => Err(Error::InvalidPath {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

type Section = HashMap<String, String>;

/// Minimal INI reader: `[section]` headers, `key = value` or `key: value` pairs,
/// `#`/`;` comment lines. Keys are lowercased; later keys win.
fn parse_ini(contents: &str) -> HashMap<String, Section> {
    let mut out: HashMap<String, Section> = HashMap::new();
    let mut current = DEFAULT_SECTION.to_string();

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            current = name.trim().to_string();
            continue;
        }

        let Some((k, v)) = line.split_once(['=', ':']) else {
            continue;
        };

        let key = k.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }

        let mut val = strip_inline_comment(v).trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.entry(current.clone()).or_default().insert(key, val);
    }

    out
}

/// Drop a trailing `; comment` or `# comment`. Only markers preceded by whitespace
/// count, so values such as `abc#1` survive.
fn strip_inline_comment(value: &str) -> &str {
    let mut prev_ws = false;
    for (idx, ch) in value.char_indices() {
        if prev_ws && (ch == ';' || ch == '#') {
            return &value[..idx];
        }
        prev_ws = ch.is_whitespace();
    }
    value
}

fn parse_u64(raw: Option<String>, key: &str) -> Result<Option<u64>> {
    raw.map(|s| {
        s.trim()
            .parse::<u64>()
            .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {s:?}")))
    })
    .transpose()
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
