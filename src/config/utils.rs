#[cfg(test)]
#[path = "utils_test.rs"]
mod tests;

use chrono::Local;
use eyre::{Context, Result};
use log::LevelFilter;
use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
};

use super::{Configuration, LogConfig, LogFile};

static ENV_VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{?([A-Za-z_]+)\}?").expect("valid env var pattern"));

/// Reads and validates the configuration file at `config_path`.
pub fn load_configuration(config_path: &str) -> Result<Configuration> {
    let config =
        std::fs::read_to_string(config_path).wrap_err(format!("reading {}", config_path))?;
    let config: Configuration = toml::from_str(&config).wrap_err("parsing configuration")?;
    config.validate().wrap_err("validating configuration")?;
    Ok(config)
}

/// Global level plus per-module overrides, in the order they are applied.
type LogLevels = (LevelFilter, Vec<(Option<String>, LevelFilter)>);

pub fn init_logger(config: &LogConfig) -> Result<()> {
    let log_file = open_log_file(&config.file)?;
    let (level, overrides) = log_levels(config)?;

    let mut builder = env_logger::Builder::new();
    builder.filter(None, level);
    for (module, module_level) in overrides {
        builder.filter(module.as_deref(), module_level);
    }
    builder
        .format(|buf, record| write_record(buf, record))
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .try_init()
        .wrap_err("installing logger")?;
    Ok(())
}

/// A filter without its own level inherits the global one. Unknown level
/// names are rejected.
pub(crate) fn log_levels(config: &LogConfig) -> Result<LogLevels> {
    let raw_level = config.level.as_deref().unwrap_or("info");
    let level = LevelFilter::from_str(raw_level)
        .wrap_err(format!("parsing log level {raw_level}"))?;

    let overrides = config
        .filters
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|filter| -> Result<(Option<String>, LevelFilter)> {
            let Some(raw) = filter.level.as_deref() else {
                return Ok((filter.module.clone(), level));
            };
            let module_level = LevelFilter::from_str(raw).wrap_err(format!(
                "parsing log level {raw} for module {}",
                filter.module.as_deref().unwrap_or("*")
            ))?;
            Ok((filter.module.clone(), module_level))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((level, overrides))
}

fn open_log_file(file: &LogFile) -> Result<std::fs::File> {
    let path = resolve_path(&file.path).wrap_err(format!("resolving log file path {}", file.path))?;
    if let Some(dir) = Path::new(&path).parent() {
        std::fs::create_dir_all(dir).wrap_err(format!("creating directory {}", dir.display()))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .append(file.append)
        .truncate(!file.append)
        .open(&path)
        .wrap_err(format!("opening log file {}", path))
}

/// `module/file:line timestamp [LEVEL] - message`
pub(crate) fn write_record(buf: &mut impl Write, record: &log::Record) -> std::io::Result<()> {
    writeln!(
        buf,
        "{}/{}:{} {} [{}] - {}",
        record.module_path().unwrap_or("unknown"),
        basename(record.file().unwrap_or("unknown")),
        record.line().unwrap_or(0),
        Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
        record.level(),
        record.args()
    )
}

pub fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

/// resolve_path resolves the input path to an absolute path. If the
/// input path contains environment variables, it will expand them to their
/// values.
pub fn resolve_path(path: &str) -> Result<String> {
    let mut ret = String::new();
    let mut last_pos = 0;

    for cap in ENV_VAR_RE.captures_iter(path) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        ret.push_str(&path[last_pos..full_match.start()]);
        let var_value = std::env::var(var_name.as_str()).unwrap_or_default();
        ret.push_str(&var_value);
        last_pos = full_match.end();
    }
    ret.push_str(&path[last_pos..]);

    // Resolve the path to an absolute path
    let path = std::path::absolute(ret.as_str()).wrap_err(format!("resolving path {}", ret))?;
    Ok(path.to_string_lossy().to_string())
}

/// First existing file among the candidates of [`config_candidates`].
pub fn lookup_config_path() -> Option<String> {
    config_candidates(
        std::env::var("XDG_CONFIG_HOME").ok(),
        std::env::var("HOME").ok(),
    )
    .into_iter()
    .find(|path| path.is_file())
    .map(|path| path.to_string_lossy().to_string())
}

/// `$XDG_CONFIG_HOME/chatpress/config.toml`, `$HOME/.config/chatpress/config.toml`,
/// then `$HOME/.chatpress.toml`. Unset or empty variables contribute nothing.
pub(crate) fn config_candidates(xdg_config_home: Option<String>, home: Option<String>) -> Vec<PathBuf> {
    let xdg_config_home = xdg_config_home.filter(|dir| !dir.is_empty());
    let home = home.filter(|dir| !dir.is_empty());

    let mut paths = vec![];
    if let Some(dir) = xdg_config_home {
        paths.push(Path::new(&dir).join("chatpress").join("config.toml"));
    }
    if let Some(home) = home {
        let home = Path::new(&home);
        paths.push(home.join(".config").join("chatpress").join("config.toml"));
        paths.push(home.join(".chatpress.toml"));
    }
    paths
}
