//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, LOCAL_CONFIG_NAME};
use crate::error::{VigilError, VigilResult};
use crate::installer::validate_requested_version;
use crate::ui::{self, UiContext};
use std::path::Path;
use tokio::fs;
use toml_edit::{Array, DocumentMut, Item};

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    config: &Config,
    manager: &ConfigManager,
    workspace: &Path,
) -> VigilResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value, local }) => {
            let path = if local {
                workspace.join(LOCAL_CONFIG_NAME)
            } else {
                manager.path().to_path_buf()
            };
            set_value(&path, &key, &value).await?;
            ui::step_ok(
                &UiContext::detect(),
                &format!("Set {} = {} in {}", key, value, path.display()),
            );
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> VigilResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> VigilResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());
    Ok(())
}

/// Shape of a settable key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyKind {
    Bool,
    /// Integer with a lower bound
    Count(i64),
    Text,
    List,
    Version,
    OneOf(&'static [&'static str]),
}

const CONFIG_KEYS: &[(&str, KeyKind)] = &[
    ("general.log_format", KeyKind::OneOf(&["text", "json"])),
    ("general.activity_log", KeyKind::Bool),
    ("scanner.version", KeyKind::Version),
    ("scanner.image", KeyKind::Text),
    ("scanner.package", KeyKind::Text),
    ("scanner.executable", KeyKind::Text),
    (
        "scanner.engine",
        KeyKind::OneOf(&["auto", "docker", "podman", "none"]),
    ),
    ("scanner.certificate", KeyKind::Text),
    ("scanner.frameworks", KeyKind::List),
    ("scanner.skip_frameworks", KeyKind::List),
    ("scanner.skip_checks", KeyKind::List),
    ("scanner.external_checks_dir", KeyKind::Text),
    ("scanner.use_bc_ids", KeyKind::Bool),
    ("scanner.debug_logs", KeyKind::Bool),
    ("scan.max_concurrent", KeyKind::Count(1)),
    ("scan.timeout_secs", KeyKind::Count(1)),
    ("scan.debounce_ms", KeyKind::Count(0)),
    ("notifications.disable_error_messages", KeyKind::Bool),
    ("cache.clear_on_config_change", KeyKind::Bool),
    ("severity.mapping_url", KeyKind::Text),
];

fn key_kind(key: &str) -> VigilResult<KeyKind> {
    CONFIG_KEYS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, kind)| *kind)
        .ok_or_else(|| {
            let valid: Vec<&str> = CONFIG_KEYS.iter().map(|(name, _)| *name).collect();
            VigilError::User(format!(
                "Unknown config key: {}. Valid keys: {}",
                key,
                valid.join(", ")
            ))
        })
}

/// Convert a command-line value into a TOML item for `key`
fn parse_item(key: &str, value: &str) -> VigilResult<Item> {
    let item = match key_kind(key)? {
        KeyKind::Bool => toml_edit::value(parse_bool(value)?),
        KeyKind::Count(min) => {
            let n: i64 = value
                .trim()
                .parse()
                .map_err(|_| VigilError::User(format!("Invalid number: {}", value)))?;
            if n < min {
                return Err(VigilError::User(format!(
                    "{} must be at least {}",
                    key, min
                )));
            }
            toml_edit::value(n)
        }
        KeyKind::Text => toml_edit::value(value.trim()),
        KeyKind::List => {
            let items: Array = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            toml_edit::value(items)
        }
        KeyKind::Version => {
            let version = value.trim();
            validate_requested_version(version)?;
            toml_edit::value(version)
        }
        KeyKind::OneOf(allowed) => {
            let choice = value.trim().to_lowercase();
            if !allowed.contains(&choice.as_str()) {
                return Err(VigilError::User(format!(
                    "Invalid value for {}: {}. Use one of: {}",
                    key,
                    value,
                    allowed.join(", ")
                )));
            }
            toml_edit::value(choice)
        }
    };
    Ok(item)
}

fn parse_bool(value: &str) -> VigilResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(VigilError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

/// Set `section.key` in a document, creating the section if needed
fn set_document_value(doc: &mut DocumentMut, key: &str, item: Item) -> VigilResult<()> {
    let (section, leaf) = key
        .split_once('.')
        .ok_or_else(|| VigilError::User(format!("Expected section.key, got: {}", key)))?;

    let table = doc
        .entry(section)
        .or_insert(toml_edit::table())
        .as_table_like_mut()
        .ok_or_else(|| VigilError::User(format!("[{}] is not a table", section)))?;
    table.insert(leaf, item);
    Ok(())
}

/// Write one key into the config file at `path`, keeping everything else as is
async fn set_value(path: &Path, key: &str, value: &str) -> VigilResult<()> {
    let item = parse_item(key, value)?;

    let mut doc = if path.exists() {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| VigilError::io(format!("reading {}", path.display()), e))?;
        content
            .parse::<DocumentMut>()
            .map_err(|e| VigilError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
    } else {
        DocumentMut::new()
    };

    set_document_value(&mut doc, key, item)?;

    let content = doc.to_string();
    toml::from_str::<Config>(&content).map_err(|e| VigilError::ConfigInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| VigilError::ConfigDirCreate {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }
    fs::write(path, content)
        .await
        .map_err(|e| VigilError::io(format!("writing {}", path.display()), e))
}
