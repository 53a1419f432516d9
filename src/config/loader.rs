//! Configuration loading with layered precedence.
//!
//! This module provides functions to load configuration with the precedence order
//! (lowest to highest): application defaults, configuration file, environment
//! variables, command-line arguments.
//!
//! # Architecture Note: Why Manual Layer Composition?
//!
//! The `OrthoConfig` derive macro provides `load()` and `compose_layers()` methods
//! that handle discovery, environment variables, and CLI parsing automatically.
//! However, this loader uses `MergeComposer` manually because:
//!
//! 1. **Subcommand separation**: The CLI (`Cli` struct) handles subcommand dispatch
//!    via clap's `#[command(subcommand)]`, while `AppConfig` holds configuration
//!    values. `OrthoConfig`'s `load()` expects to own the entire CLI parsing.
//!
//! 2. **Environment variable validation**: `OrthoConfig`'s environment layer uses
//!    Figment, which silently ignores unparseable values. This loader implements
//!    fail-fast validation that returns errors for invalid typed values.
//!
//! 3. **Custom discovery integration**: The `Cli` struct already accepts `--config`
//!    via clap, so discovery must honour that path before falling back to XDG paths.
//!
//! The trade-off is more code in this module, but better error messages and
//! integration with the existing CLI structure.
//!
//! # Environment Variable Handling
//!
//! Environment variables with unparseable values (e.g., `DOCKSHIP_SSH_CONNECT_TIMEOUT_SECS=soon`
//! instead of an integer) return an error immediately. This fail-fast approach
//! ensures misconfigurations are visible to users rather than silently falling back
//! to defaults.
//!
//! String fields (e.g., `DOCKSHIP_REMOTE`) are always accepted. Integer fields
//! (`DOCKSHIP_SSH_CONNECT_TIMEOUT_SECS`, `DOCKSHIP_DEPLOY_STOP_TIMEOUT_SECS`)
//! must have valid values or the configuration loading will fail with a clear error.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use ortho_config::discovery::ConfigDiscovery;
use ortho_config::serde_json::{self, Map, Value};
use ortho_config::{MergeComposer, toml};

use crate::config::{AppConfig, Cli, Commands};
use crate::error::{ConfigError, Result};

// ============================================================================
// Environment Variable Specification Table
// ============================================================================

/// The type of value expected from an environment variable.
#[derive(Clone, Copy)]
enum EnvVarType {
    /// String value (always accepted).
    String,
    /// Unsigned 64-bit integer. Invalid values return an error.
    U64,
}

/// Specification for a single environment variable mapping.
struct EnvVarSpec {
    /// The environment variable name (e.g., `DOCKSHIP_REMOTE`).
    env_var: &'static str,
    /// The JSON path segments (e.g., `["ssh", "connect_timeout_secs"]`).
    path: &'static [&'static str],
    /// The expected value type.
    var_type: EnvVarType,
}

/// Table of all environment variables and their JSON paths.
///
/// Adding or modifying environment variable mappings is a single-line change here.
/// The order doesn't matter as the table is processed in a single pass.
const ENV_VAR_SPECS: &[EnvVarSpec] = &[
    // Top-level fields
    EnvVarSpec {
        env_var: "DOCKSHIP_REMOTE",
        path: &["remote"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "DOCKSHIP_KEY_PATH",
        path: &["key_path"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "DOCKSHIP_PASSWORD",
        path: &["password"],
        var_type: EnvVarType::String,
    },
    // SSH fields
    EnvVarSpec {
        env_var: "DOCKSHIP_SSH_CONNECT_TIMEOUT_SECS",
        path: &["ssh", "connect_timeout_secs"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "DOCKSHIP_SSH_HOST_KEY_POLICY",
        path: &["ssh", "host_key_policy"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "DOCKSHIP_SSH_KNOWN_HOSTS_PATH",
        path: &["ssh", "known_hosts_path"],
        var_type: EnvVarType::String,
    },
    // Proxy fields
    EnvVarSpec {
        env_var: "DOCKSHIP_PROXY_LOCAL_SOCKET",
        path: &["proxy", "local_socket"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "DOCKSHIP_PROXY_REMOTE_SOCKET",
        path: &["proxy", "remote_socket"],
        var_type: EnvVarType::String,
    },
    // Deploy fields
    EnvVarSpec {
        env_var: "DOCKSHIP_DEPLOY_FILE",
        path: &["deploy", "file"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "DOCKSHIP_DEPLOY_STOP_TIMEOUT_SECS",
        path: &["deploy", "stop_timeout_secs"],
        var_type: EnvVarType::U64,
    },
];

/// Returns the list of environment variable names recognised by the config loader.
///
/// This is primarily useful for tests that need to clear all `DOCKSHIP_*` environment
/// variables to ensure isolation. Using this function instead of a hard-coded list
/// ensures the test stays in sync with the loader's actual environment variable
/// mappings.
#[must_use]
pub fn env_var_names() -> Vec<&'static str> {
    ENV_VAR_SPECS.iter().map(|spec| spec.env_var).collect()
}

/// Split a path into its parent directory and file name.
///
/// A bare file name resolves against the current directory.
pub(super) fn split_parent(path: &Utf8Path) -> (&Utf8Path, &str) {
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().unwrap_or(path.as_str());
    (parent, file_name)
}

/// Read a UTF-8 text file through its parent directory capability.
///
/// Uses `cap_std::fs_utf8` for capability-oriented filesystem access as per
/// project conventions. Shared by the application config loader and the
/// deployment declaration loader.
pub(super) fn read_text_file(path: &Utf8Path) -> Result<String> {
    // Open the parent directory using ambient authority, then read the file.
    let (parent, file_name) = split_parent(path);

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound {
                path: path.as_std_path().to_path_buf(),
            }
        } else {
            ConfigError::ParseError {
                message: format!("failed to open directory {parent}: {e}"),
            }
        }
    })?;

    let content = dir.read_to_string(file_name).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound {
                path: path.as_std_path().to_path_buf(),
            }
        } else {
            ConfigError::ParseError {
                message: format!("failed to read {path}: {e}"),
            }
        }
    })?;

    Ok(content)
}

/// Load a configuration file and push it to the composer.
fn load_config_file(path: &Utf8PathBuf, composer: &mut MergeComposer) -> Result<()> {
    let content = read_text_file(path)?;

    let value =
        toml::from_str::<serde_json::Value>(&content).map_err(|e| ConfigError::ParseError {
            message: format!("failed to parse {path}: {e}"),
        })?;

    composer.push_file(value, Some(path.clone()));
    Ok(())
}

/// Load configuration with full layer precedence.
///
/// This function loads configuration from all available sources:
/// 1. Application defaults defined in the struct
/// 2. Configuration file (discovered via XDG paths or `DOCKSHIP_CONFIG_PATH`)
/// 3. Environment variables prefixed with `DOCKSHIP_`
/// 4. Command-line arguments (from the provided `Cli`)
///
/// Later sources override earlier ones.
///
/// # Errors
///
/// Returns `ConfigError` if configuration loading fails due to:
/// - Malformed configuration files
/// - Invalid typed environment variable values (e.g., a non-integer
///   `DOCKSHIP_DEPLOY_STOP_TIMEOUT_SECS`)
/// - Missing required fields after merge
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut composer = MergeComposer::new();

    // Layer 1: Defaults (serialised from AppConfig::default()).
    let defaults =
        serde_json::to_value(AppConfig::default()).map_err(|e| ConfigError::ParseError {
            message: format!("failed to serialise defaults: {e}"),
        })?;
    composer.push_defaults(defaults);

    // Layer 2: Configuration file.
    // Use the CLI-provided path (if it exists), or discover via XDG paths.
    let config_path: Option<Utf8PathBuf> =
        cli.config.clone().filter(|p| p.exists()).or_else(|| {
            // Discover config files using ortho_config's ConfigDiscovery builder.
            let discovery = ConfigDiscovery::builder("dockship")
                .env_var("DOCKSHIP_CONFIG_PATH")
                .config_file_name("config.toml")
                .dotfile_name(".dockship.toml")
                .build();
            discovery
                .candidates()
                .into_iter()
                .filter(|p| p.exists())
                .find_map(|p| Utf8PathBuf::try_from(p).ok())
        });

    if let Some(ref path) = config_path {
        load_config_file(path, &mut composer)?;
    }

    // Layer 3: Environment variables.
    let env_values = collect_env_vars()?;
    if !env_values.is_null() {
        composer.push_environment(env_values);
    }

    // Layer 4: CLI overrides.
    let cli_overrides = build_cli_overrides(cli);
    if !cli_overrides.is_null() {
        composer.push_cli(cli_overrides);
    }

    // Merge all layers into the final configuration.
    let config =
        AppConfig::merge_from_layers(composer.layers()).map_err(ConfigError::OrthoConfig)?;

    Ok(config)
}

/// Collect environment variables with the `DOCKSHIP_` prefix into a JSON value.
///
/// This function uses a data-driven approach: all environment variable mappings
/// are defined in [`ENV_VAR_SPECS`]. Adding or changing mappings requires only
/// a single-line change in that table.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` if a typed environment variable (u64)
/// has an unparseable value. This fail-fast approach ensures misconfigurations are
/// visible to users.
fn collect_env_vars() -> Result<Value> {
    let mut root = Map::new();

    for spec in ENV_VAR_SPECS {
        let Ok(raw_value) = std::env::var(spec.env_var) else {
            continue;
        };

        // Parse the value according to its expected type.
        // Invalid values return an error immediately (fail-fast).
        let json_value = match spec.var_type {
            EnvVarType::String => Value::String(raw_value),
            EnvVarType::U64 => match raw_value.parse::<u64>() {
                Ok(n) => Value::Number(n.into()),
                Err(_) => {
                    return Err(ConfigError::InvalidValue {
                        field: spec.env_var.to_owned(),
                        reason: format!("expected unsigned integer, got '{raw_value}'"),
                    }
                    .into());
                }
            },
        };

        // Insert at the appropriate path (supports arbitrary nesting depth).
        insert_at_path(&mut root, spec.path, json_value);
    }

    if root.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::Object(root))
    }
}

/// Insert a value at a nested path in a JSON map.
///
/// For a path like `["proxy", "local_socket"]`, this creates the intermediate
/// `proxy` object if needed and inserts `local_socket` within it.
fn insert_at_path(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((&field, parents)) = path.split_last() else {
        return;
    };

    // Navigate to the parent object, creating intermediate objects as needed.
    let mut current = root;
    for &segment in parents {
        // Ensure the entry is an object; if it's not (shouldn't happen with our
        // controlled path specs), skip this insertion.
        let entry = current
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(obj) = entry.as_object_mut() else {
            return;
        };
        current = obj;
    }

    // Insert the final field.
    current.insert(field.to_owned(), value);
}

/// Build a JSON value containing CLI overrides.
///
/// Only the subcommand-specific flags feed configuration; `init` has none.
fn build_cli_overrides(cli: &Cli) -> Value {
    let mut root = Map::new();

    match &cli.command {
        Commands::Deploy(args) => {
            let string_overrides: [(&[&str], Option<String>); 6] = [
                (&["remote"], args.remote.clone()),
                (&["key_path"], args.key.as_ref().map(ToString::to_string)),
                (&["password"], args.password.clone()),
                (&["deploy", "file"], args.file.as_ref().map(ToString::to_string)),
                (
                    &["proxy", "local_socket"],
                    args.local_socket.as_ref().map(ToString::to_string),
                ),
                (&["proxy", "remote_socket"], args.remote_socket.clone()),
            ];
            for (path, value) in string_overrides {
                if let Some(text) = value {
                    insert_at_path(&mut root, path, Value::String(text));
                }
            }
        }
        Commands::Validate(args) => {
            if let Some(ref file) = args.file {
                insert_at_path(&mut root, &["deploy", "file"], Value::String(file.to_string()));
            }
        }
        Commands::Init(_) => {}
    }

    if root.is_empty() {
        Value::Null
    } else {
        Value::Object(root)
    }
}
