//! The deployment declaration document.
//!
//! A declaration lists the services that should run on the remote engine. It
//! is read-only to the reconciler: loading parses and validates it once, and
//! every later stage borrows it.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::{Deserialize, Serialize};

use super::loader::{read_text_file, split_parent};
use crate::error::{ConfigError, FilesystemError, Result};

/// A set of services to reconcile, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Deployment {
    /// Declared services. Names are unique within one document.
    #[serde(default)]
    pub services: Vec<ServiceDeclaration>,
}

/// One declared service.
///
/// The name doubles as container name and hostname on the remote engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServiceDeclaration {
    /// Unique service name.
    pub name: String,

    /// Image reference the container runs.
    pub image: String,

    /// Environment assignments in `KEY=VALUE` form.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment: Vec<String>,

    /// Published container ports.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortSpec>,

    /// Bind mounts from the remote host into the container.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeSpec>,

    /// Networks the container joins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,

    /// Optional build context; when set the image is built before deploying.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<Utf8PathBuf>,
}

impl ServiceDeclaration {
    /// Create a declaration with only a name and an image.
    #[must_use]
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            environment: Vec::new(),
            ports: Vec::new(),
            volumes: Vec::new(),
            networks: Vec::new(),
            build: None,
        }
    }

    fn field(&self, suffix: &str) -> String {
        format!("services.{}.{suffix}", self.name)
    }

    fn validate(&self, index: usize) -> Result<()> {
        if self.name.is_empty() {
            return Err(invalid(format!("services[{index}].name"), "cannot be empty"));
        }
        if !is_valid_container_name(&self.name) {
            return Err(invalid(
                format!("services[{index}].name"),
                "must match [a-zA-Z0-9][a-zA-Z0-9_.-]*",
            ));
        }
        if self.image.trim().is_empty() {
            return Err(invalid(self.field("image"), "cannot be empty"));
        }
        for assignment in &self.environment {
            match assignment.split_once('=') {
                Some((key, _)) if !key.is_empty() => {}
                _ => {
                    return Err(invalid(
                        self.field("environment"),
                        format!("'{assignment}' is not a KEY=VALUE assignment"),
                    ));
                }
            }
        }
        if self.networks.iter().any(|network| network.trim().is_empty()) {
            return Err(invalid(self.field("networks"), "network names cannot be empty"));
        }

        let mut seen_ports = HashSet::new();
        for port in &self.ports {
            if !seen_ports.insert(port.container_port) {
                return Err(invalid(
                    self.field("ports"),
                    format!("port {} is declared more than once", port.container_port),
                ));
            }
        }
        Ok(())
    }
}

/// Container names accepted by the engine: `[a-zA-Z0-9][a-zA-Z0-9_.-]*`.
fn is_valid_container_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|first| first.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> crate::error::DockshipError {
    ConfigError::InvalidValue {
        field: field.into(),
        reason: reason.into(),
    }
    .into()
}

impl Deployment {
    /// Load and validate a declaration from a TOML file.
    ///
    /// Relative build contexts are resolved against the directory holding
    /// the declaration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::FileNotFound` when the file is missing,
    /// `ConfigError::ParseError` for malformed TOML or port and volume specs,
    /// and the errors of [`Deployment::validate`].
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let content = read_text_file(path)?;
        let mut deployment = Self::from_toml(&content)?;

        let (base, _) = split_parent(path);
        for service in &mut deployment.services {
            if let Some(context) = service.build.take() {
                service.build = Some(if context.is_relative() {
                    base.join(context)
                } else {
                    context
                });
            }
        }
        Ok(deployment)
    }

    /// Parse and validate a declaration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` for malformed documents and the
    /// errors of [`Deployment::validate`].
    pub fn from_toml(content: &str) -> Result<Self> {
        let deployment: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        deployment.validate()?;
        Ok(deployment)
    }

    /// Check the invariants the reconciler relies on.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when no service is declared,
    /// `ConfigError::DuplicateService` when two services share a name, and
    /// `ConfigError::InvalidValue` for malformed fields.
    pub fn validate(&self) -> Result<()> {
        if self.services.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: String::from("services"),
            }
            .into());
        }

        let mut names = HashSet::new();
        for (index, service) in self.services.iter().enumerate() {
            service.validate(index)?;
            if !names.insert(service.name.as_str()) {
                return Err(ConfigError::DuplicateService {
                    name: service.name.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Render the declaration as TOML.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` if serialisation fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| {
            ConfigError::ParseError {
                message: format!("failed to serialise declaration: {e}"),
            }
            .into()
        })
    }

    /// Write the declaration to `path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::AlreadyExists` when the file exists and `force`
    /// is not set, and `FilesystemError` when the file cannot be written.
    pub fn save(&self, path: &Utf8Path, force: bool) -> Result<()> {
        let contents = self.to_toml()?;
        let (parent, file_name) = split_parent(path);

        let dir = Dir::open_ambient_dir(parent, ambient_authority())
            .map_err(|e| filesystem_error(parent, &e))?;
        if !force && dir.exists(file_name) {
            return Err(ConfigError::AlreadyExists {
                path: path.as_std_path().to_path_buf(),
            }
            .into());
        }
        dir.write(file_name, contents)
            .map_err(|e| filesystem_error(path, &e))?;
        Ok(())
    }
}

fn filesystem_error(path: &Utf8Path, error: &std::io::Error) -> crate::error::DockshipError {
    let std_path = path.as_std_path().to_path_buf();
    match error.kind() {
        std::io::ErrorKind::NotFound => FilesystemError::NotFound { path: std_path },
        std::io::ErrorKind::PermissionDenied => FilesystemError::PermissionDenied { path: std_path },
        _ => FilesystemError::IoError {
            path: std_path,
            message: error.to_string(),
        },
    }
    .into()
}

/// A published container port.
///
/// Written as `port` or `port/tcp`. Every declared port is bound to the same
/// port number on all interfaces of the remote host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct PortSpec {
    /// Port number inside the container.
    pub container_port: u16,
}

impl PortSpec {
    /// Create a TCP port specification.
    #[must_use]
    pub const fn tcp(container_port: u16) -> Self {
        Self { container_port }
    }

    /// Key used by the engine for exposed ports and bindings, e.g. `8080/tcp`.
    #[must_use]
    pub fn engine_key(&self) -> String {
        format!("{}/tcp", self.container_port)
    }
}

impl FromStr for PortSpec {
    type Err = ConfigError;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        let spec = raw.trim();
        let (port, protocol) = spec.split_once('/').unwrap_or((spec, "tcp"));
        let port_error = |reason: String| ConfigError::InvalidValue {
            field: String::from("ports"),
            reason,
        };

        if !protocol.eq_ignore_ascii_case("tcp") {
            return Err(port_error(format!(
                "unsupported protocol '{protocol}' in '{spec}', only tcp is supported"
            )));
        }
        let container_port = port
            .parse::<u16>()
            .ok()
            .filter(|number| *number != 0)
            .ok_or_else(|| port_error(format!("'{spec}' must be a port between 1 and 65535")))?;
        Ok(Self { container_port })
    }
}

impl TryFrom<String> for PortSpec {
    type Error = ConfigError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PortSpec> for String {
    fn from(spec: PortSpec) -> Self {
        spec.to_string()
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.container_port)
    }
}

/// Access mode of a bind mount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VolumeMode {
    /// Read-write mount.
    #[default]
    ReadWrite,

    /// Read-only mount.
    ReadOnly,
}

impl VolumeMode {
    const fn as_str(self) -> &'static str {
        match self {
            Self::ReadWrite => "rw",
            Self::ReadOnly => "ro",
        }
    }
}

/// A bind mount written as `hostPath:containerPath[:ro|rw]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct VolumeSpec {
    /// Path on the remote host.
    pub host_path: String,

    /// Absolute path inside the container.
    pub container_path: String,

    /// Access mode.
    pub mode: VolumeMode,
}

impl VolumeSpec {
    /// Bind string understood by the engine.
    #[must_use]
    pub fn bind(&self) -> String {
        format!(
            "{}:{}:{}",
            self.host_path,
            self.container_path,
            self.mode.as_str()
        )
    }
}

impl FromStr for VolumeSpec {
    type Err = ConfigError;

    fn from_str(spec: &str) -> std::result::Result<Self, Self::Err> {
        let volume_error = |reason: &str| ConfigError::InvalidValue {
            field: String::from("volumes"),
            reason: format!("'{spec}' {reason}"),
        };

        let parts: Vec<&str> = spec.trim().split(':').collect();
        let (host_path, container_path, mode) = match parts.as_slice() {
            [host, container] => (*host, *container, VolumeMode::ReadWrite),
            [host, container, "rw"] => (*host, *container, VolumeMode::ReadWrite),
            [host, container, "ro"] => (*host, *container, VolumeMode::ReadOnly),
            [_, _, _] => return Err(volume_error("has a mode other than ro or rw")),
            _ => return Err(volume_error("must look like hostPath:containerPath[:mode]")),
        };

        if host_path.is_empty() {
            return Err(volume_error("has an empty host path"));
        }
        if !container_path.starts_with('/') {
            return Err(volume_error("needs an absolute container path"));
        }
        Ok(Self {
            host_path: String::from(host_path),
            container_path: String::from(container_path),
            mode,
        })
    }
}

impl TryFrom<String> for VolumeSpec {
    type Error = ConfigError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VolumeSpec> for String {
    fn from(spec: VolumeSpec) -> Self {
        spec.to_string()
    }
}

impl fmt::Display for VolumeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            VolumeMode::ReadWrite => write!(f, "{}:{}", self.host_path, self.container_path),
            VolumeMode::ReadOnly => f.write_str(&self.bind()),
        }
    }
}
