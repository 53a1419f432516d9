//! Interactive construction of a deployment declaration for `dockship init`.

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input};

use super::declaration::{Deployment, PortSpec, ServiceDeclaration, VolumeSpec};
use crate::error::{ConfigError, Result};

/// Source of operator answers.
///
/// The terminal implementation is [`TerminalPrompter`]; tests supply scripted
/// answers.
pub trait Prompter {
    /// Ask for a line of text. An empty answer selects `default` when given.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::PromptFailed` when the prompt cannot be shown or
    /// is aborted.
    fn text(&self, prompt: &str, default: Option<&str>) -> Result<String>;

    /// Ask a yes/no question.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::PromptFailed` when the prompt cannot be shown or
    /// is aborted.
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;
}

/// Prompts on the controlling terminal using `dialoguer`.
#[derive(Default)]
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    /// Create a prompter with the colourful theme.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn prompt_failed(error: &dialoguer::Error) -> crate::error::DockshipError {
    ConfigError::PromptFailed {
        message: error.to_string(),
    }
    .into()
}

impl Prompter for TerminalPrompter {
    fn text(&self, prompt: &str, default: Option<&str>) -> Result<String> {
        let mut input = Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true);
        if let Some(value) = default {
            input = input.default(String::from(value));
        }
        input.interact_text().map_err(|e| prompt_failed(&e))
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact()
            .map_err(|e| prompt_failed(&e))
    }
}

/// Split a comma-separated answer into trimmed, non-empty items.
fn split_list(answer: &str) -> impl Iterator<Item = &str> {
    answer.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn prompt_service<P: Prompter>(prompter: &P) -> Result<ServiceDeclaration> {
    let name = prompter.text("Service name", None)?;
    let image = prompter.text("Image reference", None)?;
    let mut service = ServiceDeclaration::new(name.trim(), image.trim());

    let ports = prompter.text("Ports (comma separated, e.g. 8080,443/tcp)", Some(""))?;
    service.ports = split_list(&ports)
        .map(str::parse::<PortSpec>)
        .collect::<std::result::Result<_, _>>()?;

    let environment = prompter.text("Environment (comma separated KEY=VALUE)", Some(""))?;
    service.environment = split_list(&environment).map(String::from).collect();

    let volumes = prompter.text("Volumes (comma separated host:container[:ro])", Some(""))?;
    service.volumes = split_list(&volumes)
        .map(str::parse::<VolumeSpec>)
        .collect::<std::result::Result<_, _>>()?;

    let networks = prompter.text("Networks (comma separated)", Some(""))?;
    service.networks = split_list(&networks).map(String::from).collect();

    let build = prompter.text("Build context directory (empty for none)", Some(""))?;
    let trimmed = build.trim();
    if !trimmed.is_empty() {
        service.build = Some(trimmed.into());
    }
    Ok(service)
}

/// Ask the operator for one or more services and return the declaration.
///
/// The result is validated before it is returned, so a declaration that
/// `init` writes always loads again.
///
/// # Errors
///
/// Returns `ConfigError::PromptFailed` when prompting fails, and
/// `ConfigError::InvalidValue` or `ConfigError::DuplicateService` when the
/// answers do not form a valid declaration.
pub fn prompt_deployment<P: Prompter>(prompter: &P) -> Result<Deployment> {
    let mut deployment = Deployment::default();
    loop {
        deployment.services.push(prompt_service(prompter)?);
        if !prompter.confirm("Add another service?", false)? {
            break;
        }
    }
    deployment.validate()?;
    Ok(deployment)
}
