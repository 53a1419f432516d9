//! Unit tests for dockship configuration.
//!
//! This module contains tests organised into:
//! - [`helpers`] - Shared fixtures and helper functions
//! - [`types_tests`] - Application config types and serialisation
//! - [`layer_precedence_tests`] - `MergeComposer` layer precedence tests
//! - [`declaration_tests`] - Deployment declaration parsing and validation
//! - [`prompt_tests`] - Scripted `init` prompts
