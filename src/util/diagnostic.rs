//! User-facing diagnostic messages.
//!
//! Every failure the CLI reports names what went wrong, the containers
//! involved, and at least one concrete way to fix the configuration.

use std::fmt;
use std::path::PathBuf;

use miette::{Diagnostic as MietteDiagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    pub const NO_MANIFEST: &str = "help: Create a Flotilla.toml with at least one [[container]]";

    pub const UNKNOWN_CONTAINER: &str = "help: Run `flotilla graph` to list bound containers";

    pub const UNRESOLVED_REMOTE: &str =
        "help: Add the target as a [[container]] or give the remote a `fallback`";

    pub const UNRESOLVED_SHARED: &str =
        "help: Declare the key under [[container.shared]] in a container reachable from the root";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic message with optional context and suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub severity: Severity,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
    /// Manifest the diagnostic refers to
    pub location: Option<PathBuf>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, message)
    }

    fn with_severity(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity_str = match (color, self.severity) {
            (true, Severity::Error) => "\x1b[1;31merror\x1b[0m",
            (true, Severity::Warning) => "\x1b[1;33mwarning\x1b[0m",
            (false, Severity::Error) => "error",
            (false, Severity::Warning) => "warning",
        };

        output.push_str(&format!("{}: {}\n", severity_str, self.message));

        if let Some(ref path) = self.location {
            output.push_str(&format!("  --> {}\n", path.display()));
        }

        for ctx in &self.context {
            output.push_str(&format!("  = {}\n", ctx));
        }

        if !self.suggestions.is_empty() {
            output.push('\n');
            let help_prefix = if color {
                "\x1b[1;32mhelp\x1b[0m"
            } else {
                "help"
            };
            output.push_str(&format!("{}: consider:\n", help_prefix));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Two `[[container]]` entries share a name.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("container `{name}` is declared more than once")]
#[diagnostic(
    code(flotilla::manifest::duplicate_container),
    help("Container names must be unique across the manifest; rename or remove one entry")
)]
pub struct DuplicateContainerError {
    pub name: String,
    #[source_code]
    pub src: NamedSource<String>,
    #[label("second declaration here")]
    pub span: Option<SourceSpan>,
}

/// An expose or shared declaration points at a module the container does not define.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("container `{container}` references undefined module `{module}`")]
#[diagnostic(code(flotilla::manifest::undefined_module))]
pub struct UndefinedModuleError {
    pub container: String,
    pub module: String,
    #[help]
    pub defined: Option<String>,
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_formatting() {
        let diag = Diagnostic::error("remote container `container-with-shared` was never bound")
            .with_context("required by `container-no-shared` as alias `container-with-shared`")
            .with_suggestion("Add `container-with-shared` to Flotilla.toml")
            .with_suggestion("Declare a fallback container for the remote");

        let output = diag.format(false);
        assert!(output.starts_with("error: remote container"));
        assert!(output.contains("  = required by `container-no-shared`"));
        assert!(output.contains("help: consider:"));
        assert!(output.contains("2. Declare a fallback"));
    }

    #[test]
    fn test_warning_without_suggestions() {
        let output = Diagnostic::warning("version mismatch").format(false);
        assert_eq!(output, "warning: version mismatch\n");
    }

    #[test]
    fn test_location_rendered() {
        let output = Diagnostic::warning("remote container `missing` was never bound")
            .with_location("Flotilla.toml")
            .format(false);
        assert!(output.contains("--> Flotilla.toml"));
    }
}
