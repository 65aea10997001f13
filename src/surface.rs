//! The public entry point: [`Shell`], the configured owner of shared
//! process-wide state (virtual command registry, `ShellSettings`, default
//! [`CommandOptions`]), and the [`cmd!`] macro that renders a
//! tagged-template-style command safely.
//!
//! Grounded on `bash.rs`'s `Bash`/`BashOptions` pair — "one configured
//! entry point owning shared state, constructed from an options struct with
//! sane defaults" — generalized from an in-memory interpreter to a runner
//! factory. `cmd!` has no teacher counterpart (the JS tagged-template form
//! it stands in for has no native Rust syntax); it is synthesized in the
//! spirit of builder-macro crates, quoting each interpolated piece through
//! [`crate::quote::quote_arg`] and splicing literal template fragments in
//! verbatim.

use std::collections::HashMap;
use std::sync::Arc;

use crate::registry::{Handler, VirtualCommandRegistry};
use crate::runner::Runner;
use crate::settings::ShellSettings;
use crate::spec::{CommandOptions, CommandSpec};

/// Construction options for [`Shell`]. Mirrors `BashOptions`: everything
/// optional, sane defaults applied in [`Shell::new`].
#[derive(Default)]
pub struct ShellOptions {
    pub env: Option<HashMap<String, String>>,
    pub cwd: Option<String>,
    pub settings: Option<ShellSettings>,
    pub registry: Option<VirtualCommandRegistry>,
}

/// The configured owner of process-wide shell state: the virtual command
/// registry, `errexit`/`pipefail`/trace settings, and default per-run
/// options every [`Runner`] it creates inherits.
pub struct Shell {
    registry: Arc<VirtualCommandRegistry>,
    settings: ShellSettings,
    default_options: CommandOptions,
}

impl Shell {
    pub fn new(options: ShellOptions) -> Self {
        let registry = options.registry.unwrap_or_else(crate::commands::with_builtins);
        let settings = options.settings.unwrap_or_else(ShellSettings::from_env);
        let mut default_options = CommandOptions::default();
        default_options.cwd = options.cwd;
        default_options.env = options.env;
        Self { registry: Arc::new(registry), settings, default_options }
    }

    /// Register a virtual command, overriding any built-in of the same
    /// name.
    pub fn register(&mut self, handler: Handler) {
        Arc::get_mut(&mut self.registry)
            .map(|r| r.register(handler))
            .unwrap_or_else(|| {
                let mut cloned = VirtualCommandRegistry::new();
                for name in self.registry.list() {
                    if let Some(h) = self.registry.get(name) {
                        cloned.register(clone_handler(h));
                    }
                }
                cloned.register(handler);
                self.registry = Arc::new(cloned);
            });
    }

    pub fn settings(&self) -> &ShellSettings {
        &self.settings
    }

    /// Build a [`Runner`] for a raw command string, parsed (or routed to a
    /// real shell) the same way either path would be reached through
    /// [`cmd!`].
    pub fn exec(&self, command: impl Into<String>) -> Runner {
        self.exec_with(command, self.default_options.clone())
    }

    pub fn exec_with(&self, command: impl Into<String>, options: CommandOptions) -> Runner {
        Runner::new(CommandSpec::with_options(command, options), self.registry.clone(), self.settings.clone())
    }

    /// Build a [`Runner`] for a pre-split argument vector. Each argument is
    /// quoted through [`crate::quote::quote`] before being joined into the
    /// command string, so arguments containing spaces or shell
    /// metacharacters need no caller-side escaping.
    pub fn command<S: AsRef<str>>(&self, argv: &[S]) -> Runner {
        let rendered = argv.iter().map(|a| crate::quote::quote(a.as_ref())).collect::<Vec<_>>().join(" ");
        self.exec(rendered)
    }
}

fn clone_handler(h: &Handler) -> Handler {
    match h {
        Handler::Buffered(c) => Handler::Buffered(c.clone()),
        Handler::Streaming(c) => Handler::Streaming(c.clone()),
    }
}

/// Render a `cmd!`-style template into a command string and run it through
/// `$shell.exec(...)`. Literal string fragments are spliced verbatim;
/// every other piece is converted `Into<Arg>` and quoted.
///
/// ```ignore
/// let shell = Shell::new(ShellOptions::default());
/// let runner = cmd!(shell, "echo ", user_input);
/// ```
#[macro_export]
macro_rules! cmd {
    ($shell:expr, $($piece:tt)*) => {{
        let mut __cmd = String::new();
        $crate::__cmd_pieces!(__cmd; $($piece)*);
        $shell.exec(__cmd)
    }};
}

#[macro_export]
#[doc(hidden)]
macro_rules! __cmd_pieces {
    ($buf:ident; ) => {};
    ($buf:ident; $lit:literal $(, $($rest:tt)*)?) => {
        $buf.push_str($lit);
        $crate::__cmd_pieces!($buf; $($($rest)*)?);
    };
    ($buf:ident; $e:expr $(, $($rest:tt)*)?) => {
        $buf.push_str(&$crate::quote::quote_arg(&$crate::quote::Arg::from($e)));
        $crate::__cmd_pieces!($buf; $($($rest)*)?);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn command_quotes_each_argument() {
        let shell = Shell::new(ShellOptions::default());
        let runner = shell.command(&["echo", "$(whoami)"]);
        let result = runner.run().await.unwrap();
        assert_eq!(result.stdout_string(), "$(whoami)\n");
    }

    #[tokio::test]
    async fn cmd_macro_quotes_interpolated_pieces() {
        let shell = Shell::new(ShellOptions::default());
        let injected = "$(whoami)";
        let runner = cmd!(shell, "echo ", injected);
        let result = runner.run().await.unwrap();
        assert_eq!(result.stdout_string(), "$(whoami)\n");
    }

    #[tokio::test]
    async fn cmd_macro_composes_literal_and_value_fragments() {
        let shell = Shell::new(ShellOptions::default());
        let dir = "/tmp";
        let runner = cmd!(shell, "cd ", dir, " && pwd");
        let result = runner.run().await.unwrap();
        assert_eq!(result.code, 0);
    }
}
