//! Process-wide shell settings: `errexit`, `pipefail`, `verbose`, `trace`.
//!
//! Grounded on `bash.rs`'s `BashOptions` field set and `main.rs`'s
//! `clap::Parser` flag shape, extended with the env-var precedence this
//! engine's public surface documents: `COMMAND_STREAM_TRACE` takes
//! precedence over `CI`, which takes precedence over
//! `COMMAND_STREAM_VERBOSE`.

#[derive(Debug, Clone, Default)]
pub struct ShellSettings {
    pub errexit: bool,
    pub pipefail: bool,
    pub verbose: bool,
    /// Comma-separated category filter, e.g. "ProcessRunner,VirtualCommand".
    pub trace: Option<String>,
}

impl ShellSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the engine's recognized environment variables. Never inspects
    /// command semantics; only affects diagnostic output.
    pub fn from_env() -> Self {
        let trace_var = std::env::var("COMMAND_STREAM_TRACE").ok().filter(|s| !s.is_empty());
        let ci = std::env::var("CI").map(|v| v != "" && v != "0" && v != "false").unwrap_or(false);
        let verbose_var = std::env::var("COMMAND_STREAM_VERBOSE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let trace = trace_var.or_else(|| if ci { Some("*".to_string()) } else { None });
        let verbose = trace.is_some() || ci || verbose_var;

        Self { errexit: false, pipefail: false, verbose, trace }
    }

    pub fn errexit(mut self, value: bool) -> Self {
        self.errexit = value;
        self
    }

    pub fn pipefail(mut self, value: bool) -> Self {
        self.pipefail = value;
        self
    }

    pub fn verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// True if `category` passes the trace filter (supports a bare `*`
    /// wildcard and exact, case-sensitive category names).
    pub fn traces(&self, category: &str) -> bool {
        match &self.trace {
            None => false,
            Some(filter) => filter.split(',').any(|c| c.trim() == "*" || c.trim() == category),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_filter_matches_category() {
        let s = ShellSettings { trace: Some("ProcessRunner,VirtualCommand".into()), ..Default::default() };
        assert!(s.traces("ProcessRunner"));
        assert!(s.traces("VirtualCommand"));
        assert!(!s.traces("Other"));
    }

    #[test]
    fn wildcard_trace_matches_everything() {
        let s = ShellSettings { trace: Some("*".into()), ..Default::default() };
        assert!(s.traces("Anything"));
    }

    #[test]
    fn no_trace_filter_matches_nothing() {
        let s = ShellSettings::default();
        assert!(!s.traces("ProcessRunner"));
    }
}
