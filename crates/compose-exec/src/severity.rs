use std::fmt;

/// Severity assigned to one line of child output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marker rules recognised in builder output, in evaluation order.
const STANDARD_MARKERS: [(&str, Severity); 4] = [
    ("DEBUG:", Severity::Debug),
    ("WARNING:", Severity::Warning),
    ("ERROR:", Severity::Error),
    ("CRITICAL:", Severity::Critical),
];

/// Ordered `(marker, severity)` rules evaluated top to bottom over a line.
///
/// The first rule whose marker occurs anywhere in the line wins; rule order,
/// not position in the line, decides. Lines matching nothing get the fallback.
#[derive(Debug, Clone)]
pub struct SeverityRules {
    rules: Vec<(&'static str, Severity)>,
    fallback: Severity,
}

impl SeverityRules {
    /// `DEBUG:`, `WARNING:`, `ERROR:`, `CRITICAL:`; fallback `Info`.
    pub fn standard() -> Self {
        Self {
            rules: STANDARD_MARKERS.to_vec(),
            fallback: Severity::Info,
        }
    }

    /// Rule set with no markers; every line gets `fallback`.
    pub fn empty(fallback: Severity) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
        }
    }

    /// Append a rule with the lowest priority so far.
    pub fn with_rule(mut self, marker: &'static str, severity: Severity) -> Self {
        self.rules.push((marker, severity));
        self
    }

    pub fn classify(&self, line: &str) -> Severity {
        self.rules
            .iter()
            .find(|(marker, _)| line.contains(marker))
            .map(|(_, severity)| *severity)
            .unwrap_or(self.fallback)
    }
}

impl Default for SeverityRules {
    fn default() -> Self {
        Self::standard()
    }
}

/// How stderr lines of one invocation are classified.
///
/// The builder's stderr carries the same markers as its stdout, while the
/// archiver only writes to stderr when something went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StderrPolicy {
    /// Apply the same rules as stdout.
    #[default]
    Classify,
    /// Every stderr line gets this severity.
    Uniform(Severity),
}

impl StderrPolicy {
    pub fn resolve(self, rules: &SeverityRules, line: &str) -> Severity {
        match self {
            Self::Classify => rules.classify(line),
            Self::Uniform(severity) => severity,
        }
    }
}
