//! Line classification of command processor output
//!
//! The command processor has no reliable exit status, so success is read from its
//! output. Classification is a pure function of the line and the configured
//! signature sets, which keeps a rescan of a persisted log identical to the live scan.

use serde::{Deserialize, Serialize};

/// Prefix SQLcl puts in front of server messages
pub const SQLCL_MESSAGE_PREFIX: &str = "Error Message = ";

/// Configurable signature sets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSettings {
    /// Leading tokens of generic, non-fatal errors
    #[serde(default = "default_error_prefixes")]
    pub error_prefixes: Vec<String>,

    /// Leading text of authentication/connectivity failures
    #[serde(default = "default_fatal_signatures")]
    pub fatal_signatures: Vec<String>,
}

fn default_error_prefixes() -> Vec<String> {
    vec!["ORA-".to_string(), "SP2-".to_string()]
}

fn default_fatal_signatures() -> Vec<String> {
    vec![
        "ORA-01017: invalid username/password".to_string(),
        "ORA-01804: failure to initialize timezone information".to_string(),
        "ORA-12514: TNS:listener does not currently know of service requested in connect descriptor"
            .to_string(),
    ]
}

impl Default for SignatureSettings {
    fn default() -> Self {
        Self {
            error_prefixes: default_error_prefixes(),
            fatal_signatures: default_fatal_signatures(),
        }
    }
}

/// Class of one output line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// Ends the target's run
    Fatal,
    /// Counted and reported
    Error,
    Plain,
}

/// Outcome of scanning a sequence of lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scan {
    /// Lines consumed, up to and including a fatal line
    pub lines: Vec<String>,

    /// Generic error lines, right-trimmed
    pub errors: Vec<String>,

    /// The fatal line, if the scan stopped on one
    pub fatal: Option<String>,
}

/// Compiled signature sets
#[derive(Debug, Clone)]
pub struct Signatures {
    error_prefixes: Vec<String>,
    fatal_signatures: Vec<String>,
}

impl Signatures {
    pub fn new(settings: &SignatureSettings) -> Self {
        Self {
            error_prefixes: non_empty(&settings.error_prefixes),
            fatal_signatures: non_empty(&settings.fatal_signatures),
        }
    }

    /// Classify one line of tool output
    pub fn classify(&self, line: &str) -> LineClass {
        let trimmed = line.trim();
        let message = trimmed
            .strip_prefix(SQLCL_MESSAGE_PREFIX)
            .unwrap_or(trimmed);
        if self
            .fatal_signatures
            .iter()
            .any(|signature| message.starts_with(signature.as_str()))
        {
            return LineClass::Fatal;
        }

        let line = line.trim_end();
        if self
            .error_prefixes
            .iter()
            .any(|prefix| line.starts_with(prefix.as_str()))
        {
            return LineClass::Error;
        }

        LineClass::Plain
    }

    /// Scan lines in order, stopping at the first fatal line
    pub fn scan<'a, I>(&self, lines: I) -> Scan
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut scan = Scan::default();
        for line in lines {
            scan.lines.push(line.to_string());
            match self.classify(line) {
                LineClass::Fatal => {
                    scan.fatal = Some(line.trim().to_string());
                    break;
                }
                LineClass::Error => scan.errors.push(line.trim_end().to_string()),
                LineClass::Plain => {}
            }
        }
        scan
    }

    /// Scan a persisted log artifact, skipping its stamp record
    pub fn scan_log(&self, content: &str) -> Scan {
        self.scan(content.lines().skip(1))
    }
}

impl Default for Signatures {
    fn default() -> Self {
        Self::new(&SignatureSettings::default())
    }
}

fn non_empty(values: &[String]) -> Vec<String> {
    values
        .iter()
        .filter(|v| !v.is_empty())
        .cloned()
        .collect()
}
