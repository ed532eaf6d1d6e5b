//! Dataset schema and categorical codec
//! Holds the role of every column (continuous, integer-valued, categorical) and the
//! token <-> code dictionaries used to encode records and decode rendered output.
//! A codec is built once at start-up and only read afterwards.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{KMeansError, Result};

/// Field separator of the reference dataset
pub const DEFAULT_DELIMITER: char = ',';

/// Number of features in the reference dataset
pub const KDD_FEATURES: usize = 41;

const PROTOCOLS: [&str; 3] = ["icmp", "tcp", "udp"];

const SERVICES: [&str; 70] = [
    "aol", "auth", "bgp", "courier", "csnet_ns", "ctf", "daytime", "discard", "domain", "domain_u",
    "echo", "eco_i", "ecr_i", "efs", "exec", "finger", "ftp", "ftp_data", "gopher", "harvest",
    "hostnames", "http", "http_2784", "http_443", "http_8001", "icmp", "imap4", "IRC",
    "iso_tsap", "klogin", "kshell", "ldap", "link", "login", "mtp", "name", "netbios_dgm",
    "netbios_ns", "netbios_ssn", "netstat", "nnsp", "nntp", "ntp_u", "other", "pm_dump",
    "pop_2", "pop_3", "printer", "private", "remote_job", "rje", "shell", "smtp", "sql_net",
    "ssh", "sunrpc", "supdup", "systat", "telnet", "tftp_u", "tim_i", "time", "urh_i", "urp_i",
    "uucp", "uucp_path", "vmnet", "whois", "X11", "Z39_50",
];

const FLAGS: [&str; 11] = ["OTH", "REJ", "RSTO", "RSTOS0", "RSTR", "S0", "S1", "S2", "S3", "SF", "SH"];

/// Role of a column in the feature vector
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Real value, rendered with two decimals
    Continuous,
    /// Numeric value rendered as the nearest integer
    Integer,
    /// Token from a fixed vocabulary, encoded as its index
    Categorical,
}

/// Serializable description of one column
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub kind: ColumnKind,
    #[serde(default)]
    pub tokens: Vec<String>,
}

impl ColumnSpec {
    pub fn continuous() -> Self {
        Self { kind: ColumnKind::Continuous, tokens: Vec::new() }
    }

    pub fn integer() -> Self {
        Self { kind: ColumnKind::Integer, tokens: Vec::new() }
    }

    pub fn categorical<S: AsRef<str>>(tokens: &[S]) -> Self {
        Self { kind: ColumnKind::Categorical, tokens: tokens.iter().map(|t| t.as_ref().to_string()).collect() }
    }
}

/// Serializable schema description, loadable from JSON
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    pub columns: Vec<ColumnSpec>,
}

fn default_delimiter() -> char {
    DEFAULT_DELIMITER
}

#[derive(Clone, Debug)]
struct Column {
    kind: ColumnKind,
    tokens: Vec<String>,
    codes: HashMap<String, usize>,
}

/// Read-only schema plus categorical dictionaries
///
/// Safe to share between threads: nothing mutates it after construction.
#[derive(Clone, Debug)]
pub struct FeatureCodec {
    delimiter: char,
    columns: Vec<Column>,
}

impl FeatureCodec {
    /// Build a codec from column descriptions
    ///
    /// # Errors
    /// * `InvalidSchema` if there are no columns, a categorical column has no tokens or
    ///   repeats a token, or a non-categorical column carries tokens
    pub fn new(delimiter: char, specs: Vec<ColumnSpec>) -> Result<Self> {
        if specs.is_empty() {
            return Err(KMeansError::InvalidSchema("schema has no columns".to_string()));
        }
        let mut columns = Vec::with_capacity(specs.len());
        for (idx, spec) in specs.into_iter().enumerate() {
            let mut codes = HashMap::with_capacity(spec.tokens.len());
            match spec.kind {
                ColumnKind::Categorical => {
                    if spec.tokens.is_empty() {
                        return Err(KMeansError::InvalidSchema(format!("categorical column {} has no tokens", idx)));
                    }
                    for (code, token) in spec.tokens.iter().enumerate() {
                        if codes.insert(token.clone(), code).is_some() {
                            return Err(KMeansError::InvalidSchema(format!("column {} repeats token `{}`", idx, token)));
                        }
                    }
                }
                _ => {
                    if !spec.tokens.is_empty() {
                        return Err(KMeansError::InvalidSchema(format!("column {} is not categorical but has tokens", idx)));
                    }
                }
            }
            columns.push(Column { kind: spec.kind, tokens: spec.tokens, codes });
        }
        Ok(Self { delimiter, columns })
    }

    pub fn from_config(config: SchemaConfig) -> Result<Self> {
        Self::new(config.delimiter, config.columns)
    }

    /// Parse a JSON schema description
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SchemaConfig = serde_json::from_str(json)
            .map_err(|err| KMeansError::InvalidSchema(err.to_string()))?;
        Self::from_config(config)
    }

    /// Schema of the KDD Cup 1999 connection records
    ///
    /// Column 0 is continuous, columns 1-3 are protocol, service and flag,
    /// columns 4-23, 31 and 32 are integer counters, the rest are rates.
    pub fn kdd_cup() -> Result<Self> {
        let specs = (0..KDD_FEATURES).map(|col| match col {
            1 => ColumnSpec::categorical(&PROTOCOLS),
            2 => ColumnSpec::categorical(&SERVICES),
            3 => ColumnSpec::categorical(&FLAGS),
            4..=23 | 31 | 32 => ColumnSpec::integer(),
            _ => ColumnSpec::continuous(),
        }).collect();
        Self::new(DEFAULT_DELIMITER, specs)
    }

    /// Number of features (F)
    pub fn features(&self) -> usize {
        self.columns.len()
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn kind(&self, column: usize) -> Option<ColumnKind> {
        self.columns.get(column).map(|c| c.kind)
    }

    pub fn is_categorical(&self, column: usize) -> bool {
        self.kind(column) == Some(ColumnKind::Categorical)
    }

    pub fn is_integer_valued(&self, column: usize) -> bool {
        self.kind(column) == Some(ColumnKind::Integer)
    }

    /// Numeric code of a categorical token
    pub fn encode(&self, column: usize, token: &str) -> Result<f64> {
        self.column(column)?
            .codes
            .get(token)
            .map(|code| *code as f64)
            .ok_or_else(|| KMeansError::UnknownToken { column, token: token.to_string() })
    }

    /// Token for a (possibly unrounded) code
    pub fn decode(&self, column: usize, code: f64) -> Result<&str> {
        let col = self.column(column)?;
        let rounded = code.round();
        if !rounded.is_finite() || rounded < 0.0 || rounded as usize >= col.tokens.len() {
            return Err(KMeansError::CodeOutOfRange { column, code: rounded as i64 });
        }
        Ok(col.tokens[rounded as usize].as_str())
    }

    fn column(&self, column: usize) -> Result<&Column> {
        self.columns.get(column).ok_or(KMeansError::DimensionMismatch {
            expected: self.columns.len(),
            found: column + 1,
        })
    }
}
