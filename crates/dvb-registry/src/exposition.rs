//! Prometheus text exposition of single-sample metric records.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

/// Sample value of a record. Every variant has a fixed textual form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    Boolean(bool),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MetricValue::Integer(v) => write!(f, "{v}"),
            MetricValue::Unsigned(v) => write!(f, "{v}"),
            MetricValue::Float(v) if v.is_nan() => f.write_str("NaN"),
            MetricValue::Float(v) if v.is_infinite() => {
                f.write_str(if v > 0.0 { "+Inf" } else { "-Inf" })
            }
            MetricValue::Float(v) => write!(f, "{v:.6}"),
            MetricValue::Boolean(v) => f.write_str(if v { "1" } else { "0" }),
        }
    }
}

impl From<bool> for MetricValue {
    fn from(v: bool) -> Self {
        MetricValue::Boolean(v)
    }
}

impl From<u32> for MetricValue {
    fn from(v: u32) -> Self {
        MetricValue::Unsigned(u64::from(v))
    }
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        MetricValue::Unsigned(v)
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Integer(v)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

/// One metric with a single sample, rendered as a `HELP`/`TYPE`/sample block
/// followed by a blank line.
#[derive(Debug, Clone, Copy)]
pub struct MetricRecord<'a, L: AsRef<str> = &'a str> {
    pub name: &'a str,
    pub kind: MetricKind,
    pub help: &'a str,
    /// Alternating key/value tokens.
    pub labels: &'a [L],
    pub value: MetricValue,
}

impl<L: AsRef<str>> fmt::Display for MetricRecord<'_, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.help.is_empty() {
            writeln!(f, "# HELP {} {}", self.name, escape_help(self.help))?;
        }
        writeln!(f, "# TYPE {} {}", self.name, self.kind.as_str())?;
        writeln!(
            f,
            "{}{} {}",
            self.name,
            format_labels(self.labels),
            self.value
        )?;
        writeln!(f)
    }
}

/// Render alternating key/value tokens as `{k1="v1",k2="v2"}`.
///
/// Empty or odd-length input renders as the empty string, never as `{}`.
pub fn format_labels<L: AsRef<str>>(pairs: &[L]) -> String {
    if pairs.is_empty() || pairs.len() % 2 != 0 {
        return String::new();
    }
    let mut out = String::from("{");
    for (i, pair) in pairs.chunks_exact(2).enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(pair[0].as_ref());
        out.push_str("=\"");
        out.push_str(&escape_label_value(pair[1].as_ref()));
        out.push('"');
    }
    out.push('}');
    out
}

fn escape_label_value(v: &str) -> String {
    let mut out = String::with_capacity(v.len());
    for c in v.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}
