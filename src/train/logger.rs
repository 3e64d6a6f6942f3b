//! Per-epoch metric rows

use std::fmt;

/// One cell of a logged row
#[derive(Clone, Debug, PartialEq)]
pub enum LogValue {
    Int(usize),
    /// A metric value; `None` when the metric had nothing to report
    Float(Option<f32>),
    Text(String),
}

impl LogValue {
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            LogValue::Int(i) => Some(*i as f32),
            LogValue::Float(v) => *v,
            LogValue::Text(_) => None,
        }
    }
}

impl fmt::Display for LogValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogValue::Int(i) => write!(f, "{i}"),
            LogValue::Float(Some(v)) => write!(f, "{v:.6}"),
            LogValue::Float(None) => f.write_str("None"),
            LogValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<usize> for LogValue {
    fn from(i: usize) -> Self {
        LogValue::Int(i)
    }
}

impl From<Option<f32>> for LogValue {
    fn from(v: Option<f32>) -> Self {
        LogValue::Float(v)
    }
}

impl From<String> for LogValue {
    fn from(s: String) -> Self {
        LogValue::Text(s)
    }
}

/// Sink for the metric table, one row per epoch
pub trait RowLogger {
    /// Called once before the first row of a fit with the column names
    fn header(&mut self, _names: &[String]) {}

    fn log_row(&mut self, row: &[LogValue]);
}

/// Prints whitespace-aligned rows to stdout
#[derive(Clone, Debug, Default)]
pub struct PrintLogger;

const COLUMN_WIDTH: usize = 12;

impl RowLogger for PrintLogger {
    fn header(&mut self, names: &[String]) {
        let line: Vec<String> = names
            .iter()
            .map(|n| format!("{n:<width$}", width = COLUMN_WIDTH))
            .collect();
        println!("{}", line.join(" ").trim_end());
    }

    fn log_row(&mut self, row: &[LogValue]) {
        let line: Vec<String> = row
            .iter()
            .map(|v| format!("{:<width$}", v.to_string(), width = COLUMN_WIDTH))
            .collect();
        println!("{}", line.join(" ").trim_end());
    }
}

/// Discards everything
#[derive(Clone, Debug, Default)]
pub struct NoopLogger;

impl RowLogger for NoopLogger {
    fn log_row(&mut self, _row: &[LogValue]) {}
}

/// Format a duration in seconds as `mm:ss`, or `h:mm:ss` past the hour
pub fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (h, m, s) = (total / 3600, (total / 60) % 60, total % 60);
    if h != 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.4), "00:00");
        assert_eq!(format_time(75.0), "01:15");
        assert_eq!(format_time(3725.0), "1:02:05");
    }

    #[test]
    fn test_log_value_display() {
        assert_eq!(LogValue::Int(3).to_string(), "3");
        assert_eq!(LogValue::Float(Some(0.5)).to_string(), "0.500000");
        assert_eq!(LogValue::Float(None).to_string(), "None");
        assert_eq!(LogValue::from("00:01".to_string()).to_string(), "00:01");
    }

    #[test]
    fn test_as_f32() {
        assert_eq!(LogValue::Float(Some(1.5)).as_f32(), Some(1.5));
        assert_eq!(LogValue::Text("x".into()).as_f32(), None);
    }
}
