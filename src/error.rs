use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    /// A source table is malformed: missing column, bad date, bad number.
    #[error("Data format error in {source_name}{}: {message}", line_suffix(.line))]
    DataFormat {
        source_name: String,
        line: Option<usize>,
        message: String,
    },

    #[error("Data consistency error: {0}")]
    DataConsistency(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

fn line_suffix(line: &Option<usize>) -> String {
    match line {
        Some(l) => format!(" (line {})", l),
        None => String::new(),
    }
}

impl ReportError {
    pub fn format(source_name: &str, line: Option<usize>, message: impl Into<String>) -> Self {
        ReportError::DataFormat {
            source_name: source_name.to_string(),
            line,
            message: message.into(),
        }
    }

    pub fn is_data_format(&self) -> bool {
        matches!(self, ReportError::DataFormat { .. })
    }

    pub fn is_data_consistency(&self) -> bool {
        matches!(self, ReportError::DataConsistency(_))
    }
}

pub type ReportResult<T> = Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_format_message_includes_line_when_known() {
        let e = ReportError::format("monthly", Some(4), "bad date");
        assert_eq!(e.to_string(), "Data format error in monthly (line 4): bad date");
        let e = ReportError::format("monthly", None, "missing column");
        assert_eq!(e.to_string(), "Data format error in monthly: missing column");
        assert!(e.is_data_format());
        assert!(!e.is_data_consistency());
    }
}
