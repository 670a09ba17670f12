//! Result delivery for the measurement loop

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use gauge_station::{Measurement, ResultSink, SinkError};

/// Prints each result on stdout and optionally appends it to a file
pub struct ConsoleSink {
    file: Option<PathBuf>,
}

impl ConsoleSink {
    pub fn new(file: Option<PathBuf>) -> Self {
        Self { file }
    }
}

impl ResultSink for ConsoleSink {
    fn deliver(&self, measurement: &Measurement) -> Result<(), SinkError> {
        println!("RESULT {}", measurement);

        if let Some(path) = &self.file {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "{}", measurement)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauge_protocol::Dimensions;

    #[test]
    fn test_appends_lines() {
        let path = std::env::temp_dir().join(format!("gauge-results-{}.txt", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let sink = ConsoleSink::new(Some(path.clone()));
        sink.deliver(&Measurement::with_dimensions(1250, Dimensions::new(30, 20, 10)))
            .unwrap();
        sink.deliver(&Measurement::weight_only(800)).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1250:30:20:10\n800\n");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_unwritable_file_is_an_error() {
        let sink = ConsoleSink::new(Some(std::env::temp_dir()));
        assert!(sink.deliver(&Measurement::weight_only(1)).is_err());
    }
}
