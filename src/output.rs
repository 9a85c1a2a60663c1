/*!
 * Prime Output
 * The one user-visible artifact of the pipeline: a line per discovered prime
 *
 * Every stage process holds a copy of the same sink descriptor. Lines are
 * rendered in full and handed to the kernel in a single unbuffered write, so
 * output from concurrently running stages interleaves by line, never inside one.
 */

use crate::core::types::{Candidate, Pid, StageIndex};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Write};
use std::os::fd::AsFd;

/// Line format for discovered primes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// `prime 7`
    #[default]
    Text,
    /// `{"prime":7,"stage":4,"pid":1234}`
    Json,
}

/// One discovered prime as reported by its stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimeRecord {
    pub prime: Candidate,
    pub stage: StageIndex,
    pub pid: Pid,
}

/// Shared, unbuffered output stream for prime lines
#[derive(Debug)]
pub struct PrimeSink {
    file: File,
    format: OutputFormat,
}

impl PrimeSink {
    /// Sink writing to a private duplicate of this process's stdout
    pub fn stdout(format: OutputFormat) -> io::Result<Self> {
        let fd = io::stdout().as_fd().try_clone_to_owned()?;
        Ok(Self::new(File::from(fd), format))
    }

    /// Sink over any file or pipe; open regular files in append mode
    pub fn new(file: File, format: OutputFormat) -> Self {
        Self { file, format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Render a record as one complete line, trailing newline included
    pub fn render(&self, record: &PrimeRecord) -> io::Result<String> {
        let mut line = match self.format {
            OutputFormat::Text => format!("prime {}", record.prime),
            OutputFormat::Json => serde_json::to_string(record)?,
        };
        line.push('\n');
        Ok(line)
    }

    /// Write one record with a single write call
    pub fn emit(&self, record: &PrimeRecord) -> io::Result<()> {
        let line = self.render(record)?;
        (&self.file).write_all(line.as_bytes())
    }
}

/// Parse a line produced by either format back into its prime
pub fn parse_line(line: &str) -> Option<Candidate> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("prime ") {
        return rest.trim().parse().ok();
    }
    serde_json::from_str::<PrimeRecord>(line)
        .ok()
        .map(|record| record.prime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom};

    fn record(prime: Candidate) -> PrimeRecord {
        PrimeRecord {
            prime,
            stage: 4,
            pid: 1234,
        }
    }

    #[test]
    fn test_text_line() {
        let sink = PrimeSink::new(tempfile::tempfile().unwrap(), OutputFormat::Text);
        assert_eq!(sink.render(&record(7)).unwrap(), "prime 7\n");
    }

    #[test]
    fn test_json_line() {
        let sink = PrimeSink::new(tempfile::tempfile().unwrap(), OutputFormat::Json);
        assert_eq!(
            sink.render(&record(7)).unwrap(),
            "{\"prime\":7,\"stage\":4,\"pid\":1234}\n"
        );
    }

    #[test]
    fn test_parse_both_formats() {
        assert_eq!(parse_line("prime 31"), Some(31));
        assert_eq!(parse_line("{\"prime\":31,\"stage\":11,\"pid\":9}"), Some(31));
        assert_eq!(parse_line("garbage"), None);
        assert_eq!(parse_line("prime x"), None);
    }

    #[test]
    fn test_emit_appends_lines() {
        let mut file = tempfile::tempfile().unwrap();
        let sink = PrimeSink::new(file.try_clone().unwrap(), OutputFormat::Text);
        sink.emit(&record(2)).unwrap();
        sink.emit(&record(3)).unwrap();

        let mut text = String::new();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.read_to_string(&mut text).unwrap();
        assert_eq!(text, "prime 2\nprime 3\n");
    }
}
