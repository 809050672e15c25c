use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    io::{self, Write},
};

use crate::reading::Reading;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
            Self::Csv => f.write_str("csv"),
        }
    }
}

impl clap::ValueEnum for OutputFormat {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Text, Self::Json, Self::Csv]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::Text => clap::builder::PossibleValue::new("text"),
            Self::Json => clap::builder::PossibleValue::new("json"),
            Self::Csv => clap::builder::PossibleValue::new("csv"),
        })
    }
}

/// How a [`Reporter`] writes readings
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub format: OutputFormat,
    /// Prefix text output with a running number. CSV rows always carry one.
    pub numbered: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            numbered: true,
        }
    }
}

/// One CSV row
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlattenReading {
    pub seq: usize,
    pub satellites: String,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub altitude: Option<String>,
    pub speed: Option<String>,
    pub course: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde_as(as = "Option<serde_with::TimestampSeconds<i64>>")]
    pub unix_time: Option<DateTime<Utc>>,
    pub humidity: Option<String>,
    pub temperature: Option<String>,
}

impl From<(usize, &Reading)> for FlattenReading {
    fn from((seq, value): (usize, &Reading)) -> Self {
        Self {
            seq,
            satellites: value.satellites().to_owned(),
            latitude: value.latitude().map(str::to_owned),
            longitude: value.longitude().map(str::to_owned),
            altitude: value.altitude().map(str::to_owned),
            speed: value.speed().map(str::to_owned),
            course: value.course().map(str::to_owned),
            timestamp: value.timestamp(),
            unix_time: value.timestamp(),
            humidity: value.humidity().map(str::to_owned),
            temperature: value.temperature().map(str::to_owned),
        }
    }
}

enum Sink<W: Write> {
    Plain(W),
    Csv(csv::Writer<W>),
}

/// Writes each reading to an output as soon as it is reported.
pub struct Reporter<W: Write> {
    sink: Sink<W>,
    config: ReportConfig,
    count: usize,
}

impl<W: Write> Reporter<W> {
    pub fn new(output: W, config: ReportConfig) -> Self {
        let sink = match config.format {
            OutputFormat::Csv => Sink::Csv(csv::Writer::from_writer(output)),
            OutputFormat::Text | OutputFormat::Json => Sink::Plain(output),
        };
        Self {
            sink,
            config,
            count: 0,
        }
    }

    /// Readings reported so far
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn report(&mut self, reading: &Reading) -> io::Result<()> {
        self.count += 1;
        match &mut self.sink {
            Sink::Plain(output) => {
                match self.config.format {
                    OutputFormat::Json => {
                        serde_json::to_writer(&mut *output, reading)?;
                        output.write_all(b"\n")?;
                    }
                    _ => {
                        if self.config.numbered {
                            output.write_fmt(format_args!("#{:0>4}\n", self.count))?;
                        }
                        output.write_fmt(format_args!("{:#}\n", reading))?;
                    }
                }
                output.flush()
            }
            Sink::Csv(writer) => {
                writer.serialize(FlattenReading::from((self.count, reading)))?;
                writer.flush()
            }
        }
    }

    /// Flush and hand back the output.
    pub fn into_inner(self) -> io::Result<W> {
        match self.sink {
            Sink::Plain(mut output) => {
                output.flush()?;
                Ok(output)
            }
            Sink::Csv(writer) => writer.into_inner().map_err(|e| e.into_error()),
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::proto::line::Fields;

    fn reading(line: &str) -> Reading {
        Reading::from_fields(&Fields::try_from(line).unwrap())
    }

    fn output(format: OutputFormat, numbered: bool, lines: &[&str]) -> String {
        let mut reporter = Reporter::new(Vec::new(), ReportConfig { format, numbered });
        for line in lines {
            reporter.report(&reading(line)).unwrap();
        }
        assert_eq!(reporter.count(), lines.len());
        String::from_utf8(reporter.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_text_numbered() {
        let out = output(OutputFormat::Text, true, &["07,40.7128,-74.0060,10,1.2,45,"]);
        assert!(out.starts_with("#0001\nnumber of satellites: 07\nlat: 40.7128\n"));
        assert!(out.ends_with("datetime: ---\n"));
    }

    #[test]
    fn test_text_plain() {
        let out = output(OutputFormat::Text, false, &[""]);
        assert!(out.starts_with("number of satellites: 0\n"));
    }

    #[test]
    fn test_json_lines() {
        let out = output(
            OutputFormat::Json,
            true,
            &["01,1,2,3,4,5,2024-01-01T00:00:00,55,21.3", "02"],
        );
        let rows: Vec<Reading> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(
            rows,
            vec![
                reading("01,1,2,3,4,5,2024-01-01T00:00:00,55,21.3"),
                reading("02")
            ]
        );
    }

    #[test]
    fn test_csv_rows() {
        let out = output(
            OutputFormat::Csv,
            true,
            &["07,40.7128,-74.0060,10,1.2,45,2024-03-01T12:00:00", "03,,,,,,"],
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "seq,satellites,latitude,longitude,altitude,speed,course,timestamp,unix_time,humidity,temperature"
        );
        assert!(lines[1].starts_with("1,07,40.7128,-74.0060,10,1.2,45,2024-03-01T12:00:00"));
        assert!(lines[1].ends_with(",1709294400,,"));
        assert_eq!(lines[2], "2,03,,,,,,,,,");
    }
}
