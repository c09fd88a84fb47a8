//! Row sink implementations.

use std::io::Write;

use crate::ResultsResult;

/// Receives the header once, then one row per completed step.
pub trait RowSink {
    fn write_header(&mut self, names: &[String]) -> ResultsResult<()>;
    fn write_row(&mut self, step: u64, values: &[f64]) -> ResultsResult<()>;
}

/// CSV-style writer over any `io::Write`: a `time step` column followed by
/// one column per entity in traversal order.
pub struct CsvWriter<W: Write> {
    out: W,
}

impl<W: Write> CsvWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(mut self) -> ResultsResult<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<W: Write> RowSink for CsvWriter<W> {
    fn write_header(&mut self, names: &[String]) -> ResultsResult<()> {
        write!(self.out, "time step")?;
        for name in names {
            write!(self.out, ",{name}")?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn write_row(&mut self, step: u64, values: &[f64]) -> ResultsResult<()> {
        write!(self.out, "{step}")?;
        for value in values {
            write!(self.out, ",{value}")?;
        }
        writeln!(self.out)?;
        Ok(())
    }
}

/// In-memory sink for tests and queries.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub header: Vec<String>,
    pub rows: Vec<(u64, Vec<f64>)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded series for one column, by entity name.
    pub fn series(&self, name: &str) -> Option<Vec<f64>> {
        let column = self.header.iter().position(|n| n == name)?;
        Some(self.rows.iter().map(|(_, values)| values[column]).collect())
    }
}

impl RowSink for MemorySink {
    fn write_header(&mut self, names: &[String]) -> ResultsResult<()> {
        self.header = names.to_vec();
        Ok(())
    }

    fn write_row(&mut self, step: u64, values: &[f64]) -> ResultsResult<()> {
        self.rows.push((step, values.to_vec()));
        Ok(())
    }
}
