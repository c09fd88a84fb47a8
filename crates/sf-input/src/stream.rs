//! Bounded-cache streaming over override sources.

use std::collections::VecDeque;
use std::io::BufRead;

use sf_project::{OverrideDoc, TimestepDef};

use crate::batch::OverrideBatch;
use crate::{InputError, InputResult};

/// Number of batches to hold in memory at a time. Larger is faster, smaller
/// keeps the footprint bounded regardless of log size.
const CACHE_SIZE: usize = 10;

/// Anything that can hand out time-ordered override batches one at a time.
pub trait OverrideSource {
    /// Pull the next batch, or `None` when the source is exhausted.
    fn next_batch(&mut self) -> InputResult<Option<OverrideBatch>>;

    /// Whether the source may still produce batches. May report `true` right
    /// at the end of input; `next_batch` settles the question.
    fn has_more(&self) -> bool;
}

/// Source backed by a fully parsed override document.
#[derive(Debug)]
pub struct DocSource {
    batches: VecDeque<OverrideBatch>,
}

impl DocSource {
    pub fn new(doc: OverrideDoc) -> Self {
        Self {
            batches: doc.timesteps.into_iter().map(Into::into).collect(),
        }
    }
}

impl OverrideSource for DocSource {
    fn next_batch(&mut self) -> InputResult<Option<OverrideBatch>> {
        Ok(self.batches.pop_front())
    }

    fn has_more(&self) -> bool {
        !self.batches.is_empty()
    }
}

/// Source streaming one JSON timestep object per line off a reader, without
/// ever holding the whole log.
pub struct JsonlSource<R: BufRead> {
    reader: R,
    line: usize,
    done: bool,
}

impl<R: BufRead> JsonlSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            done: false,
        }
    }
}

impl<R: BufRead> OverrideSource for JsonlSource<R> {
    fn next_batch(&mut self) -> InputResult<Option<OverrideBatch>> {
        let mut buf = String::new();
        loop {
            if self.done {
                return Ok(None);
            }
            buf.clear();
            self.line += 1;
            if self.reader.read_line(&mut buf)? == 0 {
                self.done = true;
                return Ok(None);
            }
            if buf.trim().is_empty() {
                continue;
            }
            let def: TimestepDef =
                serde_json::from_str(buf.trim()).map_err(|source| InputError::MalformedBatch {
                    line: self.line,
                    source,
                })?;
            return Ok(Some(def.into()));
        }
    }

    fn has_more(&self) -> bool {
        !self.done
    }
}

/// The reader the simulation clock polls each step: a bounded cache over an
/// override source, refilled only when the cache runs dry and the source
/// still has data.
pub struct OverrideStream {
    source: Box<dyn OverrideSource + Send>,
    cache: VecDeque<OverrideBatch>,
}

impl OverrideStream {
    pub fn new(source: Box<dyn OverrideSource + Send>) -> Self {
        Self {
            source,
            cache: VecDeque::with_capacity(CACHE_SIZE),
        }
    }

    pub fn from_doc(doc: OverrideDoc) -> Self {
        Self::new(Box::new(DocSource::new(doc)))
    }

    pub fn from_jsonl<R: BufRead + Send + 'static>(reader: R) -> Self {
        Self::new(Box::new(JsonlSource::new(reader)))
    }

    /// Whether any batches remain in the cache or the underlying source.
    pub fn has_more(&self) -> bool {
        !self.cache.is_empty() || self.source.has_more()
    }

    /// Look at the next batch without consuming it, refilling the cache from
    /// the source if needed.
    pub fn peek_next(&mut self) -> InputResult<Option<&OverrideBatch>> {
        self.check_cache()?;
        Ok(self.cache.front())
    }

    /// Consume and return the next batch, refilling the cache from the
    /// source if needed.
    pub fn take_next(&mut self) -> InputResult<Option<OverrideBatch>> {
        self.check_cache()?;
        Ok(self.cache.pop_front())
    }

    /// Refill the cache, but only once it is empty: refills load at most
    /// `CACHE_SIZE` batches, which bounds memory for any input.
    fn check_cache(&mut self) -> InputResult<()> {
        if !self.cache.is_empty() {
            return Ok(());
        }
        while self.cache.len() < CACHE_SIZE {
            match self.source.next_batch()? {
                Some(batch) => self.cache.push_back(batch),
                None => break,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::OverrideMode;
    use std::io::Cursor;

    fn jsonl(lines: &[&str]) -> OverrideStream {
        OverrideStream::from_jsonl(Cursor::new(lines.join("\n")))
    }

    fn step_line(step: u64) -> String {
        format!(
            r#"{{"stepValue": {step}, "overrides": [{{"id": "1.1", "name": "tub", "type": "valueset", "value": 5.0}}]}}"#
        )
    }

    #[test]
    fn peek_then_take_agree() {
        let lines: Vec<String> = (0..3).map(step_line).collect();
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        let mut stream = jsonl(&lines);

        assert!(stream.has_more());
        let peeked = stream.peek_next().unwrap().unwrap().clone();
        let taken = stream.take_next().unwrap().unwrap();
        assert_eq!(peeked, taken);
        assert_eq!(taken.step, 0);
        assert_eq!(taken.overrides[0].mode, OverrideMode::Set);
    }

    #[test]
    fn drains_in_order_and_ends() {
        let lines: Vec<String> = (0..25).map(step_line).collect();
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        let mut stream = jsonl(&lines);

        for expected in 0..25 {
            let batch = stream.take_next().unwrap().unwrap();
            assert_eq!(batch.step, expected);
        }
        assert!(stream.take_next().unwrap().is_none());
        assert!(!stream.has_more());
    }

    #[test]
    fn cache_stays_bounded() {
        // More batches than the cache holds; after one refill the cache has
        // at most CACHE_SIZE entries and the rest stay in the source.
        let lines: Vec<String> = (0..50).map(step_line).collect();
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        let mut stream = jsonl(&lines);

        stream.peek_next().unwrap();
        assert_eq!(stream.cache.len(), CACHE_SIZE);
        assert!(stream.source.has_more());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let binding = step_line(3);
        let mut stream = jsonl(&["", &binding, "   ", ""]);
        assert_eq!(stream.take_next().unwrap().unwrap().step, 3);
        assert!(stream.take_next().unwrap().is_none());
    }

    #[test]
    fn malformed_line_is_fatal() {
        let mut stream = jsonl(&[r#"{"overrides": []}"#]);
        let err = stream.take_next().unwrap_err();
        assert!(matches!(err, InputError::MalformedBatch { line: 1, .. }));
    }

    #[test]
    fn doc_source_preserves_document_order() {
        let doc: OverrideDoc = serde_json::from_str(
            r#"{
                "id": "9.1",
                "name": "inputs",
                "timesteps": [
                    {"stepValue": 1, "overrides": []},
                    {"stepValue": 4, "overrides": []}
                ]
            }"#,
        )
        .unwrap();
        let mut stream = OverrideStream::from_doc(doc);
        assert_eq!(stream.take_next().unwrap().unwrap().step, 1);
        assert_eq!(stream.take_next().unwrap().unwrap().step, 4);
        assert!(!stream.has_more());
    }
}
