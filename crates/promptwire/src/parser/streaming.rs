use uuid::Uuid;

use super::OutputParser;
use crate::architecture::Architecture;
use crate::models::channel::ProcessedOutput;

/// Accumulates chunks of one generation and re-parses the whole buffer after each.
///
/// A fresh random seed is drawn per generation, so channel ids are stable while the buffer grows
/// and distinct between generations. [`StreamingParser::reset`] starts a new generation.
#[derive(Debug, Clone)]
pub struct StreamingParser {
    parser: OutputParser,
    buffer: String,
}

impl StreamingParser {
    pub fn new(architecture: Architecture) -> Self {
        Self::with_seed(architecture, Uuid::new_v4())
    }

    pub fn with_seed(architecture: Architecture, seed: Uuid) -> Self {
        Self {
            parser: OutputParser::with_seed(architecture, seed),
            buffer: String::new(),
        }
    }

    /// Append a chunk and return the best-known channels so far
    pub fn push(&mut self, chunk: &str) -> ProcessedOutput {
        self.buffer.push_str(chunk);
        self.parser.parse(&self.buffer)
    }

    /// Replace the buffer with the full text produced so far
    pub fn replace(&mut self, text: &str) -> ProcessedOutput {
        self.buffer.clear();
        self.buffer.push_str(text);
        self.parser.parse(&self.buffer)
    }

    /// Parse the buffer as complete output
    pub fn finish(&self) -> ProcessedOutput {
        self.parser.parse_final(&self.buffer)
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn architecture(&self) -> Architecture {
        self.parser.architecture()
    }

    /// Clear the buffer and draw a new seed for the next generation
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.parser = OutputParser::with_seed(self.parser.architecture(), Uuid::new_v4());
    }
}
