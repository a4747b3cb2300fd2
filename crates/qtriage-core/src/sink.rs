//! Destinations for rendered text output.
//!
//! Renderers write through [`OutputSink`] and never know whether the text
//! lands in a file, on stdout, in memory, or in several places at once.

use std::cell::RefCell;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use qtriage_error::{Result, TriageError};

/// A text destination.
pub trait OutputSink {
    /// Write `text` exactly as given.
    fn write_str(&mut self, text: &str) -> Result<()>;

    /// Write `text` followed by a newline.
    fn write_line(&mut self, text: &str) -> Result<()> {
        self.write_str(text)?;
        self.write_str("\n")
    }

    /// Write pre-formatted arguments, as produced by `format_args!`.
    fn write_formatted(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        match args.as_str() {
            Some(text) => self.write_str(text),
            None => self.write_str(&args.to_string()),
        }
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: OutputSink + ?Sized> OutputSink for Box<S> {
    fn write_str(&mut self, text: &str) -> Result<()> {
        (**self).write_str(text)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Standard output.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn write_str(&mut self, text: &str) -> Result<()> {
        io::stdout().lock().write_all(text.as_bytes())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        io::stdout().lock().flush()?;
        Ok(())
    }
}

/// A buffered file, created (or truncated) on construction.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileSink {
    /// # Errors
    ///
    /// `TriageError::OutputWrite` if the file cannot be created.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path).map_err(|err| TriageError::output_write(&path, err))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputSink for FileSink {
    fn write_str(&mut self, text: &str) -> Result<()> {
        self.writer
            .write_all(text.as_bytes())
            .map_err(|err| TriageError::output_write(&self.path, err))
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|err| TriageError::output_write(&self.path, err))
    }
}

/// In-memory buffer. Clones share the same buffer, so a clone can be handed
/// to a renderer while the original is kept for reading.
#[derive(Debug, Clone, Default)]
pub struct CaptureSink {
    buffer: Rc<RefCell<String>>,
}

impl CaptureSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    #[must_use]
    pub fn contents(&self) -> String {
        self.buffer.borrow().clone()
    }
}

impl OutputSink for CaptureSink {
    fn write_str(&mut self, text: &str) -> Result<()> {
        self.buffer.borrow_mut().push_str(text);
        Ok(())
    }
}

/// Writes every piece of text to each member in turn.
#[derive(Default)]
pub struct FanOutSink {
    sinks: Vec<Box<dyn OutputSink>>,
}

impl FanOutSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member; `None` is skipped, which keeps optional mirrors simple.
    #[must_use]
    pub fn with(mut self, sink: Option<Box<dyn OutputSink>>) -> Self {
        if let Some(sink) = sink {
            self.sinks.push(sink);
        }
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl fmt::Debug for FanOutSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanOutSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl OutputSink for FanOutSink {
    fn write_str(&mut self, text: &str) -> Result<()> {
        for sink in &mut self.sinks {
            sink.write_str(text)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

/// Drops everything.
#[derive(Debug, Default)]
pub struct DiscardSink;

impl OutputSink for DiscardSink {
    fn write_str(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }
}
