//! Buffered byte streams handed out by file handles.
//!
//! A handle never keeps a reference to the streams it opens. Both types
//! release their underlying resource on drop, so a `?` halfway through a
//! copy still closes the file.

use std::fmt;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};

/// Readable end: a finite, non-restartable sequence of bytes.
pub struct Source {
    inner: BufReader<Box<dyn Read + Send>>,
}

impl Source {
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        Self {
            inner: BufReader::new(Box::new(reader)),
        }
    }

    pub fn read_all(mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.inner.read_to_end(&mut buf)?;
        Ok(buf)
    }

    pub fn read_string(mut self) -> io::Result<String> {
        let mut buf = String::new();
        self.inner.read_to_string(&mut buf)?;
        Ok(buf)
    }
}

impl Read for Source {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl BufRead for Source {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt)
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("buffered", &self.inner.buffer().len())
            .finish()
    }
}

/// Writable end. Dropping flushes on a best-effort basis; call
/// [`Sink::close`] to see the flush error.
pub struct Sink {
    inner: BufWriter<Box<dyn Write + Send>>,
}

impl Sink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: BufWriter::new(Box::new(writer)),
        }
    }

    /// Flush everything and release the underlying writer.
    pub fn close(self) -> io::Result<()> {
        let mut inner = self.inner.into_inner().map_err(|e| e.into_error())?;
        inner.flush()
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("buffered", &self.inner.buffer().len())
            .finish()
    }
}
