//! Streaming writer for nested object/array documents.
//!
//! [`JsonWriter`] never holds the document in memory: every call is written
//! to the sink immediately, in document order. It keeps only a stack of open
//! frames, each remembering whether a child has already been emitted so the
//! next child knows to write a separator first.
//!
//! Misuse (ending a frame of the wrong kind, writing a keyed field into an
//! array, writing a bare value into an object) is a defect in the caller and
//! fails an assertion rather than producing corrupt output.

use std::io::Write;

use crate::value::{Scalar, escape};

/// Indentation written per nesting level.
const INDENT: &str = "  ";

/// Errors raised while emitting a document.
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    /// The underlying sink rejected a write or flush.
    #[error("failed to write trace output: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}

/// Kind of an open container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// A `{ ... }` container of keyed fields.
    Object,
    /// A `[ ... ]` container of unkeyed elements.
    Array,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    kind: FrameKind,
    has_child: bool,
}

/// Incremental emitter of nested objects and arrays.
#[derive(Debug)]
pub struct JsonWriter<W: Write> {
    out: W,
    frames: Vec<Frame>,
}

impl<W: Write> JsonWriter<W> {
    /// Wrap a sink. Nothing is written until the first call.
    pub const fn new(out: W) -> Self {
        Self {
            out,
            frames: Vec::new(),
        }
    }

    /// Number of currently open containers.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Kind of the innermost open container, if any.
    pub fn current(&self) -> Option<FrameKind> {
        self.frames.last().map(|f| f.kind)
    }

    /// Open an object as an array element or as the top-level value.
    pub fn begin_object(&mut self) -> Result<(), WriterError> {
        self.begin_element()?;
        self.open(FrameKind::Object)
    }

    /// Close the innermost object.
    pub fn end_object(&mut self) -> Result<(), WriterError> {
        self.close_frame(FrameKind::Object)
    }

    /// Open an array as an array element or as the top-level value.
    pub fn begin_array(&mut self) -> Result<(), WriterError> {
        self.begin_element()?;
        self.open(FrameKind::Array)
    }

    /// Close the innermost array.
    pub fn end_array(&mut self) -> Result<(), WriterError> {
        self.close_frame(FrameKind::Array)
    }

    /// Open a nested object as the value of `key` in the current object.
    pub fn begin_object_field(&mut self, key: &str) -> Result<(), WriterError> {
        self.write_key(key)?;
        self.open(FrameKind::Object)
    }

    /// Open a nested array as the value of `key` in the current object.
    pub fn begin_array_field(&mut self, key: &str) -> Result<(), WriterError> {
        self.write_key(key)?;
        self.open(FrameKind::Array)
    }

    /// Write a keyed scalar into the current object.
    pub fn field<'v>(&mut self, key: &str, value: impl Into<Scalar<'v>>) -> Result<(), WriterError> {
        self.write_key(key)?;
        self.out.write_all(value.into().encode().as_bytes())?;
        self.mark_child();
        Ok(())
    }

    /// Write an unkeyed scalar into the current array.
    pub fn value<'v>(&mut self, value: impl Into<Scalar<'v>>) -> Result<(), WriterError> {
        assert!(
            self.current() == Some(FrameKind::Array),
            "bare value written outside an array (open frame: {:?})",
            self.current()
        );
        self.separate()?;
        self.out.write_all(value.into().encode().as_bytes())?;
        self.mark_child();
        Ok(())
    }

    /// Push buffered output to the sink.
    pub fn flush(&mut self) -> Result<(), WriterError> {
        self.out.flush()?;
        Ok(())
    }

    /// Flush and hand back the sink.
    ///
    /// Closing with containers still open leaves a truncated document; this
    /// is reported but not treated as fatal.
    pub fn close(mut self) -> Result<W, WriterError> {
        if !self.frames.is_empty() {
            tracing::warn!(open_frames = self.frames.len(), "trace document closed while unbalanced");
        }
        self.out.flush()?;
        Ok(self.out)
    }

    /// Separator and indentation before a new unkeyed element.
    fn begin_element(&mut self) -> Result<(), WriterError> {
        if let Some(kind) = self.current() {
            assert!(
                kind == FrameKind::Array,
                "unkeyed container opened directly inside an object"
            );
        }
        self.separate()
    }

    fn write_key(&mut self, key: &str) -> Result<(), WriterError> {
        assert!(
            self.current() == Some(FrameKind::Object),
            "keyed field `{key}` written outside an object (open frame: {:?})",
            self.current()
        );
        self.separate()?;
        self.out.write_all(escape(key).as_bytes())?;
        self.out.write_all(b": ")?;
        Ok(())
    }

    fn open(&mut self, kind: FrameKind) -> Result<(), WriterError> {
        let token: &[u8] = match kind {
            FrameKind::Object => b"{",
            FrameKind::Array => b"[",
        };
        self.out.write_all(token)?;
        self.frames.push(Frame {
            kind,
            has_child: false,
        });
        Ok(())
    }

    fn close_frame(&mut self, kind: FrameKind) -> Result<(), WriterError> {
        let top = self.frames.pop();
        assert!(
            top.is_some_and(|f| f.kind == kind),
            "end of {kind:?} does not match open frame {:?}",
            top.map(|f| f.kind)
        );
        if top.is_some_and(|f| f.has_child) {
            self.newline()?;
        }
        let token: &[u8] = match kind {
            FrameKind::Object => b"}",
            FrameKind::Array => b"]",
        };
        self.out.write_all(token)?;
        if self.frames.is_empty() {
            self.out.write_all(b"\n")?;
        } else {
            self.mark_child();
        }
        Ok(())
    }

    /// Comma (when needed) plus a fresh indented line.
    fn separate(&mut self) -> Result<(), WriterError> {
        let Some(top) = self.frames.last() else {
            return Ok(());
        };
        if top.has_child {
            self.out.write_all(b",")?;
        }
        self.newline()
    }

    fn newline(&mut self) -> Result<(), WriterError> {
        self.out.write_all(b"\n")?;
        for _ in 0..self.frames.len() {
            self.out.write_all(INDENT.as_bytes())?;
        }
        Ok(())
    }

    fn mark_child(&mut self) {
        if let Some(top) = self.frames.last_mut() {
            top.has_child = true;
        }
    }
}
