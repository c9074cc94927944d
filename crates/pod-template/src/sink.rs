/*
 * sink.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Output sinks.
//!
//! Rendering writes output incrementally. In strict mode a failure stops
//! rendering, and whatever was written before it stays in the sink.

use std::io;

/// Receives rendered output.
pub trait Sink {
    fn write_str(&mut self, text: &str) -> io::Result<()>;
}

impl Sink for String {
    fn write_str(&mut self, text: &str) -> io::Result<()> {
        self.push_str(text);
        Ok(())
    }
}

/// Adapts any [`io::Write`] into a [`Sink`].
#[derive(Debug)]
pub struct IoSink<W: io::Write> {
    writer: W,
}

impl<W: io::Write> IoSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: io::Write> Sink for IoSink<W> {
    fn write_str(&mut self, text: &str) -> io::Result<()> {
        self.writer.write_all(text.as_bytes())
    }
}
