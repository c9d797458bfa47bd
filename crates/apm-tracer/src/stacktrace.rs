// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Stack frame representation and source-context enrichment.
//!
//! The tracer does not capture stack traces itself; instrumentation hands
//! it pre-built [`Frame`] lists. A [`ContextSetter`] can decorate frames
//! with the source lines surrounding the frame location before a batch is
//! sent.

use std::fs;
use std::io;
use std::path::PathBuf;

use serde::Serialize;

/// A single stack frame attached to a span or error record.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    /// Function name, as reported by the instrumentation.
    pub function: String,
    /// Source file path.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub file: String,
    /// 1-based line number within `file`.
    pub line: u32,
    /// Source lines immediately before `line`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pre_context: Vec<String>,
    /// The source line at `line`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_line: Option<String>,
    /// Source lines immediately after `line`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub post_context: Vec<String>,
}

impl Frame {
    /// Create a frame with location only; context lines are filled in by a
    /// [`ContextSetter`] at send time.
    pub fn new(function: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Frame {
            function: function.into(),
            file: file.into(),
            line,
            ..Default::default()
        }
    }
}

/// Populates a frame's `pre_context`, `context_line` and `post_context`
/// with `pre` lines before and `post` lines after the frame location.
///
/// An error from the setter aborts enrichment of the remaining records in
/// the batch but never the send itself.
pub trait ContextSetter: Send + Sync {
    fn set_context(&self, frame: &mut Frame, pre: usize, post: usize) -> io::Result<()>;
}

/// A [`ContextSetter`] that reads source lines from the local filesystem,
/// resolving relative frame paths against an optional base directory.
#[derive(Debug, Default)]
pub struct FileContextSetter {
    base_dir: Option<PathBuf>,
}

impl FileContextSetter {
    pub fn new() -> Self {
        FileContextSetter::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        FileContextSetter {
            base_dir: Some(base_dir.into()),
        }
    }
}

impl ContextSetter for FileContextSetter {
    fn set_context(&self, frame: &mut Frame, pre: usize, post: usize) -> io::Result<()> {
        if frame.file.is_empty() || frame.line == 0 {
            return Ok(());
        }
        let path = match &self.base_dir {
            Some(base) => base.join(&frame.file),
            None => PathBuf::from(&frame.file),
        };
        let source = fs::read_to_string(path)?;
        let lines: Vec<&str> = source.lines().collect();
        let index = frame.line as usize - 1;
        if index >= lines.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line {} out of range for {}", frame.line, frame.file),
            ));
        }
        let start = index.saturating_sub(pre);
        frame.pre_context = lines[start..index].iter().map(|s| s.to_string()).collect();
        frame.context_line = Some(lines[index].to_string());
        let end = (index + 1 + post).min(lines.len());
        frame.post_context = lines[index + 1..end].iter().map(|s| s.to_string()).collect();
        Ok(())
    }
}
