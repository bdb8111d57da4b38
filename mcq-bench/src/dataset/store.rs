//! Newline-delimited JSON storage

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use super::{AnswerKey, DatasetError, DatasetResult};

/// Read every non-blank line of a JSONL file as `T`
pub fn read_jsonl<T: DeserializeOwned>(path: impl AsRef<Path>) -> DatasetResult<Vec<T>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DatasetError::MissingInput(path.to_path_buf()));
    }

    let reader = BufReader::new(File::open(path)?);
    let mut rows = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row = serde_json::from_str(line).map_err(|source| DatasetError::Json {
            path: path.display().to_string(),
            line: index + 1,
            source,
        })?;
        rows.push(row);
    }

    Ok(rows)
}

/// Write rows to a JSONL file, replacing any previous content
pub fn write_jsonl<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> DatasetResult<()> {
    let path = path.as_ref();
    ensure_parent(path)?;

    let mut out = BufWriter::new(File::create(path)?);
    for row in rows {
        serde_json::to_writer(&mut out, row)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Write the answer key as a pretty-printed JSON object keyed by qid
pub fn write_answer_map(path: impl AsRef<Path>, answers: &AnswerKey) -> DatasetResult<()> {
    let path = path.as_ref();
    ensure_parent(path)?;

    let json = serde_json::to_string_pretty(answers.as_map())?;
    fs::write(path, json)?;
    Ok(())
}

/// Append-only JSONL sink that flushes after every row
pub struct JsonlWriter<W: Write> {
    inner: W,
    rows_written: usize,
}

impl JsonlWriter<File> {
    /// Open `path` for appending, creating it and its parent directory if needed
    pub fn append(path: impl AsRef<Path>) -> DatasetResult<Self> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            rows_written: 0,
        }
    }

    /// Serialize one row, terminate it with a newline and flush
    pub fn write_row<T: Serialize>(&mut self, row: &T) -> DatasetResult<()> {
        let mut line = serde_json::to_vec(row)?;
        line.push(b'\n');
        self.inner.write_all(&line)?;
        self.inner.flush()?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
