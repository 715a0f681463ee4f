//! Output emitters
//!
//! The exporter writes normalized rows into a [`RowSink`] page by page and
//! closes it with the final [`ExportSummary`]. Two sinks:
//!
//! - [`BufferedSink`] collects everything into an [`ExportResult`]
//! - [`StreamingSink`] writes an incrementally parseable JSON document into a
//!   bounded channel, rows first and summary fields last
//!
//! Streamed document layout:
//!
//! ```text
//! {"rows":[{...},{...}],"rowCount":2,"start":"...","end":"...","pages":1,
//!  "truncated":false,"reportedRowCount":2,"audit":{...}}
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{AnalyticsError, Result};
use crate::export::{ExportResult, ExportSummary};
use crate::row::NormalizedRow;

/// Chunks buffered between the export task and the response body
pub const STREAM_CHANNEL_CAPACITY: usize = 16;

const ROWS_OPEN: &[u8] = b"{\"rows\":[";

/// Destination for exported rows
#[async_trait]
pub trait RowSink: Send {
    /// Emit one page of rows
    async fn write_rows(&mut self, rows: &[NormalizedRow]) -> Result<()>;

    /// Close the output after a successful export
    async fn finish(&mut self, summary: &ExportSummary) -> Result<()>;

    /// Close the output after a failed export
    ///
    /// `partial.error` carries the failure message. Sinks that have not
    /// produced output yet may do nothing; the error is returned to the caller
    /// either way.
    async fn abort(&mut self, partial: &ExportSummary) -> Result<()> {
        let _ = partial;
        Ok(())
    }
}

/// Collects rows in memory
#[derive(Debug, Default)]
pub struct BufferedSink {
    rows: Vec<NormalizedRow>,
    summary: Option<ExportSummary>,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows collected so far
    pub fn rows(&self) -> &[NormalizedRow] {
        &self.rows
    }

    /// Complete result, `None` unless the export finished
    pub fn into_result(self) -> Option<ExportResult> {
        let summary = self.summary?;
        Some(ExportResult {
            rows: self.rows,
            summary,
        })
    }
}

#[async_trait]
impl RowSink for BufferedSink {
    async fn write_rows(&mut self, rows: &[NormalizedRow]) -> Result<()> {
        self.rows.extend_from_slice(rows);
        Ok(())
    }

    async fn finish(&mut self, summary: &ExportSummary) -> Result<()> {
        self.summary = Some(summary.clone());
        Ok(())
    }
}

/// Writes the JSON document into a channel as pages arrive
///
/// Nothing is sent until the first page (or the final summary) is written, so
/// a failure on the very first provider call leaves the channel empty and the
/// caller can still answer with an error status.
pub struct StreamingSink {
    tx: mpsc::Sender<Bytes>,
    started: bool,
    written: u64,
}

impl StreamingSink {
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self {
            tx,
            started: false,
            written: 0,
        }
    }

    /// Sink plus the receiving end, using the default capacity
    pub fn channel() -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        (Self::new(tx), rx)
    }

    /// Whether any bytes have been sent
    pub fn started(&self) -> bool {
        self.started
    }

    async fn send(&mut self, chunk: Vec<u8>) -> Result<()> {
        self.started = true;
        self.tx
            .send(Bytes::from(chunk))
            .await
            .map_err(|_| AnalyticsError::Cancelled)
    }

    fn open(&self, chunk: &mut Vec<u8>) {
        if !self.started {
            chunk.extend_from_slice(ROWS_OPEN);
        }
    }

    fn trailer(&self, summary: &ExportSummary) -> Result<Vec<u8>> {
        let mut chunk = Vec::new();
        self.open(&mut chunk);
        chunk.extend_from_slice(b"],");
        chunk.extend_from_slice(&summary_fields(summary)?);
        Ok(chunk)
    }
}

#[async_trait]
impl RowSink for StreamingSink {
    async fn write_rows(&mut self, rows: &[NormalizedRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut chunk = Vec::with_capacity(rows.len() * 256);
        self.open(&mut chunk);
        for row in rows {
            if self.written > 0 {
                chunk.push(b',');
            }
            serde_json::to_writer(&mut chunk, row)?;
            self.written += 1;
        }

        self.send(chunk).await
    }

    async fn finish(&mut self, summary: &ExportSummary) -> Result<()> {
        let chunk = self.trailer(summary)?;
        self.send(chunk).await
    }

    async fn abort(&mut self, partial: &ExportSummary) -> Result<()> {
        if !self.started {
            return Ok(());
        }
        let chunk = self.trailer(partial)?;
        self.send(chunk).await
    }
}

/// Summary serialized as an object body without the opening brace
///
/// Appended after `],` this closes the document.
fn summary_fields(summary: &ExportSummary) -> Result<Vec<u8>> {
    let mut encoded = serde_json::to_vec(summary)?;
    if encoded.first() == Some(&b'{') {
        encoded.remove(0);
    }
    Ok(encoded)
}
