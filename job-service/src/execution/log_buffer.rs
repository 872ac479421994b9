// Log Buffer
// Append-only job output with an independent read cursor

use crate::execution::tracking::TrackingHandle;

use tokio::sync::mpsc;

/// Live sink that receives every chunk of output as it is written
pub type LiveSink = mpsc::UnboundedSender<String>;

/// Append-only string store with separate write and read positions.
///
/// Writes always land at the end of the buffer. `read` returns bytes the
/// caller has not read before and never blocks.
#[derive(Debug, Clone, Default)]
pub struct StringFifo {
    buffer: String,
    read_pos: usize,
}

impl StringFifo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, data: &str) -> usize {
        self.buffer.push_str(data);
        data.len()
    }

    /// Read up to `length` unread bytes, or everything unread when `None`.
    ///
    /// The cut is moved back to the previous UTF-8 boundary; if that would
    /// return nothing, it is moved forward to the next one instead.
    pub fn read(&mut self, length: Option<usize>) -> String {
        let start = self.read_pos;
        let total = self.buffer.len();
        let mut end = match length {
            Some(n) => start.saturating_add(n).min(total),
            None => total,
        };

        while !self.buffer.is_char_boundary(end) {
            end -= 1;
        }
        if end == start && length.unwrap_or(0) > 0 {
            while end < total {
                end += 1;
                if self.buffer.is_char_boundary(end) {
                    break;
                }
            }
        }

        self.read_pos = end;
        self.buffer[start..end].to_string()
    }

    /// Number of bytes written but not yet read
    pub fn unread(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.read_pos = 0;
    }

    /// Full contents, regardless of the read cursor
    pub fn string(&self) -> &str {
        &self.buffer
    }
}

impl std::fmt::Display for StringFifo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.buffer)
    }
}

/// Collects a job's output, mirroring it to a tracking record and a live sink
#[derive(Debug, Default)]
pub struct LogBuffer {
    fifo: StringFifo,
    record: Option<TrackingHandle>,
    sink: Option<LiveSink>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to a tracking record; every write replaces its log with the
    /// whole buffer contents
    pub fn with_record(mut self, record: TrackingHandle) -> Self {
        self.record = Some(record);
        self
    }

    /// Forward raw writes to a live consumer
    pub fn with_sink(mut self, sink: LiveSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn write(&mut self, data: &str) {
        self.fifo.write(data);

        if let Some(record) = &self.record {
            record.update(|job| job.log = self.fifo.string().to_string());
        }

        if let Some(sink) = &self.sink {
            // A dropped receiver only means nobody is watching.
            let _ = sink.send(data.to_string());
        }
    }

    pub fn read(&mut self, length: Option<usize>) -> String {
        self.fifo.read(length)
    }

    pub fn log(&self) -> &str {
        self.fifo.string()
    }
}
