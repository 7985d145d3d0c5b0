/// Byte sink connecting the detection engine to the terminal.
///
/// The engine only ever queues bytes; flushing and output batching stay
/// under host control, so `flush` is never called from inside the engine.
pub trait OutputSink {
    /// Queue bytes for delivery to the terminal.
    fn write(&mut self, bytes: &[u8]);

    /// Deliver queued bytes to the terminal.
    fn flush(&mut self);

    /// Whether the sink has failed and queued bytes are being lost.
    fn is_bad(&self) -> bool {
        false
    }
}

impl OutputSink for Vec<u8> {
    fn write(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }

    fn flush(&mut self) {}
}
