use super::api::Message;
use std::collections::HashSet;

/// Watermark plus processed-message record, owned exclusively by the polling
/// loop. Fetch results overlap by design, so both checks are needed: the
/// watermark bounds what counts as new, the id set guards against replies to
/// a message the watermark has not yet passed.
///
/// The processed set grows for the lifetime of the process. That is accepted
/// for a long-lived but bounded-duration agent; no eviction policy exists.
pub struct ProcessingLedger {
    watermark: i64,
    processed: HashSet<String>,
}

impl ProcessingLedger {
    pub fn new(watermark: i64) -> Self {
        Self {
            watermark,
            processed: HashSet::new(),
        }
    }

    pub fn watermark(&self) -> i64 {
        self.watermark
    }

    pub fn is_processed(&self, id: &str) -> bool {
        self.processed.contains(id)
    }

    pub fn mark_processed(&mut self, id: &str) {
        self.processed.insert(id.to_string());
    }

    /// Messages newer than the watermark and not yet processed, ascending by
    /// timestamp so replies keep fetch order.
    pub fn candidates(&self, messages: &[Message]) -> Vec<Message> {
        let mut fresh: Vec<Message> = messages
            .iter()
            .filter(|m| m.timestamp > self.watermark && !self.processed.contains(&m.id))
            .cloned()
            .collect();
        fresh.sort_by_key(|m| m.timestamp);
        fresh
    }

    /// Advance the watermark over everything seen in a fetch, replied-to or
    /// not. Never moves backwards.
    pub fn observe(&mut self, messages: &[Message]) {
        if let Some(latest) = messages.iter().map(|m| m.timestamp).max() {
            self.watermark = self.watermark.max(latest);
        }
    }
}
