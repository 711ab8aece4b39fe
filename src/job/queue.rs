//! Target queue for recursive fuzzing
//!
//! Targets discovered mid-run are appended while earlier targets are still
//! being processed, so the queue is append-only with a monotonic read cursor
//! instead of a pop-front structure. This keeps indices stable for user
//! inspection and deletion.

use std::sync::Mutex;

/// One pass of the wordlist against a base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueTarget {
    /// URL template containing the substitution placeholder
    pub url: String,

    /// Recursion depth this target was discovered at
    pub depth: u32,
}

#[derive(Debug, Default)]
struct QueueInner {
    targets: Vec<QueueTarget>,
    cursor: usize,
}

/// Append-only FIFO of fuzzing targets
///
/// Workers append recursion targets concurrently with the dispatcher
/// advancing the cursor, so all access goes through an internal lock.
#[derive(Debug, Default)]
pub struct TargetQueue {
    inner: Mutex<QueueInner>,
}

impl TargetQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a target to the end of the queue
    pub fn append(&self, target: QueueTarget) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        inner.targets.push(target);
    }

    /// Takes the next unprocessed target and advances the cursor
    pub fn advance(&self) -> Option<QueueTarget> {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        let target = inner.targets.get(inner.cursor).cloned()?;
        inner.cursor += 1;
        Some(target)
    }

    /// Whether unprocessed targets remain
    pub fn has_more(&self) -> bool {
        let inner = self.inner.lock().expect("queue lock poisoned");
        inner.cursor < inner.targets.len()
    }

    /// Position of the in-flight target, 1-based; 0 before the first advance
    pub fn cursor(&self) -> usize {
        self.inner.lock().expect("queue lock poisoned").cursor
    }

    /// Total number of targets ever appended
    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue lock poisoned").targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The current target plus everything still pending
    pub fn visible(&self) -> Vec<QueueTarget> {
        let inner = self.inner.lock().expect("queue lock poisoned");
        let start = inner.cursor.saturating_sub(1);
        inner.targets[start..].to_vec()
    }

    /// Deletes the `index`-th pending target, 1-based
    ///
    /// Index 1 is the first target after the in-flight one, i.e. the second
    /// entry of the visible slice. Returns false for out-of-range indices
    /// and when nothing is in flight yet.
    pub fn delete_pending(&self, index: usize) -> bool {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        if index == 0 || inner.cursor == 0 {
            return false;
        }
        let real = inner.cursor + index - 1;
        if real >= inner.targets.len() {
            return false;
        }
        inner.targets.remove(real);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(url: &str, depth: u32) -> QueueTarget {
        QueueTarget {
            url: url.to_string(),
            depth,
        }
    }

    #[test]
    fn test_append_and_advance_in_order() {
        let queue = TargetQueue::new();
        queue.append(target("http://h/FUZZ", 0));
        queue.append(target("http://h/admin/FUZZ", 1));

        assert!(queue.has_more());
        assert_eq!(queue.advance().unwrap().url, "http://h/FUZZ");
        assert_eq!(queue.cursor(), 1);
        assert_eq!(queue.advance().unwrap().depth, 1);
        assert!(!queue.has_more());
        assert!(queue.advance().is_none());
    }

    #[test]
    fn test_append_while_in_flight() {
        let queue = TargetQueue::new();
        queue.append(target("http://h/FUZZ", 0));
        queue.advance();

        // Recursion discovers new targets while the first is processed
        queue.append(target("http://h/a/FUZZ", 1));
        queue.append(target("http://h/b/FUZZ", 1));

        assert_eq!(queue.len(), 3);
        assert!(queue.has_more());
        assert_eq!(queue.advance().unwrap().url, "http://h/a/FUZZ");
    }

    #[test]
    fn test_visible_includes_current_and_pending() {
        let queue = TargetQueue::new();
        queue.append(target("http://h/FUZZ", 0));
        queue.append(target("http://h/a/FUZZ", 1));
        queue.append(target("http://h/b/FUZZ", 1));
        queue.advance();

        let visible = queue.visible();
        assert_eq!(visible.len(), 3);
        assert_eq!(visible[0].url, "http://h/FUZZ");
        assert_eq!(visible[1].url, "http://h/a/FUZZ");
    }

    #[test]
    fn test_delete_pending() {
        let queue = TargetQueue::new();
        queue.append(target("http://h/FUZZ", 0));
        queue.append(target("http://h/a/FUZZ", 1));
        queue.append(target("http://h/b/FUZZ", 1));
        queue.advance();

        assert!(queue.delete_pending(1));
        assert_eq!(queue.len(), 2);
        // The remaining pending target moved up
        assert_eq!(queue.advance().unwrap().url, "http://h/b/FUZZ");
    }

    #[test]
    fn test_delete_pending_out_of_range() {
        let queue = TargetQueue::new();
        queue.append(target("http://h/FUZZ", 0));
        queue.advance();

        assert!(!queue.delete_pending(0));
        assert!(!queue.delete_pending(1));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_delete_pending_before_first_advance() {
        let queue = TargetQueue::new();
        queue.append(target("http://h/FUZZ", 0));

        assert!(!queue.delete_pending(1));
        assert_eq!(queue.len(), 1);
    }
}
