use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use crate::domain::{HoldId, SuspendError};
use crate::ports::SuspendPreventionService;

// ============================================================================
// InProcessSuspendService - reference-counted named holds
// ============================================================================

#[derive(Default)]
struct HoldTable {
    by_id: HashMap<HoldId, String>,
    by_tag: HashMap<String, usize>,
}

/// Suspend-prevention service that keeps its holds in process memory.
///
/// Each tag is reference counted: two holds on the same tag keep the host
/// awake until both are released. Hosts that integrate with a real power
/// manager forward `acquire`/`release` to it; this adapter is what the
/// runtime binary and the tests use.
#[derive(Default)]
pub struct InProcessSuspendService {
    next_id: AtomicU64,
    table: Mutex<HoldTable>,
}

impl InProcessSuspendService {
    /// Create a service with no holds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live holds on `tag`.
    pub fn held(&self, tag: &str) -> usize {
        self.table.lock().by_tag.get(tag).copied().unwrap_or(0)
    }

    /// Number of live holds across all tags.
    pub fn total_held(&self) -> usize {
        self.table.lock().by_id.len()
    }

    /// Whether anything currently prevents suspension.
    pub fn is_suspend_blocked(&self) -> bool {
        self.total_held() > 0
    }
}

impl SuspendPreventionService for InProcessSuspendService {
    fn acquire(&self, tag: &str) -> HoldId {
        let id = HoldId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut table = self.table.lock();
        table.by_id.insert(id, tag.to_string());
        *table.by_tag.entry(tag.to_string()).or_insert(0) += 1;
        trace!(tag, hold = id.0, "suspend hold acquired");
        id
    }

    fn release(&self, hold: HoldId) -> Result<(), SuspendError> {
        let mut table = self.table.lock();
        let tag = table
            .by_id
            .remove(&hold)
            .ok_or(SuspendError::UnknownHold(hold))?;

        if let Some(count) = table.by_tag.get_mut(&tag) {
            *count -= 1;
            if *count == 0 {
                table.by_tag.remove(&tag);
            }
        }
        trace!(tag = tag.as_str(), hold = hold.0, "suspend hold released");
        Ok(())
    }
}
