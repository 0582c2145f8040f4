//! Incremental reveal: a bounded window over the filtered result set that
//! grows one page at a time as the reader scrolls.

/// Items revealed per growth step (and initially).
pub const PAGE_SIZE: usize = 300;

/// Fraction of the sentinel element that must be visible to trigger growth.
pub const VISIBILITY_RATIO: f64 = 0.1;

/// The visible-count cursor over a filtered result set.
///
/// Growth is triggered at most once per cursor value: once a given `visible`
/// value has grown the window, the same value cannot trigger again until the
/// window is reset. The cursor never exceeds the filtered total and never
/// shrinks except through [`reset`].
///
/// [`reset`]: RevealWindow::reset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealWindow {
    page_size: usize,
    total: usize,
    visible: usize,
    last_triggered: Option<usize>,
}

impl RevealWindow {
    pub fn new(page_size: usize, total: usize) -> Self {
        Self {
            page_size,
            total,
            visible: page_size.min(total),
            last_triggered: None,
        }
    }

    /// Rebuild a window mid-session from a persisted cursor value. The cursor
    /// is clamped to the current total so a stale value cannot overshoot.
    pub fn resume(page_size: usize, total: usize, visible: usize) -> Self {
        Self {
            page_size,
            total,
            visible: visible.min(total),
            last_triggered: None,
        }
    }

    pub fn visible(&self) -> usize {
        self.visible
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn fully_revealed(&self) -> bool {
        self.visible >= self.total
    }

    /// Feed one visibility measurement of the last rendered item.
    ///
    /// Grows the cursor by one page (capped at the total) when the visible
    /// fraction reaches [`VISIBILITY_RATIO`], there are still hidden items,
    /// and this cursor value has not already triggered. Returns whether the
    /// window grew.
    pub fn observe(&mut self, fraction: f64) -> bool {
        if fraction < VISIBILITY_RATIO
            || self.fully_revealed()
            || self.last_triggered == Some(self.visible)
        {
            return false;
        }
        self.last_triggered = Some(self.visible);
        self.visible = (self.visible + self.page_size).min(self.total);
        true
    }

    /// The filtered set changed size: start over at `min(page_size, total)`
    /// and forget the consumed trigger.
    pub fn reset(&mut self, new_total: usize) {
        self.total = new_total;
        self.visible = self.page_size.min(new_total);
        self.last_triggered = None;
    }
}
