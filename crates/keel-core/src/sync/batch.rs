/// Inclusive block window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: u64,
    pub end: u64,
}

/// Gap-free partition of `[start, target]` into windows of at most `size` blocks, ascending.
#[derive(Debug, Clone)]
pub struct ForwardWindows {
    cursor: Option<u64>,
    target: u64,
    size: u64,
}

/// Gap-free partition of `[floor, start]` into windows of at most `size` blocks, descending.
#[derive(Debug, Clone)]
pub struct BackwardWindows {
    cursor: Option<u64>,
    floor: u64,
    size: u64,
}

#[must_use]
pub fn forward(start: u64, target: u64, size: u64) -> ForwardWindows {
    ForwardWindows { cursor: (start <= target).then_some(start), target, size: size.max(1) }
}

#[must_use]
pub fn backward(start: u64, floor: u64, size: u64) -> BackwardWindows {
    BackwardWindows { cursor: (start >= floor).then_some(start), floor, size: size.max(1) }
}

impl Iterator for ForwardWindows {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        let start = self.cursor?;
        let end = start.saturating_add(self.size - 1).min(self.target);
        self.cursor = (end < self.target).then(|| end + 1);
        Some(Window { start, end })
    }
}

impl Iterator for BackwardWindows {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        let end = self.cursor?;
        let start = end.saturating_sub(self.size - 1).max(self.floor);
        self.cursor = (start > self.floor).then(|| start - 1);
        Some(Window { start, end })
    }
}
