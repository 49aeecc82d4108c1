use std::collections::VecDeque;
use std::ops::Range;


/// Variant positions seen within the last `width` evaluated positions.
#[derive(Debug, Clone)]
pub struct DensityWindow {
    width: usize,
    positions: VecDeque<usize>,
}

impl DensityWindow {

    pub fn new(width:usize) -> Self {
        Self { width, positions: VecDeque::new() }
    }

    pub fn width(&self) -> usize { self.width }
    pub fn density(&self) -> usize { self.positions.len() }
    pub fn first(&self) -> Option<usize> { self.positions.front().copied() }

    /// Slides the window so that it ends at `pos`
    pub fn push(&mut self, pos:usize, is_variant:bool) {
        while self.positions.front().is_some_and(|&p| p + self.width <= pos) {
            self.positions.pop_front();
        }
        if is_variant {
            self.positions.push_back(pos);
        }
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegionState {
    #[default]
    Inactive,
    Active { beg: usize, last_variant: usize },
    /// `[beg,end)` is ready for haplotype analysis
    Finalizing { beg: usize, end: usize, reopen_at: Option<usize> },
}


/// Opens and closes active regions over a stream of evaluated positions.
#[derive(Debug, Clone)]
pub struct RegionTracker {
    window: DensityWindow,
    state: RegionState,
    min_density: usize,
    max_span: usize,
    // end of the last finalized region; regions never overlap
    last_end: Option<usize>,
}

impl RegionTracker {

    pub fn new(window:usize, min_density:usize, max_span:usize) -> Self {
        Self {
            window: DensityWindow::new(window),
            state: RegionState::Inactive,
            min_density: min_density.max(1),
            max_span: max_span.max(1),
            last_end: None,
        }
    }

    pub fn state(&self) -> RegionState { self.state }
    pub fn density(&self) -> usize { self.window.density() }

    /// Start of the open region, if any
    pub fn active_beg(&self) -> Option<usize> {
        match self.state {
            RegionState::Active { beg, .. } | RegionState::Finalizing { beg, .. } => Some(beg),
            RegionState::Inactive => None
        }
    }

    /// Evaluates `pos`; call [`RegionTracker::take_finalized`] afterwards
    /// to collect a region closed by this position.
    pub fn advance(&mut self, pos:usize, is_variant:bool) {
        self.window.push(pos, is_variant);
        let is_dense = self.window.density() >= self.min_density;

        self.state = match self.state {
            RegionState::Inactive if is_variant && is_dense => {
                let beg = self.window.first().unwrap_or(pos)
                    .max(self.last_end.unwrap_or(0));
                RegionState::Active { beg, last_variant: pos }
            }
            RegionState::Active { beg, last_variant } if is_variant => {
                if pos + 1 - beg > self.max_span {
                    RegionState::Finalizing { beg, end: last_variant + 1, reopen_at: Some(pos) }
                } else {
                    RegionState::Active { beg, last_variant: pos }
                }
            }
            RegionState::Active { beg, last_variant } if !is_dense => {
                RegionState::Finalizing { beg, end: last_variant + 1, reopen_at: None }
            }
            state => state
        };
    }

    /// Closes the open region, if any, as if the stream ended
    pub fn close(&mut self) {
        if let RegionState::Active { beg, last_variant } = self.state {
            self.state = RegionState::Finalizing { beg, end: last_variant + 1, reopen_at: None };
        }
    }

    pub fn take_finalized(&mut self) -> Option<Range<usize>> {
        let RegionState::Finalizing { beg, end, reopen_at } = self.state else { return None };
        self.last_end = Some(end);
        self.state = match reopen_at {
            Some(pos) => RegionState::Active { beg: pos, last_variant: pos },
            None => RegionState::Inactive
        };
        Some(beg..end)
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.state = RegionState::Inactive;
        self.last_end = None;
    }
}
