use std::ops::Range;

use log::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Unrequested,
    Requested,
    Loaded,
    Errored,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadState {
    pub total_images: usize,
    pub queued_count: usize,
    pub loaded_count: usize,
    pub has_errors: bool,
    pub is_complete: bool,
}

/// What a single settled fetch changed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoadProgress {
    /// `loaded / total`, floored to three decimals.
    pub progress: f64,
    pub errored: bool,
    /// True only for the completion that made the whole set loaded.
    pub finished: bool,
}

/// Tracks which image slots were requested and how many have settled.
pub struct Preloader {
    state: LoadState,
    slots: Vec<SlotState>,
}

impl Preloader {
    pub fn new(total_images: usize) -> Preloader {
        Preloader {
            state: LoadState {
                total_images,
                queued_count: 0,
                loaded_count: 0,
                has_errors: false,
                is_complete: false,
            },
            slots: vec![SlotState::Unrequested; total_images],
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_complete
    }

    pub fn has_errors(&self) -> bool {
        self.state.has_errors
    }

    pub fn slot(&self, index: usize) -> Option<SlotState> {
        self.slots.get(index).copied()
    }

    /// Queue up to `count` more slots. Returns the slot indices the caller must
    /// start fetching, or `None` when there is nothing left to queue.
    pub fn request_load(&mut self, count: usize) -> Option<Range<usize>> {
        if self.state.is_complete {
            return None;
        }
        let available = self.state.total_images - self.state.queued_count;
        let count = count.min(available);
        if count == 0 {
            return None;
        }

        let range = self.state.queued_count..self.state.queued_count + count;
        for slot in &mut self.slots[range.clone()] {
            *slot = SlotState::Requested;
        }
        self.state.queued_count += count;
        debug!(
            "Queued images {}..{} ({} of {} queued)",
            range.start, range.end, self.state.queued_count, self.state.total_images
        );
        Some(range)
    }

    /// Record the outcome of a fetch. Completions for slots that were never
    /// requested or that already settled are ignored.
    pub fn image_settled(&mut self, index: usize, success: bool) -> Option<LoadProgress> {
        match self.slots.get(index) {
            Some(SlotState::Requested) => {}
            _ => return None,
        }
        self.slots[index] = if success {
            SlotState::Loaded
        } else {
            SlotState::Errored
        };

        self.state.loaded_count += 1;
        if !success {
            self.state.has_errors = true;
        }
        let finished = self.state.loaded_count == self.state.total_images;
        if finished {
            self.state.is_complete = true;
        }

        let ratio = self.state.loaded_count as f64 / self.state.total_images as f64;
        Some(LoadProgress {
            progress: (ratio * 1000.0).floor() / 1000.0,
            errored: !success,
            finished,
        })
    }
}
