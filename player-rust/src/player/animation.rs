use super::frame::{advance_frame, FrameStep};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockState {
    Idle,
    Running,
    /// A tick hit the end of a non-looping sequence; finalized by `stop`.
    Stopping,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickOutcome {
    /// The clock is not running; no further ticks are needed.
    Idle,
    /// Less than one frame elapsed. Keep ticking.
    Pending,
    /// Commit this frame and keep ticking.
    Advance(FrameStep),
    /// The run is over and must be stopped without drawing.
    Finished,
}

/// Where the playhead is and how it may move on this tick.
#[derive(Clone, Copy, Debug)]
pub struct Playhead {
    pub current_frame: u32,
    pub total_images: u32,
    pub reverse: bool,
    pub loop_playback: bool,
}

pub fn full_animation_duration(total_images: u32, fps: f64) -> f64 {
    total_images as f64 / fps * 1000.0
}

/// Converts elapsed time into frame steps for a running animation.
#[derive(Debug)]
pub struct AnimationClock {
    state: ClockState,
    last_tick: f64,
    duration: f64,
    frames_remaining: Option<i64>,
}

impl AnimationClock {
    pub fn new(total_images: u32, fps: f64) -> AnimationClock {
        AnimationClock {
            state: ClockState::Idle,
            last_tick: 0.0,
            duration: full_animation_duration(total_images, fps),
            frames_remaining: None,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_animating(&self) -> bool {
        self.state != ClockState::Idle
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn update_duration(&mut self, total_images: u32, fps: f64) {
        self.duration = full_animation_duration(total_images, fps);
    }

    pub fn frames_remaining(&self) -> Option<i64> {
        self.frames_remaining
    }

    pub fn set_frames_remaining(&mut self, frames: Option<i64>) {
        self.frames_remaining = frames;
    }

    /// Idle -> Running. Returns false if the clock was already running.
    pub fn start(&mut self, now: f64) -> bool {
        if self.state != ClockState::Idle {
            return false;
        }
        self.state = ClockState::Running;
        self.last_tick = now;
        true
    }

    /// Back to Idle. Returns true when a running session actually ended.
    pub fn stop(&mut self) -> bool {
        let was_running = self.state != ClockState::Idle;
        self.state = ClockState::Idle;
        self.frames_remaining = None;
        was_running
    }

    /// Count a committed frame against the queue. A tick that skips frames
    /// consumes its whole delta, so a bounded run may end past its target.
    pub fn frame_committed(&mut self, delta: u32) {
        if let Some(frames) = self.frames_remaining.as_mut() {
            *frames -= delta as i64;
        }
    }

    pub fn tick(&mut self, time: f64, playhead: Playhead) -> TickOutcome {
        // A previous commit may already have used up the queue.
        if self.frames_remaining.map_or(false, |frames| frames <= 0) {
            return TickOutcome::Finished;
        }
        match self.state {
            ClockState::Idle => return TickOutcome::Idle,
            ClockState::Stopping => return TickOutcome::Finished,
            ClockState::Running => {}
        }

        let progress = (time - self.last_tick) / self.duration;
        let delta_frames = progress * playhead.total_images as f64;
        if !(delta_frames >= 1.0) {
            return TickOutcome::Pending;
        }

        let step = advance_frame(
            playhead.current_frame,
            playhead.total_images,
            delta_frames.floor().min(u32::MAX as f64) as u32,
            playhead.reverse,
            playhead.loop_playback,
        );
        if step.stop_requested {
            self.state = ClockState::Stopping;
            return TickOutcome::Finished;
        }
        self.last_tick = time;
        TickOutcome::Advance(step)
    }
}
