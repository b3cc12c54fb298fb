/// Result of moving the playhead by some number of frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameStep {
    pub frame: u32,
    /// Frames actually moved, after reducing the request modulo the image count.
    pub delta: u32,
    /// Set when a non-looping sequence hit its first or last frame.
    pub stop_requested: bool,
}

/// Clamp an arbitrary frame number into `1..=total_images`, flooring fractions.
pub fn normalize_frame_number(frame_number: f64, total_images: u32) -> u32 {
    let frame_number = frame_number.floor();
    if frame_number.is_nan() || frame_number <= 0.0 {
        1
    } else if frame_number > total_images as f64 {
        total_images
    } else {
        frame_number as u32
    }
}

pub fn advance_frame(
    current_frame: u32,
    total_images: u32,
    delta_frames: u32,
    reverse: bool,
    loop_playback: bool,
) -> FrameStep {
    let total = total_images.max(1) as i64;
    let delta = delta_frames as i64 % total;
    let mut candidate = if reverse {
        current_frame as i64 - delta
    } else {
        current_frame as i64 + delta
    };

    let mut stop_requested = false;
    if loop_playback {
        // ex. candidate = -2, total = 50 => 48; candidate = 53, total = 50 => 3
        if candidate <= 0 {
            candidate = total - candidate.abs();
        } else if candidate > total {
            candidate -= total;
        }
    } else if candidate <= 0 {
        candidate = 1;
        stop_requested = true;
    } else if candidate > total {
        candidate = total;
        stop_requested = true;
    }

    FrameStep {
        frame: candidate as u32,
        delta: delta as u32,
        stop_requested,
    }
}
