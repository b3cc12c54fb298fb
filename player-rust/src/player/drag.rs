use super::settings::TouchScrollMode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragDirection {
    /// Pointer moved right, towards the next frame.
    Forward,
    /// Pointer moved left, towards the previous frame.
    Backward,
}

/// Whole frame steps produced by one pointer move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DragSteps {
    pub direction: DragDirection,
    pub count: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DragState {
    pub is_dragging: bool,
    pub origin: (f64, f64),
    pub last_x: f64,
    pub accumulated_delta: f64,
    pub threshold: f64,
}

/// Pixels of pointer movement per frame step.
pub fn drag_threshold(rendered_width: f64, total_images: u32, drag_modifier: f64) -> f64 {
    let per_frame = rendered_width / total_images.max(1) as f64;
    let threshold = per_frame / drag_modifier;
    if threshold.is_finite() && threshold > 0.0 {
        threshold
    } else {
        1.0
    }
}

pub struct DragController {
    state: DragState,
    inversion: bool,
    touch_scroll_mode: TouchScrollMode,
    page_scroll_timer_delay: f64,
    scroll_locked_until: f64,
}

impl DragController {
    pub fn new(
        threshold: f64,
        inversion: bool,
        touch_scroll_mode: TouchScrollMode,
        page_scroll_timer_delay: f64,
    ) -> DragController {
        DragController {
            state: DragState {
                is_dragging: false,
                origin: (0.0, 0.0),
                last_x: 0.0,
                accumulated_delta: 0.0,
                threshold,
            },
            inversion,
            touch_scroll_mode,
            page_scroll_timer_delay,
            scroll_locked_until: f64::NEG_INFINITY,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        self.state.is_dragging
    }

    pub fn threshold(&self) -> f64 {
        self.state.threshold
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.state.threshold = threshold;
    }

    pub fn set_inversion(&mut self, inversion: bool) {
        self.inversion = inversion;
    }

    pub fn set_touch_scroll_mode(&mut self, mode: TouchScrollMode, delay: f64) {
        self.touch_scroll_mode = mode;
        self.page_scroll_timer_delay = delay;
    }

    pub fn start(&mut self, x: f64, y: f64, threshold: f64) {
        self.state.is_dragging = true;
        self.state.origin = (x, y);
        self.state.last_x = x;
        self.state.accumulated_delta = 0.0;
        self.state.threshold = threshold;
    }

    pub fn move_to(&mut self, x: f64) -> Option<DragSteps> {
        if !self.state.is_dragging {
            return None;
        }
        self.state.accumulated_delta += x - self.state.last_x;
        self.state.last_x = x;

        let threshold = self.state.threshold;
        let mut count = 0;
        let mut moving_right = self.state.accumulated_delta > 0.0;
        while self.state.accumulated_delta.abs() >= threshold {
            moving_right = self.state.accumulated_delta > 0.0;
            if moving_right {
                self.state.accumulated_delta -= threshold;
            } else {
                self.state.accumulated_delta += threshold;
            }
            count += 1;
        }
        if count == 0 {
            return None;
        }

        let direction = if moving_right != self.inversion {
            DragDirection::Forward
        } else {
            DragDirection::Backward
        };
        Some(DragSteps { direction, count })
    }

    /// Ends the gesture. Returns false if no drag was in progress.
    pub fn end(&mut self, now: f64) -> bool {
        if !self.state.is_dragging {
            return false;
        }
        self.state.is_dragging = false;
        self.state.accumulated_delta = 0.0;
        self.scroll_locked_until = now + self.page_scroll_timer_delay;
        true
    }

    pub fn should_prevent_page_scroll(&self, now: f64) -> bool {
        match self.touch_scroll_mode {
            TouchScrollMode::PreventPageScroll => true,
            TouchScrollMode::AllowPageScroll => false,
            TouchScrollMode::PageScrollTimer => {
                self.state.is_dragging || now < self.scroll_locked_until
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> DragController {
        DragController::new(10.0, false, TouchScrollMode::PageScrollTimer, 1500.0)
    }

    #[test]
    fn test_threshold_scales_with_modifier() {
        assert_eq!(drag_threshold(400.0, 40, 1.0), 10.0);
        assert_eq!(drag_threshold(400.0, 40, 2.0), 5.0);
        assert_eq!(drag_threshold(400.0, 40, 0.5), 20.0);
        assert_eq!(drag_threshold(0.0, 40, 1.0), 1.0);
    }

    #[test]
    fn test_single_event_of_three_thresholds() {
        let mut drag = controller();
        drag.start(0.0, 0.0, 10.0);
        assert_eq!(
            drag.move_to(30.0),
            Some(DragSteps {
                direction: DragDirection::Forward,
                count: 3
            })
        );
    }

    #[test]
    fn test_many_small_events_sum_to_three_steps() {
        let mut drag = controller();
        drag.start(100.0, 0.0, 10.0);
        let mut total = 0;
        let mut x = 100.0;
        for _ in 0..12 {
            x -= 2.5;
            if let Some(steps) = drag.move_to(x) {
                assert_eq!(steps.direction, DragDirection::Backward);
                total += steps.count;
            }
        }
        assert_eq!(total, 3);
        assert_eq!(drag.state().accumulated_delta, 0.0);
    }

    #[test]
    fn test_remainder_carries_over() {
        let mut drag = controller();
        drag.start(0.0, 0.0, 10.0);
        assert_eq!(drag.move_to(7.0), None);
        let steps = drag.move_to(14.0).unwrap();
        assert_eq!(steps.count, 1);
        assert_eq!(drag.state().accumulated_delta, 4.0);
    }

    #[test]
    fn test_inversion_flips_direction() {
        let mut drag = DragController::new(10.0, true, TouchScrollMode::AllowPageScroll, 0.0);
        drag.start(0.0, 0.0, 10.0);
        assert_eq!(drag.move_to(10.0).unwrap().direction, DragDirection::Backward);
    }

    #[test]
    fn test_moves_ignored_when_not_dragging() {
        let mut drag = controller();
        assert_eq!(drag.move_to(50.0), None);
        drag.start(0.0, 0.0, 10.0);
        assert!(drag.end(0.0));
        assert_eq!(drag.move_to(50.0), None);
        assert!(!drag.end(0.0));
    }

    #[test]
    fn test_page_scroll_timer() {
        let mut drag = controller();
        assert!(!drag.should_prevent_page_scroll(0.0));
        drag.start(0.0, 0.0, 10.0);
        assert!(drag.should_prevent_page_scroll(10.0));
        drag.end(100.0);
        assert!(drag.should_prevent_page_scroll(1599.0));
        assert!(!drag.should_prevent_page_scroll(1600.0));
    }

    #[test]
    fn test_fixed_scroll_modes() {
        let prevent = DragController::new(10.0, false, TouchScrollMode::PreventPageScroll, 0.0);
        assert!(prevent.should_prevent_page_scroll(0.0));
        let mut allow = DragController::new(10.0, false, TouchScrollMode::AllowPageScroll, 0.0);
        allow.start(0.0, 0.0, 10.0);
        assert!(!allow.should_prevent_page_scroll(0.0));
    }
}
