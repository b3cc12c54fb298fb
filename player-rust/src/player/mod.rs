pub mod animation;
pub mod drag;
pub mod frame;
pub mod preload;
pub mod settings;


use log::{debug, warn};

use self::{
    animation::{AnimationClock, Playhead, TickOutcome},
    drag::{drag_threshold, DragController, DragDirection},
    frame::{advance_frame, normalize_frame_number},
    preload::Preloader,
    settings::{FillMode, OptionEffect, OptionError, OptionValue, Settings},
};

/// Notifications raised by the player, dispatched by the host as
/// `animate-images:<name>` events.
#[derive(Clone, Debug, PartialEq)]
pub enum PlayerEvent {
    PreloadFinished,
    LoadingProgress(f64),
    LoadingError,
    AnimationEnd,
    PosterLoaded,
    DragStart,
    DragChange(u32),
    DragEnd,
}

impl PlayerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::PreloadFinished => "preload-finished",
            PlayerEvent::LoadingProgress(_) => "loading-progress",
            PlayerEvent::LoadingError => "loading-error",
            PlayerEvent::AnimationEnd => "animation-end",
            PlayerEvent::PosterLoaded => "poster-loaded",
            PlayerEvent::DragStart => "drag-start",
            PlayerEvent::DragChange(_) => "drag-change",
            PlayerEvent::DragEnd => "drag-end",
        }
    }
}

/// Paints frames onto the drawing surface.
pub trait FrameRenderer {
    fn clear(&mut self);
    /// Draw a 1-based frame. Slots that are not loaded are skipped.
    fn draw_frame(&mut self, frame_number: u32, fill_mode: FillMode);
    /// Recompute the surface size after a layout change.
    fn update_size(&mut self, ratio: Option<f64>);
    /// Current width / height ratio of the surface.
    fn ratio(&self) -> f64;
    /// Width the frames are rendered at, in CSS pixels.
    fn rendered_width(&self) -> f64;
    /// Redraw whatever is shown before the first frame, if anything.
    fn draw_placeholder(&mut self, _fill_mode: FillMode) {}
    /// Runs after the surface is cleared, right before `draw_frame`.
    fn before_frame(&mut self, _frame_number: u32) {}
    /// Runs once `draw_frame` returned.
    fn after_frame(&mut self, _frame_number: u32) {}
}

/// Everything the player needs from its environment.
pub trait PlayerHost {
    /// High resolution timestamp in milliseconds.
    fn now(&self) -> f64;
    /// Start fetching one image; the result comes back via `image_settled`.
    fn request_image(&mut self, index: usize, src: &str);
    /// Ask for one `tick` on the next display refresh.
    fn request_tick(&mut self);
    fn cancel_tick(&mut self);
    fn dispatch_event(&mut self, event: PlayerEvent);
    fn set_drag_input(&mut self, enabled: bool);
    /// Release every remaining subscription. Called once from `destroy`.
    fn teardown(&mut self) {}
}

/// Operation waiting for the full preload to finish.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PendingAction {
    Play,
    Next,
    Prev,
    SetFrame(f64),
    PlayTo(f64),
    PlayFrames(f64),
    Reset,
}

pub struct ImageSequencePlayer<R: FrameRenderer, H: PlayerHost> {
    settings: Settings,
    renderer: R,
    host: H,
    preloader: Preloader,
    clock: AnimationClock,
    drag: Option<DragController>,
    current_frame: u32,
    is_any_frame_changed: bool,
    deferred_action: Option<PendingAction>,
    tick_requested: bool,
    destroyed: bool,
}

impl<R: FrameRenderer, H: PlayerHost> ImageSequencePlayer<R, H> {
    pub fn new(settings: Settings, renderer: R, host: H) -> Self {
        let total_images = settings.total_images();
        let clock = AnimationClock::new(total_images, settings.fps);
        ImageSequencePlayer {
            preloader: Preloader::new(total_images as usize),
            clock,
            settings,
            renderer,
            host,
            drag: None,
            current_frame: 1,
            is_any_frame_changed: false,
            deferred_action: None,
            tick_requested: false,
            destroyed: false,
        }
    }

    /// Size the surface, start the configured preload, autoplay and drag input.
    pub fn init(&mut self) {
        self.update_canvas();
        let preload_count = self.settings.initial_preload_count();
        if preload_count > 0 {
            self.request_load(preload_count);
        }
        if self.settings.autoplay {
            self.play();
        }
        if self.settings.draggable {
            self.toggle_drag(true);
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    pub fn total_images(&self) -> u32 {
        self.settings.total_images()
    }

    pub fn ratio(&self) -> f64 {
        self.renderer.ratio()
    }

    pub fn is_animating(&self) -> bool {
        self.clock.is_animating()
    }

    pub fn is_preload_finished(&self) -> bool {
        self.preloader.is_complete()
    }

    pub fn is_loaded_with_errors(&self) -> bool {
        self.preloader.has_errors()
    }

    pub fn is_any_frame_changed(&self) -> bool {
        self.is_any_frame_changed
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn deferred_action(&self) -> Option<PendingAction> {
        self.deferred_action
    }

    pub fn frames_remaining(&self) -> Option<i64> {
        self.clock.frames_remaining()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.as_ref().map_or(false, |drag| drag.is_dragging())
    }

    pub fn drag_threshold(&self) -> Option<f64> {
        self.drag.as_ref().map(|drag| drag.threshold())
    }

    /// Single entry point for every frame change. Returns false when the
    /// frame was skipped because it is already on screen.
    fn commit_frame(&mut self, frame_number: u32, delta: u32) -> bool {
        if frame_number == self.current_frame && self.is_any_frame_changed {
            return false;
        }
        self.is_any_frame_changed = true;

        self.paint(frame_number);
        self.clock.frame_committed(delta);
        self.current_frame = frame_number;
        true
    }

    fn paint(&mut self, frame_number: u32) {
        self.renderer.clear();
        self.renderer.before_frame(frame_number);
        self.renderer.draw_frame(frame_number, self.settings.fill_mode);
        self.renderer.after_frame(frame_number);
    }

    fn defer(&mut self, action: PendingAction) {
        debug!("Deferring {:?} until preload finishes", action);
        self.deferred_action = Some(action);
        self.request_load(self.settings.images.len());
    }

    fn run_action(&mut self, action: PendingAction) {
        match action {
            PendingAction::Play => self.play(),
            PendingAction::Next => self.next(),
            PendingAction::Prev => self.prev(),
            PendingAction::SetFrame(frame_number) => self.set_frame(frame_number),
            PendingAction::PlayTo(frame_number) => self.play_to(frame_number),
            PendingAction::PlayFrames(frames) => self.play_frames(frames),
            PendingAction::Reset => self.reset(),
        }
    }

    fn request_load(&mut self, count: usize) {
        if let Some(range) = self.preloader.request_load(count) {
            for index in range {
                let src = &self.settings.images[index];
                self.host.request_image(index, src);
            }
        }
    }

    /// Report a finished image fetch, successful or not.
    pub fn image_settled(&mut self, index: usize, success: bool) {
        let progress = match self.preloader.image_settled(index, success) {
            Some(progress) => progress,
            None => return,
        };
        self.host
            .dispatch_event(PlayerEvent::LoadingProgress(progress.progress));
        if progress.errored {
            warn!("Failed to load image {}", self.settings.images[index]);
            self.host.dispatch_event(PlayerEvent::LoadingError);
        }
        if progress.finished {
            self.after_preload_finished();
        }
    }

    fn after_preload_finished(&mut self) {
        debug!("Preload finished, errors: {}", self.preloader.has_errors());
        self.refresh_drag();
        self.host.dispatch_event(PlayerEvent::PreloadFinished);
        if let Some(action) = self.deferred_action.take() {
            self.run_action(action);
        }
    }

    fn schedule_tick(&mut self) {
        if !self.tick_requested {
            self.tick_requested = true;
            self.host.request_tick();
        }
    }

    /// Advance the animation; called by the host on each display refresh.
    pub fn tick(&mut self, time: f64) {
        self.tick_requested = false;
        let playhead = Playhead {
            current_frame: self.current_frame,
            total_images: self.total_images(),
            reverse: self.settings.reverse,
            loop_playback: self.settings.loop_playback,
        };
        match self.clock.tick(time, playhead) {
            TickOutcome::Idle => {}
            TickOutcome::Pending => self.schedule_tick(),
            TickOutcome::Advance(step) => {
                self.commit_frame(step.frame, step.delta);
                if self.clock.is_animating() {
                    self.schedule_tick();
                }
            }
            TickOutcome::Finished => self.stop(),
        }
    }

    pub fn play(&mut self) {
        if self.clock.is_animating() {
            return;
        }
        if !self.preloader.is_complete() {
            self.defer(PendingAction::Play);
            return;
        }
        let now = self.host.now();
        self.clock.start(now);
        // The initial frame is never drawn on its own, the first run draws it.
        if !self.is_any_frame_changed {
            self.commit_frame(1, 1);
        }
        self.schedule_tick();
    }

    pub fn stop(&mut self) {
        if self.tick_requested {
            self.tick_requested = false;
            self.host.cancel_tick();
        }
        if self.clock.stop() {
            self.host.dispatch_event(PlayerEvent::AnimationEnd);
        }
    }

    pub fn toggle(&mut self) {
        if self.clock.is_animating() {
            self.stop();
        } else {
            self.play();
        }
    }

    fn step_once(&mut self, reverse: bool) {
        let step = advance_frame(
            self.current_frame,
            self.total_images(),
            1,
            reverse,
            self.settings.loop_playback,
        );
        self.commit_frame(step.frame, step.delta);
    }

    pub fn next(&mut self) {
        if !self.preloader.is_complete() {
            return self.defer(PendingAction::Next);
        }
        self.stop();
        self.step_once(self.settings.reverse);
    }

    pub fn prev(&mut self) {
        if !self.preloader.is_complete() {
            return self.defer(PendingAction::Prev);
        }
        self.stop();
        self.step_once(!self.settings.reverse);
    }

    pub fn set_frame(&mut self, frame_number: f64) {
        if !self.preloader.is_complete() {
            return self.defer(PendingAction::SetFrame(frame_number));
        }
        self.stop();
        let frame_number = normalize_frame_number(frame_number, self.total_images());
        self.commit_frame(frame_number, 1);
    }

    pub fn play_to(&mut self, frame_number: f64) {
        if !self.preloader.is_complete() {
            return self.defer(PendingAction::PlayTo(frame_number));
        }
        let total = self.total_images();
        let target = normalize_frame_number(frame_number, total);
        let current = self.current_frame;
        self.set_reverse(target <= current);

        let mut frames = (target as i64 - current as i64).abs();
        if self.settings.loop_playback && frames as f64 > total as f64 / 2.0 {
            // Take the shorter way round.
            if current > target {
                frames = (total - current + target) as i64;
                self.set_reverse(false);
            } else {
                frames = (total - target + current) as i64;
                self.set_reverse(true);
            }
        }
        self.play_frames(frames as f64);
    }

    pub fn play_frames(&mut self, frames: f64) {
        if !self.preloader.is_complete() {
            return self.defer(PendingAction::PlayFrames(frames));
        }
        let mut frames = frames.floor() as i64;
        if frames < 0 {
            return self.stop();
        }
        // Nothing has been drawn yet: the first frame is part of this run.
        if !self.is_any_frame_changed {
            frames = frames.saturating_add(1);
        }
        if frames <= 0 {
            return self.stop();
        }
        self.clock.set_frames_remaining(Some(frames));
        self.play();
    }

    pub fn set_reverse(&mut self, reverse: bool) {
        self.settings.reverse = reverse;
    }

    pub fn reverse(&self) -> bool {
        self.settings.reverse
    }

    /// Queue more images; `None` queues everything that is left.
    pub fn preload_images(&mut self, count: Option<usize>) {
        self.request_load(count.unwrap_or(self.settings.images.len()));
    }

    pub fn reset(&mut self) {
        if !self.preloader.is_complete() {
            return self.defer(PendingAction::Reset);
        }
        self.stop();
        let first = normalize_frame_number(1.0, self.total_images());
        self.commit_frame(first, 1);
    }

    pub fn update_canvas(&mut self) {
        self.renderer.update_size(self.settings.ratio);
        self.refresh_drag();
        // Resizing clears the surface.
        if self.is_any_frame_changed {
            self.paint(self.current_frame);
        } else {
            self.renderer.draw_placeholder(self.settings.fill_mode);
        }
    }

    /// The placeholder image finished loading. It is only shown while no
    /// frame has been drawn.
    pub fn placeholder_ready(&mut self) {
        if !self.is_any_frame_changed {
            self.renderer.draw_placeholder(self.settings.fill_mode);
        }
        self.host.dispatch_event(PlayerEvent::PosterLoaded);
    }

    pub fn get_option(&self, option: &str) -> Result<OptionValue, OptionError> {
        self.settings.get(option).map_err(|err| {
            warn!("{}", err);
            err
        })
    }

    /// Change an option at runtime. Rejected values are logged and the
    /// previous value is kept.
    pub fn set_option(&mut self, option: &str, value: &OptionValue) -> Result<(), OptionError> {
        let effect = match self.settings.set(option, value) {
            Ok(effect) => effect,
            Err(err) => {
                warn!("{}", err);
                return Err(err);
            }
        };
        match effect {
            OptionEffect::None => {}
            OptionEffect::Duration => {
                let total_images = self.total_images();
                self.clock.update_duration(total_images, self.settings.fps);
            }
            OptionEffect::CanvasSize => self.update_canvas(),
            OptionEffect::Drag => self.refresh_drag(),
            OptionEffect::DragInput => self.toggle_drag(self.settings.draggable),
        }
        Ok(())
    }

    fn current_drag_threshold(&self) -> f64 {
        drag_threshold(
            self.renderer.rendered_width(),
            self.total_images(),
            self.settings.drag_modifier,
        )
    }

    fn refresh_drag(&mut self) {
        let threshold = self.current_drag_threshold();
        let settings = &self.settings;
        if let Some(drag) = self.drag.as_mut() {
            drag.set_threshold(threshold);
            drag.set_inversion(settings.inversion);
            drag.set_touch_scroll_mode(
                settings.touch_scroll_mode,
                settings.page_scroll_timer_delay,
            );
        }
    }

    fn toggle_drag(&mut self, enable: bool) {
        if enable {
            if self.drag.is_none() {
                self.drag = Some(DragController::new(
                    self.current_drag_threshold(),
                    self.settings.inversion,
                    self.settings.touch_scroll_mode,
                    self.settings.page_scroll_timer_delay,
                ));
            }
            self.host.set_drag_input(true);
        } else if self.drag.take().is_some() {
            self.host.set_drag_input(false);
        }
    }

    pub fn drag_start(&mut self, x: f64, y: f64) {
        if self.drag.is_none() {
            return;
        }
        if !self.preloader.is_complete() {
            self.request_load(self.settings.images.len());
        }
        self.stop();
        let threshold = self.current_drag_threshold();
        if let Some(drag) = self.drag.as_mut() {
            drag.start(x, y, threshold);
        }
        self.host.dispatch_event(PlayerEvent::DragStart);
    }

    pub fn drag_move(&mut self, x: f64) {
        let steps = match self.drag.as_mut().and_then(|drag| drag.move_to(x)) {
            Some(steps) => steps,
            None => return,
        };
        let reverse = match steps.direction {
            DragDirection::Forward => self.settings.reverse,
            DragDirection::Backward => !self.settings.reverse,
        };
        for _ in 0..steps.count {
            let step = advance_frame(
                self.current_frame,
                self.total_images(),
                1,
                reverse,
                self.settings.loop_playback,
            );
            if self.commit_frame(step.frame, step.delta) {
                self.host
                    .dispatch_event(PlayerEvent::DragChange(self.current_frame));
            }
        }
    }

    pub fn drag_end(&mut self) {
        let now = self.host.now();
        if self.drag.as_mut().map_or(false, |drag| drag.end(now)) {
            self.host.dispatch_event(PlayerEvent::DragEnd);
        }
    }

    pub fn should_prevent_page_scroll(&self) -> bool {
        let now = self.host.now();
        self.drag
            .as_ref()
            .map_or(false, |drag| drag.should_prevent_page_scroll(now))
    }

    /// Stop, clear the surface and release every subscription. Safe to call
    /// more than once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.stop();
        self.deferred_action = None;
        self.renderer.clear();
        self.toggle_drag(false);
        self.host.teardown();
        self.destroyed = true;
    }
}
