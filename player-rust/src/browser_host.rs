use std::{
    cell::RefCell,
    collections::VecDeque,
    rc::{Rc, Weak},
};

use log::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{
    AddEventListenerOptions, EventTarget, HtmlCanvasElement, HtmlImageElement, MouseEvent,
    TouchEvent,
};

use crate::{
    js_api::{BrowserPlayer, PlayerShell},
    player::{PlayerEvent, PlayerHost},
    rendering::ImageStore,
    utils::performance_now,
};

/// Notifications waiting to be dispatched once the player is released.
pub type EventQueue = Rc<RefCell<VecDeque<PlayerEvent>>>;

fn window() -> Result<web_sys::Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("window is not available"))
}

/// A pending `requestAnimationFrame` call, cancelled on drop.
pub struct AnimationFrameHandle {
    id: i32,
}

impl AnimationFrameHandle {
    pub fn request(callback: &Closure<dyn FnMut(f64)>) -> Result<Self, JsValue> {
        let id = window()?.request_animation_frame(callback.as_ref().unchecked_ref())?;
        Ok(AnimationFrameHandle { id })
    }
}

impl Drop for AnimationFrameHandle {
    fn drop(&mut self) {
        if let Some(window) = web_sys::window() {
            let _ = window.cancel_animation_frame(self.id);
        }
    }
}

/// A registered DOM listener, removed on drop.
pub struct EventListenerHandle {
    target: EventTarget,
    event_type: &'static str,
    callback: js_sys::Function,
}

impl EventListenerHandle {
    pub fn listen(
        target: &EventTarget,
        event_type: &'static str,
        callback: &js_sys::Function,
        passive: Option<bool>,
    ) -> Result<Self, JsValue> {
        match passive {
            Some(passive) => {
                let options = AddEventListenerOptions::new();
                options.set_passive(passive);
                target.add_event_listener_with_callback_and_add_event_listener_options(
                    event_type, callback, &options,
                )?;
            }
            None => target.add_event_listener_with_callback(event_type, callback)?,
        }
        Ok(EventListenerHandle {
            target: target.clone(),
            event_type,
            callback: callback.clone(),
        })
    }
}

impl Drop for EventListenerHandle {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.event_type, &self.callback);
    }
}

pub async fn load_image(src: &str) -> Result<HtmlImageElement, JsValue> {
    let image = HtmlImageElement::new()?;
    image.set_src(src);
    JsFuture::from(image.decode()).await?;
    Ok(image)
}

fn mouse_closure(
    shell: &Weak<PlayerShell>,
    handler: fn(&mut BrowserPlayer, &MouseEvent),
) -> Closure<dyn FnMut(MouseEvent)> {
    let shell = shell.clone();
    Closure::new(move |event: MouseEvent| {
        if let Some(shell) = shell.upgrade() {
            shell.with_player(|player| handler(player, &event));
        }
    })
}

fn touch_closure(
    shell: &Weak<PlayerShell>,
    handler: fn(&mut BrowserPlayer, &TouchEvent),
) -> Closure<dyn FnMut(TouchEvent)> {
    let shell = shell.clone();
    Closure::new(move |event: TouchEvent| {
        if let Some(shell) = shell.upgrade() {
            shell.with_player(|player| handler(player, &event));
        }
    })
}

fn on_mouse_down(player: &mut BrowserPlayer, event: &MouseEvent) {
    player.drag_start(event.page_x() as f64, event.page_y() as f64);
}

fn on_mouse_move(player: &mut BrowserPlayer, event: &MouseEvent) {
    if player.is_dragging() {
        player.drag_move(event.page_x() as f64);
    }
}

fn on_pointer_up<E>(player: &mut BrowserPlayer, _event: &E) {
    player.drag_end();
}

fn on_touch_start(player: &mut BrowserPlayer, event: &TouchEvent) {
    if let Some(touch) = event.touches().get(0) {
        player.drag_start(touch.page_x() as f64, touch.page_y() as f64);
    }
}

fn on_touch_move(player: &mut BrowserPlayer, event: &TouchEvent) {
    if event.cancelable() && player.should_prevent_page_scroll() {
        event.prevent_default();
    }
    if !player.is_dragging() {
        return;
    }
    if let Some(touch) = event.touches().get(0) {
        player.drag_move(touch.page_x() as f64);
    }
}

/// Closures live as long as the host. Handles only unregister them, so a
/// closure is never freed while it runs.
struct HostClosures {
    tick: Closure<dyn FnMut(f64)>,
    resize: Closure<dyn FnMut()>,
    mouse_down: Closure<dyn FnMut(MouseEvent)>,
    mouse_move: Closure<dyn FnMut(MouseEvent)>,
    mouse_up: Closure<dyn FnMut(MouseEvent)>,
    touch_start: Closure<dyn FnMut(TouchEvent)>,
    touch_move: Closure<dyn FnMut(TouchEvent)>,
    touch_end: Closure<dyn FnMut(TouchEvent)>,
}

impl HostClosures {
    fn new(shell: &Weak<PlayerShell>) -> Self {
        let tick_shell = shell.clone();
        let tick = Closure::<dyn FnMut(f64)>::new(move |time: f64| {
            if let Some(shell) = tick_shell.upgrade() {
                shell.with_player(|player| {
                    player.host_mut().frame_fired();
                    player.tick(time);
                });
            }
        });

        let resize_shell = shell.clone();
        let resize = Closure::<dyn FnMut()>::new(move || {
            if let Some(shell) = resize_shell.upgrade() {
                shell.with_player(|player| player.update_canvas());
            }
        });

        HostClosures {
            tick,
            resize,
            mouse_down: mouse_closure(shell, on_mouse_down),
            mouse_move: mouse_closure(shell, on_mouse_move),
            mouse_up: mouse_closure(shell, on_pointer_up::<MouseEvent>),
            touch_start: touch_closure(shell, on_touch_start),
            touch_move: touch_closure(shell, on_touch_move),
            touch_end: touch_closure(shell, on_pointer_up::<TouchEvent>),
        }
    }
}

/// `PlayerHost` backed by the browser: animation frames, DOM listeners and
/// image decoding.
pub struct BrowserHost {
    canvas: HtmlCanvasElement,
    images: ImageStore,
    events: EventQueue,
    shell: Weak<PlayerShell>,
    closures: HostClosures,
    pending_frame: Option<AnimationFrameHandle>,
    resize_listener: Option<EventListenerHandle>,
    drag_listeners: Vec<EventListenerHandle>,
}

impl BrowserHost {
    pub fn new(
        canvas: HtmlCanvasElement,
        images: ImageStore,
        events: EventQueue,
        shell: Weak<PlayerShell>,
    ) -> Self {
        let closures = HostClosures::new(&shell);
        BrowserHost {
            canvas,
            images,
            events,
            shell,
            closures,
            pending_frame: None,
            resize_listener: None,
            drag_listeners: vec![],
        }
    }

    pub fn listen_resize(&mut self) -> Result<(), JsValue> {
        if self.resize_listener.is_none() {
            let window: EventTarget = window()?.into();
            self.resize_listener = Some(EventListenerHandle::listen(
                &window,
                "resize",
                self.closures.resize.as_ref().unchecked_ref(),
                None,
            )?);
        }
        Ok(())
    }

    /// The requested frame callback is running; there is nothing to cancel.
    pub fn frame_fired(&mut self) {
        self.pending_frame = None;
    }

    fn add_drag_listeners(&mut self) -> Result<(), JsValue> {
        let canvas: &EventTarget = self.canvas.as_ref();
        let document: EventTarget = window()?
            .document()
            .ok_or_else(|| JsValue::from_str("document is not available"))?
            .into();
        let closures = &self.closures;

        let listeners = vec![
            EventListenerHandle::listen(
                canvas,
                "mousedown",
                closures.mouse_down.as_ref().unchecked_ref(),
                None,
            )?,
            EventListenerHandle::listen(
                &document,
                "mousemove",
                closures.mouse_move.as_ref().unchecked_ref(),
                None,
            )?,
            EventListenerHandle::listen(
                &document,
                "mouseup",
                closures.mouse_up.as_ref().unchecked_ref(),
                None,
            )?,
            EventListenerHandle::listen(
                canvas,
                "touchstart",
                closures.touch_start.as_ref().unchecked_ref(),
                Some(true),
            )?,
            EventListenerHandle::listen(
                canvas,
                "touchmove",
                closures.touch_move.as_ref().unchecked_ref(),
                Some(false),
            )?,
            EventListenerHandle::listen(
                canvas,
                "touchend",
                closures.touch_end.as_ref().unchecked_ref(),
                None,
            )?,
            EventListenerHandle::listen(
                canvas,
                "touchcancel",
                closures.touch_end.as_ref().unchecked_ref(),
                None,
            )?,
        ];
        self.drag_listeners = listeners;
        Ok(())
    }
}

impl PlayerHost for BrowserHost {
    fn now(&self) -> f64 {
        performance_now()
    }

    fn request_image(&mut self, index: usize, src: &str) {
        let shell = self.shell.clone();
        let images = self.images.clone();
        let src = src.to_string();
        spawn_local(async move {
            let success = match load_image(&src).await {
                Ok(image) => {
                    if let Some(slot) = images.borrow_mut().get_mut(index) {
                        *slot = Some(image);
                    }
                    true
                }
                Err(err) => {
                    debug!("Image {} failed to decode: {:?}", src, err);
                    false
                }
            };
            if let Some(shell) = shell.upgrade() {
                shell.with_player(|player| {
                    if !player.is_destroyed() {
                        player.image_settled(index, success);
                    }
                });
            }
        });
    }

    fn request_tick(&mut self) {
        match AnimationFrameHandle::request(&self.closures.tick) {
            Ok(handle) => self.pending_frame = Some(handle),
            Err(err) => warn!("requestAnimationFrame failed: {:?}", err),
        }
    }

    fn cancel_tick(&mut self) {
        self.pending_frame = None;
    }

    fn dispatch_event(&mut self, event: PlayerEvent) {
        self.events.borrow_mut().push_back(event);
    }

    fn set_drag_input(&mut self, enabled: bool) {
        if !enabled {
            self.drag_listeners.clear();
            return;
        }
        if self.drag_listeners.is_empty() {
            if let Err(err) = self.add_drag_listeners() {
                warn!("Could not enable dragging: {:?}", err);
                self.drag_listeners.clear();
            }
        }
    }

    fn teardown(&mut self) {
        self.pending_frame = None;
        self.resize_listener = None;
        self.drag_listeners.clear();
    }
}
