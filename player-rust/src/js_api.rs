use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use js_sys::{Array, Function, Object, Promise, Reflect};
use log::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{CustomEvent, CustomEventInit, HtmlCanvasElement};

use crate::{
    browser_host::{load_image, BrowserHost, EventQueue},
    console_warn,
    player::{
        settings::{InitError, OptionError, OptionValue, Settings, CALLBACK_OPTIONS},
        ImageSequencePlayer, PlayerEvent,
    },
    rendering::{new_image_store, CanvasFrameRenderer, SharedFrameHooks},
};

pub type BrowserPlayer = ImageSequencePlayer<CanvasFrameRenderer, BrowserHost>;

pub const EVENT_PREFIX: &str = "animate-images:";

impl From<InitError> for JsValue {
    fn from(err: InitError) -> Self {
        js_sys::Error::new(&err.to_string()).into()
    }
}

pub trait JsSerializable {
    fn to_js_object(&self) -> js_sys::Object;
}

pub trait JsUtils {
    fn str_set(&self, key: &str, value: &JsValue);
}

impl JsSerializable for js_sys::Map {
    fn to_js_object(&self) -> js_sys::Object {
        Object::from_entries(self).unwrap_or_else(|_| Object::new())
    }
}

impl JsUtils for js_sys::Map {
    fn str_set(&self, key: &str, value: &JsValue) {
        self.set(&JsValue::from_str(key), value);
    }
}

pub trait ToJsValue {
    fn to_js_value(&self) -> JsValue;
}

impl ToJsValue for OptionValue {
    fn to_js_value(&self) -> JsValue {
        match self {
            OptionValue::Bool(value) => JsValue::from_bool(*value),
            OptionValue::Number(value) => JsValue::from_f64(*value),
            OptionValue::Text(value) => JsValue::from_str(value),
            OptionValue::List(values) => values
                .iter()
                .map(|value| JsValue::from_str(value))
                .collect::<Array>()
                .into(),
            OptionValue::Unset => JsValue::UNDEFINED,
        }
    }
}

impl ToJsValue for PlayerEvent {
    /// The `detail` payload of the DOM event.
    fn to_js_value(&self) -> JsValue {
        let detail = js_sys::Map::new();
        match self {
            PlayerEvent::LoadingProgress(progress) => {
                detail.str_set("progress", &JsValue::from_f64(*progress));
            }
            PlayerEvent::DragChange(frame) => {
                detail.str_set("frame", &JsValue::from_f64(*frame as f64));
            }
            _ => return JsValue::NULL,
        }
        detail.to_js_object().into()
    }
}

/// Reads a JS value into the typed option surface. Functions and plain
/// objects are not option values.
pub fn option_value_from_js(value: &JsValue) -> Option<OptionValue> {
    if value.is_undefined() || value.is_null() {
        Some(OptionValue::Unset)
    } else if let Some(value) = value.as_bool() {
        Some(OptionValue::Bool(value))
    } else if let Some(value) = value.as_f64() {
        Some(OptionValue::Number(value))
    } else if let Some(value) = value.as_string() {
        Some(OptionValue::Text(value))
    } else if Array::is_array(value) {
        Array::from(value)
            .iter()
            .map(|item| item.as_string())
            .collect::<Option<Vec<_>>>()
            .map(OptionValue::List)
    } else {
        None
    }
}

#[derive(Default)]
pub struct Callbacks {
    on_preload_finished: Option<Function>,
    on_poster_loaded: Option<Function>,
    on_animation_end: Option<Function>,
    frame_hooks: SharedFrameHooks,
}

impl Callbacks {
    pub fn frame_hooks(&self) -> SharedFrameHooks {
        self.frame_hooks.clone()
    }

    pub fn get(&self, option: &str) -> Option<Function> {
        match option {
            "onPreloadFinished" => self.on_preload_finished.clone(),
            "onPosterLoaded" => self.on_poster_loaded.clone(),
            "onAnimationEnd" => self.on_animation_end.clone(),
            "onBeforeFrame" => self.frame_hooks.borrow().before_frame.clone(),
            "onAfterFrame" => self.frame_hooks.borrow().after_frame.clone(),
            _ => None,
        }
    }

    /// Store a callback; `null`/`undefined` clears it.
    pub fn set(&mut self, option: &str, value: &JsValue) -> Result<(), OptionError> {
        let callback = if value.is_undefined() || value.is_null() {
            None
        } else {
            match value.dyn_ref::<Function>() {
                Some(function) => Some(function.clone()),
                None => {
                    return Err(OptionError::InvalidValue {
                        option: option.to_string(),
                        expected: "a function",
                    })
                }
            }
        };
        match option {
            "onPreloadFinished" => self.on_preload_finished = callback,
            "onPosterLoaded" => self.on_poster_loaded = callback,
            "onAnimationEnd" => self.on_animation_end = callback,
            "onBeforeFrame" => self.frame_hooks.borrow_mut().before_frame = callback,
            "onAfterFrame" => self.frame_hooks.borrow_mut().after_frame = callback,
            _ => return Err(OptionError::Unknown(option.to_string())),
        }
        Ok(())
    }

    fn for_event(&self, event: &PlayerEvent) -> Option<Function> {
        match event {
            PlayerEvent::PreloadFinished => self.on_preload_finished.clone(),
            PlayerEvent::PosterLoaded => self.on_poster_loaded.clone(),
            PlayerEvent::AnimationEnd => self.on_animation_end.clone(),
            _ => None,
        }
    }
}

pub struct JsApi {}

impl JsApi {
    pub fn dispatch_player_event(canvas: &HtmlCanvasElement, event: &PlayerEvent) {
        let event_type = format!("{}{}", EVENT_PREFIX, event.name());
        let init = CustomEventInit::new();
        init.set_detail(&event.to_js_value());
        let dispatched = CustomEvent::new_with_event_init_dict(&event_type, &init)
            .and_then(|custom_event| canvas.dispatch_event(&custom_event));
        if let Err(err) = dispatched {
            console_warn!("Failed to dispatch {}: {:?}", event_type, err);
        }
    }

    pub fn dispatch_callback(canvas: &HtmlCanvasElement, callback: &Function) {
        if let Err(err) = callback.call1(&JsValue::NULL, canvas) {
            console_warn!("Callback threw: {:?}", err);
        }
    }
}

/// Owns the player and everything that must run after it is released:
/// DOM events, callbacks and promise resolution.
pub struct PlayerShell {
    player: RefCell<BrowserPlayer>,
    canvas: HtmlCanvasElement,
    events: EventQueue,
    callbacks: RefCell<Callbacks>,
    resolvers: RefCell<Vec<Function>>,
}

impl PlayerShell {
    fn new(
        canvas: HtmlCanvasElement,
        settings: Settings,
        callbacks: Callbacks,
    ) -> Result<Rc<PlayerShell>, JsValue> {
        let images = new_image_store(settings.images.len());
        let renderer =
            CanvasFrameRenderer::new(canvas.clone(), images.clone(), callbacks.frame_hooks())?;
        let events: EventQueue = Rc::new(RefCell::new(VecDeque::new()));

        Ok(Rc::new_cyclic(|shell| {
            let host = BrowserHost::new(canvas.clone(), images, events.clone(), shell.clone());
            PlayerShell {
                player: RefCell::new(ImageSequencePlayer::new(settings, renderer, host)),
                canvas,
                events,
                callbacks: RefCell::new(callbacks),
                resolvers: RefCell::new(vec![]),
            }
        }))
    }

    /// Run `f` with the player borrowed, then dispatch whatever it raised.
    /// Calls made from a frame hook, while a frame is being drawn, are
    /// ignored and return the default value.
    pub fn with_player<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut BrowserPlayer) -> R,
        R: Default,
    {
        let result = match self.player.try_borrow_mut() {
            Ok(mut player) => f(&mut player),
            Err(_) => {
                console_warn!("AnimateImages is drawing a frame; the call was ignored");
                return R::default();
            }
        };
        self.flush_events();
        result
    }

    fn next_event(&self) -> Option<PlayerEvent> {
        self.events.borrow_mut().pop_front()
    }

    fn flush_events(&self) {
        while let Some(event) = self.next_event() {
            let resolvers = if event == PlayerEvent::AnimationEnd {
                self.resolvers.take()
            } else {
                vec![]
            };
            JsApi::dispatch_player_event(&self.canvas, &event);
            let callback = self.callbacks.borrow().for_event(&event);
            if let Some(callback) = callback {
                JsApi::dispatch_callback(&self.canvas, &callback);
            }
            for resolve in resolvers {
                let _ = resolve.call0(&JsValue::NULL);
            }
        }
    }

    /// Promise for the end of the animation just started. Settles at once
    /// when nothing is playing or waiting for the preload.
    fn completion_promise(&self) -> Promise {
        let settled = match self.player.try_borrow() {
            Ok(player) => !player.is_animating() && player.deferred_action().is_none(),
            Err(_) => true,
        };
        let mut resolvers = self.resolvers.borrow_mut();
        Promise::new(&mut |resolve, _reject| {
            if settled {
                let _ = resolve.call0(&JsValue::NULL);
            } else {
                resolvers.push(resolve);
            }
        })
    }

    fn resolve_all(&self) {
        for resolve in self.resolvers.take() {
            let _ = resolve.call0(&JsValue::NULL);
        }
    }

    fn load_poster(self: &Rc<Self>, src: String) {
        let shell = Rc::downgrade(self);
        spawn_local(async move {
            let poster = match load_image(&src).await {
                Ok(poster) => poster,
                Err(err) => {
                    warn!("Poster {} failed to load: {:?}", src, err);
                    return;
                }
            };
            if let Some(shell) = shell.upgrade() {
                shell.with_player(|player| {
                    if !player.is_destroyed() {
                        player.renderer_mut().set_poster(poster);
                        player.placeholder_ready();
                    }
                });
            }
        });
    }
}

fn read_canvas(canvas: JsValue) -> Result<HtmlCanvasElement, InitError> {
    if canvas.is_undefined() || canvas.is_null() {
        return Err(InitError::MissingCanvas);
    }
    canvas
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| InitError::NotACanvas)
}

fn read_images(options: &Object) -> Result<Vec<String>, InitError> {
    let images = Reflect::get(options, &JsValue::from_str("images"))
        .map_err(|_| InitError::MissingImages)?;
    if images.is_undefined() || images.is_null() {
        return Err(InitError::MissingImages);
    }
    if !Array::is_array(&images) {
        return Err(InitError::EmptyImages);
    }
    let images = Array::from(&images)
        .iter()
        .map(|src| src.as_string())
        .collect::<Option<Vec<_>>>()
        .ok_or(InitError::NonStringImage)?;
    Ok(images)
}

fn read_settings(options: &Object) -> Result<(Settings, Callbacks), InitError> {
    let mut settings = Settings::new(read_images(options)?)?;
    let mut callbacks = Callbacks::default();

    for key in Object::keys(options).iter() {
        let key = match key.as_string() {
            Some(key) => key,
            None => continue,
        };
        if key == "images" {
            continue;
        }
        let value = Reflect::get(options, &JsValue::from_str(&key)).unwrap_or(JsValue::UNDEFINED);
        let applied = if CALLBACK_OPTIONS.contains(&key.as_str()) {
            callbacks.set(&key, &value)
        } else {
            match option_value_from_js(&value) {
                Some(value) => settings.set_initial(&key, &value),
                None => Err(OptionError::InvalidValue {
                    option: key.clone(),
                    expected: "a boolean, number, string or array",
                }),
            }
        };
        if let Err(err) = applied {
            warn!("{}", err);
        }
    }
    Ok((settings, callbacks))
}

/// Image sequence player bound to a canvas element.
#[wasm_bindgen]
pub struct AnimateImages {
    shell: Rc<PlayerShell>,
}

#[wasm_bindgen]
impl AnimateImages {
    #[wasm_bindgen(constructor)]
    pub fn new(canvas: JsValue, options: JsValue) -> Result<AnimateImages, JsValue> {
        let canvas = read_canvas(canvas)?;
        let options = options
            .dyn_into::<Object>()
            .map_err(|_| InitError::InvalidOptions)?;
        if Array::is_array(&options) || options.is_function() {
            return Err(InitError::InvalidOptions.into());
        }
        let (settings, callbacks) = read_settings(&options)?;
        let poster = settings.poster.clone();

        let shell = PlayerShell::new(canvas, settings, callbacks)?;
        shell.player.borrow_mut().host_mut().listen_resize()?;
        if let Some(poster) = poster {
            shell.load_poster(poster);
        }
        shell.with_player(|player| player.init());
        Ok(AnimateImages { shell })
    }

    pub fn play(&self) {
        self.shell.with_player(|player| player.play());
    }

    pub fn stop(&self) {
        self.shell.with_player(|player| player.stop());
    }

    pub fn toggle(&self) {
        self.shell.with_player(|player| player.toggle());
    }

    pub fn next(&self) {
        self.shell.with_player(|player| player.next());
    }

    pub fn prev(&self) {
        self.shell.with_player(|player| player.prev());
    }

    #[wasm_bindgen(js_name = setFrame)]
    pub fn set_frame(&self, frame_number: f64) {
        self.shell.with_player(|player| player.set_frame(frame_number));
    }

    #[wasm_bindgen(js_name = playTo)]
    pub fn play_to(&self, frame_number: f64) -> Promise {
        self.shell.with_player(|player| player.play_to(frame_number));
        self.shell.completion_promise()
    }

    #[wasm_bindgen(js_name = playFrames)]
    pub fn play_frames(&self, frames: f64) -> Promise {
        self.shell.with_player(|player| player.play_frames(frames));
        self.shell.completion_promise()
    }

    #[wasm_bindgen(js_name = setReverse)]
    pub fn set_reverse(&self, reverse: bool) {
        self.shell.with_player(|player| player.set_reverse(reverse));
    }

    #[wasm_bindgen(js_name = getReverse)]
    pub fn get_reverse(&self) -> bool {
        self.shell.with_player(|player| player.reverse())
    }

    /// Queue `count` more images, or everything left when omitted.
    #[wasm_bindgen(js_name = preloadImages)]
    pub fn preload_images(&self, count: Option<f64>) {
        let count = count
            .filter(|count| count.is_finite())
            .map(|count| count.max(0.0).floor() as usize);
        self.shell.with_player(|player| player.preload_images(count));
    }

    #[wasm_bindgen(js_name = updateCanvas)]
    pub fn update_canvas(&self) {
        self.shell.with_player(|player| player.update_canvas());
    }

    #[wasm_bindgen(js_name = getOption)]
    pub fn get_option(&self, option: &str) -> JsValue {
        if CALLBACK_OPTIONS.contains(&option) {
            return self
                .shell
                .callbacks
                .borrow()
                .get(option)
                .map_or(JsValue::UNDEFINED, JsValue::from);
        }
        self.shell.with_player(|player| {
            player
                .get_option(option)
                .map_or(JsValue::UNDEFINED, |value| value.to_js_value())
        })
    }

    /// Unknown options and rejected values only produce a warning.
    #[wasm_bindgen(js_name = setOption)]
    pub fn set_option(&self, option: &str, value: JsValue) {
        if CALLBACK_OPTIONS.contains(&option) {
            if let Err(err) = self.shell.callbacks.borrow_mut().set(option, &value) {
                warn!("{}", err);
            }
            return;
        }
        match option_value_from_js(&value) {
            Some(value) => {
                self.shell
                    .with_player(|player| player.set_option(option, &value).ok());
            }
            None => warn!(
                "{}",
                OptionError::InvalidValue {
                    option: option.to_string(),
                    expected: "a boolean, number, string or array",
                }
            ),
        }
    }

    #[wasm_bindgen(js_name = getCurrentFrame)]
    pub fn get_current_frame(&self) -> u32 {
        self.shell.with_player(|player| player.current_frame())
    }

    #[wasm_bindgen(js_name = getTotalImages)]
    pub fn get_total_images(&self) -> u32 {
        self.shell.with_player(|player| player.total_images())
    }

    #[wasm_bindgen(js_name = getRatio)]
    pub fn get_ratio(&self) -> f64 {
        self.shell.with_player(|player| player.ratio())
    }

    #[wasm_bindgen(js_name = isAnimating)]
    pub fn is_animating(&self) -> bool {
        self.shell.with_player(|player| player.is_animating())
    }

    #[wasm_bindgen(js_name = isPreloadFinished)]
    pub fn is_preload_finished(&self) -> bool {
        self.shell.with_player(|player| player.is_preload_finished())
    }

    #[wasm_bindgen(js_name = isLoadedWithErrors)]
    pub fn is_loaded_with_errors(&self) -> bool {
        self.shell.with_player(|player| player.is_loaded_with_errors())
    }

    pub fn reset(&self) {
        self.shell.with_player(|player| player.reset());
    }

    /// Stop, clear the canvas and remove every listener. Pending `playTo` /
    /// `playFrames` promises are settled.
    pub fn destroy(&self) {
        self.shell.with_player(|player| player.destroy());
        self.shell.resolve_all();
    }
}
