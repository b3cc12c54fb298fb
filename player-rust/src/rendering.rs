use std::{cell::RefCell, rc::Rc};

use js_sys::Function;
use log::debug;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement};

use crate::{
    console_warn,
    js_api::{JsSerializable, JsUtils},
    player::{settings::FillMode, FrameRenderer},
};

/// Decoded frames, indexed from 0. Written by the loading shell only.
pub type ImageStore = Rc<RefCell<Vec<Option<HtmlImageElement>>>>;

pub fn new_image_store(total_images: usize) -> ImageStore {
    Rc::new(RefCell::new(vec![None; total_images]))
}

/// Destination rectangle `(x, y, width, height)` for an image of the given
/// natural size, centered on the canvas.
pub fn fit_rect(
    image_size: (f64, f64),
    canvas_size: (f64, f64),
    fill_mode: FillMode,
) -> (f64, f64, f64, f64) {
    let (image_width, image_height) = image_size;
    let (canvas_width, canvas_height) = canvas_size;
    if image_width <= 0.0 || image_height <= 0.0 {
        return (0.0, 0.0, canvas_width, canvas_height);
    }

    let scale_x = canvas_width / image_width;
    let scale_y = canvas_height / image_height;
    let scale = match fill_mode {
        FillMode::Cover => scale_x.max(scale_y),
        FillMode::Contain => scale_x.min(scale_y),
    };
    let width = image_width * scale;
    let height = image_height * scale;
    (
        (canvas_width - width) / 2.0,
        (canvas_height - height) / 2.0,
        width,
        height,
    )
}

/// `onBeforeFrame` / `onAfterFrame`, shared with the option surface.
#[derive(Default)]
pub struct FrameHooks {
    pub before_frame: Option<Function>,
    pub after_frame: Option<Function>,
}

pub type SharedFrameHooks = Rc<RefCell<FrameHooks>>;

pub struct CanvasFrameRenderer {
    canvas: HtmlCanvasElement,
    ctx2d: CanvasRenderingContext2d,
    images: ImageStore,
    hooks: SharedFrameHooks,
    poster: Option<HtmlImageElement>,
    ratio: Option<f64>,
}

impl CanvasFrameRenderer {
    pub fn new(
        canvas: HtmlCanvasElement,
        images: ImageStore,
        hooks: SharedFrameHooks,
    ) -> Result<Self, JsValue> {
        let ctx2d = canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("2d context is not available"))?
            .dyn_into::<CanvasRenderingContext2d>()?;

        Ok(CanvasFrameRenderer {
            canvas,
            ctx2d,
            images,
            hooks,
            poster: None,
            ratio: None,
        })
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    pub fn set_poster(&mut self, poster: HtmlImageElement) {
        self.poster = Some(poster);
    }

    /// Calls a frame hook with the canvas and `{ context, width, height }`.
    fn run_hook(&self, hook: Option<Function>) {
        let Some(hook) = hook else {
            return;
        };
        let frame_info = js_sys::Map::new();
        frame_info.str_set("context", &self.ctx2d);
        frame_info.str_set("width", &JsValue::from_f64(self.canvas.width() as f64));
        frame_info.str_set("height", &JsValue::from_f64(self.canvas.height() as f64));
        if let Err(err) = hook.call2(&JsValue::NULL, &self.canvas, &frame_info.to_js_object()) {
            console_warn!("Frame hook threw: {:?}", err);
        }
    }

    fn draw_image(&self, image: &HtmlImageElement, fill_mode: FillMode) {
        let canvas_size = (self.canvas.width() as f64, self.canvas.height() as f64);
        let image_size = (image.natural_width() as f64, image.natural_height() as f64);
        let (x, y, width, height) = fit_rect(image_size, canvas_size, fill_mode);
        if let Err(err) = self
            .ctx2d
            .draw_image_with_html_image_element_and_dw_and_dh(image, x, y, width, height)
        {
            debug!("drawImage failed: {:?}", err);
        }
    }
}

impl FrameRenderer for CanvasFrameRenderer {
    fn clear(&mut self) {
        self.ctx2d.clear_rect(
            0.0,
            0.0,
            self.canvas.width() as f64,
            self.canvas.height() as f64,
        );
    }

    fn before_frame(&mut self, _frame_number: u32) {
        let hook = self.hooks.borrow().before_frame.clone();
        self.run_hook(hook);
    }

    fn after_frame(&mut self, _frame_number: u32) {
        let hook = self.hooks.borrow().after_frame.clone();
        self.run_hook(hook);
    }

    fn draw_frame(&mut self, frame_number: u32, fill_mode: FillMode) {
        let images = self.images.borrow();
        let image = frame_number
            .checked_sub(1)
            .and_then(|index| images.get(index as usize))
            .and_then(Option::as_ref);
        if let Some(image) = image {
            self.draw_image(image, fill_mode);
        }
    }

    fn update_size(&mut self, ratio: Option<f64>) {
        // The initial ratio comes from the width/height attributes and is only
        // replaced by the option or by a CSS-fixed height.
        let mut current_ratio = match (ratio, self.ratio) {
            (Some(ratio), _) => ratio,
            (None, Some(current)) => current,
            (None, None) => self.canvas.width() as f64 / self.canvas.height().max(1) as f64,
        };

        let dpr = web_sys::window()
            .map(|window| window.device_pixel_ratio())
            .filter(|dpr| *dpr > 0.0)
            .unwrap_or(1.0);

        let initial_client_width = self.canvas.client_width();
        self.canvas
            .set_width((self.canvas.client_width() as f64 * dpr) as u32);
        // Without a CSS width the client width follows the new attribute.
        if initial_client_width != self.canvas.client_width() {
            self.canvas
                .set_width((self.canvas.client_width() as f64 * dpr) as u32);
        }
        let client_width = self.canvas.client_width() as f64;
        let height = (client_width / current_ratio).round() * dpr;
        self.canvas.set_height(height as u32);

        let client_height = self.canvas.client_height() as f64 * dpr;
        let height_difference = (self.canvas.height() as f64 - client_height).abs();
        if height_difference >= 1.0 {
            // Height is fixed by CSS.
            self.canvas.set_height(client_height as u32);
            current_ratio = self.canvas.width() as f64 / self.canvas.height().max(1) as f64;
        } else if height_difference > 0.0 {
            self.canvas.set_height(client_height as u32);
        }

        debug!(
            "Canvas resized to {}x{} (ratio {})",
            self.canvas.width(),
            self.canvas.height(),
            current_ratio
        );
        self.ratio = Some(current_ratio);
    }

    fn ratio(&self) -> f64 {
        self.ratio
            .unwrap_or_else(|| self.canvas.width() as f64 / self.canvas.height().max(1) as f64)
    }

    fn rendered_width(&self) -> f64 {
        self.canvas.client_width() as f64
    }

    fn draw_placeholder(&mut self, fill_mode: FillMode) {
        if let Some(poster) = self.poster.clone() {
            self.clear();
            self.draw_image(&poster, fill_mode);
        }
    }
}
