//! Construction, option and playback checks that need a real DOM.

#![cfg(target_arch = "wasm32")]

use std::{cell::RefCell, rc::Rc};

use animate_images::AnimateImages;
use js_sys::{Array, Object, Promise, Reflect};
use wasm_bindgen::{prelude::*, JsCast};
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

const PIXEL: &str = "data:image/gif;base64,R0lGODlhAQABAIAAAAAAAP///ywAAAAAAQABAAACAUwAOw==";

wasm_bindgen_test_configure!(run_in_browser);

fn canvas() -> HtmlCanvasElement {
    let document = web_sys::window().unwrap().document().unwrap();
    let canvas = document
        .create_element("canvas")
        .unwrap()
        .dyn_into::<HtmlCanvasElement>()
        .unwrap();
    canvas.set_width(800);
    canvas.set_height(400);
    document.body().unwrap().append_child(&canvas).unwrap();
    canvas
}

fn options(images: &[&str]) -> Object {
    let options = Object::new();
    let images: Array = images.iter().map(|src| JsValue::from_str(src)).collect();
    Reflect::set(&options, &"images".into(), &images).unwrap();
    options
}

/// Options for `count` decodable images that are all preloaded, plus a
/// promise settled by `onPreloadFinished`.
fn preloaded_options(count: usize) -> (Object, Promise) {
    let options = options(&vec![PIXEL; count]);
    Reflect::set(&options, &"fps".into(), &JsValue::from_f64(60.0)).unwrap();
    let preloaded = Promise::new(&mut |resolve, _reject| {
        Reflect::set(&options, &"onPreloadFinished".into(), &resolve).unwrap();
    });
    (options, preloaded)
}

fn error_message(err: JsValue) -> String {
    err.dyn_into::<js_sys::Error>().unwrap().message().into()
}

#[wasm_bindgen_test]
fn test_missing_canvas_throws() {
    let err = AnimateImages::new(JsValue::UNDEFINED, options(&["a.jpg"]).into()).err();
    assert_eq!(error_message(err.unwrap()), "Canvas element is not defined");
}

#[wasm_bindgen_test]
fn test_non_canvas_node_throws() {
    let div = web_sys::window()
        .unwrap()
        .document()
        .unwrap()
        .create_element("div")
        .unwrap();
    let err = AnimateImages::new(div.into(), options(&["a.jpg"]).into()).err();
    assert_eq!(error_message(err.unwrap()), "Node is not a canvas element");
}

#[wasm_bindgen_test]
fn test_invalid_options_throw() {
    let err = AnimateImages::new(canvas().into(), JsValue::from_str("images")).err();
    assert_eq!(error_message(err.unwrap()), "Options must be an object");

    let err = AnimateImages::new(canvas().into(), Object::new().into()).err();
    assert_eq!(error_message(err.unwrap()), "options.images is not defined");

    let err = AnimateImages::new(canvas().into(), options(&[]).into()).err();
    assert_eq!(
        error_message(err.unwrap()),
        "options.images must be a non-empty array"
    );
}

#[wasm_bindgen_test]
fn test_initial_state() {
    let options = options(&["a.jpg", "b.jpg", "c.jpg"]);
    Reflect::set(&options, &"preload".into(), &"none".into()).unwrap();
    Reflect::set(&options, &"fps".into(), &JsValue::from_f64(24.0)).unwrap();
    let player = AnimateImages::new(canvas().into(), options.into()).unwrap();

    assert_eq!(player.get_total_images(), 3);
    assert_eq!(player.get_current_frame(), 1);
    assert!(!player.is_animating());
    assert!(!player.is_preload_finished());
    assert_eq!(player.get_option("fps").as_f64(), Some(24.0));
    assert_eq!(player.get_option("preload").as_string().as_deref(), Some("none"));
    player.destroy();
}

#[wasm_bindgen_test]
fn test_set_option_keeps_previous_on_bad_value() {
    let player = AnimateImages::new(canvas().into(), options(&["a.jpg"]).into()).unwrap();
    player.set_option("fps", JsValue::from_f64(60.0));
    assert_eq!(player.get_option("fps").as_f64(), Some(60.0));
    player.set_option("fps", JsValue::from_str("fast"));
    assert_eq!(player.get_option("fps").as_f64(), Some(60.0));
    player.set_option("images", Array::new().into());
    assert_eq!(player.get_total_images(), 1);
    assert!(player.get_option("speed").is_undefined());
}

#[wasm_bindgen_test]
fn test_destroy_twice_with_deferred_play() {
    let options = options(&["a.jpg", "b.jpg"]);
    Reflect::set(&options, &"preload".into(), &"none".into()).unwrap();
    let player = AnimateImages::new(canvas().into(), options.into()).unwrap();
    // Still waiting for the preload, so the promise is pending until destroy.
    let _pending = player.play_frames(1.0);
    player.destroy();
    player.destroy();
    assert!(!player.is_animating());
}

#[wasm_bindgen_test]
async fn test_play_frames_zero_settles_at_once() {
    let (options, preloaded) = preloaded_options(3);
    let player = AnimateImages::new(canvas().into(), options.into()).unwrap();
    JsFuture::from(preloaded).await.unwrap();

    player.set_frame(2.0);
    JsFuture::from(player.play_frames(0.0)).await.unwrap();
    assert!(!player.is_animating());
    assert_eq!(player.get_current_frame(), 2);
    player.destroy();
}

#[wasm_bindgen_test]
async fn test_play_to_settles_on_animation_end() {
    let (options, preloaded) = preloaded_options(3);
    let canvas = canvas();
    let player = AnimateImages::new(canvas.clone().into(), options.into()).unwrap();
    JsFuture::from(preloaded).await.unwrap();

    let ended = Promise::new(&mut |resolve, _reject| {
        player.set_option("onAnimationEnd", resolve.into());
    });
    JsFuture::from(player.play_to(3.0)).await.unwrap();
    assert!(!player.is_animating());
    assert_eq!(player.get_current_frame(), 3);
    // The callback ran before the promise settled.
    let ended_with = JsFuture::from(ended).await.unwrap();
    assert_eq!(ended_with, JsValue::from(canvas));
    player.destroy();
}

#[wasm_bindgen_test]
async fn test_destroy_settles_pending_play() {
    let options = options(&["a.jpg", "b.jpg"]);
    Reflect::set(&options, &"preload".into(), &"none".into()).unwrap();
    let player = AnimateImages::new(canvas().into(), options.into()).unwrap();

    let pending = player.play_to(2.0);
    player.destroy();
    JsFuture::from(pending).await.unwrap();
    assert!(!player.is_animating());
}

#[wasm_bindgen_test]
async fn test_frame_hooks_receive_frame_info() {
    let (options, preloaded) = preloaded_options(2);
    let canvas = canvas();
    let player = AnimateImages::new(canvas.clone().into(), options.into()).unwrap();
    JsFuture::from(preloaded).await.unwrap();

    let calls: Rc<RefCell<Vec<(JsValue, JsValue)>>> = Rc::default();
    let recorded = calls.clone();
    let hook = Closure::<dyn FnMut(JsValue, JsValue)>::new(move |canvas, info| {
        recorded.borrow_mut().push((canvas, info));
    });
    player.set_option("onAfterFrame", hook.as_ref().clone());
    assert!(player.get_option("onAfterFrame").is_function());

    player.set_frame(2.0);
    {
        let calls = calls.borrow();
        assert_eq!(calls.len(), 1);
        let (hook_canvas, info) = &calls[0];
        assert_eq!(hook_canvas, &JsValue::from(canvas.clone()));
        let context = Reflect::get(info, &"context".into()).unwrap();
        assert!(context.is_instance_of::<CanvasRenderingContext2d>());
        let width = Reflect::get(info, &"width".into()).unwrap();
        assert_eq!(width.as_f64(), Some(canvas.width() as f64));
        let height = Reflect::get(info, &"height".into()).unwrap();
        assert_eq!(height.as_f64(), Some(canvas.height() as f64));
    }

    player.set_option("onAfterFrame", JsValue::NULL);
    player.set_frame(1.0);
    assert_eq!(calls.borrow().len(), 1);
    player.destroy();
}
