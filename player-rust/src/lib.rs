pub mod browser_host;
pub mod js_api;
pub mod player;
pub mod rendering;
pub mod utils;

use utils::{init_logging, set_panic_hook};
use wasm_bindgen::prelude::*;

pub use js_api::AnimateImages;

#[wasm_bindgen(start)]
pub fn main() {
    set_panic_hook();
    init_logging();
}
