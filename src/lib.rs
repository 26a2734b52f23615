// ==================== Modules ====================
pub mod browser;
pub mod config;
pub mod engine;
pub mod game;
pub mod sprite;

use config::GameConfig;
use engine::GameLoop;
use game::Breakout;
use log::{error, info, LevelFilter};
use wasm_bindgen::prelude::*;

const CONFIG_PATH: &str = "config.json";

// ==================== Main Functions ====================
/// Main entry for Webassembly module
/// - installs panic hook + console logger
/// - loads config.json (defaults when missing)
/// - starts the Breakout demo loop
#[wasm_bindgen]
pub fn main_js() -> Result<(), JsValue> {
    // setup better panic messages for debugging
    console_error_panic_hook::set_once();
    // info until the config says otherwise
    browser::init_logging(LevelFilter::Info);

    browser::spawn_local(async move {
        let config = GameConfig::load(CONFIG_PATH).await;
        match config.log_filter() {
            Ok(level) => browser::init_logging(level),
            Err(err) => error!("{:#}", err),
        }
        info!("Starting Breakout on a {}x{} canvas", config.width, config.height);

        let frame_ms = config.frame_ms;
        if let Err(err) = GameLoop::start(Breakout::new(config), frame_ms).await {
            error!("Could not start game loop : {:#}", err);
        }
    });

    Ok(())
}
