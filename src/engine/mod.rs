pub mod actor;
pub mod events;
pub mod geometry;
pub mod input;
pub mod tilemap;

use crate::browser;
use crate::engine::geometry::Rectangle;
use crate::engine::input::{prepare_input, process_input, InputState};
use anyhow::{anyhow, Error, Result};
// ELI5: web assembly is a single threaded environment, so Rc RefCell > Mutex
use async_trait::async_trait;
use futures::channel::oneshot::channel;
use log::{error, info};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::{
    // unchecked_ref (unsafe) cast from Javascript type to Rust type
    // - because we control the closure creation and specify the expected type,
    // in principle this should be generally safe (unsafe) code
    JsCast,
    JsValue,
};
use web_sys::{CanvasRenderingContext2d, HtmlImageElement};

#[async_trait(?Send)]
pub trait Game {
    async fn initialize(&self) -> Result<Box<dyn Game>>;
    /// Fixed step, may run several times per animation frame
    fn update(&mut self, input: &mut InputState) -> Result<()>;
    fn draw(&self, renderer: &Renderer);
}

/// 60 updates per second
pub const DEFAULT_FRAME_MS: f32 = 1.0 / 60.0 * 1000.0;

pub struct GameLoop {
    last_frame: f64,
    accumulated_delta: f32,
    frame_size: f32,
}

type SharedLoopClosure = Rc<RefCell<Option<browser::LoopClosure>>>;

impl GameLoop {
    /// Accumulate real time, run as many fixed `update`s as fit, draw once
    pub fn new(now: f64, frame_size: f32) -> Self {
        GameLoop {
            last_frame: now,
            accumulated_delta: 0.0,
            frame_size: if frame_size > 0.0 {
                frame_size
            } else {
                DEFAULT_FRAME_MS
            },
        }
    }

    /// Number of fixed updates owed for a frame stamped `perf`
    pub fn advance(&mut self, perf: f64) -> u32 {
        self.accumulated_delta += (perf - self.last_frame) as f32;
        self.last_frame = perf;
        let mut steps = 0;
        while self.accumulated_delta > self.frame_size {
            self.accumulated_delta -= self.frame_size;
            steps += 1;
        }
        steps
    }

    pub async fn start(game: impl Game + 'static, frame_size: f32) -> Result<()> {
        let mut input_receiver = prepare_input()?;
        let mut game = game.initialize().await?;
        let mut game_loop = GameLoop::new(browser::now()?, frame_size);
        let step_ms = game_loop.frame_size;
        let mut input = InputState::default();
        let renderer = Renderer {
            context: browser::context()?,
        };
        let f: SharedLoopClosure = Rc::new(RefCell::new(None));
        let g = f.clone();
        *g.borrow_mut() = Some(browser::create_raf_closure(move |perf: f64| {
            process_input(&mut input, &mut input_receiver);
            for _ in 0..game_loop.advance(perf) {
                if let Err(err) = game.update(&mut input) {
                    error!("GameLoop: update failed : {:#}", err);
                }
            }
            game.draw(&renderer);
            if let Some(closure) = f.borrow().as_ref() {
                if let Err(err) = browser::request_animation_frame(closure) {
                    error!("GameLoop: stopping : {:#}", err);
                }
            }
        }));

        browser::request_animation_frame(
            g.borrow()
                .as_ref()
                .ok_or_else(|| anyhow!("GameLoop: Loop is None"))?,
        )?;
        info!("GameLoop started, {:.2}ms per update", step_ms);

        Ok(())
    }
}

pub struct Renderer {
    context: CanvasRenderingContext2d,
}

impl Renderer {
    pub fn clear(&self, rect: &Rectangle) {
        self.context
            .clear_rect(rect.x(), rect.y(), rect.width(), rect.height());
    }

    pub fn fill_rect(&self, rect: &Rectangle, color: &str) {
        self.context.set_fill_style_str(color);
        self.context
            .fill_rect(rect.x(), rect.y(), rect.width(), rect.height());
    }

    pub fn stroke_rect(&self, rect: &Rectangle, color: &str) {
        self.context.set_stroke_style_str(color);
        self.context
            .stroke_rect(rect.x(), rect.y(), rect.width(), rect.height());
    }

    pub fn fill_text(&self, text: &str, x: f64, y: f64, font: &str, color: &str) -> Result<()> {
        self.context.set_font(font);
        self.context.set_fill_style_str(color);
        self.context
            .fill_text(text, x, y)
            .map_err(|err| anyhow!("Error filling text '{}' : {:#?}", text, err))
    }

    pub fn draw_image(&self, image: &HtmlImageElement, frame: &Rectangle, destination: &Rectangle) {
        self.context
            .draw_image_with_html_image_element_and_sw_and_sh_and_dx_and_dy_and_dw_and_dh(
                image,
                frame.x(),
                frame.y(),
                frame.width(),
                frame.height(),
                destination.x(),
                destination.y(),
                destination.width(),
                destination.height(),
            )
            .expect("Drawing is throwing exceptions! Unrecoverable error");
    }
}

/// Outline bounding boxes in debug builds
#[cfg(debug_assertions)]
pub trait DebugDraw {
    fn draw_debug(&self, renderer: &Renderer);
}

#[cfg(debug_assertions)]
impl DebugDraw for Rectangle {
    fn draw_debug(&self, renderer: &Renderer) {
        renderer.stroke_rect(self, "#FF00FF");
    }
}

/// Asynchronously load an image from a given source path
/// # Arguments
/// * `source` - string slice to path/url
/// # Returns
/// * `Ok(HtmlImageElement)` - on load success
/// * `Err` - on load fail
pub async fn load_image(source: &str) -> Result<HtmlImageElement> {
    let image = browser::new_image()?;
    let (tx, rx) = channel::<Result<(), Error>>();
    let success_tx = Rc::new(RefCell::new(Some(tx)));
    let error_tx = success_tx.clone();

    let success_callback = browser::closure_once(move || {
        if let Some(tx) = success_tx.borrow_mut().take() {
            let _ = tx.send(Ok(()));
        }
    });

    let error_callback = browser::closure_once(move |err: JsValue| {
        if let Some(tx) = error_tx.borrow_mut().take() {
            let _ = tx.send(Err(anyhow!(
                "[engine::load_image] Error loading image: {:#?}",
                err
            )));
        }
    });

    image.set_onload(Some(success_callback.as_ref().unchecked_ref()));
    image.set_onerror(Some(error_callback.as_ref().unchecked_ref()));
    image.set_src(source);

    // keep callback alive until image is loaded or errors
    success_callback.forget();
    error_callback.forget();

    // ?? - Result<Result<(), Error>, oneshot::Canceled>
    // - first ? yields channel result : Result<(), Error>
    // - second ? yields image load result : () or propagating Error
    rx.await??;

    Ok(image)
}
