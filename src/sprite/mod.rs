// TABLE:
// ┌──────────────────────────────────────────────────────────────────────────┐
// │                      Sprite Module Layout                                │
// ├───────────────────┬──────────────────────────────────────────────────────┤
// │ File              │ Role                                                 │
// ├───────────────────┼──────────────────────────────────────────────────────┤
// │ mod.rs            │ Sheet json (frames map) + SpriteSheet image pairing  │
// │ animation.rs      │ Animation clips + Animator playback cursor           │
// └───────────────────┴──────────────────────────────────────────────────────┘
pub mod animation;

pub use animation::{Animation, Animator};

use crate::browser;
use crate::engine::geometry::{Point, Rectangle};
use crate::engine::{self, Renderer};
use anyhow::{anyhow, Context, Result};
use futures::join;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;
use web_sys::HtmlImageElement;

/// TexturePacker style json : `{ "frames": { "Run (1).png": { "frame": {..} } } }`
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Sheet {
    pub frames: HashMap<String, Cell>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Cell {
    pub frame: SheetRect,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub struct SheetRect {
    pub x: i16,
    pub y: i16,
    pub w: i16,
    pub h: i16,
}

impl SheetRect {
    pub fn to_rectangle(&self) -> Result<Rectangle> {
        Rectangle::new(self.x.into(), self.y.into(), self.w.into(), self.h.into())
    }
}

impl Sheet {
    pub fn cell(&self, key: &str) -> Option<&Cell> {
        self.frames.get(key)
    }

    /// Every frame key an animation needs, missing ones listed in the error
    pub fn check(&self, animation: &Animation) -> Result<()> {
        let missing: Vec<String> = (0..animation.frame_count)
            .map(|index| animation.frame_key(index))
            .filter(|key| !self.frames.contains_key(key))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("Sheet is missing frames : {:?}", missing))
        }
    }
}

/// A sheet and its image, sheet shared between every sprite using it
#[derive(Clone)]
pub struct SpriteSheet {
    sheet: Rc<Sheet>,
    image: HtmlImageElement,
}

impl SpriteSheet {
    pub fn new(sheet: Sheet, image: HtmlImageElement) -> Self {
        SpriteSheet {
            sheet: Rc::new(sheet),
            image,
        }
    }

    /// Fetch json + image at the same time, total time = slowest of the two
    pub async fn load(sheet_path: &str, image_path: &str) -> Result<Self> {
        let (sheet, image) = join!(
            browser::fetch_json::<Sheet>(sheet_path),
            engine::load_image(image_path)
        );
        let sheet =
            sheet.with_context(|| format!("Failed to load sprite sheet from : {}", sheet_path))?;
        let image = image
            .with_context(|| format!("Failed to load sprite image from : {}", image_path))?;
        Ok(SpriteSheet::new(sheet, image))
    }

    pub fn sheet(&self) -> &Sheet {
        &self.sheet
    }

    /// Draw frame `key` with its top left corner at `position`
    pub fn draw(&self, renderer: &Renderer, key: &str, position: Point) -> Result<()> {
        let cell = self
            .sheet
            .cell(key)
            .ok_or_else(|| anyhow!("Cell not found : {}", key))?;
        let frame = cell.frame.to_rectangle()?;
        let destination = Rectangle::from_parts(position, frame.size())?;
        renderer.draw_image(&self.image, &frame, &destination);
        Ok(())
    }
}
