use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Axis aligned box, top left corner + extent, world coordinates.
///
/// Fields stay private so `width > 0 && height > 0` always holds.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Rectangle {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl Rectangle {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Result<Self> {
        if !(x.is_finite() && y.is_finite() && width.is_finite() && height.is_finite()) {
            return Err(anyhow!(
                "Rectangle needs finite values, got ({}, {}, {}, {})",
                x,
                y,
                width,
                height
            ));
        }
        if width <= 0.0 || height <= 0.0 {
            return Err(anyhow!(
                "Rectangle needs a positive size, got {} x {}",
                width,
                height
            ));
        }
        Ok(Rectangle {
            x,
            y,
            width,
            height,
        })
    }

    pub fn from_parts(position: Point, size: Size) -> Result<Self> {
        Self::new(position.x, position.y, size.width, size.height)
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Inclusive on the top/left edges, exclusive on bottom/right so a point
    /// on a shared edge belongs to exactly one of two neighbours.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }

    pub fn set_position(&mut self, position: Point) {
        self.x = position.x;
        self.y = position.y;
    }

    pub fn set_x(&mut self, x: f64) {
        self.x = x;
    }

    pub fn set_y(&mut self, y: f64) {
        self.y = y;
    }
}

/// ELI5:
/// ┌──────────────────── Soft Edges ─────────────────────────┐
/// │                                                         │
/// │   x                                  x + width          │
/// │   ┌──────────────────────────────────┐  y               │
/// │   │░░░░░░░░░░░░ top * height ░░░░░░░░│                  │
/// │   │░░┌────────────────────────────┐░░│                  │
/// │   │░░│                            │░░│                  │
/// │   │░░│      effective bounds      │░░│ right * width    │
/// │   │░░│                            │░░│                  │
/// │   │░░└────────────────────────────┘░░│                  │
/// │   │░░░░░░░░░░ bottom * height ░░░░░░░│                  │
/// │   └──────────────────────────────────┘  y + height      │
/// │                                                         │
/// │   ░ = other rectangles may rest here without colliding  │
/// └─────────────────────────────────────────────────────────┘
///
/// Fraction of each edge other rectangles may sink into, all in `[0, 1)`.
/// top/bottom are fractions of the height, left/right of the width.
#[derive(Debug, Default, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SoftEdges {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl SoftEdges {
    pub const HARD: SoftEdges = SoftEdges {
        top: 0.0,
        right: 0.0,
        bottom: 0.0,
        left: 0.0,
    };

    pub fn new(top: f64, right: f64, bottom: f64, left: f64) -> Result<Self> {
        let edges = SoftEdges {
            top,
            right,
            bottom,
            left,
        };
        edges.validate()?;
        Ok(edges)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("top", self.top),
            ("right", self.right),
            ("bottom", self.bottom),
            ("left", self.left),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(anyhow!(
                    "Soft edge '{}' must be within [0, 1), got {}",
                    name,
                    value
                ));
            }
        }
        // opposite edges eating the whole box would leave nothing to collide with
        if self.left + self.right >= 1.0 || self.top + self.bottom >= 1.0 {
            return Err(anyhow!("Opposite soft edges must leave some solid area : {:?}", self));
        }
        Ok(())
    }
}

/// A static obstacle : bounds + optional soft edges
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Solid {
    pub bounds: Rectangle,
    pub soft: SoftEdges,
}

/// Effective extent after soft edges are shaved off
#[derive(Debug, Copy, Clone, PartialEq)]
struct Extent {
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
}

impl Solid {
    pub fn new(bounds: Rectangle, soft: SoftEdges) -> Result<Self> {
        soft.validate()?;
        Ok(Solid { bounds, soft })
    }

    pub fn hard(bounds: Rectangle) -> Self {
        Solid {
            bounds,
            soft: SoftEdges::HARD,
        }
    }

    fn extent(&self) -> Extent {
        let b = &self.bounds;
        Extent {
            left: b.x + b.width * self.soft.left,
            top: b.y + b.height * self.soft.top,
            right: b.right() - b.width * self.soft.right,
            bottom: b.bottom() - b.height * self.soft.bottom,
        }
    }
}

impl From<Rectangle> for Solid {
    fn from(bounds: Rectangle) -> Self {
        Solid::hard(bounds)
    }
}

/// Which axis got pushed and in which direction, each in {-1, 0, 1}
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Correction {
    pub x: i8,
    pub y: i8,
}

impl Correction {
    pub const NONE: Correction = Correction { x: 0, y: 0 };

    pub fn is_none(&self) -> bool {
        *self == Correction::NONE
    }
}

/// One resolved collision : index into the solids slice + the correction
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Contact {
    pub index: usize,
    pub correction: Correction,
}

/// Rectangle that moved this frame, remembering where it started
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Body {
    pub bounds: Rectangle,
    pub last: Point,
    pub velocity: Point,
}

impl Body {
    pub fn new(bounds: Rectangle) -> Self {
        Body {
            bounds,
            last: bounds.position(),
            velocity: Point::default(),
        }
    }

    /// Store the current position as the previous frame's position
    pub fn remember(&mut self) {
        self.last = self.bounds.position();
    }

    pub fn move_by(&mut self, dx: f64, dy: f64) {
        self.bounds.translate(dx, dy);
    }

    /// remember() then apply velocity, once per frame
    pub fn step(&mut self) {
        self.remember();
        self.move_by(self.velocity.x, self.velocity.y);
    }
}

/// `a` may carry soft edges, `b` is taken as hard.
/// Touching edges do NOT count as overlapping.
pub fn overlaps(a: &Solid, b: &Rectangle) -> bool {
    let a = a.extent();
    !(a.right <= b.x || b.right() <= a.left || a.bottom <= b.y || b.bottom() <= a.top)
}

// open intervals, same edge rule as overlaps()
fn spans_overlap(start_a: f64, end_a: f64, start_b: f64, end_b: f64) -> bool {
    start_a < end_b && start_b < end_a
}

/// Push `mover` out of `solid` along a single axis.
///
/// The axis is the one that only started overlapping this frame (Y wins if
/// both are new). When the mover was already embedded on both axes the
/// shallower penetration is resolved instead.
pub fn collide_solid(mover: &mut Body, solid: &Solid) -> Correction {
    if !overlaps(solid, &mover.bounds) {
        return Correction::NONE;
    }
    let extent = solid.extent();
    let (width, height) = (mover.bounds.width, mover.bounds.height);

    let was_over_y = spans_overlap(mover.last.y, mover.last.y + height, extent.top, extent.bottom);
    let was_over_x = spans_overlap(mover.last.x, mover.last.x + width, extent.left, extent.right);

    // penetration when pushing toward top/left (negative) or bottom/right (positive)
    let push_up = mover.bounds.bottom() - extent.top;
    let push_down = extent.bottom - mover.bounds.y;
    let push_left = mover.bounds.right() - extent.left;
    let push_right = extent.right - mover.bounds.x;

    let resolve_y = if !was_over_y {
        true
    } else if !was_over_x {
        false
    } else {
        push_up.min(push_down) <= push_left.min(push_right)
    };

    if resolve_y {
        if push_up <= push_down {
            mover.bounds.y = extent.top - height;
            Correction { x: 0, y: -1 }
        } else {
            mover.bounds.y = extent.bottom;
            Correction { x: 0, y: 1 }
        }
    } else if push_left <= push_right {
        mover.bounds.x = extent.left - width;
        Correction { x: -1, y: 0 }
    } else {
        mover.bounds.x = extent.right;
        Correction { x: 1, y: 0 }
    }
}

/// Resolve against every solid in order; one `Contact` per applied correction
pub fn collide_solids(mover: &mut Body, solids: &[Solid]) -> Vec<Contact> {
    solids
        .iter()
        .enumerate()
        .filter_map(|(index, solid)| {
            let correction = collide_solid(mover, solid);
            (!correction.is_none()).then_some(Contact { index, correction })
        })
        .collect()
}

/// Single aggregate result : the last correction applied, if any
pub fn last_correction(contacts: &[Contact]) -> Correction {
    contacts
        .last()
        .map(|contact| contact.correction)
        .unwrap_or(Correction::NONE)
}
