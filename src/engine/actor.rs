use crate::engine::geometry::{collide_solids, Body, Contact, Correction, Point, Rectangle, Solid};
use crate::engine::input::KeyState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Anything with an on-screen rectangle (hit tests, pointer behaviors)
pub trait Bounded {
    fn bounds(&self) -> Rectangle;
}

impl Bounded for Rectangle {
    fn bounds(&self) -> Rectangle {
        *self
    }
}

impl Bounded for Body {
    fn bounds(&self) -> Rectangle {
        self.bounds
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// screen space : +y points down
    pub fn unit(&self) -> Point {
        match self {
            Direction::Up => Point::new(0.0, -1.0),
            Direction::Down => Point::new(0.0, 1.0),
            Direction::Left => Point::new(-1.0, 0.0),
            Direction::Right => Point::new(1.0, 0.0),
        }
    }
}

/// ELI5:
/// ┌──────────── Mover capability ─────────────────────┐
/// │  Actor  ── moves by its own velocity              │
/// │  Player ── moves where the bound keys point       │
/// │  both   ── collide() against solids the same way  │
/// └───────────────────────────────────────────────────┘
pub trait Mover {
    fn body(&self) -> &Body;
    fn body_mut(&mut self) -> &mut Body;
    fn speed(&self) -> f64;

    fn move_in(&mut self, direction: Direction) {
        let unit = direction.unit();
        let speed = self.speed();
        self.body_mut().move_by(unit.x * speed, unit.y * speed);
    }

    fn collide(&mut self, solids: &[Solid]) -> Vec<Contact> {
        collide_solids(self.body_mut(), solids)
    }
}

#[derive(Debug, Clone)]
pub struct Actor {
    pub body: Body,
    pub speed: f64,
}

impl Actor {
    pub fn new(bounds: Rectangle, speed: f64) -> Self {
        Actor {
            body: Body::new(bounds),
            speed,
        }
    }

    /// Launch along `heading` (normalized here) at the actor's speed
    pub fn launch(&mut self, heading: Point) {
        let length = heading.x.hypot(heading.y);
        if length > 0.0 {
            self.body.velocity = Point::new(
                heading.x / length * self.speed,
                heading.y / length * self.speed,
            );
        }
    }

    pub fn stop(&mut self) {
        self.body.velocity = Point::default();
    }

    pub fn update(&mut self) {
        self.body.step();
    }
}

impl Mover for Actor {
    fn body(&self) -> &Body {
        &self.body
    }

    fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    fn speed(&self) -> f64 {
        self.speed
    }
}

impl Bounded for Actor {
    fn bounds(&self) -> Rectangle {
        self.body.bounds
    }
}

/// Key code (`KeyboardEvent.code`) to direction
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct KeyBindings(HashMap<String, Direction>);

impl KeyBindings {
    pub fn new(bindings: &[(&str, Direction)]) -> Self {
        KeyBindings(
            bindings
                .iter()
                .map(|(code, direction)| (code.to_string(), *direction))
                .collect(),
        )
    }

    pub fn arrows() -> Self {
        Self::new(&[
            ("ArrowUp", Direction::Up),
            ("ArrowDown", Direction::Down),
            ("ArrowLeft", Direction::Left),
            ("ArrowRight", Direction::Right),
        ])
    }

    pub fn horizontal() -> Self {
        Self::new(&[
            ("ArrowLeft", Direction::Left),
            ("ArrowRight", Direction::Right),
            ("KeyA", Direction::Left),
            ("KeyD", Direction::Right),
        ])
    }

    /// Every direction with at least one pressed key, each once
    pub fn pressed(&self, keys: &KeyState) -> Vec<Direction> {
        let mut directions: Vec<Direction> = self
            .0
            .iter()
            .filter(|(code, _)| keys.is_pressed(code))
            .map(|(_, direction)| *direction)
            .collect();
        // HashMap order is random, keep movement deterministic
        directions.sort_by_key(|direction| *direction as u8);
        directions.dedup();
        directions
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::arrows()
    }
}

/// Keyboard driven mover
#[derive(Debug, Clone)]
pub struct Player {
    pub actor: Actor,
    pub bindings: KeyBindings,
}

impl Player {
    pub fn new(bounds: Rectangle, speed: f64, bindings: KeyBindings) -> Self {
        Player {
            actor: Actor::new(bounds, speed),
            bindings,
        }
    }

    /// Remember last position, then move once per pressed direction
    pub fn handle_input(&mut self, keys: &KeyState) {
        self.actor.body.remember();
        for direction in self.bindings.pressed(keys) {
            self.move_in(direction);
        }
    }
}

impl Mover for Player {
    fn body(&self) -> &Body {
        &self.actor.body
    }

    fn body_mut(&mut self) -> &mut Body {
        &mut self.actor.body
    }

    fn speed(&self) -> f64 {
        self.actor.speed
    }
}

impl Bounded for Player {
    fn bounds(&self) -> Rectangle {
        self.actor.body.bounds
    }
}

/// Keep `body` inside `area`. Sign says which way it was pushed.
pub fn clamp_within(body: &mut Body, area: &Rectangle) -> Correction {
    let mut correction = Correction::NONE;
    let bounds = &mut body.bounds;
    if bounds.x() < area.x() {
        bounds.set_x(area.x());
        correction.x = 1;
    } else if bounds.right() > area.right() {
        bounds.set_x(area.right() - bounds.width());
        correction.x = -1;
    }
    if bounds.y() < area.y() {
        bounds.set_y(area.y());
        correction.y = 1;
    } else if bounds.bottom() > area.bottom() {
        bounds.set_y(area.bottom() - bounds.height());
        correction.y = -1;
    }
    correction
}
