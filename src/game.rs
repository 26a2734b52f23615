use crate::config::{BreakoutConfig, GameConfig};
#[cfg(debug_assertions)]
use crate::engine::DebugDraw;
use crate::engine::actor::{clamp_within, Actor, Bounded, KeyBindings, Mover, Player};
use crate::engine::events::{pointer_behaviors, EventBus, Propagation};
use crate::engine::geometry::{collide_solid, Correction, Point, Rectangle, Solid};
use crate::engine::input::{InputState, KeyState, PointerEvent};
use crate::engine::tilemap::TileMap;
use crate::engine::{Game, Renderer};
use crate::sprite::{Animation, Animator, SpriteSheet};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::cell::{Cell, RefCell};
use std::f64::consts::FRAC_PI_3;
use std::rc::Rc;

/// TABLE
/// ┌───────────────────── Breakout Overview ─────────────────────────────────┐
/// │                                                                         │
/// │   GameLoop ──update──► Breakout ──► Arena::update()                     │
/// │                                      ├─► pointer events ──► ui_bus      │
/// │                                      │     (start button, backdrop)     │
/// │                                      ├─► paddle : Player + keys         │
/// │                                      ├─► ball   : Actor + walls/paddle  │
/// │                                      └─► bricks : collide ──► brick_bus │
/// │                                                  trigger("hit")         │
/// │                                                                         │
/// ├──────────────────────── Phases ─────────────────────────────────────────┤
/// │  Ready   ─ Launch ─────► Playing                                        │
/// │  Playing ─ TogglePause ► Paused ─ TogglePause ► Playing                 │
/// │  Playing ─ LifeLost ───► Ready                                          │
/// │  Playing ─ Missed ─────► Over { won: false }                            │
/// │  Playing ─ Cleared ────► Over { won: true }                             │
/// │  Over    ─ Reset ──────► Ready                                          │
/// └─────────────────────────────────────────────────────────────────────────┘
pub enum Breakout {
    /// Config known, assets not loaded yet
    Loading(GameConfig),
    Loaded(Box<Arena>),
}

impl Breakout {
    pub fn new(config: GameConfig) -> Self {
        Breakout::Loading(config)
    }

    /// Optional art : any failure keeps the flat colored bricks
    async fn load_sprites(config: &BreakoutConfig) -> Option<SpriteSheet> {
        let (sheet_path, image_path) = match (&config.sprite_sheet, &config.sprite_image) {
            (Some(sheet), Some(image)) => (sheet, image),
            _ => return None,
        };
        let loaded = SpriteSheet::load(sheet_path, image_path)
            .await
            .and_then(|sprites| sprites.sheet().check(&brick_animation()).map(|()| sprites));
        match loaded {
            Ok(sprites) => Some(sprites),
            Err(err) => {
                warn!("{:#}, drawing plain bricks", err);
                None
            }
        }
    }
}

#[async_trait(?Send)]
impl Game for Breakout {
    async fn initialize(&self) -> Result<Box<dyn Game>> {
        match self {
            Breakout::Loading(config) => {
                let area = Rectangle::new(0.0, 0.0, config.width, config.height)?;
                let sprites = Self::load_sprites(&config.breakout).await;
                let arena = Arena::new(&config.breakout, area, sprites)?;
                Ok(Box::new(Breakout::Loaded(Box::new(arena))))
            }
            Breakout::Loaded(_) => Err(anyhow!("Game is already initialized")),
        }
    }

    fn update(&mut self, input: &mut InputState) -> Result<()> {
        if let Breakout::Loaded(arena) = self {
            arena.update(input)?;
        }
        Ok(())
    }

    fn draw(&self, renderer: &Renderer) {
        if let Breakout::Loaded(arena) = self {
            arena.draw(renderer);
        }
    }
}

const LIVES: u8 = 3;
const BRICK_POINTS: u32 = 10;
const MENU_WEIGHT: i32 = 10;
const BACKDROP_WEIGHT: i32 = 0;
const BRICK_COLORS: [&str; 4] = ["#E4572E", "#F3A712", "#A8C686", "#669BBC"];

fn brick_animation() -> Animation {
    Animation::new("Brick", 4, 8)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Ready,
    Playing,
    Paused,
    Over { won: bool },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Event {
    Launch,
    TogglePause,
    LifeLost,
    Missed,
    Cleared,
    Reset,
}

impl Phase {
    /// CONSUMING self and returning the next phase, like a state machine
    /// transition table. Pairs not listed keep the current phase.
    fn transition(self, event: Event) -> Self {
        match (self, event) {
            (Phase::Ready, Event::Launch) => Phase::Playing,
            (Phase::Playing, Event::TogglePause) => Phase::Paused,
            (Phase::Paused, Event::TogglePause) => Phase::Playing,
            (Phase::Playing, Event::LifeLost) => Phase::Ready,
            (Phase::Playing, Event::Missed) => Phase::Over { won: false },
            (Phase::Playing, Event::Cleared) => Phase::Over { won: true },
            (Phase::Over { .. }, Event::Reset) => Phase::Ready,
            (phase, _) => phase,
        }
    }

    fn shows_menu(&self) -> bool {
        matches!(self, Phase::Ready | Phase::Over { .. })
    }
}

pub struct Brick {
    pub cell: (usize, usize),
    pub solid: Solid,
    alive: Cell<bool>,
}

impl Brick {
    pub fn is_alive(&self) -> bool {
        self.alive.get()
    }
}

impl Bounded for Brick {
    fn bounds(&self) -> Rectangle {
        self.solid.bounds
    }
}

/// Payload of the brick bus "hit" event
pub struct BrickHit {
    pub cell: (usize, usize),
    stopped: Cell<bool>,
}

impl BrickHit {
    fn new(cell: (usize, usize)) -> Self {
        BrickHit {
            cell,
            stopped: Cell::new(false),
        }
    }
}

impl Propagation for BrickHit {
    fn is_propagation_stopped(&self) -> bool {
        self.stopped.get()
    }
}

/// Clickable area on the canvas
pub struct Widget {
    pub bounds: Rectangle,
    pub label: String,
}

impl Bounded for Widget {
    fn bounds(&self) -> Rectangle {
        self.bounds
    }
}

pub struct Arena {
    area: Rectangle,
    config: BreakoutConfig,
    phase: Phase,
    lives: u8,
    score: Rc<Cell<u32>>,
    paddle: Player,
    ball: Actor,
    bricks: Vec<Rc<Brick>>,
    brick_bus: EventBus<Brick, BrickHit>,
    ui_bus: EventBus<Widget, PointerEvent>,
    start_button: Rc<Widget>,
    backdrop: Rc<Widget>,
    // bus callbacks can't borrow the arena, they queue phase events here
    requests: Rc<RefCell<Vec<Event>>>,
    sprites: Option<SpriteSheet>,
    brick_animator: Animator,
}

impl Arena {
    pub fn new(
        config: &BreakoutConfig,
        area: Rectangle,
        sprites: Option<SpriteSheet>,
    ) -> Result<Self> {
        let paddle_bounds = Rectangle::new(
            area.center().x - config.paddle.width * 0.5,
            area.bottom() - config.paddle.height - 30.0,
            config.paddle.width,
            config.paddle.height,
        )?;
        let ball = Actor::new(
            Rectangle::new(0.0, 0.0, config.ball_size, config.ball_size)?,
            config.ball_speed,
        );
        let start_button = Rc::new(Widget {
            bounds: Rectangle::new(area.center().x - 100.0, area.center().y + 20.0, 200.0, 48.0)?,
            label: "Start".to_string(),
        });
        let backdrop = Rc::new(Widget {
            bounds: area,
            label: String::new(),
        });

        let mut arena = Arena {
            area,
            config: config.clone(),
            phase: Phase::Ready,
            lives: LIVES,
            score: Rc::new(Cell::new(0)),
            paddle: Player::new(paddle_bounds, config.paddle_speed, KeyBindings::horizontal()),
            ball,
            bricks: build_bricks(config)?,
            brick_bus: EventBus::new(),
            ui_bus: EventBus::new(),
            start_button,
            backdrop,
            requests: Rc::new(RefCell::new(Vec::new())),
            sprites,
            brick_animator: Animator::new(brick_animation()),
        };

        pointer_behaviors(&arena.ui_bus);
        // only the brick that was actually struck reacts
        arena
            .brick_bus
            .set_behavior("hit", |brick: &Brick, hit: &BrickHit| brick.cell == hit.cell);

        let requests = arena.requests.clone();
        arena.ui_bus.listen(
            &arena.backdrop,
            "click.ui",
            move |_, _| {
                requests.borrow_mut().push(Event::TogglePause);
                Ok(())
            },
            BACKDROP_WEIGHT,
        );
        arena.register_bricks();
        arena.show_menu(true);
        arena.serve_ball();
        Ok(arena)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn score(&self) -> u32 {
        self.score.get()
    }

    pub fn lives(&self) -> u8 {
        self.lives
    }

    pub fn bricks_left(&self) -> usize {
        self.bricks.iter().filter(|brick| brick.is_alive()).count()
    }

    pub fn update(&mut self, input: &mut InputState) -> Result<()> {
        for event in input.pointer.drain() {
            self.ui_bus.trigger(event.event_name(), &event)?;
        }
        if input.keys.is_pressed("Space") {
            self.requests
                .borrow_mut()
                .extend([Event::Reset, Event::Launch]);
        }
        let pending: Vec<Event> = self.requests.borrow_mut().drain(..).collect();
        for event in pending {
            self.handle(event)?;
        }

        match self.phase {
            Phase::Ready => {
                self.move_paddle(&input.keys);
                self.serve_ball();
            }
            Phase::Playing => self.play_step(&input.keys)?,
            Phase::Paused | Phase::Over { .. } => {}
        }
        self.brick_animator.update();
        Ok(())
    }

    fn handle(&mut self, event: Event) -> Result<()> {
        let previous = self.phase;
        let next = previous.transition(event);
        if next == previous {
            return Ok(());
        }
        info!("{:?} --{:?}--> {:?}", previous, event, next);
        self.phase = next;
        match (previous, next) {
            (Phase::Over { .. }, Phase::Ready) => {
                self.reset_level()?;
                self.serve_ball();
            }
            (_, Phase::Ready) => self.serve_ball(),
            (Phase::Ready, Phase::Playing) => self.ball.launch(launch_heading()),
            (_, Phase::Over { .. }) => self.ball.stop(),
            _ => {}
        }
        self.show_menu(next.shows_menu());
        Ok(())
    }

    fn move_paddle(&mut self, keys: &KeyState) {
        self.paddle.handle_input(keys);
        clamp_within(self.paddle.body_mut(), &self.area);
    }

    fn play_step(&mut self, keys: &KeyState) -> Result<()> {
        self.move_paddle(keys);
        self.ball.update();

        let wall = clamp_within(&mut self.ball.body, &self.area);
        if wall.y == -1 {
            self.lives = self.lives.saturating_sub(1);
            warn!("Ball lost, {} lives left", self.lives);
            let event = if self.lives == 0 {
                Event::Missed
            } else {
                Event::LifeLost
            };
            return self.handle(event);
        }
        bounce(&mut self.ball, wall);

        let paddle = Solid::new(self.paddle.bounds(), self.config.paddle_edges)?;
        let hit = collide_solid(&mut self.ball.body, &paddle);
        if hit.y == -1 {
            // further from the paddle center, steeper the bounce
            let half = self.paddle.bounds().width() * 0.5;
            let offset = (self.ball.bounds().center().x - self.paddle.bounds().center().x) / half;
            let angle = offset.clamp(-1.0, 1.0) * FRAC_PI_3;
            self.ball.launch(Point::new(angle.sin(), -angle.cos()));
        } else {
            bounce(&mut self.ball, hit);
        }

        let alive: Vec<Rc<Brick>> = self
            .bricks
            .iter()
            .filter(|brick| brick.is_alive())
            .cloned()
            .collect();
        let solids: Vec<Solid> = alive.iter().map(|brick| brick.solid).collect();
        for contact in self.ball.collide(&solids) {
            bounce(&mut self.ball, contact.correction);
            let brick = &alive[contact.index];
            self.brick_bus.trigger("hit", &BrickHit::new(brick.cell))?;
        }

        if self.bricks_left() == 0 {
            self.handle(Event::Cleared)?;
        }
        Ok(())
    }

    /// Ball rests on the paddle center until launched
    fn serve_ball(&mut self) {
        let paddle = self.paddle.bounds();
        let size = self.ball.bounds().width();
        self.ball.stop();
        self.ball
            .body
            .bounds
            .set_position(Point::new(paddle.center().x - size * 0.5, paddle.y() - size - 1.0));
        self.ball.body.remember();
    }

    fn show_menu(&self, visible: bool) {
        self.ui_bus.unlisten(&self.start_button, ".menu");
        if visible {
            let requests = self.requests.clone();
            self.ui_bus.listen(
                &self.start_button,
                "click.menu",
                move |_, event: &PointerEvent| {
                    requests
                        .borrow_mut()
                        .extend([Event::Reset, Event::Launch]);
                    // the backdrop behind must not read this as a pause click
                    event.stop_propagation();
                    Ok(())
                },
                MENU_WEIGHT,
            );
        }
    }

    fn register_bricks(&self) {
        for brick in &self.bricks {
            let score = self.score.clone();
            self.brick_bus.once(
                brick,
                "hit.bricks",
                move |brick, hit: &BrickHit| {
                    brick.alive.set(false);
                    score.set(score.get() + BRICK_POINTS);
                    debug!("Brick {:?} broken", brick.cell);
                    hit.stopped.set(true);
                    Ok(())
                },
                0,
            );
        }
    }

    fn reset_level(&mut self) -> Result<()> {
        for brick in &self.bricks {
            self.brick_bus.unlisten(brick, ".bricks");
        }
        self.bricks = build_bricks(&self.config)?;
        self.register_bricks();
        self.lives = LIVES;
        self.score.set(0);
        Ok(())
    }

    pub fn draw(&self, renderer: &Renderer) {
        renderer.clear(&self.area);
        renderer.fill_rect(&self.area, "#1B1B2F");

        for brick in self.bricks.iter().filter(|brick| brick.is_alive()) {
            self.draw_brick(renderer, brick);
        }
        renderer.fill_rect(&self.paddle.bounds(), "#EDEDED");
        renderer.fill_rect(&self.ball.bounds(), "#FFFFFF");

        #[cfg(debug_assertions)]
        {
            self.paddle.bounds().draw_debug(renderer);
            self.ball.bounds().draw_debug(renderer);
        }

        let status = format!("Score {}   Lives {}", self.score(), self.lives);
        self.draw_text(renderer, &status, 12.0, self.area.bottom() - 8.0);
        match self.phase {
            Phase::Paused => {
                let center = self.area.center();
                self.draw_text(renderer, "Paused", center.x - 30.0, center.y);
            }
            phase if phase.shows_menu() => {
                let button = self.start_button.bounds;
                renderer.fill_rect(&button, "#E4572E");
                let label = match phase {
                    Phase::Over { won: true } => "You win! Again?",
                    Phase::Over { won: false } => "Game over. Again?",
                    _ => self.start_button.label.as_str(),
                };
                self.draw_text(renderer, label, button.x() + 16.0, button.y() + 30.0);
            }
            _ => {}
        }
    }

    fn draw_brick(&self, renderer: &Renderer, brick: &Brick) {
        let bounds = brick.solid.bounds;
        if let Some(sprites) = &self.sprites {
            let key = self.brick_animator.current_frame_key();
            if let Err(err) = sprites.draw(renderer, &key, bounds.position()) {
                error!("{:#}", err);
            }
            return;
        }
        let color = BRICK_COLORS[brick.cell.1 % BRICK_COLORS.len()];
        // 1px gap between neighbours
        let inset = Rectangle::new(
            bounds.x() + 1.0,
            bounds.y() + 1.0,
            bounds.width() - 2.0,
            bounds.height() - 2.0,
        );
        match inset {
            Ok(inset) => renderer.fill_rect(&inset, color),
            Err(_) => renderer.fill_rect(&bounds, color),
        }
    }

    fn draw_text(&self, renderer: &Renderer, text: &str, x: f64, y: f64) {
        if let Err(err) = renderer.fill_text(text, x, y, "20px sans-serif", "#FFFFFF") {
            error!("{:#}", err);
        }
    }
}

fn build_bricks(config: &BreakoutConfig) -> Result<Vec<Rc<Brick>>> {
    let map = TileMap::parse(&config.level, config.brick, |tile| tile == '#')?;
    Ok(map
        .solids(|is_brick| *is_brick)?
        .into_iter()
        .map(|(column, row, solid)| {
            Rc::new(Brick {
                cell: (column, row),
                solid,
                alive: Cell::new(true),
            })
        })
        .collect())
}

/// Point the velocity away from whatever pushed the ball
fn bounce(ball: &mut Actor, correction: Correction) {
    let velocity = &mut ball.body.velocity;
    if correction.x != 0 {
        velocity.x = correction.x as f64 * velocity.x.abs();
    }
    if correction.y != 0 {
        velocity.y = correction.y as f64 * velocity.y.abs();
    }
}

/// Upward heading, up to 60 degrees either side of vertical
fn launch_heading() -> Point {
    let mut byte = [0u8; 1];
    let spread = match getrandom::getrandom(&mut byte) {
        Ok(()) => byte[0] as f64 / 255.0 * 2.0 - 1.0,
        Err(err) => {
            warn!("No randomness available ({}), launching straight up", err);
            0.0
        }
    };
    let angle = spread * FRAC_PI_3;
    Point::new(angle.sin(), -angle.cos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::input::{InputEvent, PointerKind};
    use approx::assert_relative_eq;

    fn arena_with(level: &[&str]) -> Arena {
        let config = BreakoutConfig {
            level: level.iter().map(|row| row.to_string()).collect(),
            ..BreakoutConfig::default()
        };
        let area = Rectangle::new(0.0, 0.0, 600.0, 600.0).unwrap();
        Arena::new(&config, area, None).unwrap()
    }

    fn click(input: &mut InputState, x: f64, y: f64) {
        input.apply(InputEvent::Pointer(PointerKind::Click, Point::new(x, y)));
    }

    fn start(arena: &mut Arena) {
        let mut input = InputState::default();
        let button = arena.start_button.bounds.center();
        click(&mut input, button.x, button.y);
        arena.update(&mut input).unwrap();
    }

    #[test]
    fn default_level_layout() {
        let arena = Arena::new(
            &BreakoutConfig::default(),
            Rectangle::new(0.0, 0.0, 600.0, 600.0).unwrap(),
            None,
        )
        .unwrap();
        assert_eq!(arena.bricks_left(), 28);
        assert_eq!(arena.phase(), Phase::Ready);
        assert_eq!(arena.ui_bus.listener_count("click"), 2);
        assert_eq!(arena.brick_bus.listener_count("hit"), 28);
        // ball waits on top of the paddle
        assert!(arena.ball.bounds().bottom() < arena.paddle.bounds().y());
    }

    #[test]
    fn start_button_launches_without_pausing() {
        let mut arena = arena_with(&["#"]);
        start(&mut arena);
        assert_eq!(arena.phase(), Phase::Playing);
        assert!(arena.ball.body.velocity.y < 0.0);
        // menu hidden while playing, backdrop stays
        assert_eq!(arena.ui_bus.listener_count("click"), 1);
    }

    #[test]
    fn backdrop_click_toggles_pause() {
        let mut arena = arena_with(&["#"]);
        start(&mut arena);
        let mut input = InputState::default();
        click(&mut input, 5.0, 300.0);
        arena.update(&mut input).unwrap();
        assert_eq!(arena.phase(), Phase::Paused);
        let frozen = arena.ball.bounds();
        arena.update(&mut InputState::default()).unwrap();
        assert_eq!(arena.ball.bounds(), frozen);

        click(&mut input, 5.0, 300.0);
        arena.update(&mut input).unwrap();
        assert_eq!(arena.phase(), Phase::Playing);
    }

    #[test]
    fn clicks_outside_the_canvas_do_nothing() {
        let mut arena = arena_with(&["#"]);
        let mut input = InputState::default();
        click(&mut input, -50.0, -50.0);
        arena.update(&mut input).unwrap();
        assert_eq!(arena.phase(), Phase::Ready);
    }

    #[test]
    fn breaking_the_last_brick_wins() {
        let mut arena = arena_with(&["#"]);
        start(&mut arena);
        arena.ball.body.bounds.set_position(Point::new(20.0, 27.0));
        arena.ball.body.velocity = Point::new(0.0, -5.0);
        arena.update(&mut InputState::default()).unwrap();

        assert_eq!(arena.bricks_left(), 0);
        assert_eq!(arena.score(), BRICK_POINTS);
        assert_relative_eq!(arena.ball.bounds().y(), 24.0);
        assert_eq!(arena.phase(), Phase::Over { won: true });
        // once listener removed itself
        assert_eq!(arena.brick_bus.listener_count("hit"), 0);
    }

    #[test]
    fn only_the_struck_brick_breaks() {
        let mut arena = arena_with(&["##########"]);
        start(&mut arena);
        // below brick (2, 0) : x 120..180
        arena.ball.body.bounds.set_position(Point::new(140.0, 27.0));
        arena.ball.body.velocity = Point::new(0.0, -5.0);
        arena.update(&mut InputState::default()).unwrap();

        assert_eq!(arena.bricks_left(), 9);
        assert!(!arena.bricks[2].is_alive());
        assert!(arena.ball.body.velocity.y > 0.0);
        assert_eq!(arena.phase(), Phase::Playing);
    }

    #[test]
    fn missing_the_ball_costs_a_life_then_the_game() {
        let mut arena = arena_with(&["#"]);
        for lives_left in (0..LIVES).rev() {
            start(&mut arena);
            arena.ball.body.bounds.set_position(Point::new(20.0, 595.0));
            arena.ball.body.velocity = Point::new(0.0, 5.0);
            arena.update(&mut InputState::default()).unwrap();
            assert_eq!(arena.lives(), lives_left);
        }
        assert_eq!(arena.phase(), Phase::Over { won: false });
        assert_eq!(arena.ball.body.velocity, Point::default());
    }

    #[test]
    fn play_again_restores_the_level() {
        let mut arena = arena_with(&["##"]);
        start(&mut arena);
        arena.ball.body.bounds.set_position(Point::new(20.0, 27.0));
        arena.ball.body.velocity = Point::new(0.0, -5.0);
        arena.update(&mut InputState::default()).unwrap();
        assert_eq!(arena.bricks_left(), 1);
        arena.handle(Event::Missed).unwrap();
        assert_eq!(arena.phase(), Phase::Over { won: false });

        start(&mut arena);
        assert_eq!(arena.phase(), Phase::Playing);
        assert_eq!(arena.bricks_left(), 2);
        assert_eq!(arena.score(), 0);
        assert_eq!(arena.lives(), LIVES);
        assert_eq!(arena.brick_bus.listener_count("hit"), 2);
    }

    #[test]
    fn paddle_sends_the_ball_back_up() {
        let mut arena = arena_with(&["#"]);
        start(&mut arena);
        let paddle = arena.paddle.bounds();
        // falling onto the right half of the paddle
        arena.ball.body.bounds.set_position(Point::new(
            paddle.center().x + 20.0,
            paddle.y() - 12.0,
        ));
        // deep enough to get past the soft top edge
        arena.ball.body.velocity = Point::new(0.0, 8.0);
        arena.update(&mut InputState::default()).unwrap();
        assert!(arena.ball.body.velocity.y < 0.0);
        assert!(arena.ball.body.velocity.x > 0.0);
    }

    #[test]
    fn phase_table_ignores_unknown_pairs() {
        assert_eq!(Phase::Paused.transition(Event::Launch), Phase::Paused);
        assert_eq!(Phase::Ready.transition(Event::Reset), Phase::Ready);
        assert_eq!(Phase::Over { won: true }.transition(Event::Reset), Phase::Ready);
    }
}
