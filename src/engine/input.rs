use crate::browser;
use crate::engine::events::Propagation;
use crate::engine::geometry::Point;
use anyhow::Result;
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use std::cell::Cell;
use std::collections::HashSet;
use wasm_bindgen::JsCast;
use web_sys::{KeyboardEvent, MouseEvent};

/// ELI5:
/// ┌─────────────── Input Flow ──────────────────────────────────────┐
/// │  DOM handler ──► channel ──► process_input() ──► InputState     │
/// │  (any time)      (queue)     (once per frame)    (read by game) │
/// └─────────────────────────────────────────────────────────────────┘
/// Browser callbacks fire between frames, so they only queue. The game
/// loop drains the queue right before `Game::update`.
#[derive(Debug)]
pub enum InputEvent {
    KeyDown(String),
    KeyUp(String),
    Pointer(PointerKind, Point),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PointerKind {
    Down,
    Up,
    Move,
    Click,
}

impl PointerKind {
    pub const ALL: [PointerKind; 4] = [
        PointerKind::Down,
        PointerKind::Up,
        PointerKind::Move,
        PointerKind::Click,
    ];

    /// DOM name, also the `EventBus` event name
    pub fn event_name(&self) -> &'static str {
        match self {
            PointerKind::Down => "mousedown",
            PointerKind::Up => "mouseup",
            PointerKind::Move => "mousemove",
            PointerKind::Click => "click",
        }
    }

    pub fn from_event_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.event_name() == name)
    }
}

/// Payload for pointer events triggered on an `EventBus`
#[derive(Debug, Clone)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub position: Point,
    stopped: Cell<bool>,
}

impl PointerEvent {
    pub fn new(kind: PointerKind, position: Point) -> Self {
        PointerEvent {
            kind,
            position,
            stopped: Cell::new(false),
        }
    }

    pub fn event_name(&self) -> &'static str {
        self.kind.event_name()
    }

    /// Listeners behind the current one won't see this event
    pub fn stop_propagation(&self) {
        self.stopped.set(true);
    }
}

impl Propagation for PointerEvent {
    fn is_propagation_stopped(&self) -> bool {
        self.stopped.get()
    }
}

#[derive(Debug, Default)]
pub struct KeyState {
    pressed: HashSet<String>,
}

impl KeyState {
    pub fn new() -> Self {
        KeyState::default()
    }

    /// `code` is the DOM `KeyboardEvent.code`, e.g. "ArrowLeft", "Space"
    pub fn is_pressed(&self, code: &str) -> bool {
        self.pressed.contains(code)
    }

    pub fn set_pressed(&mut self, code: &str) {
        self.pressed.insert(code.to_string());
    }

    pub fn set_released(&mut self, code: &str) {
        self.pressed.remove(code);
    }
}

#[derive(Debug, Default)]
pub struct PointerState {
    pub position: Point,
    pub is_down: bool,
    pending: Vec<PointerEvent>,
}

impl PointerState {
    pub fn record(&mut self, kind: PointerKind, position: Point) {
        self.position = position;
        match kind {
            PointerKind::Down => self.is_down = true,
            PointerKind::Up => self.is_down = false,
            PointerKind::Move | PointerKind::Click => {}
        }
        self.pending.push(PointerEvent::new(kind, position));
    }

    /// This frame's pointer events, oldest first. Empties the queue.
    pub fn drain(&mut self) -> Vec<PointerEvent> {
        std::mem::take(&mut self.pending)
    }
}

#[derive(Debug, Default)]
pub struct InputState {
    pub keys: KeyState,
    pub pointer: PointerState,
}

impl InputState {
    pub fn apply(&mut self, event: InputEvent) {
        match event {
            InputEvent::KeyDown(code) => self.keys.set_pressed(&code),
            InputEvent::KeyUp(code) => self.keys.set_released(&code),
            InputEvent::Pointer(kind, position) => self.pointer.record(kind, position),
        }
    }
}

fn forward(sender: &UnboundedSender<InputEvent>, event: InputEvent) {
    // receiver gone means the loop stopped, nothing left to notify
    let _ = sender.unbounded_send(event);
}

/// Hook keyboard + mouse handlers on the canvas.
/// The canvas needs a `tabindex` attribute to receive key events.
pub fn prepare_input() -> Result<UnboundedReceiver<InputEvent>> {
    let (sender, receiver) = unbounded();
    let canvas = browser::canvas()?;

    let keydown_sender = sender.clone();
    let onkeydown = browser::closure_wrap(Box::new(move |event: KeyboardEvent| {
        forward(&keydown_sender, InputEvent::KeyDown(event.code()));
    }) as Box<dyn FnMut(KeyboardEvent)>);

    let keyup_sender = sender.clone();
    let onkeyup = browser::closure_wrap(Box::new(move |event: KeyboardEvent| {
        forward(&keyup_sender, InputEvent::KeyUp(event.code()));
    }) as Box<dyn FnMut(KeyboardEvent)>);

    canvas.set_onkeydown(Some(onkeydown.as_ref().unchecked_ref()));
    canvas.set_onkeyup(Some(onkeyup.as_ref().unchecked_ref()));
    // handlers live as long as the page
    onkeydown.forget();
    onkeyup.forget();

    for kind in PointerKind::ALL {
        let pointer_sender = sender.clone();
        let handler = browser::closure_wrap(Box::new(move |event: MouseEvent| {
            let position = Point::new(event.offset_x().into(), event.offset_y().into());
            forward(&pointer_sender, InputEvent::Pointer(kind, position));
        }) as Box<dyn FnMut(MouseEvent)>);
        let function = Some(handler.as_ref().unchecked_ref());
        match kind {
            PointerKind::Down => canvas.set_onmousedown(function),
            PointerKind::Up => canvas.set_onmouseup(function),
            PointerKind::Move => canvas.set_onmousemove(function),
            PointerKind::Click => canvas.set_onclick(function),
        }
        handler.forget();
    }

    Ok(receiver)
}

/// Drain everything queued since the last frame into `state`
pub fn process_input(state: &mut InputState, receiver: &mut UnboundedReceiver<InputEvent>) {
    // stops on Empty and on Closed alike
    while let Ok(event) = receiver.try_recv() {
        state.apply(event);
    }
}
