//! Synthetic events for canvas objects.
//!
//! Things drawn on a canvas have no DOM node, so nothing bubbles for them.
//! `EventBus` keeps its own listener table and walks it in weight order
//! instead :
//!
//! ```text
//! ┌──────────────── trigger("click") ─────────────────┐
//! │  weight 10  button   ──► fires first, may stop    │
//! │  weight  5  panel    ──► fires unless stopped     │
//! │  weight  0  backdrop ──► fires last               │
//! └───────────────────────────────────────────────────┘
//! ```
use crate::engine::actor::Bounded;
use crate::engine::input::PointerEvent;
use anyhow::{Context, Result};
use log::{trace, warn};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Payloads that can halt dispatch part way through
pub trait Propagation {
    fn is_propagation_stopped(&self) -> bool {
        false
    }
}

impl Propagation for () {}

pub type Callback<T, E> = Rc<dyn Fn(&Rc<T>, &E) -> Result<()>>;
pub type Behavior<T, E> = Rc<dyn Fn(&T, &E) -> bool>;

/// `"click.drag"` parsed once : event `click`, namespace `drag`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventKey {
    pub event: String,
    pub namespace: String,
}

impl EventKey {
    /// Space separated names, each split on its FIRST dot only
    pub fn parse(names: &str) -> Vec<EventKey> {
        names.split_whitespace()
            .map(|name| match name.split_once('.') {
                Some((event, namespace)) => EventKey {
                    event: event.to_string(),
                    namespace: namespace.to_string(),
                },
                None => EventKey {
                    event: name.to_string(),
                    namespace: String::new(),
                },
            })
            .collect()
    }
}

struct Registration<T: ?Sized, E> {
    id: u64,
    target: Rc<T>,
    namespace: String,
    callback: Callback<T, E>,
    weight: i32,
    once: bool,
}

// derive(Clone) would demand T: Clone, we only clone the Rc's
impl<T: ?Sized, E> Clone for Registration<T, E> {
    fn clone(&self) -> Self {
        Registration {
            id: self.id,
            target: self.target.clone(),
            namespace: self.namespace.clone(),
            callback: self.callback.clone(),
            weight: self.weight,
            once: self.once,
        }
    }
}

fn same_target<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
    Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
}

/// Listener table keyed by event name.
///
/// All methods take `&self` so callbacks holding an `Rc<EventBus>` can listen
/// and unlisten while a dispatch is running. `trigger` walks a snapshot taken
/// when it starts :
/// - listeners added during the pass do not fire in that pass
/// - listeners removed during the pass are skipped
pub struct EventBus<T: ?Sized, E> {
    listeners: RefCell<HashMap<String, Vec<Registration<T, E>>>>,
    behaviors: RefCell<HashMap<String, Behavior<T, E>>>,
    next_id: Cell<u64>,
}

impl<T: ?Sized, E> Default for EventBus<T, E> {
    fn default() -> Self {
        EventBus {
            listeners: RefCell::new(HashMap::new()),
            behaviors: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
        }
    }
}

impl<T: ?Sized + 'static, E: Propagation + 'static> EventBus<T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen<F>(&self, target: &Rc<T>, names: &str, callback: F, weight: i32) -> Rc<T>
    where
        F: Fn(&Rc<T>, &E) -> Result<()> + 'static,
    {
        self.listen_with(target, names, callback, weight, false)
    }

    pub fn once<F>(&self, target: &Rc<T>, names: &str, callback: F, weight: i32) -> Rc<T>
    where
        F: Fn(&Rc<T>, &E) -> Result<()> + 'static,
    {
        self.listen_with(target, names, callback, weight, true)
    }

    /// One registration per event name in `names`, never deduplicated
    pub fn listen_with<F>(
        &self,
        target: &Rc<T>,
        names: &str,
        callback: F,
        weight: i32,
        once: bool,
    ) -> Rc<T>
    where
        F: Fn(&Rc<T>, &E) -> Result<()> + 'static,
    {
        let callback: Callback<T, E> = Rc::new(callback);
        let mut listeners = self.listeners.borrow_mut();
        for key in EventKey::parse(names) {
            if key.event.is_empty() {
                warn!("Ignoring listen on '.{}' : no event name", key.namespace);
                continue;
            }
            let id = self.next_id.get();
            self.next_id.set(id + 1);
            listeners.entry(key.event).or_default().push(Registration {
                id,
                target: target.clone(),
                namespace: key.namespace,
                callback: callback.clone(),
                weight,
                once,
            });
        }
        target.clone()
    }

    /// ELI5:
    /// ┌──────────────┬─────────────────────────────────────────────┐
    /// │ names        │ removes (for this target only)              │
    /// ├──────────────┼─────────────────────────────────────────────┤
    /// │ "click.drag" │ click listeners in namespace "drag"         │
    /// │ "click"      │ click listeners in every namespace          │
    /// │ ".drag"      │ every event's listeners in namespace "drag" │
    /// └──────────────┴─────────────────────────────────────────────┘
    pub fn unlisten(&self, target: &Rc<T>, names: &str) -> Rc<T> {
        let mut listeners = self.listeners.borrow_mut();
        for key in EventKey::parse(names) {
            let matches = |registration: &Registration<T, E>| {
                same_target(&registration.target, target)
                    && (key.namespace.is_empty() || registration.namespace == key.namespace)
            };
            if key.event.is_empty() {
                if key.namespace.is_empty() {
                    continue;
                }
                for list in listeners.values_mut() {
                    list.retain(|registration| !matches(registration));
                }
            } else if let Some(list) = listeners.get_mut(&key.event) {
                list.retain(|registration| !matches(registration));
            }
        }
        listeners.retain(|_, list| !list.is_empty());
        target.clone()
    }

    /// Fire `event`, highest weight first.
    ///
    /// A callback error aborts the rest of this dispatch and is returned.
    pub fn trigger(&self, event: &str, payload: &E) -> Result<()> {
        let mut snapshot = match self.listeners.borrow().get(event) {
            Some(list) => list.clone(),
            None => return Ok(()),
        };
        // stable : equal weights keep registration order, so reversed the
        // newest of them fires first
        snapshot.sort_by_key(|registration| registration.weight);
        let behavior = self.behaviors.borrow().get(event).cloned();
        trace!("trigger '{}' : {} listener(s)", event, snapshot.len());

        for registration in snapshot.iter().rev() {
            if !self.is_registered(event, registration.id) {
                continue;
            }
            if let Some(behavior) = &behavior {
                if !behavior(&*registration.target, payload) {
                    continue;
                }
            }
            if registration.once {
                // out before the call, a re-entrant trigger can't fire it twice
                self.remove_id(event, registration.id);
            }
            (registration.callback)(&registration.target, payload).with_context(|| {
                format!(
                    "Listener for '{}' (namespace '{}') failed",
                    event, registration.namespace
                )
            })?;
            if payload.is_propagation_stopped() {
                trace!("'{}' propagation stopped", event);
                break;
            }
        }
        Ok(())
    }

    /// Gate every listener of `event` behind `predicate`, replacing any previous one
    pub fn set_behavior<F>(&self, event: &str, predicate: F)
    where
        F: Fn(&T, &E) -> bool + 'static,
    {
        self.behaviors
            .borrow_mut()
            .insert(event.to_string(), Rc::new(predicate));
    }

    pub fn remove_behavior(&self, event: &str) {
        self.behaviors.borrow_mut().remove(event);
    }

    pub fn has_behavior(&self, event: &str) -> bool {
        self.behaviors.borrow().contains_key(event)
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.borrow().get(event).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    /// Drop every listener, behaviors stay
    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }

    fn is_registered(&self, event: &str, id: u64) -> bool {
        self.listeners
            .borrow()
            .get(event)
            .is_some_and(|list| list.iter().any(|registration| registration.id == id))
    }

    fn remove_id(&self, event: &str, id: u64) {
        let mut listeners = self.listeners.borrow_mut();
        if let Some(list) = listeners.get_mut(event) {
            list.retain(|registration| registration.id != id);
            if list.is_empty() {
                listeners.remove(event);
            }
        }
    }
}

/// Pointer events only reach targets whose bounds contain the pointer
pub fn pointer_behaviors<T>(bus: &EventBus<T, PointerEvent>)
where
    T: Bounded + ?Sized + 'static,
{
    for kind in crate::engine::input::PointerKind::ALL {
        bus.set_behavior(kind.event_name(), |target: &T, event: &PointerEvent| {
            target.bounds().contains(event.position)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::geometry::{Point, Rectangle};
    use crate::engine::input::PointerKind;
    use anyhow::anyhow;

    struct Target {
        name: &'static str,
        bounds: Rectangle,
    }

    impl Bounded for Target {
        fn bounds(&self) -> Rectangle {
            self.bounds
        }
    }

    fn target(name: &'static str) -> Rc<Target> {
        Rc::new(Target {
            name,
            bounds: Rectangle::new(0.0, 0.0, 10.0, 10.0).unwrap(),
        })
    }

    type Log = Rc<RefCell<Vec<&'static str>>>;

    fn record(log: &Log, label: &'static str) -> impl Fn(&Rc<Target>, &PointerEvent) -> Result<()> {
        let log = log.clone();
        move |_: &Rc<Target>, _: &PointerEvent| {
            log.borrow_mut().push(label);
            Ok(())
        }
    }

    fn click() -> PointerEvent {
        PointerEvent::new(PointerKind::Click, Point::new(5.0, 5.0))
    }

    #[test]
    fn parses_names_and_namespaces() {
        assert_eq!(
            EventKey::parse(" click.drag  mousedown .ui a.b.c "),
            vec![
                EventKey {
                    event: "click".into(),
                    namespace: "drag".into()
                },
                EventKey {
                    event: "mousedown".into(),
                    namespace: "".into()
                },
                EventKey {
                    event: "".into(),
                    namespace: "ui".into()
                },
                EventKey {
                    event: "a".into(),
                    namespace: "b.c".into()
                },
            ]
        );
        assert!(EventKey::parse("   ").is_empty());
    }

    #[test]
    fn higher_weight_fires_first() {
        let bus = EventBus::new();
        let log = Log::default();
        pointer_behaviors(&bus);
        bus.listen(&target("low"), "click", record(&log, "five"), 5);
        bus.listen(&target("high"), "click", record(&log, "ten"), 10);
        bus.trigger("click", &click()).unwrap();
        assert_eq!(*log.borrow(), vec!["ten", "five"]);
    }

    #[test]
    fn equal_weights_fire_newest_first() {
        let bus = EventBus::new();
        let log = Log::default();
        pointer_behaviors(&bus);
        bus.listen(&target("first"), "click", record(&log, "first"), 3);
        bus.listen(&target("second"), "click", record(&log, "second"), 3);
        bus.listen(&target("third"), "click", record(&log, "third"), 3);
        bus.trigger("click", &click()).unwrap();
        assert_eq!(*log.borrow(), vec!["third", "second", "first"]);
    }

    #[test]
    fn listen_returns_target_and_does_not_dedup() {
        let bus = EventBus::new();
        let log = Log::default();
        let t = target("t");
        let returned = bus.listen(&t, "click", record(&log, "a"), 0);
        assert_eq!(returned.name, "t");
        assert!(Rc::ptr_eq(&returned, &t));
        bus.listen(&t, "click", record(&log, "a"), 0);
        bus.trigger("click", &click()).unwrap();
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn multi_event_names_register_each_name() {
        let bus = EventBus::new();
        let log = Log::default();
        bus.listen(&target("t"), "mousedown mouseup.ui", record(&log, "hit"), 0);
        assert_eq!(bus.listener_count("mousedown"), 1);
        assert_eq!(bus.listener_count("mouseup"), 1);
        bus.trigger("mouseup", &click()).unwrap();
        assert_eq!(*log.borrow(), vec!["hit"]);
    }

    #[test]
    fn namespace_only_listen_is_ignored() {
        let bus: EventBus<Target, PointerEvent> = EventBus::new();
        bus.listen(&target("t"), ".ui", |_, _| Ok(()), 0);
        assert!(bus.is_empty());
    }

    #[test]
    fn once_listener_fires_exactly_once() {
        let bus = EventBus::new();
        let log = Log::default();
        let t = target("t");
        bus.once(&t, "click", record(&log, "once"), 0);
        bus.trigger("click", &click()).unwrap();
        bus.trigger("click", &click()).unwrap();
        assert_eq!(*log.borrow(), vec!["once"]);
        assert_eq!(bus.listener_count("click"), 0);
        bus.unlisten(&t, "click");
        assert!(bus.is_empty());
    }

    #[test]
    fn unlisten_by_event_and_namespace() {
        let bus = EventBus::new();
        let log = Log::default();
        let obj = target("obj");
        bus.listen(&obj, "click.a", record(&log, "cb1"), 0);
        bus.listen(&obj, "click.b", record(&log, "cb2"), 0);
        bus.unlisten(&obj, "click.a");
        bus.trigger("click", &click()).unwrap();
        assert_eq!(*log.borrow(), vec!["cb2"]);
    }

    #[test]
    fn unlisten_event_without_namespace_drops_all_namespaces() {
        let bus = EventBus::new();
        let log = Log::default();
        let obj = target("obj");
        let other = target("other");
        bus.listen(&obj, "click.a click.b click", record(&log, "obj"), 0);
        bus.listen(&other, "click.a", record(&log, "other"), 0);
        bus.unlisten(&obj, "click");
        bus.trigger("click", &click()).unwrap();
        assert_eq!(*log.borrow(), vec!["other"]);
    }

    #[test]
    fn unlisten_namespace_across_events() {
        let bus = EventBus::new();
        let log = Log::default();
        let obj = target("obj");
        bus.listen(&obj, "click.drag mousedown.drag mouseup", record(&log, "x"), 0);
        bus.unlisten(&obj, ".drag");
        assert_eq!(bus.listener_count("click"), 0);
        assert_eq!(bus.listener_count("mousedown"), 0);
        assert_eq!(bus.listener_count("mouseup"), 1);
        // nothing left to match, still fine
        bus.unlisten(&obj, ".drag missing.ns");
        assert_eq!(bus.listener_count("mouseup"), 1);
    }

    #[test]
    fn stop_propagation_skips_lower_weights() {
        let bus = EventBus::new();
        let log = Log::default();
        bus.listen(&target("back"), "click", record(&log, "five"), 5);
        let front_log = log.clone();
        bus.listen(
            &target("front"),
            "click",
            move |_, event: &PointerEvent| {
                front_log.borrow_mut().push("ten");
                event.stop_propagation();
                Ok(())
            },
            10,
        );
        bus.trigger("click", &click()).unwrap();
        assert_eq!(*log.borrow(), vec!["ten"]);
    }

    #[test]
    fn behavior_gates_listeners() {
        let bus = EventBus::new();
        let log = Log::default();
        pointer_behaviors(&bus);
        let far = Rc::new(Target {
            name: "far",
            bounds: Rectangle::new(100.0, 100.0, 10.0, 10.0).unwrap(),
        });
        bus.listen(&far, "click", record(&log, "far"), 0);
        bus.listen(&target("near"), "click", record(&log, "near"), 0);
        // no behavior for custom events, everything fires
        bus.listen(&far, "hit", record(&log, "hit"), 0);
        bus.trigger("click", &click()).unwrap();
        bus.trigger("hit", &click()).unwrap();
        assert_eq!(*log.borrow(), vec!["near", "hit"]);

        bus.remove_behavior("click");
        assert!(!bus.has_behavior("click"));
        bus.trigger("click", &click()).unwrap();
        assert_eq!(log.borrow().len(), 4);
    }

    #[test]
    fn callback_error_aborts_dispatch() {
        let bus = EventBus::new();
        let log = Log::default();
        bus.listen(&target("back"), "click", record(&log, "back"), 0);
        bus.listen(&target("front"), "click", |_, _| Err(anyhow!("boom")), 1);
        let err = bus.trigger("click", &click()).unwrap_err();
        assert!(format!("{:#}", err).contains("boom"));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn failing_once_listener_is_already_removed() {
        let bus = EventBus::new();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        bus.once(
            &target("t"),
            "click",
            move |_, _| {
                counter.set(counter.get() + 1);
                Err(anyhow!("boom"))
            },
            0,
        );
        assert!(bus.trigger("click", &click()).is_err());
        assert_eq!(bus.listener_count("click"), 0);
        bus.trigger("click", &click()).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn changes_during_dispatch_follow_the_snapshot() {
        let bus = Rc::new(EventBus::new());
        let log = Log::default();
        let back = target("back");
        let late = target("late");

        let (inner_bus, inner_log, inner_back, inner_late) =
            (bus.clone(), log.clone(), back.clone(), late.clone());
        bus.listen(
            &target("front"),
            "click",
            move |_, _| {
                inner_log.borrow_mut().push("front");
                inner_bus.unlisten(&inner_back, "click");
                inner_bus.listen(&inner_late, "click", record(&inner_log, "late"), 0);
                Ok(())
            },
            10,
        );
        bus.listen(&back, "click", record(&log, "back"), 0);

        bus.trigger("click", &click()).unwrap();
        assert_eq!(*log.borrow(), vec!["front"]);
        bus.trigger("click", &click()).unwrap();
        assert_eq!(*log.borrow(), vec!["front", "front", "late"]);
    }

    #[test]
    fn unit_payload_never_stops() {
        let bus: EventBus<str, ()> = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        let target: Rc<str> = Rc::from("tick");
        for weight in 0..3 {
            let hits = hits.clone();
            bus.listen(
                &target,
                "tick",
                move |_, _| {
                    hits.set(hits.get() + 1);
                    Ok(())
                },
                weight,
            );
        }
        bus.trigger("tick", &()).unwrap();
        bus.trigger("nothing", &()).unwrap();
        assert_eq!(hits.get(), 3);
        bus.clear();
        assert!(bus.is_empty());
    }
}
