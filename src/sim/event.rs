/// Events emitted by the level engine, and the synchronous notifier
/// that delivers them.
/// The presentation layer consumes these for sound and status messages.

use std::fmt;

use crate::domain::entity::Position;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GameEvent {
    /// Player collected a gem.
    Gem,
    /// Player pushed a stone.
    Push,
    /// A falling stone or gem came to rest at this cell.
    Ground(Position),
    /// Player reached the exit with enough gems.
    Won,
    /// Player was crushed or caught.
    GameOver,
}

impl GameEvent {
    /// Stable event name, as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::Gem => "gem",
            GameEvent::Push => "push",
            GameEvent::Ground(_) => "ground",
            GameEvent::Won => "won",
            GameEvent::GameOver => "gameover",
        }
    }
}

/// Handle returned by `Notifier::subscribe`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&GameEvent)>;

/// Listener registry. Listeners run synchronously in registration order.
///
/// Listeners are owned closures; they cannot borrow the level that owns
/// the notifier, so a handler can never re-enter a sweep in progress.
#[derive(Default)]
pub struct Notifier {
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&GameEvent) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Drop every listener at once.
    pub fn unsubscribe(&mut self) {
        self.listeners.clear();
    }

    /// Drop a single listener. Returns false if the handle was already gone.
    pub fn unsubscribe_one(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn notify(&mut self, event: GameEvent) {
        log::debug!("event: {}", event.name());
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
