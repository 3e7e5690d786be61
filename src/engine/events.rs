// src/engine/events.rs

use std::fmt;
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::debug;

/// Topics published on the agent's event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentEvent {
    /// Queue and watcher are initialised.
    Ready,
    /// A worker is about to run a recipe.
    Lock,
    /// A worker finished running a recipe, successfully or not.
    Unlock,
}

impl AgentEvent {
    /// Wire name of the topic, as seen by external subscribers.
    pub fn topic(&self) -> &'static str {
        match self {
            AgentEvent::Ready => "client:ready",
            AgentEvent::Lock => "client:lock",
            AgentEvent::Unlock => "client:unlock",
        }
    }
}

impl fmt::Display for AgentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.topic())
    }
}

type Handler = Arc<dyn Fn(AgentEvent) + Send + Sync>;

/// In-process publish/subscribe dispatcher owned by one agent.
///
/// Handlers registered with [`EventBus::subscribe`] run synchronously on the
/// publishing task, in registration order. Observers that only want to watch
/// can take a broadcast receiver from [`EventBus::stream`] instead.
pub struct EventBus {
    handlers: RwLock<Vec<(AgentEvent, Handler)>>,
    stream: broadcast::Sender<AgentEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (stream, _) = broadcast::channel(64);
        Self {
            handlers: RwLock::new(Vec::new()),
            stream,
        }
    }

    pub fn subscribe<F>(&self, topic: AgentEvent, handler: F)
    where
        F: Fn(AgentEvent) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.push((topic, Arc::new(handler)));
    }

    pub fn stream(&self) -> broadcast::Receiver<AgentEvent> {
        self.stream.subscribe()
    }

    pub fn publish(&self, event: AgentEvent) {
        debug!(topic = %event, "publishing event");

        // Handlers are cloned out so one of them may subscribe without deadlocking.
        let matching: Vec<Handler> = {
            let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            handlers
                .iter()
                .filter(|(topic, _)| *topic == event)
                .map(|(_, h)| Arc::clone(h))
                .collect()
        };

        for handler in matching {
            handler(event);
        }

        // No receivers is fine.
        let _ = self.stream.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.handlers.read().map(|h| h.len()).unwrap_or(0);
        f.debug_struct("EventBus")
            .field("handlers", &count)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn handlers_only_see_their_topic() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        bus.subscribe(AgentEvent::Lock, move |e| s.lock().unwrap().push(e));

        bus.publish(AgentEvent::Ready);
        bus.publish(AgentEvent::Lock);
        bus.publish(AgentEvent::Unlock);

        assert_eq!(*seen.lock().unwrap(), vec![AgentEvent::Lock]);
    }

    #[tokio::test]
    async fn stream_receives_every_topic() {
        let bus = EventBus::new();
        let mut rx = bus.stream();

        bus.publish(AgentEvent::Ready);
        bus.publish(AgentEvent::Unlock);

        assert_eq!(rx.recv().await.unwrap(), AgentEvent::Ready);
        assert_eq!(rx.recv().await.unwrap(), AgentEvent::Unlock);
    }

    #[test]
    fn topic_names_are_stable() {
        assert_eq!(AgentEvent::Ready.topic(), "client:ready");
        assert_eq!(AgentEvent::Lock.to_string(), "client:lock");
        assert_eq!(AgentEvent::Unlock.topic(), "client:unlock");
    }
}
