use mud_ipc::EditorEvent;

/// Notifications queued for observers.
/// The host (UI bridge, CLI) drains this after each interaction.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<EditorEvent>,
}

impl EventQueue {
    /// Queue an event for observers
    pub fn send(&mut self, event: EditorEvent) {
        self.events.push(event);
    }

    /// Take all queued events, leaving the queue empty
    pub fn drain(&mut self) -> Vec<EditorEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
