//! Undo/redo history
//!
//! Two stacks of reversible [`Command`]s. A new action clears the redo
//! stack. While the newest command waits for an entity to finish loading,
//! later requests are queued and replayed in order once it settles.

mod commands;

use std::collections::VecDeque;

use mud_ipc::EditorEvent;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::registry::{CommandError, SceneContext};

pub use commands::{
    AsyncEntityHandle, CreateEntityAsyncCommand, CreateEntityCommand, DeleteEntityCommand,
    DuplicateEntityCommand, EntityBuilder, TransformCommand,
};

/// A reversible user action
pub trait Command {
    fn label(&self) -> &str;

    fn execute(&mut self, scene: &mut SceneContext) -> Result<(), CommandError>;

    fn undo(&mut self, scene: &mut SceneContext) -> Result<(), CommandError>;

    /// Entity whose load must settle before the next action may run
    fn awaiting_entity(&self) -> Option<Uuid> {
        None
    }

    /// Called when the awaited entity's load settled
    fn settle(&mut self, _entity: Uuid) {}

    /// The command leaves the history for good; release what it holds
    fn discard(&mut self, _scene: &mut SceneContext) {}
}

/// What a history request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOutcome {
    Applied,
    /// Waiting behind an entity that is still loading
    Queued,
    /// Stack was empty
    Nothing,
}

enum QueuedAction {
    Execute {
        command: Box<dyn Command>,
        push_only: bool,
    },
    Undo,
    Redo,
}

pub struct HistoryManager {
    undo_stack: Vec<Box<dyn Command>>,
    redo_stack: Vec<Box<dyn Command>>,
    queued: VecDeque<QueuedAction>,
    max_depth: usize,
}

impl HistoryManager {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            queued: VecDeque::new(),
            max_depth: max_depth.max(1),
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queued.len()
    }

    /// Label of the command the next undo would revert
    pub fn undo_label(&self) -> Option<&str> {
        self.undo_stack.last().map(|command| command.label())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.redo_stack.last().map(|command| command.label())
    }

    /// Entity the newest command is waiting on, if any
    pub fn awaiting_entity(&self) -> Option<Uuid> {
        self.undo_stack.last().and_then(|command| command.awaiting_entity())
    }

    pub fn is_busy(&self) -> bool {
        self.awaiting_entity().is_some()
    }

    /// Run a command and record it
    pub fn execute(
        &mut self,
        command: Box<dyn Command>,
        scene: &mut SceneContext,
    ) -> Result<HistoryOutcome, CommandError> {
        self.submit(command, false, scene)
    }

    /// Record a command whose effect is already applied (e.g. a finished drag)
    pub fn push(
        &mut self,
        command: Box<dyn Command>,
        scene: &mut SceneContext,
    ) -> Result<HistoryOutcome, CommandError> {
        self.submit(command, true, scene)
    }

    fn submit(
        &mut self,
        command: Box<dyn Command>,
        push_only: bool,
        scene: &mut SceneContext,
    ) -> Result<HistoryOutcome, CommandError> {
        if self.is_busy() {
            debug!("History busy, queueing {}", command.label());
            self.queued.push_back(QueuedAction::Execute { command, push_only });
            return Ok(HistoryOutcome::Queued);
        }
        self.run_execute(command, push_only, scene)
    }

    fn run_execute(
        &mut self,
        mut command: Box<dyn Command>,
        push_only: bool,
        scene: &mut SceneContext,
    ) -> Result<HistoryOutcome, CommandError> {
        if !push_only {
            command.execute(scene)?;
        }
        info!("Executed {}", command.label());
        for mut stale in self.redo_stack.drain(..) {
            stale.discard(scene);
        }
        self.undo_stack.push(command);
        while self.undo_stack.len() > self.max_depth {
            let mut oldest = self.undo_stack.remove(0);
            debug!("History full, dropping {}", oldest.label());
            oldest.discard(scene);
        }
        Ok(HistoryOutcome::Applied)
    }

    pub fn undo(&mut self, scene: &mut SceneContext) -> Result<HistoryOutcome, CommandError> {
        if self.is_busy() {
            self.queued.push_back(QueuedAction::Undo);
            return Ok(HistoryOutcome::Queued);
        }
        self.run_undo(scene)
    }

    fn run_undo(&mut self, scene: &mut SceneContext) -> Result<HistoryOutcome, CommandError> {
        let Some(mut command) = self.undo_stack.pop() else {
            debug!("Undo: nothing to undo");
            return Ok(HistoryOutcome::Nothing);
        };
        if let Err(e) = command.undo(scene) {
            warn!("Undo of {} failed: {}", command.label(), e);
            self.undo_stack.push(command);
            return Err(e);
        }
        info!("Undid {}", command.label());
        self.redo_stack.push(command);
        Ok(HistoryOutcome::Applied)
    }

    pub fn redo(&mut self, scene: &mut SceneContext) -> Result<HistoryOutcome, CommandError> {
        if self.is_busy() {
            self.queued.push_back(QueuedAction::Redo);
            return Ok(HistoryOutcome::Queued);
        }
        self.run_redo(scene)
    }

    fn run_redo(&mut self, scene: &mut SceneContext) -> Result<HistoryOutcome, CommandError> {
        let Some(mut command) = self.redo_stack.pop() else {
            debug!("Redo: nothing to redo");
            return Ok(HistoryOutcome::Nothing);
        };
        if let Err(e) = command.execute(scene) {
            warn!("Redo of {} failed: {}", command.label(), e);
            self.redo_stack.push(command);
            return Err(e);
        }
        info!("Redid {}", command.label());
        self.undo_stack.push(command);
        Ok(HistoryOutcome::Applied)
    }

    /// An entity finished loading. Releases the waiting command and replays
    /// queued requests until the queue empties or the history is busy again.
    /// Returns true if the entity was the one being awaited.
    pub fn settle(&mut self, entity: Uuid, scene: &mut SceneContext) -> bool {
        let Some(top) = self.undo_stack.last_mut() else {
            return false;
        };
        if top.awaiting_entity() != Some(entity) {
            return false;
        }
        top.settle(entity);
        debug!("{} settled", top.label());

        while !self.is_busy() {
            let Some(action) = self.queued.pop_front() else {
                break;
            };
            let result = match action {
                QueuedAction::Execute { command, push_only } => {
                    self.run_execute(command, push_only, scene)
                }
                QueuedAction::Undo => self.run_undo(scene),
                QueuedAction::Redo => self.run_redo(scene),
            };
            if let Err(e) = result {
                warn!("Queued history action failed: {}", e);
                scene.events.send(EditorEvent::Error {
                    code: "history".to_string(),
                    message: e.to_string(),
                });
            }
        }
        true
    }

    /// Forget everything, releasing what the commands hold
    pub fn clear(&mut self, scene: &mut SceneContext) {
        for mut command in self.undo_stack.drain(..).chain(self.redo_stack.drain(..)) {
            command.discard(scene);
        }
        for action in self.queued.drain(..) {
            if let QueuedAction::Execute { mut command, .. } = action {
                command.discard(scene);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::scene;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Appends to a shared log so ordering is observable
    struct Record {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
        wait_on: Option<Uuid>,
        discarded: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Record {
        fn new(name: &'static str, log: &Rc<RefCell<Vec<String>>>) -> Self {
            Self {
                name,
                log: log.clone(),
                wait_on: None,
                discarded: Rc::new(RefCell::new(Vec::new())),
            }
        }
    }

    impl Command for Record {
        fn label(&self) -> &str {
            self.name
        }

        fn execute(&mut self, _: &mut SceneContext) -> Result<(), CommandError> {
            self.log.borrow_mut().push(format!("do {}", self.name));
            Ok(())
        }

        fn undo(&mut self, _: &mut SceneContext) -> Result<(), CommandError> {
            self.log.borrow_mut().push(format!("undo {}", self.name));
            Ok(())
        }

        fn awaiting_entity(&self) -> Option<Uuid> {
            self.wait_on
        }

        fn settle(&mut self, _: Uuid) {
            self.wait_on = None;
        }

        fn discard(&mut self, _: &mut SceneContext) {
            self.discarded.borrow_mut().push(self.name);
        }
    }

    #[test]
    fn test_undo_redo_lifo() {
        let mut scene = scene();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut history = HistoryManager::new(10);

        history.execute(Box::new(Record::new("a", &log)), &mut scene).unwrap();
        history.execute(Box::new(Record::new("b", &log)), &mut scene).unwrap();
        history.undo(&mut scene).unwrap();
        history.undo(&mut scene).unwrap();
        history.redo(&mut scene).unwrap();

        assert_eq!(*log.borrow(), ["do a", "do b", "undo b", "undo a", "do a"]);
        assert_eq!(history.undo_label(), Some("a"));
        assert_eq!(history.redo_label(), Some("b"));
    }

    #[test]
    fn test_empty_stacks_are_no_ops() {
        let mut scene = scene();
        let mut history = HistoryManager::new(10);
        assert_eq!(history.undo(&mut scene).unwrap(), HistoryOutcome::Nothing);
        assert_eq!(history.redo(&mut scene).unwrap(), HistoryOutcome::Nothing);
    }

    #[test]
    fn test_new_command_clears_redo_branch() {
        let mut scene = scene();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut history = HistoryManager::new(10);

        let undone = Record::new("a", &log);
        let discarded = undone.discarded.clone();
        history.execute(Box::new(undone), &mut scene).unwrap();
        history.undo(&mut scene).unwrap();
        assert!(history.can_redo());

        history.execute(Box::new(Record::new("b", &log)), &mut scene).unwrap();
        assert!(!history.can_redo());
        assert_eq!(history.redo(&mut scene).unwrap(), HistoryOutcome::Nothing);
        assert_eq!(*discarded.borrow(), ["a"]);
    }

    #[test]
    fn test_push_only_skips_execute() {
        let mut scene = scene();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut history = HistoryManager::new(10);
        history.push(Box::new(Record::new("drag", &log)), &mut scene).unwrap();
        assert!(log.borrow().is_empty());
        assert!(history.can_undo());
    }

    #[test]
    fn test_depth_limit_discards_oldest() {
        let mut scene = scene();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut history = HistoryManager::new(2);

        let first = Record::new("first", &log);
        let discarded = first.discarded.clone();
        history.execute(Box::new(first), &mut scene).unwrap();
        history.execute(Box::new(Record::new("second", &log)), &mut scene).unwrap();
        history.execute(Box::new(Record::new("third", &log)), &mut scene).unwrap();

        assert_eq!(history.undo_count(), 2);
        assert_eq!(*discarded.borrow(), ["first"]);
    }

    #[test]
    fn test_actions_queue_behind_pending_load() {
        let mut scene = scene();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut history = HistoryManager::new(10);
        let entity = Uuid::new_v4();

        let mut pending = Record::new("create", &log);
        pending.wait_on = Some(entity);
        history.execute(Box::new(pending), &mut scene).unwrap();
        assert!(history.is_busy());

        let outcome = history.execute(Box::new(Record::new("move", &log)), &mut scene).unwrap();
        assert_eq!(outcome, HistoryOutcome::Queued);
        assert_eq!(history.undo(&mut scene).unwrap(), HistoryOutcome::Queued);
        assert_eq!(*log.borrow(), ["do create"]);

        assert!(!history.settle(Uuid::new_v4(), &mut scene));
        assert!(history.settle(entity, &mut scene));
        assert_eq!(*log.borrow(), ["do create", "do move", "undo move"]);
        assert_eq!(history.queued_count(), 0);
        assert_eq!(history.undo_label(), Some("create"));
    }

    #[test]
    fn test_clear_discards_everything() {
        let mut scene = scene();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut history = HistoryManager::new(10);
        let a = Record::new("a", &log);
        let discarded = a.discarded.clone();
        history.execute(Box::new(a), &mut scene).unwrap();
        history.clear(&mut scene);
        assert!(!history.can_undo());
        assert_eq!(*discarded.borrow(), ["a"]);
    }
}
