//! Declarative script host backed by a table of entry rules.

use std::collections::HashMap;

use tilegate_core::{Direction, DirectionSet, ScriptId};

use crate::{InteractionScript, ScriptHost};

/// Script whose answers are fixed when it is registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableScript {
    enter_from: DirectionSet,
    jump: Option<Direction>,
}

impl TableScript {
    /// Creates a script permitting entry while travelling in `enter_from`.
    #[must_use]
    pub const fn new(enter_from: DirectionSet, jump: Option<Direction>) -> Self {
        Self { enter_from, jump }
    }
}

impl InteractionScript for TableScript {
    fn can_enter_from(&self, direction: Direction) -> bool {
        self.enter_from.contains(direction)
    }

    fn jump_direction(&self) -> Option<Direction> {
        self.jump
    }
}

/// Host that hands out copies of registered [`TableScript`]s.
#[derive(Clone, Debug, Default)]
pub struct TableScriptHost {
    scripts: HashMap<ScriptId, TableScript>,
}

impl TableScriptHost {
    /// Creates a host with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `script` under `id`, replacing any earlier entry.
    pub fn register(&mut self, id: ScriptId, script: TableScript) {
        let _ = self.scripts.insert(id, script);
    }

    /// Reports whether a script is registered under `id`.
    #[must_use]
    pub fn contains(&self, id: &ScriptId) -> bool {
        self.scripts.contains_key(id)
    }
}

impl ScriptHost for TableScriptHost {
    fn instantiate(&self, script: &ScriptId) -> Option<Box<dyn InteractionScript>> {
        self.scripts
            .get(script)
            .map(|table| Box::new(*table) as Box<dyn InteractionScript>)
    }
}
