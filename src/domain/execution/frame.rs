//! Stack frames
//!
//! One frame per nested asset or action entry. Each frame carries its
//! owner descriptor, the scoped object expressions resolve against, and
//! frame-local variables (repeat counters).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;
use tracing::warn;

use super::context::ExecutionContext;
use crate::domain::entities::{Protocol, Rule};
use crate::domain::value_objects::{DefinitionKind, DefinitionRef, ObjectPath};

/// Shared, mutable handle on a scoped object
pub type ScopeRef = Rc<RefCell<Value>>;

/// Wrap a value as a scope handle
pub fn scope_of(value: Value) -> ScopeRef {
    Rc::new(RefCell::new(value))
}

/// The definition node that pushed a frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOwner {
    /// The root frame of a context
    Context,
    Library(DefinitionRef),
    LogicBlock(DefinitionRef),
    Fact(DefinitionRef),
    Rule(DefinitionRef),
    Protocol {
        reference: DefinitionRef,
        name: Option<String>,
        version: Option<String>,
        oid: Option<String>,
    },
    Actions,
    Propose,
    Repeat { iteration_variable: String },
}

impl FrameOwner {
    pub fn rule(rule: &Rule) -> Self {
        FrameOwner::Rule(rule.reference())
    }

    pub fn protocol(protocol: &Protocol) -> Self {
        let meta = protocol.meta();
        FrameOwner::Protocol {
            reference: protocol.reference(),
            name: meta.name.clone(),
            version: meta.version.clone(),
            oid: meta.oid.clone(),
        }
    }

    pub fn kind(&self) -> DefinitionKind {
        match self {
            FrameOwner::Context => DefinitionKind::Context,
            FrameOwner::Library(_) => DefinitionKind::Library,
            FrameOwner::LogicBlock(_) => DefinitionKind::LogicBlock,
            FrameOwner::Fact(_) => DefinitionKind::Fact,
            FrameOwner::Rule(_) => DefinitionKind::Rule,
            FrameOwner::Protocol { .. } => DefinitionKind::Protocol,
            FrameOwner::Actions => DefinitionKind::Actions,
            FrameOwner::Propose => DefinitionKind::Propose,
            FrameOwner::Repeat { .. } => DefinitionKind::Repeat,
        }
    }

    pub fn reference(&self) -> DefinitionRef {
        match self {
            FrameOwner::Library(r)
            | FrameOwner::LogicBlock(r)
            | FrameOwner::Fact(r)
            | FrameOwner::Rule(r)
            | FrameOwner::Protocol { reference: r, .. } => r.clone(),
            other => DefinitionRef::anonymous(other.kind()),
        }
    }

    /// Facts, rules and protocols own an error-wrapping boundary
    pub fn is_asset(&self) -> bool {
        matches!(
            self,
            FrameOwner::Fact(_) | FrameOwner::Rule(_) | FrameOwner::Protocol { .. }
        )
    }
}

/// A scope taken from `path` inside `parent`; written back when its frame exits
#[derive(Debug)]
pub(crate) struct ScopeAnchor {
    pub(crate) parent: ScopeRef,
    pub(crate) path: ObjectPath,
    pub(crate) scope: ScopeRef,
}

/// One nested evaluation scope
#[derive(Debug)]
pub struct StackFrame {
    pub(crate) owner: FrameOwner,
    pub(crate) scope: ScopeRef,
    pub(crate) variables: BTreeMap<String, Value>,
    pub(crate) anchors: Vec<ScopeAnchor>,
}

impl StackFrame {
    pub(crate) fn new(owner: FrameOwner, scope: ScopeRef) -> Self {
        Self {
            owner,
            scope,
            variables: BTreeMap::new(),
            anchors: Vec::new(),
        }
    }

    pub fn owner(&self) -> &FrameOwner {
        &self.owner
    }

    pub fn scope(&self) -> &ScopeRef {
        &self.scope
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }
}

/// Pops its frame when dropped
///
/// Returned by `enter_root` / `enter_child`. Dropping the guard exits the
/// frame it pushed, so frames unwind on early return and on `?`.
#[must_use = "dropping the guard exits the frame immediately"]
pub struct FrameGuard<'c> {
    ctx: &'c ExecutionContext,
    depth: usize,
    active: bool,
}

impl<'c> FrameGuard<'c> {
    pub(crate) fn new(ctx: &'c ExecutionContext, depth: usize) -> Self {
        Self {
            ctx,
            depth,
            active: true,
        }
    }

    /// Zero-based depth of the guarded frame
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Exit now instead of at drop
    pub fn exit(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        // Only pop if our frame is still on top; a manual `exit()` on the
        // context may already have removed it.
        if self.ctx.depth() == self.depth + 1 {
            if let Err(e) = self.ctx.exit() {
                warn!(depth = self.depth, error = %e, "frame exit failed");
            }
        }
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
