//! Execution context
//!
//! Per-run state for one evaluation of a subject against a set of scoped
//! libraries. The context is threaded explicitly through every compiled
//! expression and action; it is deliberately `!Send` (frames share scoped
//! objects through `Rc<RefCell<_>>`).
//!
//! ## Frame state machine
//!
//! ```text
//! open ──► enter_root ──► enter_child* ──► exit* ──► exit(root) ──► close
//! ```
//!
//! `enter_root` fails while any frame is active, `enter_child` and `exit`
//! fail when none is.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use super::frame::{scope_of, FrameGuard, FrameOwner, ScopeAnchor, ScopeRef, StackFrame};
use super::registry::{DefinitionRegistry, RuleTarget};
use crate::domain::diagnostics::DebugRecorder;
use crate::domain::entities::{EngineOutput, Fact, Library, Proposal, SharedModel};
use crate::domain::policies::LifecyclePolicy;
use crate::domain::ports::{ExecutionEvent, ExecutionObserver, PathAccessor};
use crate::domain::value_objects::{DefinitionKind, DefinitionRef, DetectedIssue, ObjectPath};
use crate::error::{EngineError, EngineResult, EvaluationError};

/// What the caller asked the engine to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Produce proposals and issues on a working copy
    #[default]
    Execute,
    /// Produce issues and write back analysis fields
    Analyze,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Execute => write!(f, "execute"),
            ExecutionMode::Analyze => write!(f, "analyze"),
        }
    }
}

/// Knobs a context is opened with
#[derive(Debug, Clone)]
pub struct ContextSettings {
    pub mode: ExecutionMode,
    /// Maximum number of simultaneously active frames
    pub max_depth: usize,
    /// Iteration cap for repeats bounded only by `until`
    pub max_iterations: u32,
    /// Model key receiving the fresh identity of a proposal
    pub id_key: String,
    /// Model key holding protocol attribution
    pub protocols_key: String,
    /// Where pushed proposals are appended on the working subject
    pub proposal_backlink: Option<ObjectPath>,
    /// Evaluate definitions that are not active
    pub allow_non_active: bool,
    /// Include trial-use definitions
    pub include_trial_use: bool,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Execute,
            max_depth: 256,
            max_iterations: 1000,
            id_key: "id".to_string(),
            protocols_key: "protocols".to_string(),
            proposal_backlink: None,
            allow_non_active: false,
            include_trial_use: false,
        }
    }
}

/// Result of closing a context
#[derive(Debug)]
pub struct ExecutionOutcome {
    /// The working copy of the subject after all mutations
    pub subject: Value,
    /// Proposals and issues in insertion order, debug session last
    pub outputs: Vec<EngineOutput>,
}

/// Builder for [`ExecutionContext`]
pub struct ContextBuilder {
    subject: Value,
    accessor: Arc<dyn PathAccessor>,
    libraries: Vec<Arc<Library>>,
    settings: ContextSettings,
    observers: Vec<Arc<dyn ExecutionObserver>>,
    variables: BTreeMap<String, Value>,
    debug: bool,
}

impl ContextBuilder {
    pub fn with_libraries(mut self, libraries: Vec<Arc<Library>>) -> Self {
        self.libraries = libraries;
        self
    }

    pub fn with_settings(mut self, settings: ContextSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    /// Builder: record a debug session
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Create the context. No frame is active yet.
    pub fn open(self) -> ExecutionContext {
        let registry = DefinitionRegistry::build(&self.libraries);
        let mut observers = self.observers;
        let recorder = if self.debug {
            let hashes = self
                .libraries
                .iter()
                .map(|l| (l.id().to_string(), l.source_hash.clone()))
                .collect();
            let recorder = Arc::new(DebugRecorder::new(hashes));
            observers.push(recorder.clone());
            Some(recorder)
        } else {
            None
        };
        let detailed = observers.iter().any(|o| o.wants_detailed_events());
        debug!(
            libraries = self.libraries.len(),
            facts = registry.fact_count(),
            mode = %self.settings.mode,
            debug = self.debug,
            "execution context opened"
        );
        ExecutionContext {
            subject: scope_of(self.subject),
            accessor: self.accessor,
            libraries: self.libraries,
            registry,
            settings: self.settings,
            variables: RefCell::new(self.variables),
            frames: RefCell::new(Vec::new()),
            journal: RefCell::new(Vec::new()),
            fact_cache: RefCell::new(HashMap::new()),
            generation: Cell::new(0),
            observers,
            detailed,
            recorder,
        }
    }
}

/// Memo key: fact node, scoped object, state generation
type FactKey = (usize, usize, u64);

/// Per-run evaluation state
pub struct ExecutionContext {
    subject: ScopeRef,
    accessor: Arc<dyn PathAccessor>,
    libraries: Vec<Arc<Library>>,
    registry: DefinitionRegistry,
    settings: ContextSettings,
    variables: RefCell<BTreeMap<String, Value>>,
    frames: RefCell<Vec<StackFrame>>,
    journal: RefCell<Vec<EngineOutput>>,
    fact_cache: RefCell<HashMap<FactKey, Value>>,
    generation: Cell<u64>,
    observers: Vec<Arc<dyn ExecutionObserver>>,
    detailed: bool,
    recorder: Option<Arc<DebugRecorder>>,
}

impl ExecutionContext {
    /// Start building a context over `subject`
    pub fn builder(subject: Value, accessor: Arc<dyn PathAccessor>) -> ContextBuilder {
        ContextBuilder {
            subject,
            accessor,
            libraries: Vec::new(),
            settings: ContextSettings::default(),
            observers: Vec::new(),
            variables: BTreeMap::new(),
            debug: false,
        }
    }

    pub fn subject(&self) -> &ScopeRef {
        &self.subject
    }

    pub fn accessor(&self) -> &dyn PathAccessor {
        self.accessor.as_ref()
    }

    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    pub fn mode(&self) -> ExecutionMode {
        self.settings.mode
    }

    pub fn libraries(&self) -> &[Arc<Library>] {
        &self.libraries
    }

    pub fn is_debugging(&self) -> bool {
        self.recorder.is_some()
    }

    /// Lifecycle gate for definitions evaluated under this context
    pub fn lifecycle(&self) -> LifecyclePolicy {
        LifecyclePolicy::new(self.settings.allow_non_active, self.settings.include_trial_use)
    }

    // ------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------

    /// Push the root frame, scoped to the subject
    pub fn enter_root(&self) -> EngineResult<FrameGuard<'_>> {
        if !self.frames.borrow().is_empty() {
            return Err(EngineError::InvalidState(
                "a root frame is already active on this context".to_string(),
            ));
        }
        Ok(self.push(StackFrame::new(FrameOwner::Context, self.subject.clone())))
    }

    /// Push a child frame inheriting the current scoped object
    pub fn enter_child(&self, owner: FrameOwner) -> EngineResult<FrameGuard<'_>> {
        let scope = self.current_scope()?;
        self.enter_child_with_scope(owner, scope)
    }

    /// Push a child frame with its own scoped object
    pub fn enter_child_with_scope(
        &self,
        owner: FrameOwner,
        scope: ScopeRef,
    ) -> EngineResult<FrameGuard<'_>> {
        let depth = self.depth();
        if depth == 0 {
            return Err(EngineError::InvalidState(format!(
                "cannot enter {} without an active root frame",
                owner.kind()
            )));
        }
        if depth >= self.settings.max_depth {
            return Err(EngineError::StackOverflow {
                limit: self.settings.max_depth,
            });
        }
        Ok(self.push(StackFrame::new(owner, scope)))
    }

    fn push(&self, frame: StackFrame) -> FrameGuard<'_> {
        let owner = frame.owner.reference();
        let depth = {
            let mut frames = self.frames.borrow_mut();
            frames.push(frame);
            frames.len() - 1
        };
        trace!(depth, owner = %owner, "enter frame");
        self.notify(|| ExecutionEvent::FrameEntered { depth, owner });
        FrameGuard::new(self, depth)
    }

    /// Pop the current frame
    pub fn exit(&self) -> EngineResult<()> {
        let (frame, depth) = {
            let mut frames = self.frames.borrow_mut();
            let frame = frames.pop().ok_or_else(|| {
                EngineError::InvalidState("exit called with no active frame".to_string())
            })?;
            let depth = frames.len();
            (frame, depth)
        };
        let owner = frame.owner.reference();
        trace!(depth, owner = %owner, "exit frame");
        self.notify(|| ExecutionEvent::FrameExited { depth, owner });
        self.write_back(frame.anchors)
    }

    /// Store scopes taken by path back into their parents, innermost first
    fn write_back(&self, anchors: Vec<ScopeAnchor>) -> EngineResult<()> {
        if anchors.is_empty() {
            return Ok(());
        }
        for anchor in anchors.into_iter().rev() {
            let value = anchor.scope.borrow().clone();
            let mut parent = anchor.parent.try_borrow_mut().map_err(|_| {
                EngineError::InvalidState(format!(
                    "scope parent of '{}' is borrowed during frame exit",
                    anchor.path
                ))
            })?;
            self.accessor.set(&mut parent, &anchor.path, value)?;
        }
        self.touch();
        Ok(())
    }

    /// Number of active frames
    pub fn depth(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Scoped object of the current frame
    pub fn current_scope(&self) -> EngineResult<ScopeRef> {
        self.frames
            .borrow()
            .last()
            .map(|f| f.scope.clone())
            .ok_or_else(|| EngineError::InvalidState("no active frame".to_string()))
    }

    /// Replace the current frame's scoped object for the rest of its life
    pub fn replace_scope(&self, scope: ScopeRef) -> EngineResult<()> {
        {
            let mut frames = self.frames.borrow_mut();
            let frame = frames
                .last_mut()
                .ok_or_else(|| EngineError::InvalidState("no active frame".to_string()))?;
            frame.scope = scope;
        }
        self.touch();
        Ok(())
    }

    /// Replace the current frame's scoped object with the value found at
    /// `path` inside it; the value is written back when the frame exits
    pub fn replace_scope_at(&self, path: ObjectPath, scope: ScopeRef) -> EngineResult<()> {
        if path.is_root() {
            return Ok(());
        }
        {
            let mut frames = self.frames.borrow_mut();
            let frame = frames
                .last_mut()
                .ok_or_else(|| EngineError::InvalidState("no active frame".to_string()))?;
            let parent = std::mem::replace(&mut frame.scope, scope.clone());
            frame.anchors.push(ScopeAnchor {
                parent,
                path,
                scope,
            });
        }
        self.touch();
        Ok(())
    }

    /// Walk frames innermost-first and return the first hit
    pub fn find_frame<T>(&self, probe: impl FnMut(&StackFrame) -> Option<T>) -> Option<T> {
        self.frames.borrow().iter().rev().find_map(probe)
    }

    /// Owner chain innermost-first
    pub fn stack(&self) -> Vec<DefinitionRef> {
        self.frames
            .borrow()
            .iter()
            .rev()
            .map(|f| f.owner.reference())
            .collect()
    }

    // ------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------

    /// Look up a variable: frame, then parent frames, then the context
    pub fn variable(&self, name: &str) -> Option<Value> {
        let found = self
            .find_frame(|f| f.variables.get(name).cloned())
            .or_else(|| self.variables.borrow().get(name).cloned());
        if let Some(value) = &found {
            self.notify(|| ExecutionEvent::VariableRead {
                name: name.to_string(),
                value: value.clone(),
            });
        }
        found
    }

    /// Bind a context-level variable
    pub fn set_variable(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.notify(|| ExecutionEvent::VariableWritten {
            name: name.clone(),
            value: value.clone(),
        });
        self.variables.borrow_mut().insert(name, value);
        self.touch();
    }

    /// Bind a variable on the current frame
    pub fn set_frame_variable(&self, name: impl Into<String>, value: Value) -> EngineResult<()> {
        let name = name.into();
        self.notify(|| ExecutionEvent::VariableWritten {
            name: name.clone(),
            value: value.clone(),
        });
        {
            let mut frames = self.frames.borrow_mut();
            let frame = frames
                .last_mut()
                .ok_or_else(|| EngineError::InvalidState("no active frame".to_string()))?;
            frame.variables.insert(name, value);
        }
        self.touch();
        Ok(())
    }

    pub fn remove_variable(&self, name: &str) -> Option<Value> {
        let removed = self.variables.borrow_mut().remove(name);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.borrow().contains_key(name)
    }

    // ------------------------------------------------------------------
    // Registries
    // ------------------------------------------------------------------

    pub fn fact(&self, name: &str) -> EngineResult<&Fact> {
        self.registry
            .fact(&self.libraries, name)
            .ok_or_else(|| EngineError::Lookup {
                kind: "fact",
                name: name.to_string(),
            })
    }

    pub fn rule(&self, name: &str) -> EngineResult<RuleTarget<'_>> {
        self.registry
            .rule(&self.libraries, name)
            .ok_or_else(|| EngineError::Lookup {
                kind: "rule",
                name: name.to_string(),
            })
    }

    pub fn model(&self, name: &str) -> EngineResult<&SharedModel> {
        self.registry
            .model(&self.libraries, name)
            .ok_or_else(|| EngineError::Lookup {
                kind: "model",
                name: name.to_string(),
            })
    }

    // ------------------------------------------------------------------
    // State generation and fact memo
    // ------------------------------------------------------------------

    /// Bumped on every mutation a fact could observe
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Start a new generation; memo entries of the old one can never hit again
    pub(crate) fn touch(&self) {
        self.generation.set(self.generation.get() + 1);
        self.fact_cache.borrow_mut().clear();
    }

    fn fact_key(&self, fact: &Fact, scope: &ScopeRef) -> FactKey {
        (
            fact as *const Fact as usize,
            Rc::as_ptr(scope) as usize,
            self.generation.get(),
        )
    }

    pub(crate) fn cached_fact(&self, fact: &Fact, scope: &ScopeRef) -> Option<Value> {
        self.fact_cache
            .borrow()
            .get(&self.fact_key(fact, scope))
            .cloned()
    }

    pub(crate) fn cache_fact(&self, fact: &Fact, scope: &ScopeRef, value: Value) {
        let key = self.fact_key(fact, scope);
        self.fact_cache.borrow_mut().insert(key, value);
    }

    // ------------------------------------------------------------------
    // Journal
    // ------------------------------------------------------------------

    pub fn push_proposal(&self, proposal: Proposal) {
        debug!(proposal = %proposal.id, protocol = ?proposal.attribution.protocol, "proposal pushed");
        self.notify(|| ExecutionEvent::ProposalPushed {
            proposal: proposal.clone(),
        });
        self.journal.borrow_mut().push(EngineOutput::Proposal(proposal));
    }

    pub fn push_issue(&self, issue: DetectedIssue) {
        debug!(priority = %issue.priority, issue_type = %issue.issue_type, "issue raised");
        self.notify(|| ExecutionEvent::IssueRaised {
            issue: issue.clone(),
        });
        self.journal.borrow_mut().push(EngineOutput::Issue(issue));
    }

    pub fn proposals(&self) -> Vec<Proposal> {
        self.journal
            .borrow()
            .iter()
            .filter_map(|o| o.as_proposal().cloned())
            .collect()
    }

    pub fn issues(&self) -> Vec<DetectedIssue> {
        self.journal
            .borrow()
            .iter()
            .filter_map(|o| o.as_issue().cloned())
            .collect()
    }

    // ------------------------------------------------------------------
    // Errors and events
    // ------------------------------------------------------------------

    /// Wrap an error at an asset boundary, once
    ///
    /// Errors that already carry evaluation context, invalid-state errors
    /// and lifecycle refusals pass through untouched.
    pub fn wrap_error(&self, error: EngineError) -> EngineError {
        if error.is_fatal() || error.evaluation().is_some() {
            return error;
        }
        let (asset, stack) = {
            let frames = self.frames.borrow();
            let asset = frames
                .iter()
                .rev()
                .find(|f| f.owner.is_asset())
                .map(|f| f.owner.reference())
                .unwrap_or_else(|| DefinitionRef::anonymous(DefinitionKind::Context));
            let stack = frames.iter().rev().map(|f| f.owner.reference()).collect();
            (asset, stack)
        };
        self.notify(|| ExecutionEvent::ErrorCaught {
            asset: asset.clone(),
            message: error.to_string(),
        });
        EngineError::Evaluation(Box::new(EvaluationError {
            asset,
            stack,
            cause: error,
        }))
    }

    /// Deliver an event; the closure only runs when someone listens
    pub(crate) fn notify(&self, build: impl FnOnce() -> ExecutionEvent) {
        if self.observers.is_empty() {
            return;
        }
        let event = build();
        let detailed = event.is_detailed();
        if detailed && !self.detailed {
            return;
        }
        for observer in &self.observers {
            if !detailed || observer.wants_detailed_events() {
                observer.on_event(&event);
            }
        }
    }

    /// Discard the context, returning the working subject and outputs
    pub fn close(self) -> ExecutionOutcome {
        let mut outputs = self.journal.into_inner();
        if let Some(recorder) = &self.recorder {
            outputs.push(EngineOutput::Debug(recorder.finish()));
        }
        self.frames.borrow_mut().clear();
        let subject = match Rc::try_unwrap(self.subject) {
            Ok(cell) => cell.into_inner(),
            Err(shared) => shared.borrow().clone(),
        };
        ExecutionOutcome { subject, outputs }
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("mode", &self.settings.mode)
            .field("depth", &self.depth())
            .field("generation", &self.generation.get())
            .field("outputs", &self.journal.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::accessor::JsonPathAccessor;
    use serde_json::json;

    fn context(subject: Value) -> ExecutionContext {
        ExecutionContext::builder(subject, Arc::new(JsonPathAccessor::default())).open()
    }

    #[test]
    fn memo_is_dropped_on_each_generation() {
        let ctx = context(json!({}));
        let _root = ctx.enter_root().unwrap();
        let fact = Fact::new("n", crate::domain::entities::ExpressionNode::snippet("n"));
        for n in 0..50 {
            ctx.set_variable("n", json!(n));
            assert_eq!(fact.compute(&ctx).unwrap(), json!(n));
            assert_eq!(ctx.fact_cache.borrow().len(), 1);
        }
    }

    #[test]
    fn child_without_root_is_invalid() {
        let ctx = context(json!({}));
        let err = ctx.enter_child(FrameOwner::Actions).err().unwrap();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }

    #[test]
    fn double_root_is_invalid() {
        let ctx = context(json!({}));
        let _root = ctx.enter_root().unwrap();
        assert!(matches!(
            ctx.enter_root().err().unwrap(),
            EngineError::InvalidState(_)
        ));
    }

    #[test]
    fn exit_on_empty_stack_is_invalid() {
        let ctx = context(json!({}));
        assert!(matches!(ctx.exit(), Err(EngineError::InvalidState(_))));
    }

    #[test]
    fn guards_unwind_in_order() {
        let ctx = context(json!({}));
        {
            let _root = ctx.enter_root().unwrap();
            {
                let child = ctx.enter_child(FrameOwner::Actions).unwrap();
                assert_eq!(child.depth(), 1);
                assert_eq!(ctx.depth(), 2);
            }
            assert_eq!(ctx.depth(), 1);
        }
        assert_eq!(ctx.depth(), 0);
        // The context may host a fresh root afterwards
        assert!(ctx.enter_root().is_ok());
    }

    #[test]
    fn depth_limit_is_enforced() {
        let ctx = ExecutionContext::builder(json!({}), Arc::new(JsonPathAccessor::default()))
            .with_settings(ContextSettings {
                max_depth: 2,
                ..ContextSettings::default()
            })
            .open();
        let _root = ctx.enter_root().unwrap();
        let _child = ctx.enter_child(FrameOwner::Actions).unwrap();
        assert!(matches!(
            ctx.enter_child(FrameOwner::Actions).err().unwrap(),
            EngineError::StackOverflow { limit: 2 }
        ));
    }

    #[test]
    fn variables_fall_back_from_frame_to_context() {
        let ctx = context(json!({}));
        ctx.set_variable("dose", json!(1));
        let _root = ctx.enter_root().unwrap();
        let _repeat = ctx
            .enter_child(FrameOwner::Repeat {
                iteration_variable: "index".to_string(),
            })
            .unwrap();
        ctx.set_frame_variable("index", json!(2)).unwrap();
        let _inner = ctx.enter_child(FrameOwner::Actions).unwrap();
        assert_eq!(ctx.variable("index"), Some(json!(2)));
        assert_eq!(ctx.variable("dose"), Some(json!(1)));
        assert_eq!(ctx.variable("missing"), None);
    }

    #[test]
    fn mutations_bump_generation() {
        let ctx = context(json!({}));
        let before = ctx.generation();
        ctx.set_variable("x", json!(1));
        assert!(ctx.generation() > before);
    }

    #[test]
    fn scope_replacement_is_local_to_the_frame() {
        let ctx = context(json!({ "name": "subject" }));
        let _root = ctx.enter_root().unwrap();
        {
            let _child = ctx.enter_child(FrameOwner::Actions).unwrap();
            ctx.replace_scope(scope_of(json!({ "name": "other" }))).unwrap();
            assert_eq!(ctx.current_scope().unwrap().borrow()["name"], "other");
        }
        assert_eq!(ctx.current_scope().unwrap().borrow()["name"], "subject");
    }

    #[test]
    fn wrap_error_names_nearest_asset() {
        let ctx = context(json!({}));
        let _root = ctx.enter_root().unwrap();
        let _fact = ctx
            .enter_child(FrameOwner::Fact(DefinitionRef::new(DefinitionKind::Fact, "f")))
            .unwrap();
        let _actions = ctx.enter_child(FrameOwner::Actions).unwrap();
        let wrapped = ctx.wrap_error(EngineError::UnknownVariable("x".to_string()));
        let inner = wrapped.evaluation().unwrap();
        assert_eq!(inner.asset.id, "f");
        assert_eq!(inner.stack.len(), 3);
        assert_eq!(inner.stack[0].kind, DefinitionKind::Actions);

        // Second wrap is a no-op
        let again = ctx.wrap_error(wrapped);
        assert!(matches!(
            again.evaluation().unwrap().cause,
            EngineError::UnknownVariable(_)
        ));
    }

    #[test]
    fn close_returns_working_subject() {
        let ctx = context(json!({ "a": 1 }));
        {
            let _root = ctx.enter_root().unwrap();
            ctx.current_scope().unwrap().borrow_mut()["a"] = json!(2);
        }
        let outcome = ctx.close();
        assert_eq!(outcome.subject, json!({ "a": 2 }));
        assert!(outcome.outputs.is_empty());
    }
}
