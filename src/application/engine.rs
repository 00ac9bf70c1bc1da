//! Decision Engine Use Case
//!
//! Orchestrates one evaluation of a subject against a library set:
//!
//! 1. Resolve `include` references into the scoped library set
//! 2. Apply lifecycle gating to every library
//! 3. Open an execution context over a working copy of the subject
//! 4. Run the rules and protocols of every applicable logic block
//! 5. Close the context and hand back its outputs

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::domain::entities::{
    ComputableAsset, EngineOutput, Library, LibraryReference, LogicBlock,
};
use crate::domain::execution::{ContextSettings, ExecutionContext, ExecutionMode, FrameOwner};
use crate::domain::policies::{Admission, LifecyclePolicy};
use crate::domain::ports::{ExecutionObserver, LibraryResolver, PathAccessor};
use crate::domain::services::{validate_libraries, Severity, ValidationIssue};
use crate::domain::value_objects::{
    DefinitionKind, DetectedIssue, ExecutionParameters, ObjectPath,
};
use crate::error::{EngineError, EngineResult};

/// Rule engine over a fixed set of root libraries
pub struct DecisionEngine {
    libraries: Vec<Arc<Library>>,
    accessor: Arc<dyn PathAccessor>,
    resolver: Option<Box<dyn LibraryResolver>>,
    observers: Vec<Arc<dyn ExecutionObserver>>,
    config: EngineConfig,
}

impl DecisionEngine {
    /// Create an engine over root libraries
    pub fn new(libraries: Vec<Arc<Library>>, accessor: Arc<dyn PathAccessor>) -> Self {
        Self {
            libraries,
            accessor,
            resolver: None,
            observers: Vec::new(),
            config: EngineConfig::default(),
        }
    }

    /// Builder: resolve `include` entries through this resolver
    pub fn with_resolver(mut self, resolver: impl LibraryResolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Builder: attach an observer to every context this engine opens
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run protocols and rules, returning proposals and issues in the order
    /// they were produced; a debug session comes last when `_debug` is set.
    ///
    /// The caller's subject is never modified.
    pub fn execute(
        &self,
        subject: &Value,
        parameters: &ExecutionParameters,
    ) -> EngineResult<Vec<EngineOutput>> {
        let ctx = self.open(subject, parameters, ExecutionMode::Execute)?;
        self.run(&ctx, parameters)?;
        let outcome = ctx.close();
        info!(outputs = outcome.outputs.len(), "execute finished");
        Ok(outcome.outputs)
    }

    /// Run rules only and return the detected issues.
    ///
    /// Configured analysis fields (`analysis.writable_fields`) written by the
    /// rules are copied back onto `subject`; every other field is left as
    /// it was.
    pub fn analyze(
        &self,
        subject: &mut Value,
        parameters: &ExecutionParameters,
    ) -> EngineResult<Vec<DetectedIssue>> {
        let ctx = self.open(subject, parameters, ExecutionMode::Analyze)?;
        self.run(&ctx, parameters)?;
        let outcome = ctx.close();

        for field in &self.config.analysis.writable_fields {
            let path = ObjectPath::parse(field)?;
            if let Some(value) = self.accessor.get(&outcome.subject, &path) {
                self.accessor.set(subject, &path, value.clone())?;
            }
        }

        let issues: Vec<_> = outcome
            .outputs
            .iter()
            .filter_map(|o| o.as_issue().cloned())
            .collect();
        info!(issues = issues.len(), "analyze finished");
        Ok(issues)
    }

    /// Check the scoped library set without evaluating anything
    ///
    /// Compiles every expression ahead of time; unresolved includes and
    /// withdrawn libraries are reported rather than raised.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let libraries = self.collect_libraries(|library, reference, error| {
            issues.push(ValidationIssue {
                severity: Severity::Error,
                definition: library.reference(),
                message: format!("include {}: {}", reference, error),
            });
        });
        for library in &libraries {
            if library.meta.status.is_withdrawn() {
                issues.push(ValidationIssue {
                    severity: Severity::Warning,
                    definition: library.reference(),
                    message: format!("library is {} and refuses to run", library.meta.status),
                });
            }
        }
        issues.extend(validate_libraries(&libraries));
        issues
    }

    /// Root libraries followed by everything they include, de-duplicated
    pub fn scoped_libraries(&self) -> EngineResult<Vec<Arc<Library>>> {
        let mut failure = None;
        let libraries = self.collect_libraries(|_, _, error| {
            failure.get_or_insert(error);
        });
        match failure {
            Some(error) => Err(error),
            None => Ok(libraries),
        }
    }

    /// Breadth-first include walk; each library id is visited once, so
    /// include cycles terminate.
    fn collect_libraries(
        &self,
        mut on_unresolved: impl FnMut(&Library, &LibraryReference, EngineError),
    ) -> Vec<Arc<Library>> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<Arc<Library>> = self.libraries.iter().cloned().collect();
        let mut scoped = Vec::new();

        while let Some(library) = queue.pop_front() {
            if !seen.insert(library.id().to_string()) {
                continue;
            }
            for reference in &library.include {
                if let Some(known) = scoped
                    .iter()
                    .chain(queue.iter())
                    .find(|l: &&Arc<Library>| reference.matches(&l.meta))
                {
                    debug!(library = library.id(), include = known.id(), "include already scoped");
                    continue;
                }
                let resolved = match &self.resolver {
                    Some(resolver) => resolver.resolve(reference),
                    None => Err(EngineError::UnresolvedLibrary {
                        reference: reference.to_string(),
                    }),
                };
                match resolved {
                    Ok(included) => queue.push_back(included),
                    Err(error) => on_unresolved(&library, reference, error),
                }
            }
            scoped.push(library);
        }
        scoped
    }

    /// Scoped libraries that pass the lifecycle gate
    fn admitted_libraries(&self, policy: LifecyclePolicy) -> EngineResult<Vec<Arc<Library>>> {
        let mut admitted = Vec::new();
        for library in self.scoped_libraries()? {
            if policy.admit(&library.meta, DefinitionKind::Library)? == Admission::Run {
                admitted.push(library);
            }
        }
        Ok(admitted)
    }

    fn settings(
        &self,
        mode: ExecutionMode,
        parameters: &ExecutionParameters,
    ) -> EngineResult<ContextSettings> {
        Ok(ContextSettings {
            mode,
            max_depth: self.config.limits.max_depth,
            max_iterations: self.config.limits.max_iterations,
            id_key: self.config.model.id_key.clone(),
            protocols_key: self.config.model.protocols_key.clone(),
            proposal_backlink: self.config.backlink_path()?,
            allow_non_active: parameters.allows_non_active(),
            include_trial_use: parameters.is_debug(),
        })
    }

    fn open(
        &self,
        subject: &Value,
        parameters: &ExecutionParameters,
        mode: ExecutionMode,
    ) -> EngineResult<ExecutionContext> {
        let settings = self.settings(mode, parameters)?;
        let libraries = self.admitted_libraries(LifecyclePolicy::new(
            settings.allow_non_active,
            settings.include_trial_use,
        ))?;

        let mut builder = ExecutionContext::builder(self.accessor.deep_copy(subject), self.accessor.clone())
            .with_libraries(libraries)
            .with_settings(settings)
            .with_debug(parameters.is_debug());
        for observer in &self.observers {
            builder = builder.with_observer(observer.clone());
        }
        for (name, value) in parameters.variables() {
            builder = builder.with_variable(name.clone(), value.clone());
        }
        Ok(builder.open())
    }

    fn run(&self, ctx: &ExecutionContext, parameters: &ExecutionParameters) -> EngineResult<()> {
        let _root = ctx.enter_root()?;
        let subject_type = self
            .accessor
            .type_of(&ctx.subject().borrow())
            .map(str::to_string);

        for library in ctx.libraries() {
            let _library = ctx.enter_child(FrameOwner::Library(library.reference()))?;
            for block in &library.blocks {
                if block.applies_to(subject_type.as_deref()) {
                    self.run_block(ctx, block, parameters.scope())?;
                } else {
                    debug!(block = %block.meta.id, subject = ?subject_type, "block does not apply");
                }
            }
        }
        Ok(())
    }

    fn run_block(
        &self,
        ctx: &ExecutionContext,
        block: &LogicBlock,
        scope: Option<&str>,
    ) -> EngineResult<()> {
        let _block = ctx.enter_child(FrameOwner::LogicBlock(block.reference()))?;
        if let Some(guard) = &block.when {
            let applies = guard
                .evaluate_bool(ctx, "when", None)
                .map_err(|e| ctx.wrap_error(e))?;
            if !applies {
                debug!(block = %block.meta.id, "block guard not satisfied");
                return Ok(());
            }
        }

        for asset in &block.definitions {
            match asset {
                ComputableAsset::Rule(rule) => {
                    rule.compute(ctx)?;
                }
                ComputableAsset::Protocol(protocol) if ctx.mode() == ExecutionMode::Execute => {
                    if scope.map_or(true, |s| protocol.in_scope(s)) {
                        protocol.compute(ctx)?;
                    }
                }
                ComputableAsset::Protocol(_) | ComputableAsset::Fact(_) | ComputableAsset::Model(_) => {}
            }
        }
        Ok(())
    }
}
