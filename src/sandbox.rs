//! The sandbox facade
//!
//! [`Sandbox`] composes the pipeline every command goes through: parse,
//! hold/release classification, rule evaluation (per sub-command and per
//! referenced external path), interactive escalation, and finally
//! supervised execution. Policy refusals come back as
//! [`ExecutionReport::Denied`]; only infrastructure failures (a process
//! that could not be spawned) surface as errors.
//!
//! The pipeline fails closed: an unparseable command, an ask with no
//! handler configured, and a handler error all deny.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio_util::sync::CancellationToken;

use crate::core::{
    create_event_channel, EventReceiver, EventSender, ExecutionOutcome, ExecutionReport,
    ExecutionRequest, Refusal, SandboxResult,
};
use crate::escalation::{EscalationDecision, EscalationHandler, EscalationRequest, Generalizer};
use crate::hold::{classify, ExecMode, HoldModeConfig};
use crate::parser::ParsedCommand;
use crate::rules::{
    evaluate, shared, DomainDefaults, PermissionRule, RuleAction, RuleOrigin, Ruleset,
    SharedRuleset,
};
use crate::supervisor::{platform_killer, Supervisor};

/// Command-execution sandbox with layered permissions
pub struct Sandbox {
    rules: SharedRuleset,
    defaults: DomainDefaults,
    hold_config: HoldModeConfig,
    mode: RwLock<ExecMode>,
    handler: Option<Arc<dyn EscalationHandler>>,
    generalizer: Generalizer,
    events: EventSender,
    supervisor: Supervisor,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Sandbox {
    /// A sandbox with base defaults, security defaults, release mode and no
    /// escalation handler (asks fail closed until one is configured)
    pub fn new() -> Self {
        let mut ruleset = Ruleset::base_defaults();
        ruleset.merge_security_defaults(Ruleset::security_defaults());

        let events = create_event_channel();
        let supervisor = Supervisor::new(events.clone(), platform_killer());
        Self {
            rules: shared(ruleset),
            defaults: DomainDefaults::new(),
            hold_config: HoldModeConfig::default(),
            mode: RwLock::new(ExecMode::Release),
            handler: None,
            generalizer: Generalizer::default(),
            events,
            supervisor,
        }
    }

    /// Layer user rules: base defaults, then the user set, then security
    /// defaults for the domains the user left unconfigured
    pub fn with_rules(self, user: Ruleset) -> Self {
        let mut ruleset = Ruleset::base_defaults();
        ruleset.merge(user);
        ruleset.merge_security_defaults(Ruleset::security_defaults());
        Self {
            rules: shared(ruleset),
            ..self
        }
    }

    /// Install the escalation handler invoked for "ask" resolutions
    pub fn with_handler(mut self, handler: Arc<dyn EscalationHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Replace the hold/release classifier configuration
    pub fn with_hold_config(mut self, config: HoldModeConfig) -> Self {
        self.hold_config = config;
        self
    }

    /// Set the initial operating mode
    pub fn with_mode(self, mode: ExecMode) -> Self {
        Self {
            mode: RwLock::new(mode),
            ..self
        }
    }

    /// Replace the per-domain fallback defaults
    pub fn with_defaults(mut self, defaults: DomainDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Replace the "always" pattern generalizer
    pub fn with_generalizer(mut self, generalizer: Generalizer) -> Self {
        self.generalizer = generalizer;
        self
    }

    /// The current operating mode
    pub fn mode(&self) -> ExecMode {
        *read_lock(&self.mode)
    }

    /// Switch between hold and release at runtime
    pub fn set_mode(&self, mode: ExecMode) {
        tracing::info!("[Sandbox] Switching to {:?} mode", mode);
        *write_lock(&self.mode) = mode;
    }

    /// Handle to the live ruleset (session rules appear here as they are
    /// approved)
    pub fn rules(&self) -> SharedRuleset {
        Arc::clone(&self.rules)
    }

    /// Subscribe to progress events for running executions
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Run one command through the full pipeline
    ///
    /// Cancelling `cancel` while an escalation is pending abandons the
    /// invocation without spawning anything; cancelling during execution
    /// kills the process tree.
    pub async fn execute(
        &self,
        request: ExecutionRequest,
        cancel: &CancellationToken,
    ) -> SandboxResult<ExecutionReport> {
        if request.timeout_ms == 0 {
            return Err(crate::core::SandboxError::invalid_config(
                "timeout_ms must be nonzero",
            ));
        }

        let parsed = match ParsedCommand::parse(&request.command, &request.cwd) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::info!("[Sandbox] Refusing unparseable command: {}", e);
                return Ok(ExecutionReport::Denied(Refusal::new(
                    "bash",
                    format!("Refusing to execute an unparseable command: {e}"),
                )));
            }
        };

        let verdict = classify(&parsed, self.mode(), &self.hold_config);
        if verdict.blocked {
            let reason = verdict
                .reason
                .unwrap_or_else(|| "Blocked in hold mode".to_string());
            let mut refusal = Refusal::new("bash", reason);
            if let Some(pattern) = verdict.matched_pattern {
                refusal = refusal.with_pattern(pattern);
            }
            return Ok(ExecutionReport::Denied(refusal));
        }

        // Resolve every sub-command and external path against the rules
        // under one read guard, collecting asks per permission domain. The
        // guard is dropped before any await point.
        let mut asks: Vec<PendingAsk> = Vec::new();
        {
            let rules = read_lock(&self.rules);

            for signature in parsed.signatures() {
                let eval = evaluate("bash", &signature, &rules, &self.defaults);
                match eval.action {
                    RuleAction::Allow => {}
                    RuleAction::Deny => {
                        tracing::info!("[Sandbox] Denied by rule: {}", signature);
                        let mut refusal = Refusal::new(
                            "bash",
                            format!("'{signature}' is denied by a permission rule"),
                        );
                        if let Some(pattern) = eval.matched_pattern {
                            refusal = refusal.with_pattern(pattern);
                        }
                        return Ok(ExecutionReport::Denied(refusal));
                    }
                    RuleAction::Ask => {
                        let always = self.generalizer.generalize(&signature);
                        push_ask(&mut asks, "bash", signature, vec![always]);
                    }
                }
            }

            let cwd = request
                .cwd
                .canonicalize()
                .unwrap_or_else(|_| request.cwd.clone());
            for path in &parsed.referenced_paths {
                if path.starts_with(&cwd) {
                    continue;
                }
                let candidate = path.display().to_string();
                let eval = evaluate("external_directory", &candidate, &rules, &self.defaults);
                match eval.action {
                    RuleAction::Allow => {}
                    RuleAction::Deny => {
                        tracing::info!("[Sandbox] External path denied: {}", candidate);
                        let mut refusal = Refusal::new(
                            "external_directory",
                            format!(
                                "Access to '{candidate}' outside the working directory is denied"
                            ),
                        );
                        if let Some(pattern) = eval.matched_pattern {
                            refusal = refusal.with_pattern(pattern);
                        }
                        return Ok(ExecutionReport::Denied(refusal));
                    }
                    RuleAction::Ask => {
                        // An "always" approval covers the exact path and its
                        // subtree, bounded at the path-component separator so
                        // siblings sharing the prefix still ask
                        let always = vec![candidate.clone(), format!("{candidate}/*")];
                        push_ask(&mut asks, "external_directory", candidate, always);
                    }
                }
            }
        }

        for ask in asks {
            let handler = match &self.handler {
                Some(handler) => Arc::clone(handler),
                None => {
                    tracing::warn!(
                        "[Sandbox] Approval required for {} but no escalation handler is configured",
                        ask.permission
                    );
                    return Ok(ExecutionReport::Denied(Refusal::new(
                        ask.permission,
                        "Approval is required but no escalation handler is configured",
                    )));
                }
            };

            let escalation = EscalationRequest {
                permission: ask.permission.to_string(),
                patterns: ask.patterns,
                always_patterns: ask.always_patterns.clone(),
                description: request.description.clone(),
            };
            let decision = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("[Sandbox] Cancelled while awaiting approval");
                    return Ok(ExecutionReport::Completed(
                        ExecutionOutcome::aborted_before_spawn(),
                    ));
                }
                result = handler.ask(escalation) => match result {
                    Ok(decision) => decision,
                    Err(e) => {
                        tracing::warn!("[Sandbox] Escalation handler failed, denying: {}", e);
                        return Ok(ExecutionReport::Denied(Refusal::new(
                            ask.permission,
                            format!("Escalation failed: {e}"),
                        )));
                    }
                },
            };

            match decision {
                EscalationDecision::Deny => {
                    return Ok(ExecutionReport::Denied(Refusal::new(
                        ask.permission,
                        "Approval was not granted",
                    )));
                }
                EscalationDecision::AllowOnce => {}
                EscalationDecision::AllowAlways => {
                    let mut rules = write_lock(&self.rules);
                    for pattern in &ask.always_patterns {
                        rules.push(
                            PermissionRule::new(ask.permission, pattern.clone(), RuleAction::Allow)
                                .with_origin(RuleOrigin::Session),
                        );
                    }
                }
            }
        }

        let outcome = self.supervisor.supervise(&request, cancel).await?;
        Ok(ExecutionReport::Completed(outcome))
    }
}

/// Outstanding approvals for one permission domain
struct PendingAsk {
    permission: &'static str,
    patterns: Vec<String>,
    always_patterns: Vec<String>,
}

fn push_ask(
    asks: &mut Vec<PendingAsk>,
    permission: &'static str,
    pattern: String,
    always: Vec<String>,
) {
    let idx = match asks.iter().position(|a| a.permission == permission) {
        Some(idx) => idx,
        None => {
            asks.push(PendingAsk {
                permission,
                patterns: Vec::new(),
                always_patterns: Vec::new(),
            });
            asks.len() - 1
        }
    };
    let entry = &mut asks[idx];
    if !entry.patterns.contains(&pattern) {
        entry.patterns.push(pattern);
    }
    for pattern in always {
        if !entry.always_patterns.contains(&pattern) {
            entry.always_patterns.push(pattern);
        }
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
