// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Signing runs over a set of input paths.

use {
    crate::{
        discovery::discover,
        error::SigningError,
        identity::SigningIdentity,
        invoker::{
            sign_target, CodesignInvoker, Diagnostic, SignatureInvoker, SigningResult,
            SigningStatus,
        },
        ordering::signing_order,
        target::SigningTarget,
    },
    slog::{debug, error, info, o, warn},
    std::{
        collections::HashSet,
        io::Write,
        path::{Path, PathBuf},
    },
    tokio_util::sync::CancellationToken,
};

/// What to do when an input fails to sign.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailurePolicy {
    /// Stop the whole run at the first failure.
    FailFast,
    /// Abandon the failing input but still process later inputs.
    ///
    /// The run still fails at the end, reporting every failure.
    ContinueAcrossRoots,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::FailFast
    }
}

/// Inputs to a signing run.
pub struct SigningOptions<'a> {
    /// Files and bundles to sign, processed in order.
    pub files: Vec<PathBuf>,
    /// Raw signing identity string. Validated before any work happens.
    pub identity: String,
    /// Receives human-readable progress.
    pub output: &'a mut dyn Write,
    pub logger: slog::Logger,
    pub policy: FailurePolicy,
}

impl<'a> SigningOptions<'a> {
    pub fn new(
        files: impl IntoIterator<Item = impl Into<PathBuf>>,
        identity: impl ToString,
        output: &'a mut dyn Write,
        logger: slog::Logger,
    ) -> Self {
        Self {
            files: files.into_iter().map(|p| p.into()).collect(),
            identity: identity.to_string(),
            output,
            logger,
            policy: FailurePolicy::default(),
        }
    }

    pub fn policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// How a run ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verdict {
    Success,
    Failure,
    Cancelled,
}

/// Progress of a signing run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunState {
    NotStarted,
    Discovering,
    Ordering,
    /// Invoking the signer for the target at this run-wide index.
    Signing(usize),
    Done(Verdict),
}

/// Everything a single run produced.
#[derive(Debug)]
pub struct RunOutcome {
    results: Vec<SigningResult>,
    state: RunState,
    error: Option<SigningError>,
}

impl RunOutcome {
    /// Per-target results in the order targets were processed.
    pub fn results(&self) -> &[SigningResult] {
        &self.results
    }

    /// The terminal state of the run.
    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn verdict(&self) -> Verdict {
        match self.state {
            RunState::Done(verdict) => verdict,
            _ => Verdict::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        self.verdict() == Verdict::Success
    }

    /// Paths that were signed during the run.
    pub fn signed_paths(&self) -> Vec<&Path> {
        self.results
            .iter()
            .filter(|r| r.is_signed())
            .map(|r| r.path.as_path())
            .collect()
    }

    pub fn error(&self) -> Option<&SigningError> {
        self.error.as_ref()
    }

    pub fn into_result(self) -> Result<(), SigningError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Why signing of one root stopped early.
enum RootStop {
    /// The root failed; the run may continue depending on policy.
    Failed(SigningError),
    /// The run must end now.
    Abort(SigningError),
}

/// Drives signing runs through a [SignatureInvoker].
pub struct Signer<I> {
    invoker: I,
}

impl Default for Signer<CodesignInvoker> {
    fn default() -> Self {
        Self::new(CodesignInvoker::default())
    }
}

impl<I: SignatureInvoker> Signer<I> {
    pub fn new(invoker: I) -> Self {
        Self { invoker }
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    /// Sign every input, returning only the terminal error.
    pub fn sign(
        &self,
        cancel: &CancellationToken,
        options: &mut SigningOptions,
    ) -> Result<(), SigningError> {
        self.run(cancel, options).into_result()
    }

    /// Sign every input and report everything that happened.
    pub fn run(&self, cancel: &CancellationToken, options: &mut SigningOptions) -> RunOutcome {
        let mut run = Run {
            invoker: &self.invoker,
            cancel,
            logger: options.logger.clone(),
            output: &mut *options.output,
            results: vec![],
            state: RunState::NotStarted,
            signed: HashSet::new(),
            invocations: 0,
        };

        let error = run.execute(&options.files, &options.identity, options.policy);

        let verdict = match &error {
            None => Verdict::Success,
            Some(e) if e.is_cancelled() => Verdict::Cancelled,
            Some(_) => Verdict::Failure,
        };
        run.transition(RunState::Done(verdict));

        RunOutcome {
            results: run.results,
            state: run.state,
            error,
        }
    }
}

/// Sign files with `codesign`.
///
/// This is the main entry point. Targets are discovered beneath every input
/// and signed innermost first. The first failure ends the run unless
/// [SigningOptions::policy] says otherwise. Targets signed before a failure
/// or cancellation stay signed.
pub fn sign(cancel: &CancellationToken, options: &mut SigningOptions) -> Result<(), SigningError> {
    Signer::default().sign(cancel, options)
}

struct Run<'r, I> {
    invoker: &'r I,
    cancel: &'r CancellationToken,
    logger: slog::Logger,
    output: &'r mut dyn Write,
    results: Vec<SigningResult>,
    state: RunState,
    /// Paths signed so far. Prevents signing a path twice in one run.
    signed: HashSet<PathBuf>,
    invocations: usize,
}

impl<'r, I: SignatureInvoker> Run<'r, I> {
    fn transition(&mut self, state: RunState) {
        debug!(self.logger, "state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn progress(&mut self, message: std::fmt::Arguments) -> Result<(), SigningError> {
        self.output
            .write_fmt(message)
            .and_then(|_| self.output.write_all(b"\n"))
            .map_err(SigningError::Output)
    }

    fn cancelled(&self, next: Option<&Path>) -> SigningError {
        warn!(self.logger, "signing cancelled");
        SigningError::Cancelled {
            next: next.map(|p| p.to_path_buf()),
        }
    }

    fn execute(
        &mut self,
        files: &[PathBuf],
        identity: &str,
        policy: FailurePolicy,
    ) -> Option<SigningError> {
        if self.cancel.is_cancelled() {
            return Some(self.cancelled(files.first().map(|p| p.as_path())));
        }

        let identity = match SigningIdentity::resolve(identity) {
            Ok(identity) => identity,
            Err(e) => {
                error!(self.logger, "{}", e);
                return Some(e);
            }
        };
        debug!(self.logger, "resolved signing identity"; "identity" => identity.as_str());

        let mut failures = vec![];

        for root in files {
            match self.sign_root(root, &identity) {
                Ok(()) => {}
                Err(RootStop::Abort(e)) => {
                    failures.push(e);
                    break;
                }
                Err(RootStop::Failed(e)) => {
                    failures.push(e);

                    if policy == FailurePolicy::FailFast {
                        break;
                    }
                }
            }
        }

        // A cancellation always wins over failures of earlier roots.
        if failures.last().map(|e| e.is_cancelled()).unwrap_or(false) {
            return failures.pop();
        }

        match failures.len() {
            0 => None,
            1 => failures.pop(),
            _ => Some(SigningError::Multiple(failures)),
        }
    }

    fn sign_root(&mut self, root: &Path, identity: &SigningIdentity) -> Result<(), RootStop> {
        let parent_logger = self.logger.clone();
        self.logger = parent_logger.new(o!("root" => root.display().to_string()));

        let res = self.sign_root_inner(root, identity);

        self.logger = parent_logger;
        res
    }

    fn sign_root_inner(&mut self, root: &Path, identity: &SigningIdentity) -> Result<(), RootStop> {
        if self.cancel.is_cancelled() {
            return Err(RootStop::Abort(self.cancelled(Some(root))));
        }

        self.transition(RunState::Discovering);
        self.progress(format_args!("==> Signing {}", root.display()))
            .map_err(RootStop::Abort)?;

        let forest = discover(root).map_err(|e| {
            error!(self.logger, "discovery failed: {}", e);
            RootStop::Failed(e)
        })?;
        info!(self.logger, "discovered {} signable targets", forest.len());

        if self.cancel.is_cancelled() {
            return Err(RootStop::Abort(self.cancelled(Some(root))));
        }

        self.transition(RunState::Ordering);
        let order = signing_order(&forest);

        for (index, target) in order.iter().enumerate() {
            if self.signed.contains(target.path()) {
                debug!(self.logger, "already signed {}", target.path().display());
                continue;
            }

            if self.cancel.is_cancelled() {
                let signed = &self.signed;
                self.results.extend(
                    order[index..]
                        .iter()
                        .filter(|t| !signed.contains(t.path()))
                        .map(|t| SigningResult::skipped(t)),
                );
                return Err(RootStop::Abort(self.cancelled(Some(target.path()))));
            }

            self.sign_one(target, identity)?;
        }

        self.progress(format_args!("    Code signing successful"))
            .map_err(RootStop::Abort)?;

        Ok(())
    }

    fn sign_one(&mut self, target: &SigningTarget, identity: &SigningIdentity) -> Result<(), RootStop> {
        self.transition(RunState::Signing(self.invocations));
        self.invocations += 1;

        info!(
            self.logger,
            "signing {} {}",
            target.kind(),
            target.path().display();
            "path" => target.path().display().to_string()
        );
        self.progress(format_args!("    {}", target.path().display()))
            .map_err(RootStop::Abort)?;

        let result = sign_target(self.invoker, target, identity, self.cancel);

        let outcome = match &result.status {
            SigningStatus::Signed => {
                info!(self.logger, "signed {}", target.path().display());
                self.signed.insert(target.path().to_path_buf());
                Ok(())
            }
            SigningStatus::Failed(diagnostic) => {
                error!(self.logger, "failed to sign {}", target.path().display());
                if let Diagnostic::ExitStatus { output, .. } = diagnostic {
                    for line in output.lines() {
                        warn!(self.logger, "{}", line);
                    }
                }

                Err(RootStop::Failed(
                    diagnostic.clone().into_error(target.path()),
                ))
            }
            // Cancellation raced in between our check and the invocation.
            SigningStatus::Skipped => Err(RootStop::Abort(self.cancelled(Some(target.path())))),
        };

        self.results.push(result);

        outcome
    }
}
