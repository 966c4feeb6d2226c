// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Invocation of the platform code signing tool. */

use {
    crate::{
        error::SigningError,
        identity::SigningIdentity,
        target::{SigningTarget, TargetKind},
    },
    std::{
        ffi::OsString,
        path::{Path, PathBuf},
    },
    tokio_util::sync::CancellationToken,
};

/// Exit status and captured output of one signing invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InvocationOutput {
    /// Whether the process exited successfully.
    pub success: bool,
    /// The process exit code, if it exited normally.
    pub code: Option<i32>,
    /// Combined stdout and stderr.
    pub output: String,
}

/// Something that can apply a signature to a single target.
///
/// Implementations perform exactly one signing operation per call and must
/// not retry. `Err` means the signing mechanism could not be launched at
/// all; a mechanism that ran and failed is reported through
/// [InvocationOutput::success].
pub trait SignatureInvoker {
    /// Name of the program performing the signing, for diagnostics.
    fn program_name(&self) -> String;

    fn invoke(
        &self,
        target: &SigningTarget,
        identity: &SigningIdentity,
    ) -> std::io::Result<InvocationOutput>;
}

/// Why a signing invocation failed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Diagnostic {
    /// The tool ran and exited unsuccessfully.
    ExitStatus { code: Option<i32>, output: String },
    /// The tool could not be started (missing, permission denied, ...).
    Launch { program: String, message: String },
}

impl Diagnostic {
    /// Convert into the error reported for the failing target.
    pub fn into_error(self, path: &Path) -> SigningError {
        match self {
            Self::ExitStatus { code, output } => SigningError::ToolFailed {
                path: path.to_path_buf(),
                code,
                output,
            },
            Self::Launch { program, message } => SigningError::ToolLaunch {
                path: path.to_path_buf(),
                program,
                message,
            },
        }
    }
}

/// Outcome status of signing a single target.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SigningStatus {
    Signed,
    Failed(Diagnostic),
    /// Not attempted because the run was cancelled.
    Skipped,
}

/// The outcome of signing a single target.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SigningResult {
    pub path: PathBuf,
    pub kind: TargetKind,
    pub status: SigningStatus,
}

impl SigningResult {
    pub fn skipped(target: &SigningTarget) -> Self {
        Self {
            path: target.path().to_path_buf(),
            kind: target.kind(),
            status: SigningStatus::Skipped,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.status == SigningStatus::Signed
    }
}

/// Sign a single target.
///
/// Nothing is launched if `cancel` has already fired. Once launched, the
/// invocation runs to completion.
pub fn sign_target(
    invoker: &dyn SignatureInvoker,
    target: &SigningTarget,
    identity: &SigningIdentity,
    cancel: &CancellationToken,
) -> SigningResult {
    if cancel.is_cancelled() {
        return SigningResult::skipped(target);
    }

    let status = match invoker.invoke(target, identity) {
        Ok(output) if output.success => SigningStatus::Signed,
        Ok(output) => SigningStatus::Failed(Diagnostic::ExitStatus {
            code: output.code,
            output: output.output,
        }),
        Err(e) => SigningStatus::Failed(Diagnostic::Launch {
            program: invoker.program_name(),
            message: e.to_string(),
        }),
    };

    SigningResult {
        path: target.path().to_path_buf(),
        kind: target.kind(),
        status,
    }
}

/// Signs targets by running Apple's `codesign` tool.
///
/// Existing signatures are always replaced (`-f`), so signing an already
/// signed target succeeds.
#[derive(Clone, Debug)]
pub struct CodesignInvoker {
    /// Kept as a string so a bare name is resolved through `PATH`.
    program: OsString,
    entitlements: Option<PathBuf>,
    hardened_runtime: bool,
    timestamp: bool,
    extra_args: Vec<String>,
}

impl Default for CodesignInvoker {
    fn default() -> Self {
        Self {
            program: OsString::from("codesign"),
            entitlements: None,
            hardened_runtime: true,
            timestamp: true,
            extra_args: vec![],
        }
    }
}

impl CodesignInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a different program instead of `codesign` from `PATH`.
    pub fn program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    /// Embed the entitlements plist at `path` in every signature.
    pub fn entitlements(mut self, path: impl Into<PathBuf>) -> Self {
        self.entitlements = Some(path.into());
        self
    }

    /// Whether to enable the hardened runtime (`--options runtime`).
    pub fn hardened_runtime(mut self, enabled: bool) -> Self {
        self.hardened_runtime = enabled;
        self
    }

    /// Whether to request a secure timestamp.
    ///
    /// Never requested for ad-hoc signatures.
    pub fn timestamp(mut self, enabled: bool) -> Self {
        self.timestamp = enabled;
        self
    }

    /// Append an argument before the target path.
    pub fn extra_arg(mut self, arg: impl ToString) -> Self {
        self.extra_args.push(arg.to_string());
        self
    }

    /// The arguments `codesign` is invoked with to sign `target`.
    pub fn arguments(&self, target: &SigningTarget, identity: &SigningIdentity) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-s".into(),
            identity.as_str().into(),
            "-f".into(),
            "-v".into(),
        ];

        if self.timestamp && !identity.is_ad_hoc() {
            args.push("--timestamp".into());
        } else {
            args.push("--timestamp=none".into());
        }

        if self.hardened_runtime {
            args.push("--options".into());
            args.push("runtime".into());
        }

        if let Some(entitlements) = &self.entitlements {
            args.push("--entitlements".into());
            args.push(entitlements.into());
        }

        args.extend(self.extra_args.iter().map(OsString::from));
        args.push(target.path().into());

        args
    }
}

impl SignatureInvoker for CodesignInvoker {
    fn program_name(&self) -> String {
        self.program.to_string_lossy().to_string()
    }

    fn invoke(
        &self,
        target: &SigningTarget,
        identity: &SigningIdentity,
    ) -> std::io::Result<InvocationOutput> {
        let output = duct::cmd(self.program.clone(), self.arguments(target, identity))
            .stderr_to_stdout()
            .stdout_capture()
            .unchecked()
            .run()?;

        Ok(InvocationOutput {
            success: output.status.success(),
            code: output.status.code(),
            output: String::from_utf8_lossy(&output.stdout).to_string(),
        })
    }
}
