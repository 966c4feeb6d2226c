// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::{
        identity::SigningIdentity,
        invoker::{InvocationOutput, SignatureInvoker},
        target::SigningTarget,
    },
    anyhow::Result,
    goblin::mach::header::{MH_DYLIB, MH_EXECUTE, MH_MAGIC_64},
    std::{
        cell::RefCell,
        path::{Path, PathBuf},
        sync::{Arc, Mutex},
    },
    tokio_util::sync::CancellationToken,
};

/// `CPU_TYPE_ARM64`.
const CPU_TYPE_ARM64: u32 = 0x0100_000c;

pub fn temp_dir() -> Result<(tempfile::TempDir, PathBuf)> {
    let td = tempfile::Builder::new()
        .prefix("bundle-signing-")
        .tempdir()?;
    let path = td.path().to_path_buf();

    Ok((td, path))
}

/// Write a little-endian 64-bit Mach-O header with the given file type.
///
/// Enough for header sniffing. Not a loadable binary.
pub fn write_macho(path: &Path, filetype: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut data = vec![];
    data.extend_from_slice(&MH_MAGIC_64.to_le_bytes());
    data.extend_from_slice(&CPU_TYPE_ARM64.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&filetype.to_le_bytes());
    data.resize(32, 0);

    std::fs::write(path, &data)?;

    Ok(())
}

pub fn write_info_plist(path: &Path, executable: Option<&str>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut dict = plist::Dictionary::new();
    dict.insert("CFBundleIdentifier".into(), "com.example.test".into());
    if let Some(exe) = executable {
        dict.insert("CFBundleExecutable".into(), exe.into());
    }
    plist::Value::Dictionary(dict).to_file_xml(path)?;

    Ok(())
}

/// Fabricates a macOS application bundle on disk.
///
/// Relative paths given to methods are relative to `Contents/`.
pub struct AppBuilder {
    root: PathBuf,
}

impl AppBuilder {
    pub fn new(dir: &Path, name: &str) -> Result<Self> {
        let root = dir.join(name);
        write_info_plist(&root.join("Contents").join("Info.plist"), None)?;

        Ok(Self { root })
    }

    fn contents(&self) -> PathBuf {
        self.root.join("Contents")
    }

    pub fn main_executable(self, name: &str) -> Result<Self> {
        write_info_plist(&self.contents().join("Info.plist"), Some(name))?;
        write_macho(&self.contents().join("MacOS").join(name), MH_EXECUTE)?;

        Ok(self)
    }

    pub fn executable(self, rel: &str) -> Result<Self> {
        write_macho(&self.contents().join(rel), MH_EXECUTE)?;

        Ok(self)
    }

    pub fn dylib(self, rel: &str) -> Result<Self> {
        write_macho(&self.contents().join(rel), MH_DYLIB)?;

        Ok(self)
    }

    pub fn resource(self, rel: &str) -> Result<Self> {
        let path = self.contents().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, b"resource data")?;

        Ok(self)
    }

    /// A framework under `Frameworks/` with no binaries.
    pub fn framework(self, name: &str) -> Result<Self> {
        let root = self.contents().join("Frameworks").join(name);
        write_info_plist(&root.join("Resources").join("Info.plist"), None)?;

        Ok(self)
    }

    /// A framework under `Frameworks/` with a `Versions/A` holding its binary.
    pub fn versioned_framework(self, name: &str, executable: &str) -> Result<Self> {
        let root = self.contents().join("Frameworks").join(name);
        write_info_plist(&root.join("Resources").join("Info.plist"), Some(executable))?;

        let version = root.join("Versions").join("A");
        write_info_plist(
            &version.join("Resources").join("Info.plist"),
            Some(executable),
        )?;
        write_macho(&version.join(executable), MH_DYLIB)?;

        Ok(self)
    }

    /// A deep plugin bundle (e.g. `PlugIns/Foo.appex`).
    pub fn plugin(self, rel: &str) -> Result<Self> {
        write_info_plist(
            &self.contents().join(rel).join("Contents").join("Info.plist"),
            None,
        )?;

        Ok(self)
    }

    pub fn build(self) -> PathBuf {
        self.root
    }
}

/// A [SignatureInvoker] that records invocations instead of signing.
#[derive(Default)]
pub struct RecordingInvoker {
    calls: RefCell<Vec<(PathBuf, String)>>,
    fail_path: Option<PathBuf>,
    launch_failure: bool,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a non-zero exit for the target at `path`.
    pub fn fail_on(mut self, path: impl Into<PathBuf>) -> Self {
        self.fail_path = Some(path.into());
        self
    }

    /// Report a launch failure for every invocation.
    pub fn launch_failure(mut self) -> Self {
        self.launch_failure = true;
        self
    }

    /// Cancel `token` once `count` invocations have completed.
    pub fn cancel_after(mut self, count: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((count, token));
        self
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.calls.borrow().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn identities(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|(_, i)| i.clone()).collect()
    }
}

impl SignatureInvoker for RecordingInvoker {
    fn program_name(&self) -> String {
        "fake-codesign".to_string()
    }

    fn invoke(
        &self,
        target: &SigningTarget,
        identity: &SigningIdentity,
    ) -> std::io::Result<InvocationOutput> {
        if self.launch_failure {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such file or directory",
            ));
        }

        self.calls
            .borrow_mut()
            .push((target.path().to_path_buf(), identity.to_string()));

        if let Some((count, token)) = &self.cancel_after {
            if self.calls.borrow().len() == *count {
                token.cancel();
            }
        }

        if self.fail_path.as_deref() == Some(target.path()) {
            Ok(InvocationOutput {
                success: false,
                code: Some(1),
                output: format!("{}: errSecInternalComponent\n", target.path().display()),
            })
        } else {
            Ok(InvocationOutput {
                success: true,
                code: Some(0),
                output: format!("{}: signed Mach-O thin (arm64)\n", target.path().display()),
            })
        }
    }
}

/// A slog Drain capturing formatted messages.
#[derive(Clone, Default)]
pub struct CaptureDrain {
    pub messages: Arc<Mutex<Vec<(slog::Level, String)>>>,
}

impl slog::Drain for CaptureDrain {
    type Ok = ();
    type Err = slog::Never;

    fn log(
        &self,
        record: &slog::Record,
        _values: &slog::OwnedKVList,
    ) -> Result<Self::Ok, Self::Err> {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((record.level(), record.msg().to_string()));
        }

        Ok(())
    }
}

impl CaptureDrain {
    pub fn logger(&self) -> slog::Logger {
        slog::Logger::root(self.clone(), slog::o!())
    }

    pub fn messages_at(&self, level: slog::Level) -> Vec<String> {
        self.messages
            .lock()
            .map(|messages| {
                messages
                    .iter()
                    .filter(|(l, _)| *l == level)
                    .map(|(_, m)| m.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub fn discard_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}
