// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Signing targets and the containment forest they form.

use {
    apple_bundles::BundlePackageType,
    std::path::{Path, PathBuf},
};

/// The kind of entity a [SigningTarget] refers to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TargetKind {
    /// A standalone Mach-O executable.
    Executable,
    /// A Mach-O dynamic library or loadable bundle file.
    DynamicLibrary,
    /// An application or plugin bundle directory.
    Bundle,
    /// A framework bundle directory.
    Framework,
}

impl TargetKind {
    /// Whether this kind is a directory that can contain other targets.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Bundle | Self::Framework)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Executable => "executable",
            Self::DynamicLibrary => "dynamic library",
            Self::Bundle => "bundle",
            Self::Framework => "framework",
        }
    }
}

impl From<BundlePackageType> for TargetKind {
    fn from(v: BundlePackageType) -> Self {
        match v {
            BundlePackageType::Framework => Self::Framework,
            BundlePackageType::App | BundlePackageType::Bundle => Self::Bundle,
        }
    }
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index of a target within its [TargetForest].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TargetId(usize);

impl TargetId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A filesystem entity eligible for a code signature.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SigningTarget {
    path: PathBuf,
    kind: TargetKind,
    parent: Option<TargetId>,
}

impl SigningTarget {
    /// Absolute path of this target.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    /// The smallest enclosing bundle, or `None` for a top-level input.
    pub fn parent(&self) -> Option<TargetId> {
        self.parent
    }
}

/// Signing targets related by filesystem containment.
///
/// Targets are stored in discovery order. A target's parent is always added
/// before the target itself, so parents have smaller indices than children.
#[derive(Clone, Debug, Default)]
pub struct TargetForest {
    targets: Vec<SigningTarget>,
}

impl TargetForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a target and obtain its identifier.
    ///
    /// # Panics
    ///
    /// If `parent` doesn't refer to a container already in this forest.
    pub fn add(
        &mut self,
        path: impl Into<PathBuf>,
        kind: TargetKind,
        parent: Option<TargetId>,
    ) -> TargetId {
        if let Some(parent) = parent {
            assert!(
                self.targets[parent.0].kind.is_container(),
                "parent target must be a bundle"
            );
        }

        let id = TargetId(self.targets.len());
        self.targets.push(SigningTarget {
            path: path.into(),
            kind,
            parent,
        });

        id
    }

    pub fn get(&self, id: TargetId) -> Option<&SigningTarget> {
        self.targets.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Iterate targets in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (TargetId, &SigningTarget)> + '_ {
        self.targets
            .iter()
            .enumerate()
            .map(|(i, target)| (TargetId(i), target))
    }
}
