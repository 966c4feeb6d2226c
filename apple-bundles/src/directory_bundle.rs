// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bundles backed by a directory.

use {
    crate::BundlePackageType,
    anyhow::{anyhow, Context, Result},
    std::path::{Path, PathBuf},
};

/// An Apple bundle backed by a filesystem directory.
///
/// Instances can represent any bundle flavor: macOS application bundles,
/// frameworks (and the versions within them), or generic bundles such as
/// plugins and app extensions.
#[derive(Clone, Debug)]
pub struct DirectoryBundle {
    /// Root directory of this bundle.
    root: PathBuf,

    /// Whether content lives directly in the root rather than `Contents/`.
    shallow: bool,

    package_type: BundlePackageType,

    /// Parsed `Info.plist` file.
    info_plist: plist::Dictionary,
}

impl DirectoryBundle {
    /// Probe a directory and open it as a bundle.
    ///
    /// A directory is a bundle when it carries an `Info.plist` in one of the
    /// well-known locations:
    ///
    /// * `Resources/Info.plist` for frameworks (and each framework version
    ///   under `Versions/`);
    /// * `Contents/Info.plist` for deep bundles (macOS applications, plugins);
    /// * `Info.plist` for shallow bundles (iOS style applications).
    ///
    /// The plist must parse as a dictionary. Errors otherwise.
    pub fn new_from_path(directory: &Path) -> Result<Self> {
        if !directory.is_dir() {
            return Err(anyhow!("{} is not a directory", directory.display()));
        }

        let root_name = directory
            .file_name()
            .ok_or_else(|| anyhow!("unable to resolve root directory name"))?
            .to_string_lossy()
            .to_string();

        let framework_plist = directory.join("Resources").join("Info.plist");
        let deep_plist = directory.join("Contents").join("Info.plist");
        let shallow_plist = directory.join("Info.plist");

        // The framework probe comes first: a framework's `Resources/` directory
        // would otherwise pass as a shallow bundle.
        let (package_type, shallow, plist_path) = if framework_plist.is_file() {
            (BundlePackageType::Framework, true, framework_plist)
        } else if deep_plist.is_file() {
            (Self::type_from_name(&root_name), false, deep_plist)
        } else if shallow_plist.is_file() {
            (Self::type_from_name(&root_name), true, shallow_plist)
        } else {
            return Err(anyhow!(
                "Info.plist not found in {}; not a valid bundle",
                directory.display()
            ));
        };

        let value = plist::Value::from_file(&plist_path)
            .with_context(|| format!("parsing {}", plist_path.display()))?;
        let info_plist = value
            .into_dictionary()
            .ok_or_else(|| anyhow!("{} is not a dictionary", plist_path.display()))?;

        Ok(Self {
            root: directory.to_path_buf(),
            shallow,
            package_type,
            info_plist,
        })
    }

    /// Whether a directory carries an `Info.plist` where a bundle would.
    ///
    /// The plist is not parsed.
    pub fn has_info_plist(directory: &Path) -> bool {
        [
            directory.join("Resources").join("Info.plist"),
            directory.join("Contents").join("Info.plist"),
            directory.join("Info.plist"),
        ]
        .iter()
        .any(|path| path.is_file())
    }

    fn type_from_name(root_name: &str) -> BundlePackageType {
        if root_name.ends_with(".app") {
            BundlePackageType::App
        } else if root_name.ends_with(".framework") {
            BundlePackageType::Framework
        } else {
            BundlePackageType::Bundle
        }
    }

    /// Resolve the absolute path to a file in the bundle's content directory.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        if self.shallow {
            self.root.join(path.as_ref())
        } else {
            self.root.join("Contents").join(path.as_ref())
        }
    }

    /// The root directory of this bundle.
    pub fn root_dir(&self) -> &Path {
        &self.root
    }

    pub fn package_type(&self) -> BundlePackageType {
        self.package_type
    }

    /// Obtain an `Info.plist` key as a `String`.
    ///
    /// Returns `None` if the key doesn't exist. Errors if the value is not a
    /// string.
    pub fn info_plist_key_string(&self, key: &str) -> Result<Option<String>> {
        match self.info_plist.get(key) {
            Some(value) => Ok(Some(
                value
                    .as_string()
                    .ok_or_else(|| anyhow!("key {} is not a string", key))?
                    .to_string(),
            )),
            None => Ok(None),
        }
    }

    /// Obtain the name of the main executable (`CFBundleExecutable`).
    pub fn main_executable(&self) -> Result<Option<String>> {
        self.info_plist_key_string("CFBundleExecutable")
    }

    /// Resolve the absolute path of the main executable.
    ///
    /// Deep bundles keep it in `Contents/MacOS/`. Shallow bundles and
    /// framework versions keep it in the root. The file is not required to
    /// exist.
    pub fn main_executable_path(&self) -> Result<Option<PathBuf>> {
        Ok(self.main_executable()?.map(|main| {
            if self.shallow {
                self.resolve_path(main)
            } else {
                self.resolve_path(Path::new("MacOS").join(main))
            }
        }))
    }

    /// Whether this bundle is a version within a framework bundle.
    ///
    /// This is true for frameworks whose parent directory is `Versions`.
    pub fn is_framework_version(&self) -> bool {
        self.package_type == BundlePackageType::Framework
            && self
                .root
                .parent()
                .and_then(|parent| parent.file_name())
                .map(|name| name == "Versions")
                .unwrap_or(false)
    }
}
