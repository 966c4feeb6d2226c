// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Apple bundle primitives.
//!
//! A bundle is a directory with a well-defined structure holding an
//! `Info.plist` file. Applications (`.app`), frameworks (`.framework`) and
//! plugins (`.appex`, `.bundle`, `.plugin`, `.xpc`, ...) are all bundles.

mod directory_bundle;
pub use directory_bundle::*;

/// Denotes the type of a bundle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BundlePackageType {
    /// Application bundle.
    App,
    /// Framework bundle.
    Framework,
    /// Generic bundle. Plugins and app extensions land here.
    Bundle,
}

/// Directory names that are structural parts of a bundle.
///
/// These directories commonly hold an `Info.plist` (or a `Resources/Info.plist`)
/// and would be misidentified as shallow bundles if probed.
pub const STRUCTURAL_DIRECTORY_NAMES: &[&str] =
    &["Contents", "Resources", "Versions", "_CodeSignature"];

/// Whether a directory name is a structural part of a bundle.
///
/// Directories with these names are never bundles themselves.
pub fn is_structural_directory_name(name: &str) -> bool {
    STRUCTURAL_DIRECTORY_NAMES.contains(&name)
}
