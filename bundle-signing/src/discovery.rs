// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Discovery of signable content beneath an input path.

use {
    crate::{
        error::SigningError,
        target::{TargetForest, TargetId, TargetKind},
    },
    apple_bundles::{is_structural_directory_name, DirectoryBundle},
    goblin::mach::{
        fat::FAT_MAGIC,
        header::{Header, MH_BUNDLE, MH_DYLIB, SIZEOF_HEADER_64},
        parse_magic_and_ctx,
    },
    scroll::Pread,
    std::{
        collections::HashSet,
        io::Read,
        path::{Path, PathBuf},
    },
};

/// Universal binaries with more architectures than this are assumed to be
/// something else sharing the magic (Java class files).
const MAX_FAT_ARCHES: u32 = 32;

/// Magic of universal binaries with 64-bit offsets.
const FAT_MAGIC_64: u32 = 0xcafe_babf;

/// Discover every signable entity at or beneath a path.
///
/// A file is a single target. A directory must be a bundle; it is recorded
/// along with every nested bundle and Mach-O binary inside it, each pointing
/// at its innermost enclosing bundle.
///
/// Symlinks are not followed. Any failure discards the entire result.
pub fn discover(root: impl AsRef<Path>) -> Result<TargetForest, SigningError> {
    let root = root.as_ref();

    let metadata = match root.symlink_metadata() {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SigningError::PathNotFound(root.to_path_buf()));
        }
        Err(e) => return Err(SigningError::DiscoveryIo(root.to_path_buf(), e)),
    };

    let canonical = std::fs::canonicalize(root)
        .map_err(|e| SigningError::DiscoveryIo(root.to_path_buf(), e))?;

    let mut discoverer = Discoverer::default();

    if metadata.is_dir() || (metadata.file_type().is_symlink() && canonical.is_dir()) {
        let bundle = DirectoryBundle::new_from_path(&canonical).map_err(|e| {
            if DirectoryBundle::has_info_plist(&canonical) {
                SigningError::DirectoryBundle(root.to_path_buf(), e)
            } else {
                SigningError::NotSignable(root.to_path_buf())
            }
        })?;

        discoverer.walk_bundle(&bundle, None)?;
    } else if canonical.is_file() {
        let kind = macho_kind(&canonical)?.unwrap_or_else(|| kind_from_extension(&canonical));
        discoverer.forest.add(canonical, kind, None);
    } else {
        return Err(SigningError::NotSignable(root.to_path_buf()));
    }

    Ok(discoverer.forest)
}

#[derive(Default)]
struct Discoverer {
    forest: TargetForest,
    /// Paths sealed as part of a bundle's own signature.
    main_executables: HashSet<PathBuf>,
    /// Paths already recorded in `forest`.
    seen: HashSet<PathBuf>,
}

impl Discoverer {
    fn add(&mut self, path: &Path, kind: TargetKind, parent: Option<TargetId>) -> TargetId {
        self.seen.insert(path.to_path_buf());
        self.forest.add(path, kind, parent)
    }

    fn walk_bundle(
        &mut self,
        bundle: &DirectoryBundle,
        parent: Option<TargetId>,
    ) -> Result<(), SigningError> {
        let id = self.add(bundle.root_dir(), bundle.package_type().into(), parent);
        self.record_main_executable(bundle)?;

        let mut walker = walkdir::WalkDir::new(bundle.root_dir())
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| SigningError::Walk(bundle.root_dir().to_path_buf(), e))?;
            let path = entry.path();
            let file_type = entry.file_type();

            if file_type.is_symlink() {
                continue;
            }

            if file_type.is_dir() {
                let name = entry.file_name().to_string_lossy();

                if is_structural_directory_name(&name) {
                    continue;
                }

                let nested = match DirectoryBundle::new_from_path(path) {
                    Ok(nested) => nested,
                    Err(_) => continue,
                };

                if nested.is_framework_version() {
                    // Content of a framework version belongs to the framework.
                    self.record_main_executable(&nested)?;
                } else {
                    walker.skip_current_dir();
                    self.walk_bundle(&nested, Some(id))?;
                }

                continue;
            }

            if !file_type.is_file() || self.main_executables.contains(path) {
                continue;
            }

            if self.seen.contains(path) {
                continue;
            }

            if let Some(kind) = macho_kind(path)? {
                self.add(path, kind, Some(id));
            }
        }

        Ok(())
    }

    fn record_main_executable(&mut self, bundle: &DirectoryBundle) -> Result<(), SigningError> {
        let main = bundle
            .main_executable_path()
            .map_err(|e| SigningError::DirectoryBundle(bundle.root_dir().to_path_buf(), e))?;

        if let Some(main) = main {
            self.main_executables.insert(main);
        }

        Ok(())
    }
}

/// Resolve the target kind of a Mach-O file from its header.
///
/// Returns `None` if the file isn't Mach-O.
fn macho_kind(path: &Path) -> Result<Option<TargetKind>, SigningError> {
    let io_err = |e: std::io::Error| SigningError::DiscoveryIo(path.to_path_buf(), e);

    let mut data = Vec::with_capacity(SIZEOF_HEADER_64);
    std::fs::File::open(path)
        .map_err(io_err)?
        .take(SIZEOF_HEADER_64 as u64)
        .read_to_end(&mut data)
        .map_err(io_err)?;

    let magic = match goblin::mach::peek(&data, 0) {
        Ok(magic) => magic,
        Err(_) => return Ok(None),
    };

    if magic == FAT_MAGIC || magic == FAT_MAGIC_64 {
        let arches = data.pread_with::<u32>(4, scroll::BE).unwrap_or(u32::MAX);

        return Ok(if arches <= MAX_FAT_ARCHES {
            Some(kind_from_extension(path))
        } else {
            None
        });
    }

    let ctx = match parse_magic_and_ctx(&data, 0) {
        Ok((_, Some(ctx))) => ctx,
        _ => return Ok(None),
    };

    let header = match data.pread_with::<Header>(0, ctx) {
        Ok(header) => header,
        Err(_) => return Ok(None),
    };

    Ok(Some(match header.filetype {
        MH_DYLIB | MH_BUNDLE => TargetKind::DynamicLibrary,
        _ => TargetKind::Executable,
    }))
}

fn kind_from_extension(path: &Path) -> TargetKind {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("dylib") | Some("so") => TargetKind::DynamicLibrary,
        _ => TargetKind::Executable,
    }
}
