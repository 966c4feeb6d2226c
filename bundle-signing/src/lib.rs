// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Sign Apple bundles and their nested code.

This crate signs files and bundles by invoking Apple's `codesign` tool once
per signable entity. Given a bundle, it finds every nested bundle, framework
and Mach-O binary and signs them innermost first, so that every container's
signature seals the final signatures of its contents.

The main entry point is [sign()]. A run is driven by [SigningOptions]:

```no_run
use bundle_signing::{sign, CancellationToken, SigningOptions};

let mut stdout = std::io::stdout();
let logger = slog::Logger::root(slog::Discard, slog::o!());

sign(
    &CancellationToken::new(),
    &mut SigningOptions::new(
        ["build/MyApp.app"],
        "Developer ID Application: Example (ABCDE12345)",
        &mut stdout,
        logger,
    ),
)?;
# Ok::<(), bundle_signing::SigningError>(())
```

Signing is fail-fast by default: the first failure ends the run and leaves
already signed targets in place. A [CancellationToken] may be cancelled from
another thread; it is observed before each invocation, never in the middle
of one.

The [Signer] type accepts any [SignatureInvoker], which lets callers replace
`codesign` with something else.
*/

pub mod config;
mod discovery;
pub use discovery::*;
mod engine;
pub use engine::*;
mod error;
pub use error::*;
mod identity;
pub use identity::*;
mod invoker;
pub use invoker::*;
pub mod logging;
mod ordering;
pub use ordering::*;
mod target;
pub use target::*;
#[cfg(test)]
mod testutil;

pub use tokio_util::sync::CancellationToken;
