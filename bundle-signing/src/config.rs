// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! JSON configuration files for the `bundle-sign` tool.

A configuration file looks like:

```json
{
    "source": ["./build/MyApp.app"],
    "sign": {
        "application_identity": "Developer ID Application: Example (ABCDE12345)",
        "entitlements_file": "./entitlements.plist"
    }
}
```

Unknown keys are ignored so a file can carry settings for other tools.
*/

use {
    crate::error::SigningError,
    serde::Deserialize,
    std::path::{Path, PathBuf},
};

/// The `sign` section of a configuration file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct SignConfig {
    /// Identity passed to `codesign -s`.
    pub application_identity: String,

    #[serde(default)]
    pub entitlements_file: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct Config {
    /// Files and bundles to sign.
    #[serde(default)]
    pub source: Vec<PathBuf>,

    #[serde(default)]
    pub sign: Option<SignConfig>,
}

impl Config {
    /// Parse a configuration file.
    ///
    /// Relative paths in the file are resolved against the directory holding
    /// it.
    pub fn parse_file(path: impl AsRef<Path>) -> Result<Self, SigningError> {
        let path = path.as_ref();

        let data =
            std::fs::read(path).map_err(|e| SigningError::ConfigRead(path.to_path_buf(), e))?;
        let mut config: Self = serde_json::from_slice(&data)
            .map_err(|e| SigningError::ConfigParse(path.to_path_buf(), e))?;

        if let Some(dir) = path.parent() {
            config.resolve_relative(dir);
        }

        Ok(config)
    }

    /// Parse configuration from a JSON string. Paths are left as written.
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    /// The `sign` section, which must be present.
    pub fn sign_config(&self) -> Result<&SignConfig, SigningError> {
        self.sign.as_ref().ok_or(SigningError::ConfigNoSign)
    }

    fn resolve_relative(&mut self, dir: &Path) {
        for source in self.source.iter_mut() {
            if source.is_relative() {
                *source = dir.join(&*source);
            }
        }

        if let Some(entitlements) = self
            .sign
            .as_mut()
            .and_then(|sign| sign.entitlements_file.as_mut())
        {
            if entitlements.is_relative() {
                *entitlements = dir.join(&*entitlements);
            }
        }
    }
}
