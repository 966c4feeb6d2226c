// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Signing identity resolution.

use crate::error::SigningError;

/// Length of a hex encoded SHA-1 certificate fingerprint.
const SHA1_FINGERPRINT_LENGTH: usize = 40;

/// The identity value `codesign` understands as ad-hoc signing.
pub const AD_HOC_IDENTITY: &str = "-";

/// A validated reference to a code signing credential.
///
/// This is what `codesign -s` receives: a certificate common name (or a
/// substring of one), a SHA-1 certificate fingerprint, or `-` for ad-hoc
/// signing. Instances cannot be modified once resolved.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SigningIdentity(String);

impl SigningIdentity {
    /// Validate and normalize an identity string.
    ///
    /// Surrounding whitespace is removed. Values with control characters are
    /// rejected. Exactly 40 hex digits denote a SHA-1 fingerprint; any other
    /// value is matched by `codesign` against certificate names.
    pub fn resolve(value: &str) -> Result<Self, SigningError> {
        let value = value.trim();

        if value.is_empty() {
            return Err(SigningError::IdentityMissing);
        }

        if value.chars().any(|c| c.is_control()) {
            return Err(SigningError::IdentityMalformed(
                value.to_string(),
                "contains control characters",
            ));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this identity requests an ad-hoc signature.
    pub fn is_ad_hoc(&self) -> bool {
        self.0 == AD_HOC_IDENTITY
    }

    /// Whether this identity is a SHA-1 certificate fingerprint.
    pub fn is_fingerprint(&self) -> bool {
        self.0.len() == SHA1_FINGERPRINT_LENGTH && self.0.chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl AsRef<str> for SigningIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::error::ErrorCategory};

    #[test]
    fn empty_is_missing() {
        for value in ["", "   ", "\t\n"] {
            let err = SigningIdentity::resolve(value).unwrap_err();
            assert!(matches!(err, SigningError::IdentityMissing));
            assert_eq!(err.category(), ErrorCategory::Config);
        }
    }

    #[test]
    fn common_name() -> Result<(), SigningError> {
        let identity =
            SigningIdentity::resolve("  Developer ID Application: Example Corp (ABCDE12345) ")?;
        assert_eq!(
            identity.as_str(),
            "Developer ID Application: Example Corp (ABCDE12345)"
        );
        assert!(!identity.is_ad_hoc());
        assert!(!identity.is_fingerprint());

        Ok(())
    }

    #[test]
    fn fingerprint() -> Result<(), SigningError> {
        let identity = SigningIdentity::resolve("0123456789ABCDEF0123456789abcdef01234567")?;
        assert!(identity.is_fingerprint());

        Ok(())
    }

    #[test]
    fn short_hex_is_a_name() -> Result<(), SigningError> {
        for value in ["ABCDE12345", "Cafe", "0123456789abcdef"] {
            let identity = SigningIdentity::resolve(value)?;
            assert_eq!(identity.as_str(), value);
            assert!(!identity.is_fingerprint());
        }

        // One digit short of a fingerprint.
        assert!(!SigningIdentity::resolve("0123456789abcdef0123456789abcdef0123456")?
            .is_fingerprint());

        Ok(())
    }

    #[test]
    fn ad_hoc() -> Result<(), SigningError> {
        let identity = SigningIdentity::resolve("-")?;
        assert!(identity.is_ad_hoc());
        assert_eq!(identity.to_string(), "-");

        Ok(())
    }

    #[test]
    fn control_characters() {
        assert!(matches!(
            SigningIdentity::resolve("Developer ID\nApplication"),
            Err(SigningError::IdentityMalformed(..))
        ));
    }
}
