//! # Scope Resolver
//!
//! Maps the symbolic scope names used in documents to root handles.
//!
//! Recognised names: `LOCAL_MACHINE`, `CURRENT_USER`, `CLASSES_ROOT`,
//! `CURRENT_CONFIG`, `USERS`. Matching is exact.
//!
//! ## Fallback policy
//!
//! An absent, empty or unrecognised scope resolves to `HKEY_LOCAL_MACHINE`
//! instead of failing. The fallback is an explicit variant of [`Scope`]
//! (`Unspecified` / `Unrecognized`) so callers can see and report it; the
//! resolver itself never errors.

use crate::primitives::{
    HKEY_CLASSES_ROOT, HKEY_CURRENT_CONFIG, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, HKEY_USERS,
};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// SCOPE HANDLE
// =============================================================================

/// A root namespace of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScopeHandle {
    LocalMachine,
    CurrentUser,
    ClassesRoot,
    CurrentConfig,
    Users,
}

impl ScopeHandle {
    /// Every root handle.
    pub const ALL: [ScopeHandle; 5] = [
        ScopeHandle::LocalMachine,
        ScopeHandle::CurrentUser,
        ScopeHandle::ClassesRoot,
        ScopeHandle::CurrentConfig,
        ScopeHandle::Users,
    ];

    /// The predefined handle constant of the native registry.
    #[must_use]
    pub const fn raw(self) -> u32 {
        match self {
            ScopeHandle::LocalMachine => HKEY_LOCAL_MACHINE,
            ScopeHandle::CurrentUser => HKEY_CURRENT_USER,
            ScopeHandle::ClassesRoot => HKEY_CLASSES_ROOT,
            ScopeHandle::CurrentConfig => HKEY_CURRENT_CONFIG,
            ScopeHandle::Users => HKEY_USERS,
        }
    }

    /// Native root name, e.g. `HKEY_CURRENT_USER`.
    #[must_use]
    pub const fn root_name(self) -> &'static str {
        match self {
            ScopeHandle::LocalMachine => "HKEY_LOCAL_MACHINE",
            ScopeHandle::CurrentUser => "HKEY_CURRENT_USER",
            ScopeHandle::ClassesRoot => "HKEY_CLASSES_ROOT",
            ScopeHandle::CurrentConfig => "HKEY_CURRENT_CONFIG",
            ScopeHandle::Users => "HKEY_USERS",
        }
    }
}

impl fmt::Display for ScopeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.root_name())
    }
}

// =============================================================================
// SCOPE
// =============================================================================

/// A scope as written in a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    LocalMachine,
    CurrentUser,
    ClassesRoot,
    CurrentConfig,
    Users,
    /// No scope given (absent or empty). Resolves to local machine.
    #[default]
    Unspecified,
    /// A name outside the recognised set, kept verbatim. Resolves to local
    /// machine.
    Unrecognized(String),
}

impl Scope {
    /// Classify a scope name. Never fails.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            "LOCAL_MACHINE" => Scope::LocalMachine,
            "CURRENT_USER" => Scope::CurrentUser,
            "CLASSES_ROOT" => Scope::ClassesRoot,
            "CURRENT_CONFIG" => Scope::CurrentConfig,
            "USERS" => Scope::Users,
            "" => Scope::Unspecified,
            other => Scope::Unrecognized(other.to_string()),
        }
    }

    /// The root handle this scope opens under.
    #[must_use]
    pub fn handle(&self) -> ScopeHandle {
        match self {
            Scope::CurrentUser => ScopeHandle::CurrentUser,
            Scope::ClassesRoot => ScopeHandle::ClassesRoot,
            Scope::CurrentConfig => ScopeHandle::CurrentConfig,
            Scope::Users => ScopeHandle::Users,
            Scope::LocalMachine | Scope::Unspecified | Scope::Unrecognized(_) => {
                ScopeHandle::LocalMachine
            }
        }
    }

    /// Whether this scope reaches local machine only through the default.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Scope::Unspecified | Scope::Unrecognized(_))
    }

    /// The text to write back into a document, `None` when the scope was
    /// absent.
    #[must_use]
    pub fn as_document_str(&self) -> Option<&str> {
        match self {
            Scope::LocalMachine => Some("LOCAL_MACHINE"),
            Scope::CurrentUser => Some("CURRENT_USER"),
            Scope::ClassesRoot => Some("CLASSES_ROOT"),
            Scope::CurrentConfig => Some("CURRENT_CONFIG"),
            Scope::Users => Some("USERS"),
            Scope::Unspecified => None,
            Scope::Unrecognized(name) => Some(name),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Unspecified => f.write_str("<unspecified>"),
            other => f.write_str(other.as_document_str().unwrap_or_default()),
        }
    }
}

/// Resolve a symbolic scope name to a root handle.
///
/// Unknown or empty input resolves to `HKEY_LOCAL_MACHINE`.
#[must_use]
pub fn resolve(name: &str) -> ScopeHandle {
    Scope::parse(name).handle()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_recognised_names() {
        let cases = [
            ("LOCAL_MACHINE", ScopeHandle::LocalMachine),
            ("CURRENT_USER", ScopeHandle::CurrentUser),
            ("CLASSES_ROOT", ScopeHandle::ClassesRoot),
            ("CURRENT_CONFIG", ScopeHandle::CurrentConfig),
            ("USERS", ScopeHandle::Users),
        ];
        for (name, expected) in cases {
            assert_eq!(resolve(name), expected, "scope {}", name);
        }
    }

    #[test]
    fn resolve_defaults_to_local_machine() {
        assert_eq!(resolve(""), ScopeHandle::LocalMachine);
        assert_eq!(resolve("unknown-token"), ScopeHandle::LocalMachine);
        assert_eq!(resolve("current_user"), ScopeHandle::LocalMachine);
    }

    #[test]
    fn non_default_names_never_hit_local_machine() {
        for name in ["CURRENT_USER", "CLASSES_ROOT", "CURRENT_CONFIG", "USERS"] {
            assert_ne!(resolve(name), ScopeHandle::LocalMachine);
        }
    }

    #[test]
    fn fallback_is_explicit() {
        assert!(Scope::parse("").is_fallback());
        assert!(Scope::parse("HKCU").is_fallback());
        assert!(!Scope::parse("LOCAL_MACHINE").is_fallback());
        assert_eq!(Scope::parse("HKCU"), Scope::Unrecognized("HKCU".into()));
    }

    #[test]
    fn document_text_roundtrips() {
        for name in ["LOCAL_MACHINE", "CURRENT_USER", "USERS", "HKCU"] {
            assert_eq!(Scope::parse(name).as_document_str(), Some(name));
        }
        assert_eq!(Scope::Unspecified.as_document_str(), None);
    }

    #[test]
    fn raw_handles_match_native_constants() {
        assert_eq!(ScopeHandle::LocalMachine.raw(), 0x8000_0002);
        assert_eq!(ScopeHandle::CurrentUser.raw(), 0x8000_0001);
        assert_eq!(ScopeHandle::CurrentConfig.raw(), 0x8000_0005);
    }
}
