// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Scriptlet storage and interpreter resolution.

Scriptlets are small bodies of code rpm runs at package lifecycle points.
Interpreter resolution is deferred until the package is written, so the
precedence is stable regardless of call order: a per-slot override wins,
then the global default (non-Lua slots only), then `/bin/sh` or the Lua
marker.
*/

use crate::{
    error::{Result, RpmPackagingError},
    tags,
};

/// Interpreter used when nothing else is configured.
pub const DEFAULT_INTERPRETER: &str = "/bin/sh";

/// Marker rpm recognises as "run with the embedded Lua interpreter".
pub const LUA_MARKER: &str = "<lua>";

/// The seven scriptlet slots rpm runs at package lifecycle points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScriptletSlot {
    Prein,
    Postin,
    Preun,
    Postun,
    Pretrans,
    Posttrans,
    VerifyScript,
}

pub(crate) const SLOTS: [ScriptletSlot; 7] = [
    ScriptletSlot::Prein,
    ScriptletSlot::Postin,
    ScriptletSlot::Preun,
    ScriptletSlot::Postun,
    ScriptletSlot::Pretrans,
    ScriptletSlot::Posttrans,
    ScriptletSlot::VerifyScript,
];

impl ScriptletSlot {
    /// Slot for a lowercase name such as `"prein"`.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "prein" => Ok(Self::Prein),
            "postin" => Ok(Self::Postin),
            "preun" => Ok(Self::Preun),
            "postun" => Ok(Self::Postun),
            "pretrans" => Ok(Self::Pretrans),
            "posttrans" => Ok(Self::Posttrans),
            "verifyscript" => Ok(Self::VerifyScript),
            _ => Err(RpmPackagingError::UnknownScriptletSlot(name.to_string())),
        }
    }

    /// `pretrans` and `posttrans` run before any files are unpacked, so rpm
    /// can only execute them with its embedded Lua interpreter.
    pub fn is_lua(self) -> bool {
        matches!(self, Self::Pretrans | Self::Posttrans)
    }

    /// (body tag, interpreter tag) pair for this slot.
    pub(crate) fn tag_pair(self) -> (i32, i32) {
        match self {
            Self::Prein => (tags::PREIN, tags::PREIN_PROG),
            Self::Postin => (tags::POSTIN, tags::POSTIN_PROG),
            Self::Preun => (tags::PREUN, tags::PREUN_PROG),
            Self::Postun => (tags::POSTUN, tags::POSTUN_PROG),
            Self::Pretrans => (tags::PRETRANS, tags::PRETRANS_PROG),
            Self::Posttrans => (tags::POSTTRANS, tags::POSTTRANS_PROG),
            Self::VerifyScript => (tags::VERIFY_SCRIPT, tags::VERIFY_SCRIPT_PROG),
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Prein => 0,
            Self::Postin => 1,
            Self::Preun => 2,
            Self::Postun => 3,
            Self::Pretrans => 4,
            Self::Posttrans => 5,
            Self::VerifyScript => 6,
        }
    }
}

/// Scriptlet bodies plus interpreter configuration.
#[derive(Clone, Debug, Default)]
pub struct Scriptlets {
    bodies: [String; 7],
    overrides: [Option<String>; 7],
    default_interpreter: Option<String>,
}

impl Scriptlets {
    /// Store a slot's body. A later call replaces the earlier body.
    pub fn set_body(&mut self, slot: ScriptletSlot, body: impl Into<String>) {
        self.bodies[slot.index()] = body.into();
    }

    /// Set the interpreter for slots without a per-slot override.
    ///
    /// Lua slots are unaffected. An empty path reverts non-overridden slots
    /// to `/bin/sh`.
    pub fn set_default_interpreter(&mut self, path: &str) {
        self.default_interpreter = if path.is_empty() {
            None
        } else {
            Some(path.to_string())
        };
    }

    /// Pin a specific slot's interpreter, overriding the default and the Lua
    /// marker. The override is sticky: later default changes do not undo it.
    pub fn set_interpreter_for(&mut self, slot_name: &str, path: &str) -> Result<()> {
        let slot = ScriptletSlot::from_name(slot_name)?;
        self.overrides[slot.index()] = Some(path.to_string());
        Ok(())
    }

    /// The interpreter a slot would run with right now.
    pub fn interpreter(&self, slot: ScriptletSlot) -> &str {
        if let Some(explicit) = &self.overrides[slot.index()] {
            return explicit;
        }
        if slot.is_lua() {
            return LUA_MARKER;
        }
        self.default_interpreter.as_deref().unwrap_or(DEFAULT_INTERPRETER)
    }

    /// Resolve every populated slot to its `(slot, interpreter, body)`
    /// triple. Slots without a body are skipped.
    pub fn resolve(&self) -> Vec<(ScriptletSlot, &str, &str)> {
        SLOTS
            .iter()
            .filter(|slot| !self.bodies[slot.index()].is_empty())
            .map(|slot| (*slot, self.interpreter(*slot), self.bodies[slot.index()].as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, anyhow::Result};

    #[test]
    fn test_empty_slots_resolve_to_nothing() {
        let scriptlets = Scriptlets::default();
        assert!(scriptlets.resolve().is_empty());

        let mut scriptlets = Scriptlets::default();
        scriptlets.set_default_interpreter("/bin/test");
        assert!(scriptlets.resolve().is_empty());
    }

    #[test]
    fn test_default_interpreters() {
        let mut scriptlets = Scriptlets::default();
        for slot in SLOTS {
            scriptlets.set_body(slot, "body");
        }

        for (slot, interpreter, body) in scriptlets.resolve() {
            let want = if slot.is_lua() { LUA_MARKER } else { DEFAULT_INTERPRETER };
            assert_eq!(interpreter, want, "{:?}", slot);
            assert_eq!(body, "body");
        }
    }

    #[test]
    fn test_default_override_skips_lua_slots() {
        let mut scriptlets = Scriptlets::default();
        scriptlets.set_body(ScriptletSlot::Prein, "echo");
        scriptlets.set_body(ScriptletSlot::Posttrans, "i = 1");
        scriptlets.set_default_interpreter("/bin/test");

        assert_eq!(scriptlets.interpreter(ScriptletSlot::Prein), "/bin/test");
        assert_eq!(scriptlets.interpreter(ScriptletSlot::Posttrans), LUA_MARKER);
    }

    #[test]
    fn test_empty_default_reverts() {
        let mut scriptlets = Scriptlets::default();
        scriptlets.set_body(ScriptletSlot::VerifyScript, "echo");
        scriptlets.set_default_interpreter("/bin/test");
        assert_eq!(scriptlets.interpreter(ScriptletSlot::VerifyScript), "/bin/test");

        scriptlets.set_default_interpreter("");
        assert_eq!(scriptlets.interpreter(ScriptletSlot::VerifyScript), DEFAULT_INTERPRETER);
    }

    #[test]
    fn test_slot_override_is_sticky() -> Result<()> {
        let mut scriptlets = Scriptlets::default();
        scriptlets.set_default_interpreter("/bin/test");
        scriptlets.set_body(ScriptletSlot::Prein, "echo");
        scriptlets.set_interpreter_for("prein", "/bin/other")?;

        // Re-applying the default does not undo the per-slot override.
        scriptlets.set_default_interpreter("/bin/test");
        assert_eq!(scriptlets.interpreter(ScriptletSlot::Prein), "/bin/other");

        scriptlets.set_default_interpreter("");
        assert_eq!(scriptlets.interpreter(ScriptletSlot::Prein), "/bin/other");

        Ok(())
    }

    #[test]
    fn test_lua_slot_override() -> Result<()> {
        let mut scriptlets = Scriptlets::default();
        scriptlets.set_body(ScriptletSlot::Posttrans, "i = 1");
        assert_eq!(scriptlets.interpreter(ScriptletSlot::Posttrans), LUA_MARKER);

        scriptlets.set_interpreter_for("posttrans", "/bin/test")?;
        assert_eq!(scriptlets.interpreter(ScriptletSlot::Posttrans), "/bin/test");

        // The global default never applies to Lua slots, overridden or not.
        scriptlets.set_default_interpreter("/foo/bar");
        assert_eq!(scriptlets.interpreter(ScriptletSlot::Posttrans), "/bin/test");

        Ok(())
    }

    #[test]
    fn test_unknown_slot_name() {
        let mut scriptlets = Scriptlets::default();
        assert!(matches!(
            scriptlets.set_interpreter_for("mistake", "/bin/test"),
            Err(RpmPackagingError::UnknownScriptletSlot(_))
        ));
    }
}
