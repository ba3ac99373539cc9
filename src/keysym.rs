//! Keysym names accepted for trigger keys, and keycode translation

use std::collections::HashMap;

use crate::error::ConfigError;

pub type Keysym = u32;

/// Modifier-style keys that make sense as drag triggers
const NAMED_KEYSYMS: &[(&str, Keysym)] = &[
    ("Shift_L", 0xffe1),
    ("Shift_R", 0xffe2),
    ("Control_L", 0xffe3),
    ("Control_R", 0xffe4),
    ("Caps_Lock", 0xffe5),
    ("Meta_L", 0xffe7),
    ("Meta_R", 0xffe8),
    ("Alt_L", 0xffe9),
    ("Alt_R", 0xffea),
    ("Super_L", 0xffeb),
    ("Super_R", 0xffec),
    ("Hyper_L", 0xffed),
    ("Hyper_R", 0xffee),
    ("ISO_Level3_Shift", 0xfe03),
];

pub fn keysym_from_name(name: &str) -> Option<Keysym> {
    NAMED_KEYSYMS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, keysym)| *keysym)
}

pub fn keysym_name(keysym: Keysym) -> Option<&'static str> {
    NAMED_KEYSYMS
        .iter()
        .find(|(_, known)| *known == keysym)
        .map(|(name, _)| *name)
}

/// Resolve configured names into keysyms, rejecting an empty set and
/// unknown names
pub fn resolve_trigger_keys(names: &[String]) -> Result<Vec<Keysym>, ConfigError> {
    if names.is_empty() {
        return Err(ConfigError::NoTriggerKeys);
    }

    let mut keysyms = Vec::with_capacity(names.len());
    for name in names {
        let keysym =
            keysym_from_name(name.trim()).ok_or_else(|| ConfigError::UnknownKeysym(name.clone()))?;
        if !keysyms.contains(&keysym) {
            keysyms.push(keysym);
        }
    }
    Ok(keysyms)
}

/// Keycode to keysym table built from the server's keyboard mapping, using
/// the unshifted (first) column only
#[derive(Debug, Clone, Default)]
pub struct KeycodeMap {
    keysyms: HashMap<u8, Keysym>,
}

impl KeycodeMap {
    /// `keysyms` is the flat reply of `GetKeyboardMapping` starting at
    /// `min_keycode`, `per_keycode` entries per keycode
    pub fn from_mapping(min_keycode: u8, per_keycode: u8, keysyms: &[Keysym]) -> Self {
        let mut map = HashMap::new();
        if per_keycode == 0 {
            return Self { keysyms: map };
        }

        for (offset, row) in keysyms.chunks(per_keycode as usize).enumerate() {
            let Some(keycode) = u8::try_from(min_keycode as usize + offset).ok() else {
                break;
            };
            if let Some(&keysym) = row.first()
                && keysym != 0
            {
                map.insert(keycode, keysym);
            }
        }

        Self { keysyms: map }
    }

    pub fn keysym(&self, keycode: u8) -> Option<Keysym> {
        self.keysyms.get(&keycode).copied()
    }
}
