//! Modifier-key state, decoupled from any particular event source.

/// Answers "should a drag starting now rotate instead of move?".
///
/// Queried once per gesture, at gesture start. Implementations may be backed
/// by keyboard state, a touch long-press, a stylus barrel button, etc.
pub trait ModifierKeyObserver {
    fn rotate_modifier_pressed(&self) -> bool;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ModifierKey {
    Shift,
    Alt,
    Control,
    Meta,
}

impl ModifierKey {
    /// Maps a DOM `KeyboardEvent.key` value.
    pub fn from_key_name(name: &str) -> Option<Self> {
        match name {
            "Shift" => Some(Self::Shift),
            "Alt" => Some(Self::Alt),
            "Control" => Some(Self::Control),
            "Meta" => Some(Self::Meta),
            _ => None,
        }
    }

    fn bit(self) -> u8 {
        match self {
            Self::Shift => 1,
            Self::Alt => 2,
            Self::Control => 4,
            Self::Meta => 8,
        }
    }
}

/// Keyboard-backed observer fed from window-level key events.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct KeyboardModifiers {
    rotate_key: ModifierKey,
    pressed: u8,
}

impl Default for KeyboardModifiers {
    fn default() -> Self {
        Self::new(ModifierKey::Shift)
    }
}

impl KeyboardModifiers {
    pub fn new(rotate_key: ModifierKey) -> Self {
        Self {
            rotate_key,
            pressed: 0,
        }
    }

    pub fn key_down(&mut self, key: ModifierKey) {
        self.pressed |= key.bit();
    }

    pub fn key_up(&mut self, key: ModifierKey) {
        self.pressed &= !key.bit();
    }

    /// Window lost focus: key-up events will never arrive, so forget everything.
    pub fn blur(&mut self) {
        self.pressed = 0;
    }

    pub fn is_pressed(&self, key: ModifierKey) -> bool {
        self.pressed & key.bit() != 0
    }
}

impl ModifierKeyObserver for KeyboardModifiers {
    fn rotate_modifier_pressed(&self) -> bool {
        self.is_pressed(self.rotate_key)
    }
}

#[cfg(test)]
mod tests {
    use super::{KeyboardModifiers, ModifierKey, ModifierKeyObserver};

    #[test]
    fn tracks_rotate_key_only() {
        let mut keys = KeyboardModifiers::new(ModifierKey::Alt);
        keys.key_down(ModifierKey::Shift);
        assert!(!keys.rotate_modifier_pressed());

        keys.key_down(ModifierKey::Alt);
        assert!(keys.rotate_modifier_pressed());

        keys.key_up(ModifierKey::Alt);
        assert!(!keys.rotate_modifier_pressed());
        assert!(keys.is_pressed(ModifierKey::Shift));
    }

    #[test]
    fn blur_releases_everything() {
        let mut keys = KeyboardModifiers::default();
        keys.key_down(ModifierKey::Shift);
        keys.key_down(ModifierKey::Meta);
        keys.blur();
        assert!(!keys.rotate_modifier_pressed());
        assert!(!keys.is_pressed(ModifierKey::Meta));
    }

    #[test]
    fn parses_dom_key_names() {
        assert_eq!(ModifierKey::from_key_name("Shift"), Some(ModifierKey::Shift));
        assert_eq!(ModifierKey::from_key_name("a"), None);
    }
}
