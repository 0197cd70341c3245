//! Input handling.
//!
//! In a windowed build this sits behind the platform's key events. The
//! controller never sees raw events: it consumes one immutable [`KeyState`]
//! snapshot per tick, produced by [`KeyboardState`].

/// Logical input symbols the controller understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    W,
    A,
    S,
    D,
    Shift,
    Space,
}

impl Key {
    /// Keys that count as "a direction is pressed".
    pub const DIRECTIONS: [Key; 4] = [Key::W, Key::A, Key::S, Key::D];

    /// Maps a key symbol (as reported by the platform, any case) to a key.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.to_ascii_lowercase().as_str() {
            "w" => Some(Key::W),
            "a" => Some(Key::A),
            "s" => Some(Key::S),
            "d" => Some(Key::D),
            "shift" => Some(Key::Shift),
            " " | "space" => Some(Key::Space),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Key::W => "w",
            Key::A => "a",
            Key::S => "s",
            Key::D => "d",
            Key::Shift => "shift",
            Key::Space => "space",
        }
    }

    fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Which keys are held at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyState {
    bits: u8,
}

impl KeyState {
    pub const NONE: Self = Self { bits: 0 };

    pub fn from_keys(keys: &[Key]) -> Self {
        keys.iter().fold(Self::NONE, |state, &k| state.with(k))
    }

    /// Builds a snapshot from key symbols; unknown symbols are ignored.
    pub fn from_symbols<'a>(symbols: impl IntoIterator<Item = &'a str>) -> Self {
        symbols
            .into_iter()
            .filter_map(Key::from_symbol)
            .fold(Self::NONE, |state, k| state.with(k))
    }

    pub fn with(self, key: Key) -> Self {
        Self {
            bits: self.bits | key.bit(),
        }
    }

    pub fn without(self, key: Key) -> Self {
        Self {
            bits: self.bits & !key.bit(),
        }
    }

    pub fn pressed(self, key: Key) -> bool {
        self.bits & key.bit() != 0
    }

    pub fn any_direction(self) -> bool {
        Key::DIRECTIONS.iter().any(|&k| self.pressed(k))
    }

    pub fn jump(self) -> bool {
        self.pressed(Key::Space)
    }
}

/// What a key-down event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Shift was held: flip walk/run instead of recording the key.
    ToggleRun,
    Pressed(Key),
    Ignored,
}

/// Tracks held keys across platform events.
#[derive(Debug, Clone, Default)]
pub struct KeyboardState {
    held: KeyState,
}

impl KeyboardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles a key-down. While shift is held the press toggles run mode and
    /// is not recorded.
    pub fn key_down(&mut self, symbol: &str, shift_held: bool) -> KeyAction {
        if shift_held {
            return KeyAction::ToggleRun;
        }
        match Key::from_symbol(symbol) {
            Some(key) => {
                self.held = self.held.with(key);
                KeyAction::Pressed(key)
            }
            None => KeyAction::Ignored,
        }
    }

    pub fn key_up(&mut self, symbol: &str) {
        if let Some(key) = Key::from_symbol(symbol) {
            self.held = self.held.without(key);
        }
    }

    /// Releases everything (focus loss).
    pub fn clear(&mut self) {
        self.held = KeyState::NONE;
    }

    pub fn snapshot(&self) -> KeyState {
        self.held
    }
}
