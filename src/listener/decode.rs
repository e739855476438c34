//! Key event decoding state machine
//!
//! Turns a stream of raw key events from one device into accumulated text
//! and flush decisions. Each watched device owns one `DecodeState`; the
//! transition function is pure apart from mutating that state, which keeps
//! the whole state machine testable without hardware.

use std::collections::VecDeque;

use crate::keymap::Keymap;

/// Key transition reported by the input subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Up,
    Down,
    /// Autorepeat pseudo-event while a key stays pressed
    Hold,
}

impl KeyState {
    /// Map an evdev event value (0=up, 1=down, 2=hold) to a key state
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Up),
            1 => Some(Self::Down),
            2 => Some(Self::Hold),
            _ => None,
        }
    }
}

/// Mutable decode state for one watched device
#[derive(Debug, Default)]
pub struct DecodeState {
    buffer: VecDeque<char>,
    capital_letters: bool,
    capital_symbols: bool,
}

impl DecodeState {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn buffer_string(&self) -> String {
        self.buffer.iter().collect()
    }
}

/// Advance the decode state by one key event.
///
/// Returns the completed scan string when the event was a trigger key press
/// on a non-empty buffer; the buffer is cleared before returning.
///
/// Ordering rules:
/// - Hold events never change anything (autorepeat must not re-toggle
///   modes or duplicate characters).
/// - Trigger keys flush and are never appended, whatever the mode flags.
/// - Shift toggles on both down and up (flags track the held key);
///   CapsLock toggles on down only.
/// - Characters are appended on down only, so press/release pairs yield
///   one character.
/// - Appending to a full buffer evicts the oldest character first, keeping
///   the most recent `max_len` characters.
pub fn decode_key(
    state: &mut DecodeState,
    keymap: &Keymap,
    code: u16,
    key_state: KeyState,
    max_len: usize,
) -> Option<String> {
    if key_state == KeyState::Hold {
        return None;
    }

    if keymap.is_trigger(code) {
        if state.buffer.is_empty() {
            return None;
        }
        return Some(state.buffer.drain(..).collect());
    }

    if keymap.is_capitalize_all(code) {
        state.capital_letters = !state.capital_letters;
        state.capital_symbols = !state.capital_symbols;
    } else if keymap.is_capitalize_symbols(code) && key_state == KeyState::Down {
        state.capital_letters = !state.capital_letters;
    }

    if key_state != KeyState::Down {
        return None;
    }

    if let Some(ch) = keymap.resolve(code, state.capital_letters, state.capital_symbols) {
        if state.buffer.len() >= max_len {
            state.buffer.pop_front();
        }
        state.buffer.push_back(ch);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: u16 = 30;
    const KEY_W: u16 = 17;
    const KEY_X: u16 = 45;
    const KEY_Y: u16 = 21;
    const KEY_Z: u16 = 44;
    const KEY_1: u16 = 2;
    const KEY_KP1: u16 = 79;
    const KEY_ENTER: u16 = 28;
    const KEY_LEFTSHIFT: u16 = 42;
    const KEY_CAPSLOCK: u16 = 58;
    const MAX_LEN: usize = 256;

    /// Full press/release cycle for one key
    fn press(state: &mut DecodeState, keymap: &Keymap, code: u16) -> Option<String> {
        let flushed = decode_key(state, keymap, code, KeyState::Down, MAX_LEN);
        decode_key(state, keymap, code, KeyState::Up, MAX_LEN);
        flushed
    }

    #[test]
    fn test_scan_flushes_on_trigger() {
        let keymap = Keymap::default();
        let mut state = DecodeState::new();
        for code in [30, 48, 46] {
            press(&mut state, &keymap, code); // a, b, c
        }
        let flushed = decode_key(&mut state, &keymap, KEY_ENTER, KeyState::Down, MAX_LEN);
        assert_eq!(flushed.as_deref(), Some("abc"));
        assert_eq!(state.buffer_string(), "");
    }

    #[test]
    fn test_trigger_on_empty_buffer_flushes_nothing() {
        let keymap = Keymap::default();
        let mut state = DecodeState::new();
        assert_eq!(decode_key(&mut state, &keymap, KEY_ENTER, KeyState::Down, MAX_LEN), None);
        assert_eq!(decode_key(&mut state, &keymap, KEY_ENTER, KeyState::Up, MAX_LEN), None);
    }

    #[test]
    fn test_trigger_key_is_never_appended() {
        let keymap = Keymap::default();
        let mut state = DecodeState::new();
        // Shift held: trigger keys must still flush, not resolve to a character
        decode_key(&mut state, &keymap, KEY_LEFTSHIFT, KeyState::Down, MAX_LEN);
        press(&mut state, &keymap, KEY_A);
        let flushed = decode_key(&mut state, &keymap, KEY_ENTER, KeyState::Down, MAX_LEN);
        assert_eq!(flushed.as_deref(), Some("A"));
        assert_eq!(state.buffer_string(), "");
    }

    #[test]
    fn test_release_produces_no_character() {
        let keymap = Keymap::default();
        let mut state = DecodeState::new();
        decode_key(&mut state, &keymap, KEY_A, KeyState::Down, MAX_LEN);
        decode_key(&mut state, &keymap, KEY_A, KeyState::Up, MAX_LEN);
        assert_eq!(state.buffer_string(), "a");
    }

    #[test]
    fn test_hold_changes_nothing() {
        let keymap = Keymap::default();
        let mut state = DecodeState::new();
        press(&mut state, &keymap, KEY_A);

        // Letter autorepeat: no duplicate characters
        assert_eq!(decode_key(&mut state, &keymap, KEY_A, KeyState::Hold, MAX_LEN), None);
        assert_eq!(state.buffer_string(), "a");

        // Shift autorepeat: no mode flips
        assert_eq!(decode_key(&mut state, &keymap, KEY_LEFTSHIFT, KeyState::Hold, MAX_LEN), None);
        assert!(!state.capital_letters);
        assert!(!state.capital_symbols);

        // Trigger autorepeat: no flush
        assert_eq!(decode_key(&mut state, &keymap, KEY_ENTER, KeyState::Hold, MAX_LEN), None);
        assert_eq!(state.buffer_string(), "a");
    }

    #[test]
    fn test_shift_flips_both_flags_on_down_and_up() {
        let keymap = Keymap::default();
        let mut state = DecodeState::new();
        decode_key(&mut state, &keymap, KEY_LEFTSHIFT, KeyState::Down, MAX_LEN);
        assert!(state.capital_letters);
        assert!(state.capital_symbols);
        decode_key(&mut state, &keymap, KEY_LEFTSHIFT, KeyState::Up, MAX_LEN);
        assert!(!state.capital_letters);
        assert!(!state.capital_symbols);
    }

    #[test]
    fn test_capslock_flips_letter_flag_on_down_only() {
        let keymap = Keymap::default();
        let mut state = DecodeState::new();
        decode_key(&mut state, &keymap, KEY_CAPSLOCK, KeyState::Down, MAX_LEN);
        assert!(state.capital_letters);
        assert!(!state.capital_symbols);
        // Release must not toggle back
        decode_key(&mut state, &keymap, KEY_CAPSLOCK, KeyState::Up, MAX_LEN);
        assert!(state.capital_letters);
        assert!(!state.capital_symbols);
    }

    #[test]
    fn test_shift_while_held_capitalizes() {
        let keymap = Keymap::default();
        let mut state = DecodeState::new();
        decode_key(&mut state, &keymap, KEY_LEFTSHIFT, KeyState::Down, MAX_LEN);
        press(&mut state, &keymap, KEY_A);
        press(&mut state, &keymap, KEY_1);
        decode_key(&mut state, &keymap, KEY_LEFTSHIFT, KeyState::Up, MAX_LEN);
        press(&mut state, &keymap, KEY_A);
        press(&mut state, &keymap, KEY_1);
        assert_eq!(state.buffer_string(), "A!a1");
    }

    #[test]
    fn test_numpad_ignores_mode_flags() {
        let keymap = Keymap::default();
        let mut state = DecodeState::new();
        press(&mut state, &keymap, KEY_KP1);
        decode_key(&mut state, &keymap, KEY_LEFTSHIFT, KeyState::Down, MAX_LEN);
        press(&mut state, &keymap, KEY_KP1);
        assert_eq!(state.buffer_string(), "11");
    }

    #[test]
    fn test_unknown_scancode_is_silently_ignored() {
        let keymap = Keymap::default();
        let mut state = DecodeState::new();
        for (letters, symbols) in [(false, false), (true, true)] {
            state.capital_letters = letters;
            state.capital_symbols = symbols;
            assert_eq!(decode_key(&mut state, &keymap, 240, KeyState::Down, MAX_LEN), None);
            assert_eq!(state.buffer_string(), "");
        }
    }

    #[test]
    fn test_toggle_then_letter_then_trigger() {
        // down(42), down(30), up(30), down(28) -> "A"
        let keymap = Keymap::default();
        let mut state = DecodeState::new();
        assert_eq!(decode_key(&mut state, &keymap, KEY_LEFTSHIFT, KeyState::Down, MAX_LEN), None);
        assert_eq!(decode_key(&mut state, &keymap, KEY_A, KeyState::Down, MAX_LEN), None);
        assert_eq!(state.buffer_string(), "A");
        assert_eq!(decode_key(&mut state, &keymap, KEY_A, KeyState::Up, MAX_LEN), None);
        let flushed = decode_key(&mut state, &keymap, KEY_ENTER, KeyState::Down, MAX_LEN);
        assert_eq!(flushed.as_deref(), Some("A"));
        assert_eq!(state.buffer_string(), "");
    }

    #[test]
    fn test_sliding_window_evicts_oldest() {
        // max_len = 3: w, x, y, z leaves "xyz"
        let keymap = Keymap::default();
        let mut state = DecodeState::new();
        for code in [KEY_W, KEY_X, KEY_Y, KEY_Z] {
            decode_key(&mut state, &keymap, code, KeyState::Down, 3);
            decode_key(&mut state, &keymap, code, KeyState::Up, 3);
        }
        assert_eq!(state.buffer_string(), "xyz");
    }

    #[test]
    fn test_buffer_never_exceeds_bound() {
        let keymap = Keymap::default();
        let mut state = DecodeState::new();
        for _ in 0..10 {
            decode_key(&mut state, &keymap, KEY_A, KeyState::Down, 3);
            assert!(state.buffer.len() <= 3);
            decode_key(&mut state, &keymap, KEY_A, KeyState::Up, 3);
        }
        assert_eq!(state.buffer_string(), "aaa");
    }

    #[test]
    fn test_full_buffer_flushes_intact() {
        // Exactly max_len characters then a trigger: nothing may be lost
        let keymap = Keymap::default();
        let mut state = DecodeState::new();
        for code in [KEY_W, KEY_X, KEY_Y] {
            decode_key(&mut state, &keymap, code, KeyState::Down, 3);
            decode_key(&mut state, &keymap, code, KeyState::Up, 3);
        }
        let flushed = decode_key(&mut state, &keymap, KEY_ENTER, KeyState::Down, 3);
        assert_eq!(flushed.as_deref(), Some("wxy"));
    }

    #[test]
    fn test_fresh_state_is_empty_and_lowercase() {
        let state = DecodeState::new();
        assert_eq!(state.buffer_string(), "");
        assert!(!state.capital_letters);
        assert!(!state.capital_symbols);
    }

    #[test]
    fn test_key_state_from_value() {
        assert_eq!(KeyState::from_value(0), Some(KeyState::Up));
        assert_eq!(KeyState::from_value(1), Some(KeyState::Down));
        assert_eq!(KeyState::from_value(2), Some(KeyState::Hold));
        assert_eq!(KeyState::from_value(3), None);
        assert_eq!(KeyState::from_value(-1), None);
    }
}
