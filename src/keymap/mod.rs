//! Scancode-to-character tables
//!
//! Maps Linux input event codes (from <linux/input-event-codes.h>) to the
//! characters a keyboard-emulation device "types". Five tables cover the
//! regular/shifted letter and symbol planes plus the numpad; three code sets
//! mark the keys that toggle capitalization or flush the buffer.
//!
//! The built-in tables describe a US layout. Every table and set can be
//! replaced individually from the `[keymap]` config section.

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::{anyhow, Context, Result};

use crate::config::KeymapConfig;

// ============================================================================
// Built-in US Layout
// ============================================================================

const REGULAR_LETTERS: &[(u16, char)] = &[
    // qwerty row
    (16, 'q'),
    (17, 'w'),
    (18, 'e'),
    (19, 'r'),
    (20, 't'),
    (21, 'y'),
    (22, 'u'),
    (23, 'i'),
    (24, 'o'),
    (25, 'p'),
    // home row
    (30, 'a'),
    (31, 's'),
    (32, 'd'),
    (33, 'f'),
    (34, 'g'),
    (35, 'h'),
    (36, 'j'),
    (37, 'k'),
    (38, 'l'),
    // bottom row
    (44, 'z'),
    (45, 'x'),
    (46, 'c'),
    (47, 'v'),
    (48, 'b'),
    (49, 'n'),
    (50, 'm'),
];

const REGULAR_SYMBOLS: &[(u16, char)] = &[
    // number row
    (2, '1'),
    (3, '2'),
    (4, '3'),
    (5, '4'),
    (6, '5'),
    (7, '6'),
    (8, '7'),
    (9, '8'),
    (10, '9'),
    (11, '0'),
    (12, '-'),
    (13, '='),
    // punctuation
    (26, '['),
    (27, ']'),
    (39, ';'),
    (40, '\''),
    (41, '`'),
    (43, '\\'),
    (51, ','),
    (52, '.'),
    (53, '/'),
    (57, ' '),
];

const CAPITAL_SYMBOLS: &[(u16, char)] = &[
    // number row, shifted
    (2, '!'),
    (3, '@'),
    (4, '#'),
    (5, '$'),
    (6, '%'),
    (7, '^'),
    (8, '&'),
    (9, '*'),
    (10, '('),
    (11, ')'),
    (12, '_'),
    (13, '+'),
    // punctuation, shifted
    (26, '{'),
    (27, '}'),
    (39, ':'),
    (40, '"'),
    (41, '~'),
    (43, '|'),
    (51, '<'),
    (52, '>'),
    (53, '?'),
    (57, ' '),
];

const NUMPAD_SYMBOLS: &[(u16, char)] = &[
    (55, '*'),
    (71, '7'),
    (72, '8'),
    (73, '9'),
    (74, '-'),
    (75, '4'),
    (76, '5'),
    (77, '6'),
    (78, '+'),
    (79, '1'),
    (80, '2'),
    (81, '3'),
    (82, '0'),
    (83, '.'),
    (98, '/'),
];

/// KEY_ENTER, KEY_KPENTER
const TRIGGER_KEYS: &[u16] = &[28, 96];

/// KEY_LEFTSHIFT, KEY_RIGHTSHIFT
const CAPITALIZE_ALL_KEYS: &[u16] = &[42, 54];

/// KEY_CAPSLOCK
const CAPITALIZE_SYMBOLS_KEYS: &[u16] = &[58];

// ============================================================================
// Keymap
// ============================================================================

/// Immutable scancode-to-character mapping for one process lifetime
#[derive(Debug, Clone)]
pub struct Keymap {
    regular_letters: HashMap<u16, char>,
    capital_letters: HashMap<u16, char>,
    regular_symbols: HashMap<u16, char>,
    capital_symbols: HashMap<u16, char>,
    numpad_symbols: HashMap<u16, char>,
    trigger_keys: HashSet<u16>,
    capitalize_all_keys: HashSet<u16>,
    capitalize_symbols_keys: HashSet<u16>,
}

impl Default for Keymap {
    fn default() -> Self {
        Self {
            regular_letters: REGULAR_LETTERS.iter().copied().collect(),
            capital_letters: REGULAR_LETTERS
                .iter()
                .map(|&(code, ch)| (code, ch.to_ascii_uppercase()))
                .collect(),
            regular_symbols: REGULAR_SYMBOLS.iter().copied().collect(),
            capital_symbols: CAPITAL_SYMBOLS.iter().copied().collect(),
            numpad_symbols: NUMPAD_SYMBOLS.iter().copied().collect(),
            trigger_keys: TRIGGER_KEYS.iter().copied().collect(),
            capitalize_all_keys: CAPITALIZE_ALL_KEYS.iter().copied().collect(),
            capitalize_symbols_keys: CAPITALIZE_SYMBOLS_KEYS.iter().copied().collect(),
        }
    }
}

impl Keymap {
    /// Build a keymap from the `[keymap]` config section.
    /// Unset tables and sets fall back to the built-in US layout.
    pub fn from_config(config: &KeymapConfig) -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            regular_letters: parse_table(config.regular_letters.as_ref(), "regular_letters")?
                .unwrap_or(defaults.regular_letters),
            capital_letters: parse_table(config.capital_letters.as_ref(), "capital_letters")?
                .unwrap_or(defaults.capital_letters),
            regular_symbols: parse_table(config.regular_symbols.as_ref(), "regular_symbols")?
                .unwrap_or(defaults.regular_symbols),
            capital_symbols: parse_table(config.capital_symbols.as_ref(), "capital_symbols")?
                .unwrap_or(defaults.capital_symbols),
            numpad_symbols: parse_table(config.numpad_symbols.as_ref(), "numpad_symbols")?
                .unwrap_or(defaults.numpad_symbols),
            trigger_keys: config
                .trigger_keys
                .as_ref()
                .map(|codes| codes.iter().copied().collect())
                .unwrap_or(defaults.trigger_keys),
            capitalize_all_keys: config
                .capitalize_all_keys
                .as_ref()
                .map(|codes| codes.iter().copied().collect())
                .unwrap_or(defaults.capitalize_all_keys),
            capitalize_symbols_keys: config
                .capitalize_symbols_keys
                .as_ref()
                .map(|codes| codes.iter().copied().collect())
                .unwrap_or(defaults.capitalize_symbols_keys),
        })
    }

    /// Check if a key flushes the buffer as a completed scan
    pub fn is_trigger(&self, code: u16) -> bool {
        self.trigger_keys.contains(&code)
    }

    /// Check if a key toggles both capitalization flags (Shift)
    pub fn is_capitalize_all(&self, code: u16) -> bool {
        self.capitalize_all_keys.contains(&code)
    }

    /// Check if a key toggles the letter flag only (CapsLock)
    pub fn is_capitalize_symbols(&self, code: u16) -> bool {
        self.capitalize_symbols_keys.contains(&code)
    }

    /// Resolve a scancode to a character under the given mode flags.
    /// First matching table wins; codes absent from all tables yield None.
    pub fn resolve(&self, code: u16, capital_letters: bool, capital_symbols: bool) -> Option<char> {
        if capital_letters {
            if let Some(&ch) = self.capital_letters.get(&code) {
                return Some(ch);
            }
        } else if let Some(&ch) = self.regular_letters.get(&code) {
            return Some(ch);
        }
        if capital_symbols {
            if let Some(&ch) = self.capital_symbols.get(&code) {
                return Some(ch);
            }
        } else if let Some(&ch) = self.regular_symbols.get(&code) {
            return Some(ch);
        }
        self.numpad_symbols.get(&code).copied()
    }
}

/// Parse a config table of "scancode" -> "character" strings.
/// TOML table keys are strings, so scancodes arrive as decimal strings.
fn parse_table(
    table: Option<&BTreeMap<String, String>>,
    section: &str,
) -> Result<Option<HashMap<u16, char>>> {
    let Some(table) = table else {
        return Ok(None);
    };

    let mut parsed = HashMap::with_capacity(table.len());
    for (code, value) in table {
        let code: u16 = code
            .parse()
            .with_context(|| format!("keymap.{}: invalid scancode '{}'", section, code))?;
        let mut chars = value.chars();
        let ch = chars
            .next()
            .ok_or_else(|| anyhow!("keymap.{}: empty value for scancode {}", section, code))?;
        if chars.next().is_some() {
            return Err(anyhow!(
                "keymap.{}: value for scancode {} must be a single character, got '{}'",
                section,
                code,
                value
            ));
        }
        parsed.insert(code, ch);
    }
    Ok(Some(parsed))
}
