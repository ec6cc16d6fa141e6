//! Spoken key names and synthetic key presses
//!
//! Maps names like "ctrl", "page down" or "f5" to enigo keys and drives
//! combined presses: modifiers down in order, last key clicked, modifiers
//! released in reverse.

use std::thread;
use std::time::Duration;

use enigo::{Direction, Enigo, Key, Keyboard, Settings};

use super::VolumeAction;

/// Gap between repeated presses so the OS registers each one
const REPEAT_GAP: Duration = Duration::from_millis(30);

/// Parse one spoken key name
pub fn parse_key(name: &str) -> Option<Key> {
    let name = name.trim().to_lowercase();
    let key = match name.as_str() {
        "ctrl" | "control" => Key::Control,
        "alt" | "option" => Key::Alt,
        "shift" => Key::Shift,
        "win" | "windows" | "cmd" | "command" | "meta" | "super" => Key::Meta,
        "enter" | "return" => Key::Return,
        "tab" => Key::Tab,
        "esc" | "escape" => Key::Escape,
        "space" | "spacebar" => Key::Space,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" | "page up" => Key::PageUp,
        "pagedown" | "page down" => Key::PageDown,
        "capslock" | "caps lock" => Key::CapsLock,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Unicode(c),
                _ => return None,
            }
        }
    };
    Some(key)
}

/// Parse every key of a combination, naming the first unknown one
pub fn parse_combo(names: &[String]) -> Result<Vec<Key>, String> {
    names
        .iter()
        .map(|name| parse_key(name).ok_or_else(|| name.clone()))
        .collect()
}

/// Media key for a volume action
pub fn volume_key(action: VolumeAction) -> Key {
    match action {
        VolumeAction::Up => Key::VolumeUp,
        VolumeAction::Down => Key::VolumeDown,
        VolumeAction::ToggleMute | VolumeAction::Unmute => Key::VolumeMute,
    }
}

/// Hold all but the last key, click the last, release in reverse
pub fn press_combo(keys: &[Key]) -> Result<(), String> {
    let Some((last, modifiers)) = keys.split_last() else {
        return Err("empty key combination".to_string());
    };

    let mut enigo = Enigo::new(&Settings::default()).map_err(|e| e.to_string())?;
    for key in modifiers {
        enigo.key(*key, Direction::Press).map_err(|e| e.to_string())?;
    }
    let clicked = enigo.key(*last, Direction::Click).map_err(|e| e.to_string());
    for key in modifiers.iter().rev() {
        let _ = enigo.key(*key, Direction::Release);
    }
    clicked
}

/// Click `key` `presses` times
pub fn press_repeated(key: Key, presses: u32) -> Result<(), String> {
    let mut enigo = Enigo::new(&Settings::default()).map_err(|e| e.to_string())?;
    for _ in 0..presses {
        enigo.key(key, Direction::Click).map_err(|e| e.to_string())?;
        thread::sleep(REPEAT_GAP);
    }
    Ok(())
}
