//! DOM key codes to X keysym-style names, as the backend's key mapper expects.

pub fn key_name(code: u32) -> Option<&'static str> {
    let name = match code {
        8 => "BackSpace",
        9 => "Tab",
        13 => "Return",
        27 => "Escape",
        33 => "Page_Up",
        34 => "Page_Down",
        35 => "End",
        36 => "Home",
        37 => "Left",
        38 => "Up",
        39 => "Right",
        40 => "Down",
        45 => "Insert",
        46 => "Delete",
        112..=123 => FUNCTION_KEYS[(code - 112) as usize],
        _ => return None,
    };
    Some(name)
}

const FUNCTION_KEYS: [&str; 12] = [
    "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12",
];

/// Inverse lookup, used when the host reports keys by name.
pub fn key_code(name: &str) -> Option<u32> {
    (8..=123).find(|code| key_name(*code) == Some(name))
}
