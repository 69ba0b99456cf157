//! Username canonicalization

/// Minecraft formatting code marker (`§a`, `§l`, `§r`, ...)
const FORMAT_MARKER: char = '§';

/// Strip Minecraft formatting codes from a username
///
/// Removes every `§` followed by an ASCII alphanumeric or `-`. Anything else,
/// including a lone trailing `§`, is left untouched.
pub fn canonicalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c == FORMAT_MARKER {
            if let Some(&code) = chars.peek() {
                if code.is_ascii_alphanumeric() || code == '-' {
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }

    out
}
