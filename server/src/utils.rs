use arena_shared::ConnectionId;

pub const MAX_DISPLAY_NAME_LEN: usize = 24;
/// Encoded size cap, so a full roster always fits one packet
pub const MAX_DISPLAY_NAME_BYTES: usize = 48;

// Client-supplied name without control characters, trimmed and capped, or
// "Player <connection>" when nothing printable is left
pub fn display_name_for(connection: ConnectionId, requested: Option<&str>) -> String {
    let printable: String = requested
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control())
        .collect();

    let mut name = String::new();
    for c in printable.trim().chars().take(MAX_DISPLAY_NAME_LEN) {
        if name.len() + c.len_utf8() > MAX_DISPLAY_NAME_BYTES {
            break;
        }
        name.push(c);
    }

    let name = name.trim_end();
    if name.is_empty() {
        return format!("Player {}", connection);
    }
    name.to_string()
}
