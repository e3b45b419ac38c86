//! Avatar color and initial for message senders.

pub const AVATAR_PALETTE: [&str; 6] = [
    "#6c5ce7", "#e84393", "#00b894", "#fdcb6e", "#0984e3", "#e17055",
];

/// Picks a palette color from the sum of the UTF-16 code units of `uid`.
pub fn avatar_color(uid: &str) -> &'static str {
    let sum: u64 = uid.encode_utf16().map(u64::from).sum();
    AVATAR_PALETTE[(sum % AVATAR_PALETTE.len() as u64) as usize]
}

/// First character of `name`, upper-cased, or `?` for an empty name.
pub fn avatar_initial(name: &str) -> String {
    match name.chars().next() {
        Some(c) => c.to_uppercase().collect(),
        None => "?".to_string(),
    }
}
