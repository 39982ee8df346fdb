//! Logical name normalization shared by every loader.
//!
//! All loaders fold names the same way so that an entry stored as
//! `Sprites\TROOA1.png` in one archive collides with `sprites/trooa1.png`
//! in another. Lookups normalize the query with the same rule.

use std::collections::HashSet;

use super::Entry;

/// Normalize a stored name into the namespace convention.
///
/// - backslashes become forward slashes
/// - leading and duplicate slashes are dropped
/// - ASCII letters are lowercased
pub fn normalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for part in raw.split(['/', '\\']).filter(|p| !p.is_empty()) {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(part);
    }
    out.make_ascii_lowercase();
    out
}

/// Remove repeated names, keeping the last occurrence of each.
///
/// Surviving entries keep their relative order.
pub fn dedup_last_wins(entries: Vec<Entry>) -> Vec<Entry> {
    let mut seen = HashSet::with_capacity(entries.len());
    let mut kept: Vec<Entry> = entries
        .into_iter()
        .rev()
        .filter(|e| seen.insert(e.name.clone()))
        .collect();
    kept.reverse();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Locator;

    #[test]
    fn test_normalize_lowercases() {
        assert_eq!(normalize_name("PLAYPAL"), "playpal");
    }

    #[test]
    fn test_normalize_separators() {
        assert_eq!(normalize_name("sounds\\DSPISTOL.wav"), "sounds/dspistol.wav");
        assert_eq!(normalize_name("/maps//MAP01.wad"), "maps/map01.wad");
        assert_eq!(normalize_name("textures/"), "textures");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize_name(""), "");
        assert_eq!(normalize_name("///"), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_name("Gfx\\Status/FACE00.png");
        assert_eq!(normalize_name(&once), once);
    }

    #[test]
    fn test_dedup_last_wins() {
        let entries = vec![
            Entry::new("things", Locator::span(0, 10), 10),
            Entry::new("linedefs", Locator::span(10, 4), 4),
            Entry::new("THINGS", Locator::span(14, 20), 20),
        ];

        let kept = dedup_last_wins(entries);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].name, "linedefs");
        assert_eq!(kept[1].name, "things");
        assert_eq!(kept[1].locator, Locator::span(14, 20));
    }
}
