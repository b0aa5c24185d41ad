use crate::components::store::{get_json, keys, set_json, KeyValueStore, StoreScope};
use crate::error::CalendarResult;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Category of clustered days-off entries
pub const DAYS_OFF_CATEGORY: &str = "Days Off";
/// Category of iteration background entries
pub const ITERATION_CATEGORY: &str = "Iteration";
/// Category used when none was given
pub const UNCATEGORIZED: &str = "Uncategorized";

/// User-edited colors keyed by category
pub type ColorOverrides = BTreeMap<String, String>;

/// Category label with blank names folded into `Uncategorized`
pub fn normalize_category(category: &str) -> &str {
    let trimmed = category.trim();
    if trimmed.is_empty() {
        UNCATEGORIZED
    } else {
        trimmed
    }
}

/// Color for a category: user override, then the built-in table, then a generated color
pub fn resolve_color(category: &str, overrides: &ColorOverrides) -> String {
    let category = normalize_category(category);
    match overrides.get(category) {
        Some(color) => color.clone(),
        None => default_color(category),
    }
}

/// Color for a category ignoring user overrides
pub fn default_color(category: &str) -> String {
    match normalize_category(category) {
        DAYS_OFF_CATEGORY => "#ff6b6b".to_string(),
        ITERATION_CATEGORY => "#4dabf7".to_string(),
        UNCATEGORIZED => "#868e96".to_string(),
        other => generate_color(other),
    }
}

/// Deterministic color derived from the category name
pub fn generate_color(category: &str) -> String {
    let hash = category.chars().fold(0i32, |hash, c| {
        (c as i32).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash))
    });
    let hash = hash.unsigned_abs();

    let hue = hash % 360;
    let saturation = 55 + (hash / 360) % 25;
    let lightness = 45 + (hash / 9_000) % 15;

    hsl_to_hex(hue, saturation, lightness)
}

fn hsl_to_hex(hue: u32, saturation: u32, lightness: u32) -> String {
    let s = saturation as f64 / 100.0;
    let l = lightness as f64 / 100.0;

    let chroma = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let sector = hue as f64 / 60.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());

    let (r, g, b) = match hue / 60 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };

    let m = l - chroma / 2.0;
    let channel = |value: f64| ((value + m) * 255.0).round().clamp(0.0, 255.0) as u8;

    format!("#{:02x}{:02x}{:02x}", channel(r), channel(g), channel(b))
}

/// Apply panel edits on top of the saved overrides, edits win
pub fn merge_color_overrides(current: &ColorOverrides, edits: &ColorOverrides) -> ColorOverrides {
    let mut merged = current.clone();
    for (category, color) in edits {
        merged.insert(normalize_category(category).to_string(), color.clone());
    }
    merged
}

/// Load saved overrides, falling back to none
pub async fn load_color_overrides(store: &dyn KeyValueStore) -> ColorOverrides {
    match get_json::<ColorOverrides>(store, keys::EVENT_COLORS, StoreScope::Default).await {
        Ok(Some(overrides)) => overrides,
        Ok(None) => {
            debug!("No saved color settings found, using defaults");
            ColorOverrides::new()
        }
        Err(e) => {
            warn!("Failed to load color settings, using defaults: {}", e);
            ColorOverrides::new()
        }
    }
}

/// Persist the override map
pub async fn save_color_overrides(
    store: &dyn KeyValueStore,
    overrides: &ColorOverrides,
) -> CalendarResult<()> {
    set_json(store, keys::EVENT_COLORS, overrides, StoreScope::Default).await
}
