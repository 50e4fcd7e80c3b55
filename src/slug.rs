// URL-safe slugs for businesses, categories and sub-categories.

use std::collections::HashSet;

pub const CATEGORY_SLUG_MAX: usize = 120;
pub const SUBCATEGORY_SLUG_MAX: usize = 140;
pub const BUSINESS_SLUG_MAX: usize = 140;

/// Lowercase ASCII letters and digits joined by single hyphens.
///
/// "Car & Truck Expenses" -> "car-truck-expenses"
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;

    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_dash = true;
        }
    }

    slug
}

/// Slug for `base` not yet present in `used`; the result is added to `used`.
///
/// Collisions get a numeric suffix ("travel-2", "travel-3", ...), truncating
/// the base so the whole slug stays within `max_len`.
pub fn unique_slug(base: &str, used: &mut HashSet<String>, max_len: usize) -> String {
    let mut root: String = slugify(base).chars().take(max_len).collect();
    if root.is_empty() {
        root = "item".to_string();
    }

    let mut slug = root.clone();
    let mut n = 2;
    while used.contains(&slug) {
        let suffix = format!("-{}", n);
        let keep = max_len.saturating_sub(suffix.len());
        slug = format!("{}{}", &root[..keep.min(root.len())], suffix);
        n += 1;
    }

    used.insert(slug.clone());
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Car & Truck Expenses"), "car-truck-expenses");
        assert_eq!(slugify("Interest: Mortgage"), "interest-mortgage");
        assert_eq!(slugify("  Travel & Meals: Travel  "), "travel-meals-travel");
        assert_eq!(slugify("Café"), "caf");
        assert_eq!(slugify("&&&"), "");
    }

    #[test]
    fn test_unique_slug_adds_suffix() {
        let mut used = HashSet::new();

        assert_eq!(unique_slug("Travel", &mut used, 120), "travel");
        assert_eq!(unique_slug("Travel", &mut used, 120), "travel-2");
        assert_eq!(unique_slug("travel", &mut used, 120), "travel-3");
        assert_eq!(unique_slug("!!!", &mut used, 120), "item");
    }

    #[test]
    fn test_unique_slug_respects_max_len() {
        let mut used = HashSet::new();
        used.insert("abcdef".to_string());

        let slug = unique_slug("abcdefgh", &mut used, 6);
        assert_eq!(slug, "abcd-2");
        assert!(slug.len() <= 6);
    }
}
