//! Route string normalization.
//!
//! # Responsibilities
//! - Split a route string into segments (empty segments dropped)
//! - Supply the default `index` action for one-segment routes
//! - Pick the middleware group from the first segment
//! - Map segments onto controller identifier segments
//!
//! # Design Decisions
//! - Pure functions: same route string, same key
//! - No regex; kebab-case conversion is a single character scan
//! - Case is normalized at lookup time by the registry, not here

use std::fmt;

/// Action appended to routes with fewer than two segments.
pub const DEFAULT_ACTION: &str = "index";

/// Separator between identifier segments.
pub const NAMESPACE_SEPARATOR: &str = "::";

/// Middleware bundle applied to a routed controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MiddlewareGroup {
    Admin,
    Frontend,
}

impl MiddlewareGroup {
    /// `admin` when the first segment is `admin` (any case), else `frontend`.
    pub fn for_segment(first: &str) -> Self {
        if first.eq_ignore_ascii_case("admin") {
            MiddlewareGroup::Admin
        } else {
            MiddlewareGroup::Frontend
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MiddlewareGroup::Admin => "admin",
            MiddlewareGroup::Frontend => "frontend",
        }
    }

    /// Config path listing this group's middleware.
    pub fn config_key(self) -> String {
        format!("middleware.groups.{}", self.as_str())
    }
}

impl fmt::Display for MiddlewareGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized form of a route string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteKey {
    path: String,
    group: MiddlewareGroup,
}

impl RouteKey {
    /// Normalize a route string.
    ///
    /// `account` → `Account::Index` (frontend),
    /// `admin/user-profile/edit` → `Admin::UserProfile::Edit` (admin),
    /// `` → `Index` (frontend).
    pub fn parse(route: &str) -> Self {
        let mut segments: Vec<&str> = route.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 2 {
            segments.push(DEFAULT_ACTION);
        }

        let group = MiddlewareGroup::for_segment(segments[0]);

        let path = segments
            .iter()
            .map(|segment| upper_first(&kebab_to_camel(segment)))
            .collect::<Vec<_>>()
            .join(NAMESPACE_SEPARATOR)
            .replace('_', "");

        Self { path, group }
    }

    /// Identifier path relative to the controller namespace.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn group(&self) -> MiddlewareGroup {
        self.group
    }
}

/// `user-profile` → `userProfile`. Only a hyphen followed by a lowercase
/// ASCII letter is folded; other hyphens stay.
pub fn kebab_to_camel(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('-', Some(next)) if next.is_ascii_lowercase() => {
                out.push(next.to_ascii_uppercase());
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

/// Uppercase the first character, leave the rest.
pub fn upper_first(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kebab_segments_become_pascal() {
        assert_eq!(RouteKey::parse("user-profile/show").path(), "UserProfile::Show");
        assert_eq!(kebab_to_camel("user-profile"), "userProfile");
        assert_eq!(upper_first("userProfile"), "UserProfile");
    }

    #[test]
    fn test_hyphen_before_non_lowercase_is_kept() {
        assert_eq!(kebab_to_camel("report-2024"), "report-2024");
        assert_eq!(kebab_to_camel("a-B"), "a-B");
        assert_eq!(kebab_to_camel("trailing-"), "trailing-");
        assert_eq!(kebab_to_camel("multi-word-name"), "multiWordName");
    }

    #[test]
    fn test_single_segment_gets_default_action() {
        assert_eq!(RouteKey::parse("account"), RouteKey::parse("account/index"));
        assert_eq!(RouteKey::parse("account").path(), "Account::Index");
    }

    #[test]
    fn test_empty_route_is_index() {
        let key = RouteKey::parse("");
        assert_eq!(key.path(), "Index");
        assert_eq!(key.group(), MiddlewareGroup::Frontend);

        assert_eq!(RouteKey::parse("///"), key);
    }

    #[test]
    fn test_empty_segments_are_dropped() {
        assert_eq!(RouteKey::parse("/admin//users/"), RouteKey::parse("admin/users"));
    }

    #[test]
    fn test_admin_group_is_case_insensitive() {
        let lower = RouteKey::parse("admin/users/edit");
        let title = RouteKey::parse("Admin/Users/Edit");
        assert_eq!(lower, title);
        assert_eq!(lower.group(), MiddlewareGroup::Admin);
        assert_eq!(RouteKey::parse("ADMIN/users").group(), MiddlewareGroup::Admin);
        assert_eq!(RouteKey::parse("administrator/users").group(), MiddlewareGroup::Frontend);
    }

    #[test]
    fn test_underscores_are_stripped() {
        // Capitalization happens before underscores are removed.
        assert_eq!(RouteKey::parse("order_items/list").path(), "Orderitems::List");
        assert_eq!(RouteKey::parse("_draft").path(), "draft::Index");
    }

    #[test]
    fn test_group_config_key() {
        assert_eq!(MiddlewareGroup::Admin.config_key(), "middleware.groups.admin");
        assert_eq!(MiddlewareGroup::Frontend.to_string(), "frontend");
    }
}
