//! Role → permission resolution.
//!
//! Permissions are statically configured per role. Resolution walks the
//! user's roles in order and keeps the first occurrence of each permission.

use std::collections::HashSet;

const TEACHER: &[&str] = &[
    "course:info:write",
    "course:testList",
    "course:test:read",
    "course:test:write",
    "course:test:add",
    "course:test:del",
    "course:userList",
    "course:user:add",
    "course:user:del",
    "course:del",
    "quest:list:read",
    "quest:read",
    "quest:update",
    "quest:create",
    "quest:del",
    "test:quest:del",
    "test:quest:add",
    "test:quest:update",
    "test:answer:read",
];

const ADMIN: &[&str] = &[
    "user:list:read",
    "user:fullName:write",
    "user:data:read",
    "user:roles:read",
    "user:roles:write",
    "user:block:read",
    "user:block:write",
    "course:add",
    "course:del",
    "quest:list:read",
    "quest:read",
    "quest:update",
    "quest:create",
    "quest:del",
];

/// Permissions granted by a single role; unknown roles grant nothing.
pub fn role_permissions(role: &str) -> &'static [&'static str] {
    match role {
        "admin" => ADMIN,
        "teacher" => TEACHER,
        "student" => &[],
        _ => &[],
    }
}

/// Resolve a role list into an ordered, duplicate-free permission list.
pub fn resolve<S: AsRef<str>>(roles: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut permissions = Vec::new();
    for role in roles {
        for &permission in role_permissions(role.as_ref()) {
            if seen.insert(permission) {
                permissions.push(permission.to_string());
            }
        }
    }
    permissions
}

/// Whether any of `roles` grants `permission`.
pub fn has_permission<S: AsRef<str>>(roles: &[S], permission: &str) -> bool {
    roles
        .iter()
        .any(|role| role_permissions(role.as_ref()).contains(&permission))
}
