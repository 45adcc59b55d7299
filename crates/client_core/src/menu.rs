//! Permission-aware pruning of the navigation tree.

use shared::domain::{MenuItem, PermissionSet, ScreenKey};

/// Returns the subset of `items` visible to a holder of `permissions`.
///
/// Children are filtered before their parent is judged. An item survives when
/// it is public, when `permissions` grants any of its requirements, or when at
/// least one child survived. Every sibling list is stably sorted by
/// `sort_order`. The input is left untouched.
pub fn filter_menu(items: &[MenuItem], permissions: &PermissionSet) -> Vec<MenuItem> {
    let mut visible: Vec<MenuItem> = items
        .iter()
        .filter_map(|item| filter_item(item, permissions))
        .collect();
    // `sort_by_key` is stable, so equal orders keep payload order.
    visible.sort_by_key(|item| item.sort_order);
    visible
}

fn filter_item(item: &MenuItem, permissions: &PermissionSet) -> Option<MenuItem> {
    let children = filter_menu(&item.children, permissions);
    let visible = item.is_public()
        || permissions.grants_any(&item.permissions)
        || !children.is_empty();
    if !visible {
        return None;
    }

    Some(MenuItem {
        key: item.key.clone(),
        display_name: item.display_name.clone(),
        icon: item.icon.clone(),
        scope: item.scope.clone(),
        sort_order: item.sort_order,
        permissions: item.permissions.clone(),
        screens: item.screens.clone(),
        children,
    })
}

/// Depth-first lookup by key.
pub fn find_item<'a>(items: &'a [MenuItem], key: &str) -> Option<&'a MenuItem> {
    items.iter().find_map(|item| {
        if item.key == key {
            Some(item)
        } else {
            find_item(&item.children, key)
        }
    })
}

pub fn screen_for<'a>(item: &'a MenuItem, slot: &str) -> Option<&'a ScreenKey> {
    item.screens.get(slot)
}

#[cfg(test)]
#[path = "tests/menu_tests.rs"]
mod tests;
