//! Turns a flat, fetched entity list into per-category groups and derives
//! the category set the forms pick from.
//!
//! Grouping is keyed by the exact category name, so "Work" and "work" form
//! two groups. The category list used by forms dedups names
//! case-insensitively (see [`merge_categories`]). Both behaviours are
//! intentional and kept separate.

use crate::models::{Categorized, Category};
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub struct Group<T> {
    pub name: String,
    pub items: Vec<T>,
}

/// Groups in order of first appearance; items keep their input order.
#[derive(Clone, Debug, PartialEq)]
pub struct Grouped<T> {
    groups: Vec<Group<T>>,
}

impl<T> Default for Grouped<T> {
    fn default() -> Self {
        Grouped { groups: Vec::new() }
    }
}

impl<T> Grouped<T> {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group<T>> {
        self.groups.iter()
    }

    pub fn get(&self, name: &str) -> Option<&[T]> {
        self.groups
            .iter()
            .find(|g| g.name == name)
            .map(|g| g.items.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.name.as_str())
    }

    /// Items in display order: group by group.
    pub fn flatten(&self) -> impl Iterator<Item = &T> {
        self.groups.iter().flat_map(|g| g.items.iter())
    }

    pub fn item_count(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }
}

pub fn group_by_category<T, I>(items: I) -> Grouped<T>
where
    T: Categorized,
    I: IntoIterator<Item = T>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Group<T>> = Vec::new();

    for item in items {
        let name = item.category().name.clone();
        match index.get(&name) {
            Some(&i) => groups[i].items.push(item),
            None => {
                index.insert(name.clone(), groups.len());
                groups.push(Group {
                    name,
                    items: vec![item],
                });
            }
        }
    }

    Grouped { groups }
}

/// One category per distinct id, taken from its first occurrence.
pub fn distinct_categories<'a, T, I>(items: I) -> Vec<Category>
where
    T: Categorized + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .map(|item| item.category())
        .filter(|category| seen.insert(category.id))
        .cloned()
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reconciled<T> {
    pub groups: Grouped<T>,
    pub categories: Vec<Category>,
}

/// Drafts (id 0) only live inside open forms and are dropped here.
pub fn reconcile<T>(items: Vec<T>) -> Reconciled<T>
where
    T: Categorized,
{
    let items: Vec<T> = items.into_iter().filter(|item| !item.is_draft()).collect();
    let categories = distinct_categories(items.iter());
    Reconciled {
        groups: group_by_category(items),
        categories,
    }
}

pub fn names_match(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

pub fn find_by_name<'a>(categories: &'a [Category], name: &str) -> Option<&'a Category> {
    categories.iter().find(|c| names_match(&c.name, name))
}

/// Adds incoming categories unless their id or (case-insensitive) name is
/// already known. Existing entries win.
pub fn merge_categories<I>(known: &mut Vec<Category>, incoming: I)
where
    I: IntoIterator<Item = Category>,
{
    for category in incoming {
        let duplicate = known
            .iter()
            .any(|k| k.id == category.id || names_match(&k.name, &category.name));
        if !duplicate {
            known.push(category);
        }
    }
}
