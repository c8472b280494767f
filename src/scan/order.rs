//! Reordering a discovered batch so files sharing a post stay together.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Group `items` by their shared identifier, larger groups first, ties by
/// identifier; paths are sorted within a group. Items without an identifier
/// follow, sorted by path.
pub fn order_by_group(items: Vec<(PathBuf, Option<String>)>) -> Vec<PathBuf> {
    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    let mut loose = Vec::new();
    for (path, id) in items {
        match id {
            Some(id) if !id.is_empty() => groups.entry(id).or_default().push(path),
            _ => loose.push(path),
        }
    }

    let mut groups: Vec<(String, Vec<PathBuf>)> = groups.into_iter().collect();
    groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(&b.0)));
    loose.sort();

    let mut ordered = Vec::new();
    for (_, mut paths) in groups {
        paths.sort();
        ordered.extend(paths);
    }
    ordered.extend(loose);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(path: &str, id: Option<&str>) -> (PathBuf, Option<String>) {
        (PathBuf::from(path), id.map(str::to_string))
    }

    #[test]
    fn larger_groups_come_first() {
        let ordered = order_by_group(vec![
            item("z.jpg", None),
            item("b2.jpg", Some("B")),
            item("a1.jpg", Some("A")),
            item("b1.jpg", Some("B")),
            item("c.jpg", Some("")),
        ]);
        let names: Vec<&str> = ordered.iter().map(|p| p.to_str().unwrap()).collect();
        assert_eq!(names, vec!["b1.jpg", "b2.jpg", "a1.jpg", "c.jpg", "z.jpg"]);
    }
}
