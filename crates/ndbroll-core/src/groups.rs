use crate::types::GroupId;

/// Ascending, duplicate-free set of group ids backed by a `Vec`.
///
/// Clusters have a handful of groups, so binary-search insertion into a
/// contiguous vector beats a tree and keeps index-based cursors cheap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupSet {
    groups: Vec<GroupId>,
}

impl GroupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `group` at its sorted position. Returns false if already present.
    pub fn insert(&mut self, group: GroupId) -> bool {
        match self.groups.binary_search(&group) {
            Ok(_) => false,
            Err(pos) => {
                self.groups.insert(pos, group);
                true
            }
        }
    }

    pub fn position(&self, group: GroupId) -> Option<usize> {
        self.groups.binary_search(&group).ok()
    }

    pub fn get(&self, index: usize) -> Option<GroupId> {
        self.groups.get(index).copied()
    }

    pub fn remove_at(&mut self, index: usize) -> GroupId {
        self.groups.remove(index)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.groups.iter().copied()
    }
}

impl FromIterator<GroupId> for GroupSet {
    fn from_iter<I: IntoIterator<Item = GroupId>>(iter: I) -> Self {
        let mut set = GroupSet::new();
        for g in iter {
            set.insert(g);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_order_and_drops_duplicates() {
        let set: GroupSet = [5, 1, 3, 1, 5, 0, 7, 3].into_iter().collect();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 1, 3, 5, 7]);
    }

    #[test]
    fn insert_reports_new_entries() {
        let mut set = GroupSet::new();
        assert!(set.insert(2));
        assert!(!set.insert(2));
        assert!(set.insert(-1));
        assert_eq!(set.get(0), Some(-1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn position_and_remove() {
        let mut set: GroupSet = [10, 20, 30].into_iter().collect();
        assert_eq!(set.position(20), Some(1));
        assert_eq!(set.position(25), None);
        assert_eq!(set.remove_at(1), 20);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![10, 30]);
        assert_eq!(set.position(30), Some(1));
    }

    #[test]
    fn empty_set() {
        let set = GroupSet::new();
        assert!(set.is_empty());
        assert_eq!(set.get(0), None);
    }
}
