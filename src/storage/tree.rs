//! An in-memory, indexed set of staff records
//!
//! The [`Tree`] knows nothing about the filesystem. It keeps the records
//! keyed by ID, plus derived indexes that are maintained on every mutation:
//! a graph of management edges (child → manager), the set of root records,
//! and a case-folded email index.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet, HashMap},
};

use chrono::Utc;
use petgraph::{Direction, algo, graphmap::DiGraphMap};
use tracing::instrument;

use crate::{
    domain::{Parent, Profile, StaffId, StaffRecord},
    storage::{Filters, PageRequest, RecordStore, StoreError},
};

/// An in-memory representation of the staff directory.
#[derive(Debug, Clone)]
pub struct Tree {
    /// The records, keyed (and therefore ordered) by ID.
    records: BTreeMap<StaffId, StaffRecord>,

    /// Management graph. Nodes are IDs, edges point from a record to its
    /// manager. Roots have no outgoing edge.
    graph: DiGraphMap<StaffId, ()>,

    /// Records with no manager.
    roots: BTreeSet<StaffId>,

    /// Lower-cased email to owning record.
    emails: HashMap<String, StaffId>,

    /// The highest ID ever assigned. IDs are never reused.
    last_id: u64,
}

impl Default for Tree {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            graph: DiGraphMap::new(),
            roots: BTreeSet::new(),
            emails: HashMap::new(),
            last_id: 0,
        }
    }
}

impl Tree {
    /// Rebuild a tree from previously stored records.
    ///
    /// `last_id` is the highest ID ever assigned; it is raised to the highest
    /// ID present if the records contain a larger one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if two records share an ID, more than
    /// one record has no manager, a manager reference dangles, or the
    /// management graph contains a cycle, and
    /// [`StoreError::DuplicateEmail`] if two records share an email.
    pub fn from_records(
        records: impl IntoIterator<Item = StaffRecord>,
        last_id: u64,
    ) -> Result<Self, StoreError> {
        let mut tree = Self {
            last_id,
            ..Self::default()
        };

        for record in records {
            let id = record.id();
            if tree.records.contains_key(&id) {
                return Err(StoreError::Corrupt(format!("duplicate staff ID {id}")));
            }
            if let Some(key) = email_key(&record) {
                if tree.emails.contains_key(&key) {
                    return Err(StoreError::DuplicateEmail(key));
                }
            }
            tree.last_id = tree.last_id.max(id.get());
            tree.link(&record);
            tree.records.insert(id, record);
        }

        if tree.roots.len() > 1 {
            return Err(StoreError::Corrupt(format!(
                "{} staff records have no manager",
                tree.roots.len()
            )));
        }

        for record in tree.records.values() {
            if let Parent::Staff(manager) = record.parent() {
                if !tree.records.contains_key(&manager) {
                    return Err(StoreError::Corrupt(format!(
                        "staff record {} references missing manager {manager}",
                        record.id()
                    )));
                }
            }
        }

        if algo::is_cyclic_directed(&tree.graph) {
            return Err(StoreError::Corrupt(
                "management chain contains a cycle".to_string(),
            ));
        }

        Ok(tree)
    }

    /// Iterate over all records in ID order.
    pub fn records(&self) -> impl Iterator<Item = &StaffRecord> {
        self.records.values()
    }

    /// The highest ID ever assigned.
    #[must_use]
    pub const fn last_id(&self) -> u64 {
        self.last_id
    }

    /// IDs of the direct subordinates of `id`, in ID order.
    #[must_use]
    pub fn children(&self, id: StaffId) -> BTreeSet<StaffId> {
        if !self.graph.contains_node(id) {
            return BTreeSet::new();
        }
        self.graph
            .neighbors_directed(id, Direction::Incoming)
            .collect()
    }

    /// The owner of an email address, ignoring case.
    fn email_owner(&self, email: &str) -> Option<StaffId> {
        self.emails.get(&email.to_lowercase()).copied()
    }

    /// Add a record's edges and index entries.
    fn link(&mut self, record: &StaffRecord) {
        let id = record.id();
        self.graph.add_node(id);
        match record.parent() {
            Parent::Root => {
                self.roots.insert(id);
            }
            Parent::Staff(manager) => {
                self.graph.add_edge(id, manager, ());
            }
        }
        if let Some(key) = email_key(record) {
            self.emails.insert(key, id);
        }
    }

    /// Remove a record's edges and index entries. The graph node stays.
    fn unlink(&mut self, record: &StaffRecord) {
        let id = record.id();
        match record.parent() {
            Parent::Root => {
                self.roots.remove(&id);
            }
            Parent::Staff(manager) => {
                self.graph.remove_edge(id, manager);
            }
        }
        if let Some(key) = email_key(record) {
            self.emails.remove(&key);
        }
    }

    fn ensure_email_free(
        &self,
        profile: &Profile,
        owner: Option<StaffId>,
    ) -> Result<(), StoreError> {
        let Some(email) = profile.email.as_deref().filter(|email| !email.is_empty()) else {
            return Ok(());
        };
        match self.email_owner(email) {
            Some(existing) if Some(existing) != owner => {
                Err(StoreError::DuplicateEmail(email.to_string()))
            }
            _ => Ok(()),
        }
    }
}

fn email_key(record: &StaffRecord) -> Option<String> {
    record
        .email()
        .filter(|email| !email.is_empty())
        .map(str::to_lowercase)
}

/// Orders by last name, then first name (case-insensitive, missing names
/// first), then ID.
fn by_name(a: &StaffRecord, b: &StaffRecord) -> Ordering {
    let key = |record: &StaffRecord| {
        let profile = record.profile();
        (
            profile.last_name.as_deref().map(str::to_lowercase),
            profile.first_name.as_deref().map(str::to_lowercase),
            record.id(),
        )
    };
    key(a).cmp(&key(b))
}

impl RecordStore for Tree {
    fn find(&self, id: StaffId) -> Result<Option<StaffRecord>, StoreError> {
        Ok(self.records.get(&id).cloned())
    }

    fn exists(&self, id: StaffId) -> Result<bool, StoreError> {
        Ok(self.records.contains_key(&id))
    }

    fn find_chief(&self) -> Result<Option<StaffRecord>, StoreError> {
        Ok(self
            .roots
            .first()
            .and_then(|id| self.records.get(id))
            .cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<StaffRecord>, StoreError> {
        Ok(self
            .email_owner(email)
            .and_then(|id| self.records.get(&id))
            .cloned())
    }

    fn subordinates(&self, id: StaffId) -> Result<Vec<StaffRecord>, StoreError> {
        let mut subordinates: Vec<_> = self
            .children(id)
            .into_iter()
            .filter_map(|child| self.records.get(&child).cloned())
            .collect();
        subordinates.sort_by(by_name);
        Ok(subordinates)
    }

    fn is_ancestor(&self, ancestor: StaffId, id: StaffId) -> Result<bool, StoreError> {
        if ancestor == id {
            return Ok(true);
        }
        if !self.graph.contains_node(id) || !self.graph.contains_node(ancestor) {
            return Ok(false);
        }
        // Edges point upwards, so a path from `id` reaches its managers.
        Ok(algo::has_path_connecting(&self.graph, id, ancestor, None))
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.len())
    }

    fn scan(
        &self,
        filters: &Filters,
        page: PageRequest,
    ) -> Result<(Vec<StaffRecord>, usize), StoreError> {
        let matching: Vec<_> = self
            .records
            .values()
            .filter(|record| filters.matches(record))
            .collect();
        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(page.offset())
            .take(page.limit())
            .cloned()
            .collect();
        Ok((items, total))
    }

    fn search_by_name(&self, term: &str) -> Result<Vec<StaffRecord>, StoreError> {
        let term = term.to_lowercase();
        let contains = |name: &Option<String>| {
            name.as_deref()
                .is_some_and(|name| name.to_lowercase().contains(&term))
        };

        let mut found: Vec<_> = self
            .records
            .values()
            .filter(|record| {
                let profile = record.profile();
                contains(&profile.first_name) || contains(&profile.last_name)
            })
            .cloned()
            .collect();
        found.sort_by(by_name);
        Ok(found)
    }

    fn find_by_position(&self, position: &str) -> Result<Vec<StaffRecord>, StoreError> {
        let position = position.to_lowercase();
        Ok(self
            .records
            .values()
            .filter(|record| {
                record
                    .profile()
                    .position
                    .as_deref()
                    .is_some_and(|p| p.to_lowercase() == position)
            })
            .cloned()
            .collect())
    }

    #[instrument(level = "debug", skip(self, profile))]
    fn insert(&mut self, parent: Parent, profile: Profile) -> Result<StaffRecord, StoreError> {
        self.ensure_email_free(&profile, None)?;

        let id = self
            .last_id
            .checked_add(1)
            .and_then(StaffId::new)
            .ok_or_else(|| {
                StoreError::Corrupt(format!("cannot allocate staff ID after {}", self.last_id))
            })?;
        self.last_id = id.get();

        let record = StaffRecord::new(id, parent, profile, Utc::now());
        self.link(&record);
        self.records.insert(id, record.clone());
        Ok(record)
    }

    #[instrument(level = "debug", skip(self, profile))]
    fn update(
        &mut self,
        id: StaffId,
        parent: Parent,
        profile: Profile,
    ) -> Result<StaffRecord, StoreError> {
        self.ensure_email_free(&profile, Some(id))?;

        let mut record = self.records.remove(&id).ok_or(StoreError::Missing(id))?;
        self.unlink(&record);
        record.revise(parent, profile, Utc::now());
        self.link(&record);
        self.records.insert(id, record.clone());
        Ok(record)
    }

    #[instrument(level = "debug", skip(self))]
    fn remove(&mut self, id: StaffId) -> Result<StaffRecord, StoreError> {
        let record = self.records.remove(&id).ok_or(StoreError::Missing(id))?;
        self.unlink(&record);
        self.graph.remove_node(id);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> StaffId {
        StaffId::new(raw).unwrap()
    }

    fn named(first: &str, last: &str) -> Profile {
        Profile {
            first_name: Some(first.into()),
            last_name: Some(last.into()),
            ..Profile::default()
        }
    }

    fn with_email(email: &str) -> Profile {
        Profile {
            email: Some(email.into()),
            ..Profile::default()
        }
    }

    #[test]
    fn insert_assigns_sequential_ids() {
        let mut tree = Tree::default();
        let first = tree.insert(Parent::Root, Profile::default()).unwrap();
        let second = tree.insert(Parent::Staff(first.id()), Profile::default()).unwrap();

        assert_eq!(first.id(), id(1));
        assert_eq!(second.id(), id(2));
        assert_eq!(tree.count().unwrap(), 2);
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut tree = Tree::default();
        let first = tree.insert(Parent::Root, Profile::default()).unwrap();
        tree.remove(first.id()).unwrap();

        let next = tree.insert(Parent::Root, Profile::default()).unwrap();
        assert_eq!(next.id(), id(2));
    }

    #[test]
    fn exists_tracks_inserts_and_removals() {
        let mut tree = Tree::default();
        assert!(!tree.exists(id(1)).unwrap());

        let chief = tree.insert(Parent::Root, Profile::default()).unwrap();
        assert!(tree.exists(chief.id()).unwrap());

        tree.remove(chief.id()).unwrap();
        assert!(!tree.exists(chief.id()).unwrap());
    }

    #[test]
    fn children_follow_parent_changes() {
        let mut tree = Tree::default();
        let chief = tree.insert(Parent::Root, Profile::default()).unwrap();
        let deputy = tree.insert(Parent::Staff(chief.id()), Profile::default()).unwrap();
        let clerk = tree.insert(Parent::Staff(chief.id()), Profile::default()).unwrap();

        assert_eq!(
            tree.children(chief.id()),
            BTreeSet::from([deputy.id(), clerk.id()])
        );

        tree.update(clerk.id(), Parent::Staff(deputy.id()), Profile::default())
            .unwrap();

        assert_eq!(tree.children(chief.id()), BTreeSet::from([deputy.id()]));
        assert_eq!(tree.children(deputy.id()), BTreeSet::from([clerk.id()]));
    }

    #[test]
    fn chief_is_tracked() {
        let mut tree = Tree::default();
        assert!(tree.find_chief().unwrap().is_none());

        let chief = tree.insert(Parent::Root, Profile::default()).unwrap();
        assert_eq!(tree.find_chief().unwrap().map(|r| r.id()), Some(chief.id()));

        tree.remove(chief.id()).unwrap();
        assert!(tree.find_chief().unwrap().is_none());
    }

    #[test]
    fn ancestry_walks_up_the_chain() {
        let mut tree = Tree::default();
        let chief = tree.insert(Parent::Root, Profile::default()).unwrap().id();
        let middle = tree.insert(Parent::Staff(chief), Profile::default()).unwrap().id();
        let leaf = tree.insert(Parent::Staff(middle), Profile::default()).unwrap().id();

        assert!(tree.is_ancestor(chief, leaf).unwrap());
        assert!(tree.is_ancestor(leaf, leaf).unwrap());
        assert!(!tree.is_ancestor(leaf, chief).unwrap());
        assert!(!tree.is_ancestor(id(99), leaf).unwrap());
    }

    #[test]
    fn subordinates_are_sorted_by_name() {
        let mut tree = Tree::default();
        let chief = tree.insert(Parent::Root, Profile::default()).unwrap().id();
        tree.insert(Parent::Staff(chief), named("Zoe", "Brown")).unwrap();
        tree.insert(Parent::Staff(chief), named("Amy", "Adams")).unwrap();
        tree.insert(Parent::Staff(chief), named("Bob", "Brown")).unwrap();

        let names: Vec<_> = tree
            .subordinates(chief)
            .unwrap()
            .iter()
            .map(StaffRecord::display_name)
            .collect();
        assert_eq!(names, ["Amy Adams", "Bob Brown", "Zoe Brown"]);
    }

    #[test]
    fn emails_are_unique_ignoring_case() {
        let mut tree = Tree::default();
        let first = tree.insert(Parent::Root, with_email("jo@example.com")).unwrap();

        let error = tree
            .insert(Parent::Staff(first.id()), with_email("JO@example.com"))
            .unwrap_err();
        assert!(matches!(error, StoreError::DuplicateEmail(_)));

        // Re-saving a record with its own email is fine.
        tree.update(first.id(), Parent::Root, with_email("Jo@Example.com"))
            .unwrap();
        assert_eq!(
            tree.find_by_email("jo@example.com").unwrap().map(|r| r.id()),
            Some(first.id())
        );
    }

    #[test]
    fn scan_pages_in_id_order() {
        let mut tree = Tree::default();
        for _ in 0..25 {
            tree.insert(Parent::Root, Profile::default()).unwrap();
        }

        let (items, total) = tree.scan(&Filters::default(), PageRequest::new(3, 10)).unwrap();

        assert_eq!(total, 25);
        let ids: Vec<_> = items.iter().map(|r| r.id().get()).collect();
        assert_eq!(ids, [21, 22, 23, 24, 25]);
    }

    #[test]
    fn search_matches_either_name() {
        let mut tree = Tree::default();
        tree.insert(Parent::Root, named("Anna", "Karenina")).unwrap();
        tree.insert(Parent::Root, named("Ivan", "Annenkov")).unwrap();
        tree.insert(Parent::Root, named("Boris", "Godunov")).unwrap();

        let names: Vec<_> = tree
            .search_by_name("ANN")
            .unwrap()
            .iter()
            .map(StaffRecord::display_name)
            .collect();
        assert_eq!(names, ["Ivan Annenkov", "Anna Karenina"]);
    }

    #[test]
    fn position_match_ignores_case() {
        let mut tree = Tree::default();
        let profile = Profile {
            position: Some("Engineer".into()),
            ..Profile::default()
        };
        tree.insert(Parent::Root, profile).unwrap();
        tree.insert(Parent::Root, Profile::default()).unwrap();

        assert_eq!(tree.find_by_position("engineer").unwrap().len(), 1);
        assert!(tree.find_by_position("engine").unwrap().is_empty());
    }

    #[test]
    fn from_records_rejects_dangling_manager() {
        let mut source = Tree::default();
        let chief = source.insert(Parent::Root, Profile::default()).unwrap();
        let child = source.insert(Parent::Staff(chief.id()), Profile::default()).unwrap();

        let error = Tree::from_records([child], 2).unwrap_err();
        assert!(matches!(error, StoreError::Corrupt(_)));
    }

    #[test]
    fn from_records_rejects_cycles() {
        let mut source = Tree::default();
        let a = source.insert(Parent::Root, Profile::default()).unwrap().id();
        let b = source.insert(Parent::Staff(a), Profile::default()).unwrap().id();
        // Bypass the service checks to build a loop.
        source.update(a, Parent::Staff(b), Profile::default()).unwrap();

        let records: Vec<_> = source.records().cloned().collect();
        let error = Tree::from_records(records, source.last_id()).unwrap_err();
        assert!(matches!(error, StoreError::Corrupt(_)));
    }

    #[test]
    fn from_records_rejects_second_chief() {
        let mut source = Tree::default();
        source.insert(Parent::Root, Profile::default()).unwrap();
        // The store does not police the single chief.
        source.insert(Parent::Root, Profile::default()).unwrap();

        let records: Vec<_> = source.records().cloned().collect();
        let error = Tree::from_records(records, source.last_id()).unwrap_err();
        assert!(matches!(error, StoreError::Corrupt(message) if message.contains("no manager")));
    }

    #[test]
    fn from_records_restores_indexes() {
        let mut source = Tree::default();
        let chief = source.insert(Parent::Root, with_email("boss@example.com")).unwrap();
        source.insert(Parent::Staff(chief.id()), Profile::default()).unwrap();
        source.remove(id(2)).unwrap();

        let records: Vec<_> = source.records().cloned().collect();
        let mut restored = Tree::from_records(records, source.last_id()).unwrap();

        assert_eq!(restored.find_chief().unwrap().map(|r| r.id()), Some(chief.id()));
        assert!(restored.find_by_email("BOSS@example.com").unwrap().is_some());
        let next = restored.insert(Parent::Staff(chief.id()), Profile::default()).unwrap();
        assert_eq!(next.id(), id(3));
    }
}
