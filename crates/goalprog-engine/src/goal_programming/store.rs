use indexmap::IndexMap;

use super::builder::GoalConstraint;
use super::layout::VariableLayout;

/// Goal constraint records per ensemble member and function key, point and path kept apart.
#[derive(Clone, Debug, Default)]
pub(crate) struct ConstraintStore {
    point: Vec<IndexMap<String, Vec<GoalConstraint>>>,
    path: Vec<IndexMap<String, Vec<GoalConstraint>>>,
}

impl ConstraintStore {
    pub fn new(ensemble_size: usize) -> Self {
        Self {
            point: vec![IndexMap::new(); ensemble_size],
            path: vec![IndexMap::new(); ensemble_size],
        }
    }

    fn members(&self, path: bool) -> &[IndexMap<String, Vec<GoalConstraint>>] {
        if path {
            &self.path
        } else {
            &self.point
        }
    }

    fn entry(&mut self, path: bool, member: usize, key: &str) -> Option<&mut Vec<GoalConstraint>> {
        let members = if path { &mut self.path } else { &mut self.point };
        members
            .get_mut(member)
            .map(|records| records.entry(key.to_string()).or_default())
    }

    pub fn list(&self, path: bool, member: usize, key: &str) -> &[GoalConstraint] {
        self.members(path)
            .get(member)
            .and_then(|records| records.get(key))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn push_symbolic(&mut self, path: bool, member: usize, key: &str, record: GoalConstraint) {
        if let Some(list) = self.entry(path, member, key) {
            list.push(record);
        }
    }

    /// Installs a frozen record. It supersedes every frozen record on the key and the goal's own
    /// symbolic records; symbolic records of other goals stay.
    pub fn insert_frozen(&mut self, path: bool, member: usize, key: &str, record: GoalConstraint) {
        let goal = record.goal();
        if let Some(list) = self.entry(path, member, key) {
            list.retain(|r| !r.is_frozen() && r.goal() != goal);
            list.push(record);
        }
    }

    pub fn records(&self, path: bool, member: usize) -> impl Iterator<Item = &GoalConstraint> + '_ {
        self.members(path)
            .get(member)
            .into_iter()
            .flat_map(|records| records.values().flatten())
    }
}

/// Decision vector and extracted trajectories of the last successful priority.
#[derive(Clone, Debug, Default)]
pub(crate) struct ResultsCache {
    solved: Option<Solved>,
    current: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct Solved {
    pub values: Vec<f64>,
    pub layout: VariableLayout,
    pub results: Vec<IndexMap<String, Vec<f64>>>,
}

impl ResultsCache {
    pub fn store(&mut self, solved: Solved) {
        self.solved = Some(solved);
        self.current = true;
    }

    /// Marks the cache stale while a new priority is being solved; the data stays readable.
    pub fn invalidate(&mut self) {
        self.current = false;
    }

    pub fn clear(&mut self) {
        self.solved = None;
        self.current = false;
    }

    pub fn is_current(&self) -> bool {
        self.current
    }

    pub fn solved(&self) -> Option<&Solved> {
        self.solved.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal_programming::builder::{GoalRef, Side};
    use pretty_assertions::assert_eq;

    fn symbolic(index: usize) -> GoalConstraint {
        GoalConstraint::Symbolic {
            goal: GoalRef { path: false, index },
            epsilon: format!("eps_0_{index}"),
            side: Side::Lower,
            targets: vec![1.0],
        }
    }

    fn frozen(index: usize, value: f64) -> GoalConstraint {
        GoalConstraint::Frozen {
            goal: GoalRef { path: false, index },
            min: vec![value],
            max: vec![value],
        }
    }

    #[test]
    fn frozen_record_replaces_own_and_frozen_records() {
        let mut store = ConstraintStore::new(1);
        store.insert_frozen(false, 0, "f", frozen(0, 1.0));
        store.push_symbolic(false, 0, "f", symbolic(1));
        store.push_symbolic(false, 0, "f", symbolic(2));
        assert_eq!(store.list(false, 0, "f").len(), 3);

        store.insert_frozen(false, 0, "f", frozen(1, 2.0));
        assert_eq!(store.list(false, 0, "f"), &[symbolic(2), frozen(1, 2.0)]);

        store.insert_frozen(false, 0, "f", frozen(2, 3.0));
        assert_eq!(store.list(false, 0, "f"), &[frozen(2, 3.0)]);
        assert!(store.list(true, 0, "f").is_empty());
    }

    #[test]
    fn records_iterate_in_key_insertion_order() {
        let mut store = ConstraintStore::new(2);
        store.push_symbolic(false, 1, "b", symbolic(0));
        store.push_symbolic(false, 1, "a", symbolic(1));
        let goals: Vec<usize> = store.records(false, 1).map(|r| r.goal().index).collect();
        assert_eq!(goals, vec![0, 1]);
        assert_eq!(store.records(false, 0).count(), 0);
    }

    #[test]
    fn cache_keeps_last_results_when_invalidated() {
        let mut cache = ResultsCache::default();
        assert!(cache.solved().is_none());
        cache.store(Solved {
            values: vec![1.0],
            layout: VariableLayout::new(1, 1, 1),
            results: vec![IndexMap::new()],
        });
        assert!(cache.is_current());
        cache.invalidate();
        assert!(!cache.is_current());
        assert_eq!(cache.solved().map(|s| s.values.clone()), Some(vec![1.0]));
    }
}
