use std::collections::HashSet;

use crate::alarm::{Alarm, AlarmId};

/// Allocate the smallest id not present in `existing`.
///
/// Panics when the 32-bit id space is exhausted; that many registry entries
/// means the external configuration is corrupt and there is nothing sane to
/// do about it.
pub fn generate_id(existing: &HashSet<AlarmId>) -> AlarmId {
    (0..=AlarmId::MAX)
        .find(|candidate| !existing.contains(candidate))
        .expect("alarm id space exhausted; external registry is corrupt")
}

/// The in-memory alarm set.
///
/// Exclusively owned by the service task; everything else refers to alarms
/// by id and looks the current record up on demand. Inserts append in
/// arrival order; the reconcile path adds in ascending id order.
pub struct AlarmCollection {
    alarms: Vec<Alarm>,
}

impl AlarmCollection {
    pub fn new() -> Self {
        Self { alarms: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Alarm> {
        self.alarms.iter_mut()
    }

    pub fn contains(&self, id: AlarmId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: AlarmId) -> Option<&Alarm> {
        self.alarms.iter().find(|alarm| alarm.id() == id)
    }

    pub fn get_mut(&mut self, id: AlarmId) -> Option<&mut Alarm> {
        self.alarms.iter_mut().find(|alarm| alarm.id() == id)
    }

    pub fn ids(&self) -> Vec<AlarmId> {
        self.alarms.iter().map(Alarm::id).collect()
    }

    pub fn id_set(&self) -> HashSet<AlarmId> {
        self.alarms.iter().map(Alarm::id).collect()
    }

    /// Append a new alarm. The id must not already be present; the
    /// reconcile/create paths guarantee that.
    pub fn insert(&mut self, alarm: Alarm) {
        debug_assert!(!self.contains(alarm.id()), "duplicate alarm id");
        self.alarms.push(alarm);
    }

    pub fn remove(&mut self, id: AlarmId) -> Option<Alarm> {
        let index = self.alarms.iter().position(|alarm| alarm.id() == id)?;
        Some(self.alarms.remove(index))
    }

    pub fn generate_id(&self) -> AlarmId {
        generate_id(&self.id_set())
    }

    /// Difference against the externally observed id set: ids to construct
    /// and ids to tear down, both ascending.
    pub fn diff(&self, external: &HashSet<AlarmId>) -> (Vec<AlarmId>, Vec<AlarmId>) {
        let known = self.id_set();

        let mut to_add: Vec<AlarmId> = external.difference(&known).copied().collect();
        to_add.sort_unstable();

        let mut to_remove: Vec<AlarmId> = known.difference(external).copied().collect();
        to_remove.sort_unstable();

        (to_add, to_remove)
    }
}

impl Default for AlarmCollection {
    fn default() -> Self {
        Self::new()
    }
}
