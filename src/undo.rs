use std::collections::HashMap;
use std::hash::Hash;

use crate::gps_data::GpsData;

/// Where photo GPS data lives. `gps_data` returns the default value for
/// unknown keys.
pub trait GpsItemStore<K> {
    fn gps_data(&self, key: &K) -> GpsData;
    fn set_gps_data(&mut self, key: &K, data: GpsData);
}

impl<K: Eq + Hash + Clone> GpsItemStore<K> for HashMap<K, GpsData> {
    fn gps_data(&self, key: &K) -> GpsData {
        self.get(key).cloned().unwrap_or_default()
    }

    fn set_gps_data(&mut self, key: &K, data: GpsData) {
        if data == GpsData::default() {
            self.remove(key);
        } else {
            self.insert(key.clone(), data);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UndoInfo<K> {
    pub key: K,
    pub old: GpsData,
    pub new: GpsData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GpsUndoCommand<K> {
    text: String,
    infos: Vec<UndoInfo<K>>,
}

impl<K> Default for GpsUndoCommand<K> {
    fn default() -> Self {
        Self { text: String::new(), infos: Vec::new() }
    }
}

impl<K> GpsUndoCommand<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_undo_info(&mut self, info: UndoInfo<K>) {
        self.infos.push(info);
    }

    pub fn infos(&self) -> &[UndoInfo<K>] {
        &self.infos
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Restores the old values, last change first.
    pub fn undo<S: GpsItemStore<K> + ?Sized>(&self, store: &mut S) {
        for info in self.infos.iter().rev() {
            store.set_gps_data(&info.key, info.old.clone());
        }
    }

    pub fn redo<S: GpsItemStore<K> + ?Sized>(&self, store: &mut S) {
        for info in &self.infos {
            store.set_gps_data(&info.key, info.new.clone());
        }
    }
}

/// Receives finished undo commands, e.g. an application undo stack.
pub trait UndoSink<K> {
    fn push_command(&mut self, command: GpsUndoCommand<K>);
}

impl<K> UndoSink<K> for Vec<GpsUndoCommand<K>> {
    fn push_command(&mut self, command: GpsUndoCommand<K>) {
        self.push(command);
    }
}
