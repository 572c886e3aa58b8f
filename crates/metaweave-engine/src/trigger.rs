//! Trigger index: which providers care about which markers

use std::collections::{BTreeMap, BTreeSet, HashMap};

use metaweave_ids::{ClassTag, Marker, TypeKey};

/// Maps markers to the classes of providers interested in types carrying them.
///
/// It also remembers the markers each type carried when last seen, so that a
/// provider still hears about a type after the marker it reacted to has been
/// removed. Bindings are used for discovery only; they are not dependency edges.
#[derive(Debug, Default)]
pub struct TriggerIndex {
    bindings: BTreeMap<Marker, BTreeSet<ClassTag>>,
    last_seen: HashMap<TypeKey, BTreeSet<Marker>>,
}

impl TriggerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a marker to a provider class, returning false if already bound
    pub fn add_trigger(&mut self, marker: Marker, class: ClassTag) -> bool {
        self.bindings.entry(marker).or_default().insert(class)
    }

    pub fn remove_trigger(&mut self, marker: &Marker, class: &ClassTag) -> bool {
        let Some(classes) = self.bindings.get_mut(marker) else {
            return false;
        };
        let removed = classes.remove(class);
        if classes.is_empty() {
            self.bindings.remove(marker);
        }
        removed
    }

    /// Remove every binding of a class
    pub fn remove_class(&mut self, class: &ClassTag) -> usize {
        let mut removed = 0;
        self.bindings.retain(|_, classes| {
            if classes.remove(class) {
                removed += 1;
            }
            !classes.is_empty()
        });
        removed
    }

    /// Classes bound to any of the given markers
    pub fn classes_for<'a, I>(&self, markers: I) -> BTreeSet<ClassTag>
    where
        I: IntoIterator<Item = &'a Marker>,
    {
        markers
            .into_iter()
            .filter_map(|marker| self.bindings.get(marker))
            .flat_map(|classes| classes.iter().cloned())
            .collect()
    }

    /// Markers a class is bound to
    pub fn triggers_of(&self, class: &ClassTag) -> BTreeSet<Marker> {
        self.bindings
            .iter()
            .filter(|(_, classes)| classes.contains(class))
            .map(|(marker, _)| marker.clone())
            .collect()
    }

    /// Record a type's current markers and return every class that must hear about the change.
    ///
    /// That is the union of classes bound to the current markers and to the
    /// markers the type carried the previous time it was seen.
    pub fn on_type_changed(&mut self, key: &TypeKey, current: &BTreeSet<Marker>) -> BTreeSet<ClassTag> {
        let previous = if current.is_empty() {
            self.last_seen.remove(key).unwrap_or_default()
        } else {
            self.last_seen
                .insert(key.clone(), current.clone())
                .unwrap_or_default()
        };
        let mut classes = self.classes_for(current);
        classes.extend(self.classes_for(&previous));
        classes
    }

    /// Forget what was seen of a type
    pub fn forget_type(&mut self, key: &TypeKey) {
        self.last_seen.remove(key);
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&Marker, &BTreeSet<ClassTag>)> {
        self.bindings.iter()
    }
}
