use std::collections::HashSet;

use crate::Id;

/// Generates unique names within a function by suffixing a counter onto a
/// prefix until the name is fresh.
#[derive(Clone, Debug, Default)]
pub struct NameGenerator {
    name_hash: HashSet<Id>,
}

impl NameGenerator {
    /// Construct a generator that avoids the given already-defined names.
    pub fn with_prev_defined_names(names: HashSet<Id>) -> Self {
        NameGenerator { name_hash: names }
    }

    /// Add generated names to the set of defined names.
    pub fn add_names(&mut self, names: impl IntoIterator<Item = Id>) {
        self.name_hash.extend(names)
    }

    /// Return a fresh name starting with `prefix`.
    pub fn gen_name<S>(&mut self, prefix: S) -> Id
    where
        S: Into<Id> + ToString + Clone,
    {
        let prefix_id: Id = prefix.clone().into();
        let mut name = prefix_id;
        let mut i = 0;
        while self.name_hash.contains(&name) {
            name = Id::new(format!("{}{}", prefix.to_string(), i));
            i += 1;
        }
        self.name_hash.insert(name);
        name
    }
}
