//! Function and parameter descriptors, and the pending set of exported functions
//!
//! Global invariants enforced:
//! - A function name appears at most once in the pending set
//! - Iteration order over pending functions is by name (deterministic)
//! - A descriptor leaves the pending set exactly once, when it is instrumented

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One parameter of a function, in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    /// Base type, qualifiers and array suffix; pointer stars are not included
    #[serde(rename = "type")]
    pub ty: String,
    pub is_pointer: bool,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, ty: impl Into<String>, is_pointer: bool) -> Self {
        ParameterDescriptor {
            name: name.into(),
            ty: ty.into(),
            is_pointer,
        }
    }
}

/// An exported function and its (possibly provisional) parameter list
///
/// Parameters coming from a header are coarse. They are replaced, never
/// merged, once the definition is located in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub params: Vec<ParameterDescriptor>,
}

impl FunctionDescriptor {
    pub fn new(name: impl Into<String>, params: Vec<ParameterDescriptor>) -> Self {
        FunctionDescriptor {
            name: name.into(),
            params,
        }
    }
}

/// Exported functions that have not been instrumented yet in this run
#[derive(Debug, Clone, Default)]
pub struct PendingFunctions {
    functions: BTreeMap<String, FunctionDescriptor>,
}

impl PendingFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor unless one with the same name is already pending.
    ///
    /// Returns true if the descriptor was added.
    pub fn insert_if_absent(&mut self, function: FunctionDescriptor) -> bool {
        if self.functions.contains_key(&function.name) {
            return false;
        }
        self.functions.insert(function.name.clone(), function);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.get(name)
    }

    /// Remove a descriptor from the set, retiring it for the rest of the run
    pub fn retire(&mut self, name: &str) -> Option<FunctionDescriptor> {
        self.functions.remove(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Pending names in iteration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Names left over at the end of a run, sorted
    pub fn into_leftovers(self) -> Vec<String> {
        self.functions.into_keys().collect()
    }
}

impl FromIterator<FunctionDescriptor> for PendingFunctions {
    fn from_iter<I: IntoIterator<Item = FunctionDescriptor>>(iter: I) -> Self {
        let mut pending = PendingFunctions::new();
        for function in iter {
            pending.insert_if_absent(function);
        }
        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_descriptor_wins() {
        let mut pending = PendingFunctions::new();
        assert!(pending.insert_if_absent(FunctionDescriptor::new(
            "obs_init",
            vec![ParameterDescriptor::new("a", "int", false)],
        )));
        assert!(!pending.insert_if_absent(FunctionDescriptor::new("obs_init", vec![])));
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.get("obs_init").unwrap().params.len(), 1);
    }

    #[test]
    fn test_retire_is_at_most_once() {
        let mut pending: PendingFunctions = vec![
            FunctionDescriptor::new("b", vec![]),
            FunctionDescriptor::new("a", vec![]),
        ]
        .into_iter()
        .collect();

        assert!(pending.retire("a").is_some());
        assert!(pending.retire("a").is_none());
        assert_eq!(pending.into_leftovers(), vec!["b".to_string()]);
    }

    #[test]
    fn test_names_are_sorted() {
        let pending: PendingFunctions = ["zeta", "alpha", "mid"]
            .iter()
            .map(|n| FunctionDescriptor::new(*n, vec![]))
            .collect();
        let names: Vec<&str> = pending.names().collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }
}
