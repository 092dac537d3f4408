use std::collections::HashMap;

/// Which properties must re-notify when another property changes.
///
/// Built once when the view-model is constructed.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    dependents: HashMap<String, Vec<String>>,
    always: Vec<String>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// `dependent` re-notifies whenever any of `sources` changes
    pub fn depends_on(mut self, dependent: &str, sources: &[&str]) -> Self {
        for source in sources {
            let dependents = self.dependents.entry(source.to_string()).or_default();
            if !dependents.iter().any(|d| d == dependent) {
                dependents.push(dependent.to_string());
            }
        }
        self
    }

    /// `dependent` re-notifies on every property change, e.g. a computed
    /// read-only property
    pub fn always(mut self, dependent: &str) -> Self {
        if !self.always.iter().any(|d| d == dependent) {
            self.always.push(dependent.to_string());
        }
        self
    }

    /// Properties to re-notify after `source` changed, in declaration order,
    /// without duplicates and never `source` itself
    pub fn dependents_of(&self, source: &str) -> Vec<&str> {
        let mut result: Vec<&str> = Vec::new();
        let direct = self.dependents.get(source).into_iter().flatten();

        for dependent in direct.chain(&self.always) {
            if dependent != source && !result.contains(&dependent.as_str()) {
                result.push(dependent);
            }
        }
        result
    }

    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty() && self.always.is_empty()
    }
}
