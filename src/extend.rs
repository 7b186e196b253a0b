use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::graph::{builtin_classes, ClassDescriptor};

/// Tag name to class lookup, scoped to one app.
///
/// Lookups are exact and case-sensitive. Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: Arc<RwLock<HashMap<String, Arc<ClassDescriptor>>>>,
}

impl ClassRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated with the built-in classes.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_namespace(builtin_classes());
        registry
    }

    /// Registers `class` under its own name, replacing any earlier entry.
    pub fn register(&self, class: ClassDescriptor) -> Arc<ClassDescriptor> {
        self.register_as(class.name().to_string(), class)
    }

    /// Registers `class` under an alias tag.
    pub fn register_as(&self, tag: impl Into<String>, class: ClassDescriptor) -> Arc<ClassDescriptor> {
        let class = Arc::new(class);
        self.classes.write().insert(tag.into(), Arc::clone(&class));
        class
    }

    /// Registers every class of a namespace.
    pub fn register_namespace<I>(&self, classes: I) -> usize
    where
        I: IntoIterator<Item = ClassDescriptor>,
    {
        let mut guard = self.classes.write();
        let mut count = 0;
        for class in classes {
            guard.insert(class.name().to_string(), Arc::new(class));
            count += 1;
        }
        count
    }

    pub fn lookup(&self, tag: &str) -> Option<Arc<ClassDescriptor>> {
        self.classes.read().get(tag).cloned()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.classes.read().contains_key(tag)
    }

    /// Registered tag names in sorted order.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.classes.read().keys().cloned().collect();
        tags.sort();
        tags
    }
}
