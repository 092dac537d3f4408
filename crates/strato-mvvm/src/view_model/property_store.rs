use std::any::{type_name, Any};
use std::collections::HashMap;

use strato_domain::shared::DomainError;

/// Name-keyed storage for view-model property values
#[derive(Default)]
pub struct PropertyStore {
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value, or `None` if the property was never set.
    ///
    /// Reading a property as a different type than it was stored with is an
    /// error.
    pub fn get<T>(&self, name: &str) -> Result<Option<T>, DomainError>
    where
        T: Clone + Send + Sync + 'static,
    {
        ensure_valid_name(name)?;

        match self.values.get(name) {
            None => Ok(None),
            Some(value) => value.downcast_ref::<T>().cloned().map(Some).ok_or_else(|| {
                DomainError::InvalidArgument(format!(
                    "Property \"{}\" is not a {}",
                    name,
                    type_name::<T>()
                ))
            }),
        }
    }

    /// Current value, or `T::default()` if the property was never set
    pub fn get_or_default<T>(&self, name: &str) -> Result<T, DomainError>
    where
        T: Clone + Default + Send + Sync + 'static,
    {
        Ok(self.get(name)?.unwrap_or_default())
    }

    pub fn set<T>(&mut self, name: &str, value: T) -> Result<(), DomainError>
    where
        T: Send + Sync + 'static,
    {
        ensure_valid_name(name)?;
        self.values.insert(name.to_string(), Box::new(value));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub(crate) fn ensure_valid_name(name: &str) -> Result<(), DomainError> {
    if name.is_empty() {
        return Err(DomainError::InvalidArgument(
            "The property name cannot be empty".to_string(),
        ));
    }
    Ok(())
}
