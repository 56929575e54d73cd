//! Type-keyed validator registry.

use super::Validator;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::Arc;

type Validators<Q> = Vec<Arc<dyn Validator<Q>>>;

/// Holds the validators registered for each request type.
///
/// Registration may happen at any time; the validation behavior resolves
/// validators on every dispatch.
#[derive(Default)]
pub struct ValidatorRegistry {
    validators: DashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl ValidatorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a validator for request type `Q`.
    pub fn register<Q, V>(&self, validator: V)
    where
        Q: Send + Sync + 'static,
        V: Validator<Q> + 'static,
    {
        self.register_arc::<Q>(Arc::new(validator));
    }

    /// Registers a shared validator for request type `Q`.
    pub fn register_arc<Q>(&self, validator: Arc<dyn Validator<Q>>)
    where
        Q: Send + Sync + 'static,
    {
        let mut entry = self
            .validators
            .entry(TypeId::of::<Q>())
            .or_insert_with(|| Box::new(Validators::<Q>::new()) as Box<dyn Any + Send + Sync>);

        if let Some(list) = entry.value_mut().downcast_mut::<Validators<Q>>() {
            list.push(validator);
        }
    }

    /// Returns the validators registered for `Q`, in registration order.
    #[must_use]
    pub fn validators_for<Q>(&self) -> Vec<Arc<dyn Validator<Q>>>
    where
        Q: Send + Sync + 'static,
    {
        self.validators
            .get(&TypeId::of::<Q>())
            .and_then(|entry| entry.value().downcast_ref::<Validators<Q>>().cloned())
            .unwrap_or_default()
    }

    /// Returns the number of validators registered for `Q`.
    #[must_use]
    pub fn count_for<Q>(&self) -> usize
    where
        Q: Send + Sync + 'static,
    {
        self.validators
            .get(&TypeId::of::<Q>())
            .and_then(|entry| entry.value().downcast_ref::<Validators<Q>>().map(Vec::len))
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("request_types", &self.validators.len())
            .finish()
    }
}
