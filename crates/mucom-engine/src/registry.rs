//! Variable and method bindings, addressed by 8-bit id.
//!
//! Variables and functions live in separate namespaces: id 5 may name both a
//! variable and a method. Entries are cloned out of their lock before use, so
//! accessors and callbacks never run while the registry is locked.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mucom_frame::{Scalar, Value, ValueType};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};

/// Produces the current value of a variable.
pub type ReadAccessor = Arc<dyn Fn() -> Value + Send + Sync>;

/// Stores a value received for a variable.
pub type WriteAccessor = Arc<dyn Fn(Value) + Send + Sync>;

/// Result returned by method callbacks.
pub type MethodResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A bound method callback. Receives the request payload.
pub type Method = Arc<dyn Fn(&[u8]) -> MethodResult + Send + Sync>;

/// A variable binding: a declared type plus read and/or write access.
#[derive(Clone)]
pub struct Variable {
    value_type: ValueType,
    reader: Option<ReadAccessor>,
    writer: Option<WriteAccessor>,
}

impl Variable {
    /// A binding of `value_type` with no accessors yet.
    pub fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            reader: None,
            writer: None,
        }
    }

    /// Attach an untyped read accessor.
    pub fn with_reader(mut self, reader: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.reader = Some(Arc::new(reader));
        self
    }

    /// Attach an untyped write accessor.
    pub fn with_writer(mut self, writer: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.writer = Some(Arc::new(writer));
        self
    }

    /// Read-only variable backed by a getter.
    pub fn reader<T: Scalar>(get: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self::new(T::VALUE_TYPE).with_reader(move || get().into_value())
    }

    /// Write-only variable backed by a setter.
    pub fn writer<T: Scalar>(set: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self::new(T::VALUE_TYPE).with_writer(typed_writer(set))
    }

    /// Read/write variable backed by a getter and a setter.
    pub fn read_write<T: Scalar>(
        get: impl Fn() -> T + Send + Sync + 'static,
        set: impl Fn(T) + Send + Sync + 'static,
    ) -> Self {
        Self::reader(get).with_writer(typed_writer(set))
    }

    /// Read/write variable stored in a shared cell.
    pub fn cell<T: Scalar + Clone>(cell: Arc<Mutex<T>>) -> Self {
        let get_cell = Arc::clone(&cell);
        Self::read_write(
            move || lock(&get_cell).clone(),
            move |value| *lock(&cell) = value,
        )
    }

    /// The declared wire type.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// The read accessor, if any.
    pub fn read_accessor(&self) -> Option<&ReadAccessor> {
        self.reader.as_ref()
    }

    /// The write accessor, if any.
    pub fn write_accessor(&self) -> Option<&WriteAccessor> {
        self.writer.as_ref()
    }

    pub fn is_readable(&self) -> bool {
        self.reader.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.writer.is_some()
    }
}

impl std::fmt::Debug for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Variable")
            .field("value_type", &self.value_type)
            .field("readable", &self.is_readable())
            .field("writable", &self.is_writable())
            .finish()
    }
}

fn typed_writer<T: Scalar>(
    set: impl Fn(T) + Send + Sync + 'static,
) -> impl Fn(Value) + Send + Sync {
    move |value: Value| {
        let actual = value.value_type();
        match T::from_value(value) {
            Some(v) => set(v),
            None => warn!(
                expected = %T::VALUE_TYPE,
                %actual,
                "write accessor received a value of the wrong type"
            ),
        }
    }
}

/// Id-keyed variable and method bindings.
#[derive(Default)]
pub struct BindingRegistry {
    variables: Mutex<HashMap<u8, Variable>>,
    methods: Mutex<HashMap<u8, Method>>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `variable` to `id`, replacing any previous binding.
    ///
    /// Fails if the variable has neither a read nor a write accessor.
    pub fn link_variable(&self, id: u8, variable: Variable) -> Result<()> {
        if !variable.is_readable() && !variable.is_writable() {
            return Err(EngineError::Configuration(format!(
                "variable {id} ({}) has no read or write accessor",
                variable.value_type
            )));
        }
        debug!(id, value_type = %variable.value_type, "variable linked");
        lock(&self.variables).insert(id, variable);
        Ok(())
    }

    /// Remove the variable bound to `id`. Does nothing if none is bound.
    pub fn unlink_variable(&self, id: u8) {
        if lock(&self.variables).remove(&id).is_some() {
            debug!(id, "variable unlinked");
        }
    }

    /// Bind a method callback to `id`, replacing any previous binding.
    pub fn link_method<F>(&self, id: u8, callback: F)
    where
        F: Fn(&[u8]) -> MethodResult + Send + Sync + 'static,
    {
        debug!(id, "method linked");
        lock(&self.methods).insert(id, Arc::new(callback));
    }

    /// Remove the method bound to `id`. Does nothing if none is bound.
    pub fn unlink_method(&self, id: u8) {
        if lock(&self.methods).remove(&id).is_some() {
            debug!(id, "method unlinked");
        }
    }

    /// A clone of the variable bound to `id`.
    pub fn variable(&self, id: u8) -> Option<Variable> {
        lock(&self.variables).get(&id).cloned()
    }

    /// The method bound to `id`.
    pub fn method(&self, id: u8) -> Option<Method> {
        lock(&self.methods).get(&id).cloned()
    }

    /// Bound variable ids in ascending order.
    pub fn variable_ids(&self) -> Vec<u8> {
        sorted_keys(&lock(&self.variables))
    }

    /// Bound method ids in ascending order.
    pub fn method_ids(&self) -> Vec<u8> {
        sorted_keys(&lock(&self.methods))
    }
}

impl std::fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingRegistry")
            .field("variables", &self.variable_ids())
            .field("methods", &self.method_ids())
            .finish()
    }
}

fn sorted_keys<V>(map: &HashMap<u8, V>) -> Vec<u8> {
    let mut ids: Vec<u8> = map.keys().copied().collect();
    ids.sort_unstable();
    ids
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn variable_without_accessor_is_rejected() {
        let registry = BindingRegistry::new();
        let result = registry.link_variable(4, Variable::new(ValueType::U16));
        assert!(matches!(result, Err(EngineError::Configuration(_))));
        assert!(registry.variable_ids().is_empty());
    }

    #[test]
    fn relinking_keeps_only_latest() {
        let registry = BindingRegistry::new();
        registry.link_variable(7, Variable::reader(|| 1u8)).unwrap();
        registry.link_variable(7, Variable::reader(|| 2i32)).unwrap();

        let var = registry.variable(7).unwrap();
        assert_eq!(var.value_type(), ValueType::I32);
        assert_eq!((var.read_accessor().unwrap())(), Value::I32(2));
        assert_eq!(registry.variable_ids(), vec![7]);
    }

    #[test]
    fn unlink_removes_only_that_id() {
        let registry = BindingRegistry::new();
        registry.link_variable(1, Variable::reader(|| 1u8)).unwrap();
        registry.link_variable(2, Variable::reader(|| 2u8)).unwrap();
        registry.link_method(1, |_| Ok(()));

        registry.unlink_variable(1);
        registry.unlink_variable(99);

        assert_eq!(registry.variable_ids(), vec![2]);
        assert_eq!(registry.method_ids(), vec![1], "namespaces are separate");
    }

    #[test]
    fn cell_variable_reads_and_writes_shared_state() {
        let cell = Arc::new(Mutex::new(10u16));
        let var = Variable::cell(Arc::clone(&cell));
        assert!(var.is_readable() && var.is_writable());

        (var.write_accessor().unwrap())(Value::U16(512));
        assert_eq!(*cell.lock().unwrap(), 512);
        assert_eq!((var.read_accessor().unwrap())(), Value::U16(512));
    }

    #[test]
    fn typed_writer_ignores_mismatched_values() {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let var = Variable::writer(move |_: f32| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let write = var.write_accessor().unwrap();

        write(Value::I32(3));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        write(Value::F32(1.5));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn methods_are_callable_after_lookup() {
        let registry = BindingRegistry::new();
        registry.link_method(237, |payload| {
            if payload == [0x43] {
                Ok(())
            } else {
                Err("unexpected payload".into())
            }
        });

        let method = registry.method(237).unwrap();
        assert!(method(&[0x43]).is_ok());
        assert!(method(&[0x00]).is_err());

        registry.unlink_method(237);
        assert!(registry.method(237).is_none());
    }
}
