//! Process-wide type registry: every message type generated by `pdl_codegen`
//! registers a [`TypeHandler`] here so that code that only knows a type by
//! name or by wire hash code (service dispatch, generic logging, debugging
//! tools) can still encode and decode it.
//!
//! Registration is additive-only and happens once per process via
//! [`std::sync::Once`]; after that, lookups are lock-free reads of a
//! `'static` table built on first use.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use crate::wire::{Reader, WireError, WireMessage, Writer};

/// Type-erased encode/decode/default-check for one message type, keyed by
/// both its Rust [`TypeId`] and its wire hash code.
pub trait TypeHandler: Send + Sync {
    fn hash_code(&self) -> u32;
    fn type_name(&self) -> &'static str;
    fn write(&self, value: &dyn Any, w: &mut Writer) -> Result<(), RegistryError>;
    fn read(&self, r: &mut Reader) -> Result<Box<dyn Any>, WireError>;
}

struct Handler<T> {
    name: &'static str,
    _marker: std::marker::PhantomData<T>,
}

impl<T: WireMessage + Any + Send + Sync> TypeHandler for Handler<T> {
    fn hash_code(&self) -> u32 {
        T::HASH_CODE
    }

    fn type_name(&self) -> &'static str {
        self.name
    }

    fn write(&self, value: &dyn Any, w: &mut Writer) -> Result<(), RegistryError> {
        let value = value
            .downcast_ref::<T>()
            .ok_or(RegistryError::TypeMismatch)?;
        value.encode(w);
        Ok(())
    }

    fn read(&self, r: &mut Reader) -> Result<Box<dyn Any>, WireError> {
        Ok(Box::new(T::decode(r)?))
    }
}

#[derive(Debug)]
pub enum RegistryError {
    /// Looked up a handler for a [`TypeId`] or hash code with no registered
    /// type.
    Unregistered,
    /// Found a handler, but the supplied value was not an instance of the
    /// type it was registered for.
    TypeMismatch,
    /// The same Rust type was registered twice. Last-writer-wins is
    /// disallowed: a second `register::<T>()` for a `T` already present is
    /// always rejected, never silently accepted.
    DuplicateType,
    /// Two distinct Rust types registered the same wire hash code. This
    /// indicates a schema bug (two messages with the same name, or a hash
    /// collision) and is checked at registration time, not at use time.
    HashCollision { hash_code: u32 },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unregistered => write!(f, "type is not registered"),
            Self::TypeMismatch => write!(f, "registered handler does not match value's type"),
            Self::DuplicateType => write!(f, "type is already registered"),
            Self::HashCollision { hash_code } => {
                write!(f, "hash code {hash_code} is registered to two different types")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

pub struct TypeRegistry {
    by_type: HashMap<TypeId, Box<dyn TypeHandler>>,
    by_hash: HashMap<u32, TypeId>,
}

impl TypeRegistry {
    fn empty() -> Self {
        TypeRegistry {
            by_type: HashMap::new(),
            by_hash: HashMap::new(),
        }
    }

    /// Registers `T`, returning an error if it is already registered, or if
    /// its hash code collides with an already-registered, distinct type.
    /// Last-writer-wins is disallowed: there is no silent-overwrite path.
    pub fn register<T: WireMessage + Any + Send + Sync>(
        &mut self,
        name: &'static str,
    ) -> Result<(), RegistryError> {
        let type_id = TypeId::of::<T>();
        if self.by_type.contains_key(&type_id) {
            return Err(RegistryError::DuplicateType);
        }
        if let Some(existing) = self.by_hash.get(&T::HASH_CODE) {
            if *existing != type_id {
                return Err(RegistryError::HashCollision {
                    hash_code: T::HASH_CODE,
                });
            }
        }

        self.by_hash.insert(T::HASH_CODE, type_id);
        self.by_type.insert(
            type_id,
            Box::new(Handler::<T> {
                name,
                _marker: std::marker::PhantomData,
            }),
        );
        Ok(())
    }

    pub fn handler_for<T: Any>(&self) -> Result<&dyn TypeHandler, RegistryError> {
        self.by_type
            .get(&TypeId::of::<T>())
            .map(|b| b.as_ref())
            .ok_or(RegistryError::Unregistered)
    }

    pub fn handler_for_hash(&self, hash_code: u32) -> Result<&dyn TypeHandler, RegistryError> {
        let type_id = self.by_hash.get(&hash_code).ok_or(RegistryError::Unregistered)?;
        self.by_type
            .get(type_id)
            .map(|b| b.as_ref())
            .ok_or(RegistryError::Unregistered)
    }

    /// A fresh, empty registry, independent of the process-wide singleton.
    /// Tests use this so that registering a test-only message type doesn't
    /// leak into other tests running in the same process.
    pub fn isolated() -> Self {
        Self::empty()
    }
}

static GLOBAL: OnceLock<RwLock<TypeRegistry>> = OnceLock::new();

fn global_lock() -> &'static RwLock<TypeRegistry> {
    GLOBAL.get_or_init(|| {
        let mut registry = TypeRegistry::empty();
        register_builtins(&mut registry);
        RwLock::new(registry)
    })
}

/// Registers `T` in the process-wide registry. Generated code calls this
/// once per message type at startup, before accepting any RPC traffic.
/// Registering the same type a second time (e.g. from a second generated
/// module's `register_types` sharing a type with the first) is rejected
/// with [`RegistryError::DuplicateType`], not silently accepted; callers
/// that expect to run `register_types` more than once must handle that
/// error themselves.
pub fn register<T: WireMessage + Any + Send + Sync>(name: &'static str) -> Result<(), RegistryError> {
    global_lock()
        .write()
        .expect("type registry lock poisoned")
        .register::<T>(name)
}

/// Runs `f` with the handler registered for `T`, if any. Kept callback-based
/// rather than returning `&dyn TypeHandler` directly so callers never hold
/// the registry's read lock longer than one lookup.
pub fn with_handler_for<T: Any, R>(f: impl FnOnce(&dyn TypeHandler) -> R) -> Result<R, RegistryError> {
    let registry = global_lock().read().expect("type registry lock poisoned");
    registry.handler_for::<T>().map(f)
}

/// Runs `f` with the handler registered for `hash_code`, if any.
pub fn with_handler_for_hash<R>(
    hash_code: u32,
    f: impl FnOnce(&dyn TypeHandler) -> R,
) -> Result<R, RegistryError> {
    let registry = global_lock().read().expect("type registry lock poisoned");
    registry.handler_for_hash(hash_code).map(f)
}

fn register_builtins(_registry: &mut TypeRegistry) {
    // Primitive types (int32, string, Vector3, ...) are encoded inline by
    // generated field code and never looked up by hash code on their own, so
    // there is nothing to register here yet. This hook exists for parity
    // with the per-message `register::<T>()` calls generated code emits at
    // startup, and as the place future primitive-level registrations (e.g. a
    // wrapper type for generic primitive dispatch) would go.
}
