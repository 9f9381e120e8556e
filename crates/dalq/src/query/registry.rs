//! Named storage for builders.
//!
//! [`QueryRegistry`] is a caller-owned map from id to builder. Marking an id
//! with [`QueryRegistry::set_id`] makes the next produced builder stored under
//! it; the mark is consumed by that call. Entries live until removed,
//! overwritten, or the registry is cleared.
//!
//! # Example
//! ```
//! use dalq::{QueryRegistry, Select};
//!
//! let mut registry = QueryRegistry::new();
//! let users = registry.set_id("users").select(["id", "name"]);
//! users.lock().unwrap().from("users");
//!
//! let copy: Select = registry.get("users").unwrap();
//! assert_eq!(copy.to_sql(), "SELECT id, name FROM users");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::query::{Delete, Insert, Predicate, Select, Update, Where};

/// A builder shared between the registry and its callers.
pub type Shared<T> = Arc<Mutex<T>>;

/// A stored builder, by reference.
#[derive(Debug, Clone)]
pub enum StatementRef {
    Select(Shared<Select>),
    Insert(Shared<Insert>),
    Update(Shared<Update>),
    Delete(Shared<Delete>),
    Where(Shared<Where>),
}

/// An independent copy of a stored builder.
#[derive(Debug, Clone)]
pub enum Statement {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    Where(Where),
}

impl StatementRef {
    /// Deep-copy the builder behind the reference.
    pub fn snapshot(&self) -> Statement {
        match self {
            StatementRef::Select(s) => Statement::Select(lock_clone(s)),
            StatementRef::Insert(s) => Statement::Insert(lock_clone(s)),
            StatementRef::Update(s) => Statement::Update(lock_clone(s)),
            StatementRef::Delete(s) => Statement::Delete(lock_clone(s)),
            StatementRef::Where(s) => Statement::Where(lock_clone(s)),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Select(s) => s.fmt(f),
            Statement::Insert(s) => s.fmt(f),
            Statement::Update(s) => s.fmt(f),
            Statement::Delete(s) => s.fmt(f),
            Statement::Where(s) => s.fmt(f),
        }
    }
}

/// Builders that can be stored in a [`QueryRegistry`].
pub trait Registered: Clone + Sized {
    fn into_ref(shared: Shared<Self>) -> StatementRef;

    fn from_ref(entry: &StatementRef) -> Option<&Shared<Self>>;
}

macro_rules! impl_registered {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl Registered for $ty {
                fn into_ref(shared: Shared<Self>) -> StatementRef {
                    StatementRef::$ty(shared)
                }

                fn from_ref(entry: &StatementRef) -> Option<&Shared<Self>> {
                    match entry {
                        StatementRef::$ty(shared) => Some(shared),
                        _ => None,
                    }
                }
            }
        )+
    };
}

impl_registered!(Select, Insert, Update, Delete, Where);

fn lock_clone<T: Clone>(shared: &Shared<T>) -> T {
    shared.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Caller-owned registry of named builders.
#[derive(Debug, Default)]
pub struct QueryRegistry {
    pending_id: Option<String>,
    entries: HashMap<String, StatementRef>,
}

impl QueryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the next produced builder under `id`.
    pub fn set_id(&mut self, id: &str) -> &mut Self {
        self.pending_id = Some(id.to_string());
        self
    }

    /// The id waiting for the next produced builder.
    pub fn id(&self) -> Option<&str> {
        self.pending_id.as_deref()
    }

    /// Start a SELECT.
    pub fn select<I>(&mut self, columns: I) -> Shared<Select>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.store(Select::with_columns(columns))
    }

    /// Start an INSERT.
    pub fn insert(&mut self) -> Shared<Insert> {
        self.store(Insert::new())
    }

    /// Start an UPDATE.
    pub fn update(&mut self) -> Shared<Update> {
        self.store(Update::new())
    }

    /// Start a DELETE.
    pub fn delete(&mut self) -> Shared<Delete> {
        self.store(Delete::new())
    }

    /// Start a WHERE clause.
    pub fn where_(&mut self, predicate: impl Into<Predicate>) -> Shared<Where> {
        let mut clause = Where::new();
        clause.where_(predicate);
        self.store(clause)
    }

    /// Share a builder, storing it if an id is pending.
    pub fn store<T: Registered>(&mut self, builder: T) -> Shared<T> {
        let shared = Arc::new(Mutex::new(builder));
        if let Some(id) = self.pending_id.take() {
            self.entries.insert(id, T::into_ref(Arc::clone(&shared)));
        }
        shared
    }

    /// An independent copy of the builder stored under `id`.
    ///
    /// `None` if the id is unknown or holds another builder kind.
    pub fn get<T: Registered>(&self, id: &str) -> Option<T> {
        self.get_reference::<T>(id).map(|shared| lock_clone(&shared))
    }

    /// The live builder stored under `id`.
    pub fn get_reference<T: Registered>(&self, id: &str) -> Option<Shared<T>> {
        self.entries.get(id).and_then(T::from_ref).map(Arc::clone)
    }

    /// An independent copy of whatever is stored under `id`.
    pub fn get_statement(&self, id: &str) -> Option<Statement> {
        self.entries.get(id).map(StatementRef::snapshot)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<StatementRef> {
        self.entries.remove(id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.pending_id = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
