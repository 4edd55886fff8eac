//! Atom model and structural interning.
//!
//! An [`Atom`] is one of four shapes: `Symbol`, `Variable`, `Expression`, or
//! `Grounded`. Atoms are immutable and canonical: the [`Interner`] guarantees
//! that two atoms with equal structure are the same allocation, so equality
//! and hashing reduce to a single `u64` id comparison regardless of depth.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Canonical atom identifier assigned at interning time.
pub type AtomId = u64;

/// Opaque host value carried by a grounded atom.
///
/// This is a closed set of variants: host interop goes through the
/// interpreter's function registry, not through open-ended reflection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum GroundedValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl GroundedValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            GroundedValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            GroundedValue::Int(i) => Some(*i as f64),
            GroundedValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            GroundedValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GroundedValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

// Floats compare by bit pattern so interning stays idempotent (NaN == NaN
// for identity purposes, and -0.0 != 0.0).
impl PartialEq for GroundedValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (GroundedValue::Int(a), GroundedValue::Int(b)) => a == b,
            (GroundedValue::Float(a), GroundedValue::Float(b)) => a.to_bits() == b.to_bits(),
            (GroundedValue::Bool(a), GroundedValue::Bool(b)) => a == b,
            (GroundedValue::Str(a), GroundedValue::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for GroundedValue {}

impl Hash for GroundedValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            GroundedValue::Int(i) => {
                0u8.hash(state);
                i.hash(state);
            }
            GroundedValue::Float(f) => {
                1u8.hash(state);
                f.to_bits().hash(state);
            }
            GroundedValue::Bool(b) => {
                2u8.hash(state);
                b.hash(state);
            }
            GroundedValue::Str(s) => {
                3u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl fmt::Display for GroundedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroundedValue::Int(i) => write!(f, "{i}"),
            GroundedValue::Float(x) => {
                // Keep a decimal point so the printed form re-parses as a float.
                if x.fract() == 0.0 && x.is_finite() {
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
            GroundedValue::Bool(b) => write!(f, "{b}"),
            GroundedValue::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// The four term shapes.
#[derive(Debug)]
pub enum AtomKind {
    Symbol(String),
    Variable(String),
    Expression(Vec<Atom>),
    Grounded(GroundedValue),
}

#[derive(Debug)]
struct AtomInner {
    id: AtomId,
    kind: AtomKind,
}

/// A canonical, immutable term. Cheap to clone (one `Arc` bump).
///
/// Equality, hashing, and ordering all reduce to the interned id; comparing
/// atoms from different interners is meaningless and unsupported.
#[derive(Clone, Debug)]
pub struct Atom {
    inner: Arc<AtomInner>,
}

impl Atom {
    fn new(id: AtomId, kind: AtomKind) -> Self {
        Atom {
            inner: Arc::new(AtomInner { id, kind }),
        }
    }

    pub fn id(&self) -> AtomId {
        self.inner.id
    }

    pub fn kind(&self) -> &AtomKind {
        &self.inner.kind
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self.inner.kind, AtomKind::Symbol(_))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.inner.kind, AtomKind::Variable(_))
    }

    pub fn is_expression(&self) -> bool {
        matches!(self.inner.kind, AtomKind::Expression(_))
    }

    pub fn is_grounded(&self) -> bool {
        matches!(self.inner.kind, AtomKind::Grounded(_))
    }

    /// Name of a symbol atom.
    pub fn symbol_name(&self) -> Option<&str> {
        match &self.inner.kind {
            AtomKind::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// Name of a variable atom (without the `$` sigil).
    pub fn variable_name(&self) -> Option<&str> {
        match &self.inner.kind {
            AtomKind::Variable(name) => Some(name),
            _ => None,
        }
    }

    /// Ordered children of an expression atom.
    pub fn children(&self) -> Option<&[Atom]> {
        match &self.inner.kind {
            AtomKind::Expression(children) => Some(children),
            _ => None,
        }
    }

    /// First child of an expression atom.
    pub fn head(&self) -> Option<&Atom> {
        self.children().and_then(|c| c.first())
    }

    pub fn grounded_value(&self) -> Option<&GroundedValue> {
        match &self.inner.kind {
            AtomKind::Grounded(value) => Some(value),
            _ => None,
        }
    }

    /// Structural (binding-free) containment check for a variable.
    ///
    /// Iterative so arbitrarily deep expressions cannot overflow the stack.
    pub fn contains_variable(&self, var: &Atom) -> bool {
        let mut stack = vec![self];
        while let Some(atom) = stack.pop() {
            if atom == var {
                return true;
            }
            if let AtomKind::Expression(children) = atom.kind() {
                stack.extend(children.iter());
            }
        }
        false
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Atom {}

impl Hash for Atom {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl PartialOrd for Atom {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Atom {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.inner.id.cmp(&other.inner.id)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            AtomKind::Symbol(name) => write!(f, "{name}"),
            AtomKind::Variable(name) => write!(f, "${name}"),
            AtomKind::Grounded(value) => write!(f, "{value}"),
            AtomKind::Expression(children) => {
                write!(f, "(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Structural lookup key for the intern table. Expressions key on their
/// children's ids, which is what makes expression identity O(1).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum InternKey {
    Symbol(String),
    Variable(String),
    Expression(Vec<AtomId>),
    Grounded(GroundedValue),
}

/// Structural interner: the sole source of atom identity.
///
/// Concurrent and idempotent; owned by the atom space, never global.
pub struct Interner {
    table: DashMap<InternKey, Atom>,
    next_id: AtomicU64,
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl Interner {
    pub fn new() -> Self {
        Interner {
            table: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn intern(&self, key: InternKey, build: impl FnOnce() -> AtomKind) -> Atom {
        if let Some(existing) = self.table.get(&key) {
            return existing.clone();
        }
        // The entry API locks the shard, so a racing insert resolves to a
        // single canonical atom.
        self.table
            .entry(key)
            .or_insert_with(|| {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                Atom::new(id, build())
            })
            .clone()
    }

    pub fn symbol(&self, name: &str) -> Atom {
        self.intern(InternKey::Symbol(name.to_string()), || {
            AtomKind::Symbol(name.to_string())
        })
    }

    pub fn variable(&self, name: &str) -> Atom {
        self.intern(InternKey::Variable(name.to_string()), || {
            AtomKind::Variable(name.to_string())
        })
    }

    pub fn expression(&self, children: Vec<Atom>) -> Atom {
        let key = InternKey::Expression(children.iter().map(Atom::id).collect());
        self.intern(key, move || AtomKind::Expression(children))
    }

    pub fn grounded(&self, value: GroundedValue) -> Atom {
        let key = InternKey::Grounded(value.clone());
        self.intern(key, move || AtomKind::Grounded(value))
    }

    pub fn int(&self, value: i64) -> Atom {
        self.grounded(GroundedValue::Int(value))
    }

    pub fn float(&self, value: f64) -> Atom {
        self.grounded(GroundedValue::Float(value))
    }

    pub fn boolean(&self, value: bool) -> Atom {
        self.grounded(GroundedValue::Bool(value))
    }

    pub fn text(&self, value: &str) -> Atom {
        self.grounded(GroundedValue::Str(value.to_string()))
    }

    /// Number of distinct atoms interned so far.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
