//! The runtime value model. The main enum, [`Value`], is a closed sum of
//! every kind the reader can produce or evaluation can yield: atoms (nil,
//! booleans, integers, strings, symbols, keywords), compounds (lists and
//! maps), and callables (user functions, builtins, and the `recur` marker
//! consumed by the tail-call trampoline). Every variant answers
//! [`Value::truthy`] and prints through `Display`. Ergonomic helpers such
//! as [`val`], [`sym`], and [`nil`] are provided for convenient
//! construction in tests. Equality is structural; hashing is defined so
//! that atomic variants can serve as map keys.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;

use crate::builtinops::BuiltinOp;
use crate::evaluator::Binding;

/// Core value type of the interpreter.
///
/// Values are immutable: operations that appear to modify a collection
/// (`put`, `cons`) return a new value and leave the original untouched.
#[derive(Debug, Clone)]
pub enum Value {
    /// The nil value. Falsy, and distinct from the empty list.
    Nil,
    /// Booleans (`true` / `false`).
    Bool(bool),
    /// Signed 64-bit integers. Zero is falsy.
    Int(i64),
    /// String literals. Falsy when blank after whitespace trim.
    Str(String),
    /// Symbols (identifiers). The symbol `nil` is reserved by the evaluator.
    Sym(String),
    /// Keywords, printed with a leading `:`. Callable as map accessors.
    Key(String),
    /// Ordered sequences. The empty list is truthy.
    List(Vec<Value>),
    /// Mappings with structural key equality. Only atomic values may be keys.
    Map(HashMap<Value, Value>),
    /// User-defined functions carrying a captured binding-stack snapshot.
    Fn(Lambda),
    /// A registered builtin function.
    Builtin(&'static BuiltinOp),
    /// Trampoline marker holding the arguments for a tail call. Never
    /// escapes a function body.
    Recur(Vec<Value>),
}

/// The payload of a user-defined function: parameter names, unevaluated
/// body expressions, and the lexical bindings snapshotted when the `fn`
/// form was evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub(crate) params: Vec<String>,
    pub(crate) body: Vec<Value>,
    pub(crate) captured: Vec<Binding>,
}

impl Value {
    /// Per-variant truthiness, as used by `if`.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Str(s) => !s.trim().is_empty(),
            Value::Map(m) => !m.is_empty(),
            Value::Sym(_)
            | Value::Key(_)
            | Value::List(_)
            | Value::Fn(_)
            | Value::Builtin(_)
            | Value::Recur(_) => true,
        }
    }

    /// Whether this value may be used as a map key. Only atomic variants
    /// hash by payload; compound and callable values are rejected by the
    /// map builtins with a `BadKey` error.
    pub(crate) fn is_map_key(&self) -> bool {
        matches!(
            self,
            Value::Nil
                | Value::Bool(_)
                | Value::Int(_)
                | Value::Str(_)
                | Value::Sym(_)
                | Value::Key(_)
        )
    }

    /// A short name for the value's kind, used in error messages.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "a boolean",
            Value::Int(_) => "an integer",
            Value::Str(_) => "a string",
            Value::Sym(_) => "a symbol",
            Value::Key(_) => "a keyword",
            Value::List(_) => "a list",
            Value::Map(_) => "a map",
            Value::Fn(_) => "a function",
            Value::Builtin(_) => "a builtin",
            Value::Recur(_) => "a recur marker",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Sym(s) => write!(f, "{s}"),
            Value::Key(k) => write!(f, ":{k}"),
            Value::List(elements) => {
                write!(f, "(")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
            Value::Map(entries) => {
                write!(f, "(hash-map")?;
                for (k, v) in entries {
                    write!(f, " {k} {v}")?;
                }
                write!(f, ")")
            }
            Value::Fn(lambda) => write!(f, "{lambda}"),
            Value::Builtin(_) => write!(f, "<builtin>"),
            Value::Recur(values) => {
                write!(f, "#recur[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(fn (")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ")")?;
        for expr in &self.body {
            write!(f, " {expr}")?;
        }
        write!(f, ")")
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Sym(a), Value::Sym(b)) => a == b,
            (Value::Key(a), Value::Key(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Fn(a), Value::Fn(b)) => a == b,
            // Builtins compare by registered name, not function pointer
            (Value::Builtin(a), Value::Builtin(b)) => a.name == b.name,
            (Value::Recur(a), Value::Recur(b)) => a == b,
            _ => false, // Different variants are never equal
        }
    }
}

impl Eq for Value {}

/// Hashing is consistent with equality: atomic variants and lists hash
/// structurally; maps and callables hash their tag only, which is correct
/// (equal values hash equal) if coarse. Map builtins reject non-atomic keys
/// before any of the coarse cases can matter.
impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);
        match self {
            Value::Nil | Value::Map(_) | Value::Fn(_) | Value::Recur(_) => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Str(s) | Value::Sym(s) | Value::Key(s) => s.hash(state),
            Value::List(elements) => elements.hash(state),
            Value::Builtin(op) => op.name.hash(state),
        }
    }
}

// From trait implementations for Value - enables .into() conversion

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(|x| x.into()).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::List(arr.into_iter().map(|x| x.into()).collect())
    }
}

/// Helper function for creating Values - works great in mixed lists!
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for creating symbols.
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Sym(name.as_ref().to_owned())
}

/// Helper function for creating keywords.
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn key<S: AsRef<str>>(name: S) -> Value {
    Value::Key(name.as_ref().to_owned())
}

/// Helper function for creating the empty list.
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn nil() -> Value {
    Value::List(vec![])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_of(entries: Vec<(Value, Value)>) -> Value {
        Value::Map(entries.into_iter().collect())
    }

    #[test]
    fn test_truthiness_data_driven() {
        // (value, expected truthiness)
        let test_cases = vec![
            (Value::Nil, false),
            (val(true), true),
            (val(false), false),
            (val(0), false),
            (val(1), true),
            (val(-1), true),
            (val(""), false),
            (val(" \t "), false), // whitespace-only strings are blank
            (val("x"), true),
            (sym("foo"), true),
            (key("foo"), true),
            (nil(), true), // the empty list is truthy, unlike nil
            (val([1, 2]), true),
            (map_of(vec![]), false),
            (map_of(vec![(key("a"), val(1))]), true),
            (Value::Recur(vec![val(1)]), true),
        ];

        for (value, expected) in test_cases {
            assert_eq!(
                value.truthy(),
                expected,
                "truthiness mismatch for {value:?}"
            );
        }
    }

    #[test]
    fn test_printable_forms_data_driven() {
        let test_cases = vec![
            (Value::Nil, "nil"),
            (val(true), "true"),
            (val(false), "false"),
            (val(42), "42"),
            (val(-7), "-7"),
            (val("hello world"), "hello world"), // strings print verbatim
            (sym("foo"), "foo"),
            (key("a"), ":a"),
            (nil(), "()"),
            (val([1, 2, 3]), "(1 2 3)"),
            (
                Value::List(vec![sym("+"), val(1), val([2, 3])]),
                "(+ 1 (2 3))",
            ),
            (map_of(vec![]), "(hash-map)"),
            (map_of(vec![(key("a"), val(1))]), "(hash-map :a 1)"),
            (Value::Recur(vec![val(1), val(2)]), "#recur[1 2]"),
            (
                Value::Fn(Lambda {
                    params: vec!["a".to_owned(), "b".to_owned()],
                    body: vec![Value::List(vec![sym("+"), sym("a"), sym("b")])],
                    captured: vec![],
                }),
                "(fn (a b) (+ a b))",
            ),
        ];

        for (value, expected) in test_cases {
            assert_eq!(format!("{value}"), expected);
        }
    }

    #[test]
    fn test_structural_map_keys() {
        // Keys built separately must collide structurally.
        let mut entries = HashMap::new();
        entries.insert(key("a"), val(1));
        entries.insert(Value::Str("s".to_owned()), val(2));
        entries.insert(val(7), val(3));
        entries.insert(Value::Nil, val(4));

        assert_eq!(entries.get(&key("a")), Some(&val(1)));
        assert_eq!(entries.get(&val("s")), Some(&val(2)));
        assert_eq!(entries.get(&val(7)), Some(&val(3)));
        assert_eq!(entries.get(&Value::Nil), Some(&val(4)));
        // A keyword and a string with the same text are distinct keys.
        assert_eq!(entries.get(&val("a")), None);
        assert_eq!(entries.get(&sym("a")), None);

        // Overwriting through an equal key replaces, not duplicates.
        entries.insert(key("a"), val(10));
        assert_eq!(entries.len(), 4);
        assert_eq!(entries.get(&key("a")), Some(&val(10)));
    }

    #[test]
    fn test_map_key_classification() {
        assert!(Value::Nil.is_map_key());
        assert!(val(true).is_map_key());
        assert!(val(1).is_map_key());
        assert!(val("s").is_map_key());
        assert!(sym("s").is_map_key());
        assert!(key("k").is_map_key());
        assert!(!nil().is_map_key());
        assert!(!map_of(vec![]).is_map_key());
        assert!(!Value::Recur(vec![]).is_map_key());
    }

    #[test]
    fn test_equality_across_variants() {
        // Same text, different variants: never equal.
        assert_ne!(val("x"), sym("x"));
        assert_ne!(sym("x"), key("x"));
        // Nil is not the empty list.
        assert_ne!(Value::Nil, nil());
        // Structural list equality.
        assert_eq!(val([1, 2]), Value::List(vec![val(1), val(2)]));
        // Map equality ignores insertion order.
        let a = map_of(vec![(key("a"), val(1)), (key("b"), val(2))]);
        let b = map_of(vec![(key("b"), val(2)), (key("a"), val(1))]);
        assert_eq!(a, b);
    }
}
