//! Registry of built-in strict functions.
//!
//! Builtins are plain functions over evaluated argument slices, registered
//! once in a static table keyed by name. The evaluator resolves builtins
//! through [`find_op`] (after lexical bindings and namespace vars, so user
//! definitions shadow them) and calls through [`BuiltinOp::invoke`], which
//! validates arity before dispatch.
//!
//! Special forms (`def`, `let`, `if`, `fn`, `quote`, `do`, `recur`) are not
//! in this registry; they control evaluation of their arguments and live in
//! the evaluator.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::Error;
use crate::value::Value;

/// Canonical builtin signature: evaluated arguments in, value out.
pub type BuiltinFn = fn(&[Value]) -> Result<Value, Error>;

/// Expected number of arguments for a builtin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Any,
}

impl Arity {
    /// Check if the given number of arguments is valid for this operation.
    pub(crate) fn validate(self, form: &str, got: usize) -> Result<(), Error> {
        match self {
            Arity::Exact(n) if got != n => Err(Error::arity(form, n, got)),
            Arity::AtLeast(n) if got < n => Err(Error::arity(form, n, got)),
            _ => Ok(()),
        }
    }
}

/// Definition of a built-in operation.
#[derive(Debug)]
pub struct BuiltinOp {
    /// The name this operation is registered under.
    pub name: &'static str,
    /// Expected number of arguments, validated before dispatch.
    pub arity: Arity,
    func: BuiltinFn,
}

impl BuiltinOp {
    /// Validate arity and apply the operation to evaluated arguments.
    pub fn invoke(&self, args: &[Value]) -> Result<Value, Error> {
        self.arity.validate(self.name, args.len())?;
        (self.func)(args)
    }
}

//
// Argument extraction helpers
//

fn require_int(value: &Value, form: &str) -> Result<i64, Error> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(Error::TypeMismatch(format!(
            "arguments to '{form}' must be integers, got {}",
            other.kind()
        ))),
    }
}

fn require_list<'a>(value: &'a Value, form: &str) -> Result<&'a [Value], Error> {
    match value {
        Value::List(elements) => Ok(elements),
        other => Err(Error::TypeMismatch(format!(
            "'{form}' requires a list, got {}",
            other.kind()
        ))),
    }
}

fn require_map<'a>(
    value: &'a Value,
    form: &str,
) -> Result<&'a HashMap<Value, Value>, Error> {
    match value {
        Value::Map(entries) => Ok(entries),
        other => Err(Error::TypeMismatch(format!(
            "'{form}' requires a map, got {}",
            other.kind()
        ))),
    }
}

/// Only atomic values are hashable map keys; everything else is rejected.
fn require_map_key<'a>(value: &'a Value, form: &str) -> Result<&'a Value, Error> {
    if value.is_map_key() {
        Ok(value)
    } else {
        Err(Error::BadKey(format!(
            "'{form}' cannot use {} as a map key",
            value.kind()
        )))
    }
}

/// Flatten a collection into its sequence form: a list is itself, a map
/// becomes a list of two-element `(key value)` lists in unspecified order.
fn seq_of(value: &Value, form: &str) -> Result<Vec<Value>, Error> {
    match value {
        Value::List(elements) => Ok(elements.clone()),
        Value::Map(entries) => Ok(entries
            .iter()
            .map(|(k, v)| Value::List(vec![k.clone(), v.clone()]))
            .collect()),
        other => Err(Error::TypeMismatch(format!(
            "'{form}' requires a list or map, got {}",
            other.kind()
        ))),
    }
}

/// Map lookup shared by the `get` builtin and keyword-as-function calls.
/// Absent keys yield nil.
pub(crate) fn map_lookup(map: &Value, key: &Value, form: &str) -> Result<Value, Error> {
    let entries = require_map(map, form)?;
    let key = require_map_key(key, form)?;
    Ok(entries.get(key).cloned().unwrap_or(Value::Nil))
}

//
// Builtin function implementations
//

fn builtin_list(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::List(args.to_vec()))
}

fn builtin_first(args: &[Value]) -> Result<Value, Error> {
    match &args[0] {
        Value::Nil => Ok(Value::Nil),
        collection => {
            let seq = seq_of(collection, "first")?;
            Ok(seq.into_iter().next().unwrap_or(Value::Nil))
        }
    }
}

fn builtin_rest(args: &[Value]) -> Result<Value, Error> {
    let elements = require_list(&args[0], "rest")?;
    match elements {
        [] => Ok(Value::Nil),
        [_, tail @ ..] => Ok(Value::List(tail.to_vec())),
    }
}

fn builtin_cons(args: &[Value]) -> Result<Value, Error> {
    let head = &args[0];
    let tail = require_list(&args[1], "cons")?;
    let mut elements = Vec::with_capacity(tail.len() + 1);
    elements.push(head.clone());
    elements.extend_from_slice(tail);
    Ok(Value::List(elements))
}

fn builtin_count(args: &[Value]) -> Result<Value, Error> {
    match &args[0] {
        Value::List(elements) => Ok(Value::Int(elements.len() as i64)),
        Value::Map(entries) => Ok(Value::Int(entries.len() as i64)),
        other => Err(Error::TypeMismatch(format!(
            "'count' requires a list or map, got {}",
            other.kind()
        ))),
    }
}

fn builtin_seq(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::List(seq_of(&args[0], "seq")?))
}

fn builtin_hashmap(args: &[Value]) -> Result<Value, Error> {
    if args.len() % 2 != 0 {
        return Err(Error::Shape(format!(
            "'hash-map' takes an even number of arguments, got {}",
            args.len()
        )));
    }

    let mut entries = HashMap::with_capacity(args.len() / 2);
    for pair in args.chunks(2) {
        let key = require_map_key(&pair[0], "hash-map")?;
        entries.insert(key.clone(), pair[1].clone());
    }
    Ok(Value::Map(entries))
}

fn builtin_get(args: &[Value]) -> Result<Value, Error> {
    map_lookup(&args[0], &args[1], "get")
}

fn builtin_put(args: &[Value]) -> Result<Value, Error> {
    let entries = require_map(&args[0], "put")?;
    let key = require_map_key(&args[1], "put")?;

    // The source map is left untouched.
    let mut updated = entries.clone();
    updated.insert(key.clone(), args[2].clone());
    Ok(Value::Map(updated))
}

fn builtin_add(args: &[Value]) -> Result<Value, Error> {
    let mut sum: i64 = 0;
    for value in args {
        sum = sum.wrapping_add(require_int(value, "+")?);
    }
    Ok(Value::Int(sum))
}

// All four orderings chain over adjacent pairs, and `=` is equivalent to
// its own chain. `(< 1 2 3)` asks whether the arguments are strictly
// increasing; `(> 9 6 7)` is false because 6 > 7 fails.
macro_rules! numeric_comparison {
    ($name:ident, $op:tt, $op_str:expr) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            let mut prev = require_int(&args[0], $op_str)?;
            for value in &args[1..] {
                let current = require_int(value, $op_str)?;
                if !(prev $op current) {
                    return Ok(Value::Bool(false));
                }
                prev = current;
            }
            Ok(Value::Bool(true))
        }
    };
}

numeric_comparison!(builtin_eq, ==, "=");
numeric_comparison!(builtin_lt, <, "<");
numeric_comparison!(builtin_lteq, <=, "<=");
numeric_comparison!(builtin_gt, >, ">");
numeric_comparison!(builtin_gteq, >=, ">=");

fn builtin_println(args: &[Value]) -> Result<Value, Error> {
    let parts: Vec<String> = args.iter().map(|v| format!("{v}")).collect();
    println!("{}", parts.join(" "));
    Ok(Value::Nil)
}

/// Global registry of all built-in operations.
static BUILTIN_OPS: &[BuiltinOp] = &[
    BuiltinOp { name: "list", arity: Arity::Any, func: builtin_list },
    BuiltinOp { name: "first", arity: Arity::Exact(1), func: builtin_first },
    BuiltinOp { name: "rest", arity: Arity::Exact(1), func: builtin_rest },
    BuiltinOp { name: "cons", arity: Arity::Exact(2), func: builtin_cons },
    BuiltinOp { name: "count", arity: Arity::Exact(1), func: builtin_count },
    BuiltinOp { name: "seq", arity: Arity::Exact(1), func: builtin_seq },
    BuiltinOp { name: "hash-map", arity: Arity::Any, func: builtin_hashmap },
    BuiltinOp { name: "get", arity: Arity::Exact(2), func: builtin_get },
    BuiltinOp { name: "put", arity: Arity::Exact(3), func: builtin_put },
    BuiltinOp { name: "+", arity: Arity::Any, func: builtin_add },
    BuiltinOp { name: "=", arity: Arity::AtLeast(1), func: builtin_eq },
    BuiltinOp { name: "<", arity: Arity::AtLeast(1), func: builtin_lt },
    BuiltinOp { name: "<=", arity: Arity::AtLeast(1), func: builtin_lteq },
    BuiltinOp { name: ">", arity: Arity::AtLeast(1), func: builtin_gt },
    BuiltinOp { name: ">=", arity: Arity::AtLeast(1), func: builtin_gteq },
    BuiltinOp { name: "println", arity: Arity::Any, func: builtin_println },
];

/// Lazy map from name to operation for call-time lookup.
static BUILTIN_INDEX: LazyLock<HashMap<&'static str, &'static BuiltinOp>> =
    LazyLock::new(|| BUILTIN_OPS.iter().map(|op| (op.name, op)).collect());

/// All registered operations, for namespace population.
pub(crate) fn all_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS
}

/// Find a builtin operation by name.
pub(crate) fn find_op(name: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_INDEX.get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{key, nil, sym, val};

    /// Invoke a builtin through the registry, arity validation included.
    fn call_builtin(name: &str, args: &[Value]) -> Result<Value, Error> {
        find_op(name)
            .unwrap_or_else(|| panic!("builtin '{name}' not registered"))
            .invoke(args)
    }

    /// Micro-helper for success cases.
    fn success<T: Into<Value>>(value: T) -> Option<Value> {
        Some(value.into())
    }

    fn sample_map() -> Value {
        call_builtin("hash-map", &[key("a"), val(1), key("b"), val(2)]).unwrap()
    }

    #[test]
    fn test_builtin_implementations_data_driven() {
        type TestCase = (&'static str, Vec<Value>, Option<Value>);

        let test_cases: Vec<TestCase> = vec![
            // list
            ("list", vec![], success(nil())),
            ("list", vec![val(1), val(2), val(3)], success([1, 2, 3])),
            (
                "list",
                vec![val(1), val("two"), key("three")],
                Some(Value::List(vec![val(1), val("two"), key("three")])),
            ),
            // first
            ("first", vec![Value::Nil], Some(Value::Nil)),
            ("first", vec![nil()], Some(Value::Nil)),
            ("first", vec![val([1, 2, 3])], success(1)),
            ("first", vec![val(42)], None), // TypeMismatch
            ("first", vec![], None),        // Arity
            ("first", vec![nil(), nil()], None),
            // rest
            ("rest", vec![nil()], Some(Value::Nil)),
            ("rest", vec![val([1])], success(nil())),
            ("rest", vec![val([1, 2, 3])], success([2, 3])),
            ("rest", vec![Value::Nil], None), // rest wants a list, not nil
            ("rest", vec![val(1)], None),
            ("rest", vec![sample_map()], None),
            // cons
            ("cons", vec![val(100), nil()], success([100])),
            ("cons", vec![val(0), val([1, 2])], success([0, 1, 2])),
            (
                "cons",
                vec![val([1]), val([2])],
                Some(Value::List(vec![val([1]), val(2)])),
            ),
            ("cons", vec![val(1), val(2)], None), // tail must be a list
            ("cons", vec![val(1), Value::Nil], None),
            ("cons", vec![val(1)], None),
            // count
            ("count", vec![nil()], success(0)),
            ("count", vec![val([1, 2, 3])], success(3)),
            ("count", vec![sample_map()], success(2)),
            ("count", vec![val("abc")], None),
            ("count", vec![Value::Nil], None),
            // seq on lists is the identity
            ("seq", vec![nil()], success(nil())),
            ("seq", vec![val([1, 2])], success([1, 2])),
            ("seq", vec![val(5)], None),
            ("seq", vec![Value::Nil], None),
            // hash-map
            ("hash-map", vec![], Some(Value::Map(HashMap::new()))),
            ("hash-map", vec![key("a")], None), // odd argument count
            ("hash-map", vec![nil(), val(1)], None), // list keys rejected
            // get
            ("get", vec![sample_map(), key("a")], success(1)),
            ("get", vec![sample_map(), key("b")], success(2)),
            ("get", vec![sample_map(), key("missing")], Some(Value::Nil)),
            ("get", vec![val([1, 2]), key("a")], None), // not a map
            ("get", vec![sample_map(), nil()], None),   // bad key
            // put
            ("put", vec![sample_map(), key("a")], None), // Arity
            ("put", vec![val(1), key("a"), val(2)], None),
            ("put", vec![sample_map(), val([1]), val(2)], None), // bad key
            // +
            ("+", vec![], success(0)),
            ("+", vec![val(5)], success(5)),
            ("+", vec![val(1), val(2), val(3)], success(6)),
            ("+", vec![val(1), val(-2)], success(-1)),
            ("+", vec![val("x")], None),
            ("+", vec![val(1), val(true)], None),
            // =
            ("=", vec![], None), // needs at least one argument
            ("=", vec![val(5)], success(true)),
            ("=", vec![val(5), val(5), val(5)], success(true)),
            ("=", vec![val(5), val(5), val(4)], success(false)),
            ("=", vec![val(true), val(true)], None), // integers only
            // comparisons chain over adjacent pairs
            ("<", vec![val(1), val(2), val(3)], success(true)),
            ("<", vec![val(1), val(3), val(2)], success(false)),
            ("<", vec![val(2), val(2)], success(false)),
            ("<=", vec![val(2), val(2), val(3)], success(true)),
            ("<=", vec![val(3), val(2)], success(false)),
            (">", vec![val(3), val(2), val(1)], success(true)),
            (">", vec![val(4), val(4)], success(false)),
            (">=", vec![val(3), val(3), val(2)], success(true)),
            (">=", vec![val(2), val(3)], success(false)),
            ("<", vec![val(1), val("two")], None),
            // chained semantics for > (each pair, not each-against-first):
            // 9 > 6 holds but 6 > 7 does not
            (">", vec![val(9), val(6), val(7)], success(false)),
            (">", vec![val(9), val(6), val(2)], success(true)),
        ];

        for (i, (name, args, expected)) in test_cases.iter().enumerate() {
            let result = call_builtin(name, args);
            match (result, expected) {
                (Ok(actual), Some(expected_val)) => {
                    assert_eq!(
                        actual,
                        *expected_val,
                        "case #{}: ({} {:?})",
                        i + 1,
                        name,
                        args
                    );
                }
                (Err(_), None) => {} // expected error
                (result, expected) => panic!(
                    "case #{}: ({} {:?}) gave {:?}, expected {:?}",
                    i + 1,
                    name,
                    args,
                    result,
                    expected
                ),
            }
        }
    }

    #[test]
    fn test_put_leaves_source_map_unchanged() {
        let original = sample_map();
        let updated = call_builtin("put", &[original.clone(), key("a"), val(10)]).unwrap();

        assert_eq!(
            call_builtin("get", &[updated.clone(), key("a")]).unwrap(),
            val(10)
        );
        // Untouched key carries over; original still holds the old value.
        assert_eq!(call_builtin("get", &[updated, key("b")]).unwrap(), val(2));
        assert_eq!(call_builtin("get", &[original, key("a")]).unwrap(), val(1));
    }

    #[test]
    fn test_seq_and_first_on_maps() {
        // Pair order is unspecified, so check membership only.
        let m = sample_map();
        let seq = match call_builtin("seq", &[m.clone()]).unwrap() {
            Value::List(pairs) => pairs,
            other => panic!("seq of a map should be a list, got {other:?}"),
        };
        assert_eq!(seq.len(), 2);
        assert!(seq.contains(&Value::List(vec![key("a"), val(1)])));
        assert!(seq.contains(&Value::List(vec![key("b"), val(2)])));

        let first = call_builtin("first", &[m]).unwrap();
        assert!(seq.contains(&first));

        // An empty map has no first pair.
        let empty = call_builtin("hash-map", &[]).unwrap();
        assert_eq!(call_builtin("first", &[empty]).unwrap(), Value::Nil);
    }

    #[test]
    fn test_hash_map_structural_keys() {
        // Separately constructed equal keys address the same entry.
        let m = call_builtin("hash-map", &[val("k"), val(1), val(7), val(2)]).unwrap();
        assert_eq!(call_builtin("get", &[m.clone(), val("k")]).unwrap(), val(1));
        assert_eq!(call_builtin("get", &[m.clone(), val(7)]).unwrap(), val(2));
        // Same text, different kind: distinct key.
        assert_eq!(call_builtin("get", &[m, sym("k")]).unwrap(), Value::Nil);
    }

    #[test]
    fn test_arity_validation() {
        use Arity::*;

        Exact(2).validate("f", 2).unwrap();
        Exact(2).validate("f", 1).unwrap_err();
        Exact(2).validate("f", 3).unwrap_err();

        AtLeast(1).validate("f", 1).unwrap();
        AtLeast(1).validate("f", 5).unwrap();
        AtLeast(1).validate("f", 0).unwrap_err();

        Any.validate("f", 0).unwrap();
        Any.validate("f", 100).unwrap();

        match Exact(2).validate("cons", 1).unwrap_err() {
            Error::Arity {
                form,
                expected,
                got,
            } => {
                assert_eq!(form, "cons");
                assert_eq!(expected, 2);
                assert_eq!(got, 1);
            }
            other => panic!("expected arity error, got {other:?}"),
        }
    }
}
