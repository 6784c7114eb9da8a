use std::collections::HashMap;

use crate::Error;
use crate::builtinops;
use crate::reader;
use crate::value::{Lambda, Value};

/// A named global scope. Mutated only by `def`; bindings are never removed.
pub struct Ns {
    pub name: String,
    vars: HashMap<String, Value>,
}

impl Ns {
    pub fn new(name: impl Into<String>) -> Self {
        Ns {
            name: name.into(),
            vars: HashMap::new(),
        }
    }

    /// Define or overwrite a global var.
    pub fn def(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}

/// One frame of the lexical binding stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub(crate) name: String,
    pub(crate) value: Value,
}

/// Evaluation context: the namespace plus the lexical binding stack owned
/// by the current top-level evaluation. Lookup scans the stack from the
/// most recent frame down, then the namespace, then the builtin table, so
/// lexical bindings shadow globals and globals shadow builtins.
struct Context<'a> {
    ns: &'a mut Ns,
    bindings: Vec<Binding>,
}

impl Context<'_> {
    fn push(&mut self, name: &str, value: Value) {
        self.bindings.push(Binding {
            name: name.to_owned(),
            value,
        });
    }

    fn pop(&mut self) -> Option<Binding> {
        self.bindings.pop()
    }

    fn depth(&self) -> usize {
        self.bindings.len()
    }

    /// Pop frames back down to a previously saved depth. Every form that
    /// pushes frames restores its entry depth on all exit paths.
    fn unwind(&mut self, depth: usize) {
        while self.bindings.len() > depth {
            self.pop();
        }
    }

    fn get(&self, name: &str) -> Result<Value, Error> {
        for binding in self.bindings.iter().rev() {
            if binding.name == name {
                return Ok(binding.value.clone());
            }
        }
        if let Some(value) = self.ns.get(name) {
            return Ok(value.clone());
        }
        if let Some(op) = builtinops::find_op(name) {
            return Ok(Value::Builtin(op));
        }
        Err(Error::Unbound(name.to_owned()))
    }
}

/// Evaluate one form against a namespace (public API).
pub fn eval(ns: &mut Ns, expr: &Value) -> Result<Value, Error> {
    let mut ctx = Context {
        ns,
        bindings: Vec::new(),
    };
    match eval_in(&mut ctx, expr)? {
        // Recur markers are consumed by the invocation trampoline and must
        // not escape to the top level.
        Value::Recur(_) => Err(Error::NotCallable(
            "recur used outside of a function body".to_owned(),
        )),
        value => Ok(value),
    }
}

fn eval_in(ctx: &mut Context<'_>, expr: &Value) -> Result<Value, Error> {
    match expr {
        // The symbol nil is reserved for the nil value.
        Value::Sym(name) if name == "nil" => Ok(Value::Nil),
        Value::Sym(name) => ctx.get(name),
        Value::List(elements) => eval_list(ctx, elements),
        other => Ok(other.clone()),
    }
}

/// Evaluate argument expressions left to right.
fn eval_args(ctx: &mut Context<'_>, args: &[Value]) -> Result<Vec<Value>, Error> {
    args.iter().map(|arg| eval_in(ctx, arg)).collect()
}

fn eval_sequence(ctx: &mut Context<'_>, exprs: &[Value]) -> Result<Value, Error> {
    let mut result = Value::Nil;
    for expr in exprs {
        result = eval_in(ctx, expr)?;
    }
    Ok(result)
}

/// Evaluate a call form. The head decides the dispatch: a nested list is
/// evaluated and re-dispatched, a literal function or keyword is applied,
/// and a symbol either names a special form or resolves through the
/// context to something callable.
fn eval_list(ctx: &mut Context<'_>, elements: &[Value]) -> Result<Value, Error> {
    let Some((head, args)) = elements.split_first() else {
        // The empty list evaluates to itself.
        return Ok(Value::List(vec![]));
    };

    match head {
        Value::List(_) => {
            let resolved = eval_in(ctx, head)?;
            let mut replacement = Vec::with_capacity(elements.len());
            replacement.push(resolved);
            replacement.extend(args.iter().cloned());
            eval_list(ctx, &replacement)
        }

        Value::Fn(lambda) => {
            let args = eval_args(ctx, args)?;
            invoke(ctx, "anonymous", lambda, args)
        }

        Value::Key(name) => {
            let args = eval_args(ctx, args)?;
            keyword_call(name, args)
        }

        Value::Sym(name) => match name.as_str() {
            // Special forms receive their arguments unevaluated.
            "def" => special_def(ctx, args),
            "let" => special_let(ctx, args),
            "if" => special_if(ctx, args),
            "fn" => special_fn(ctx, args),
            "quote" => special_quote(args),
            "do" => eval_sequence(ctx, args),
            "recur" => Ok(Value::Recur(eval_args(ctx, args)?)),
            "nil" => Err(Error::NotCallable("nil cannot be called".to_owned())),
            _ => match ctx.get(name)? {
                Value::Fn(lambda) => {
                    let args = eval_args(ctx, args)?;
                    invoke(ctx, name, &lambda, args)
                }
                Value::Builtin(op) => {
                    let args = eval_args(ctx, args)?;
                    op.invoke(&args)
                }
                Value::Key(key_name) => {
                    let args = eval_args(ctx, args)?;
                    keyword_call(&key_name, args)
                }
                other => Err(Error::NotCallable(format!(
                    "symbol '{name}' is bound to {}, which cannot be called",
                    other.kind()
                ))),
            },
        },

        other => Err(Error::NotCallable(format!(
            "{} cannot be the head of a call",
            other.kind()
        ))),
    }
}

/// Call a user function, trampolining while the body yields a recur
/// marker. Each round binds the parameters over a fresh working copy of
/// the captured snapshot, so the snapshot stored in the function value is
/// never mutated and all frames are released on every exit path.
fn invoke(
    ctx: &mut Context<'_>,
    name: &str,
    lambda: &Lambda,
    mut args: Vec<Value>,
) -> Result<Value, Error> {
    loop {
        if args.len() < lambda.params.len() {
            return Err(Error::arity(name, lambda.params.len(), args.len()));
        }

        let mut frame = Context {
            ns: &mut *ctx.ns,
            bindings: lambda.captured.clone(),
        };
        // Extra arguments beyond the parameter list are ignored.
        for (param, arg) in lambda.params.iter().zip(args) {
            frame.push(param, arg);
        }

        let mut result = Value::Nil;
        for expr in &lambda.body {
            result = eval_in(&mut frame, expr)?;
        }

        match result {
            Value::Recur(values) => {
                if values.len() != lambda.params.len() {
                    return Err(Error::arity("recur", lambda.params.len(), values.len()));
                }
                args = values;
            }
            value => return Ok(value),
        }
    }
}

/// A keyword in call position looks itself up in its single map argument:
/// `(:a m)` behaves as `(get m :a)`.
fn keyword_call(name: &str, args: Vec<Value>) -> Result<Value, Error> {
    match args.as_slice() {
        [map] => builtinops::map_lookup(map, &Value::Key(name.to_owned()), "get"),
        _ => Err(Error::arity(format!(":{name}"), 1, args.len())),
    }
}

/// `(def name expr)` - evaluate and store in the namespace. The namespace
/// is only touched after the expression evaluates successfully.
fn special_def(ctx: &mut Context<'_>, args: &[Value]) -> Result<Value, Error> {
    match args {
        [Value::Sym(name), expr] => {
            let value = eval_in(ctx, expr)?;
            ctx.ns.def(name.clone(), value);
            Ok(Value::Nil)
        }
        [_, _] => Err(Error::TypeMismatch(
            "vars can only be named by symbols".to_owned(),
        )),
        _ => Err(Error::arity("def", 2, args.len())),
    }
}

/// `(let (name expr ...) body ...)` - each binding expression sees the
/// bindings before it; the result is the last body expression.
fn special_let(ctx: &mut Context<'_>, args: &[Value]) -> Result<Value, Error> {
    let Some((bindings_form, body)) = args.split_first() else {
        return Err(Error::arity("let", 1, 0));
    };
    let pairs = match bindings_form {
        Value::List(pairs) => pairs,
        other => {
            return Err(Error::TypeMismatch(format!(
                "let bindings must be a list, got {}",
                other.kind()
            )));
        }
    };
    if pairs.len() % 2 != 0 {
        return Err(Error::Shape(format!(
            "let bindings must pair symbols with expressions, got {} forms",
            pairs.len()
        )));
    }

    let depth = ctx.depth();
    let result = bind_and_eval(ctx, pairs, body);
    ctx.unwind(depth);
    result
}

fn bind_and_eval(
    ctx: &mut Context<'_>,
    pairs: &[Value],
    body: &[Value],
) -> Result<Value, Error> {
    for pair in pairs.chunks(2) {
        let Value::Sym(name) = &pair[0] else {
            return Err(Error::TypeMismatch(format!(
                "bindings can only be made for symbols, got {}",
                pair[0].kind()
            )));
        };
        let value = eval_in(ctx, &pair[1])?;
        ctx.push(name, value);
    }
    eval_sequence(ctx, body)
}

/// `(if test then else?)` - evaluates exactly one branch; a missing else
/// branch yields nil.
fn special_if(ctx: &mut Context<'_>, args: &[Value]) -> Result<Value, Error> {
    if args.len() < 2 {
        return Err(Error::arity("if", 2, args.len()));
    }
    if args.len() > 3 {
        return Err(Error::arity("if", 3, args.len()));
    }

    let test = eval_in(ctx, &args[0])?;
    if test.truthy() {
        eval_in(ctx, &args[1])
    } else if let Some(alternative) = args.get(2) {
        eval_in(ctx, alternative)
    } else {
        Ok(Value::Nil)
    }
}

/// `(fn (params ...) body ...)` - the body is not evaluated here; the
/// current binding stack is snapshotted by value into the function.
fn special_fn(ctx: &mut Context<'_>, args: &[Value]) -> Result<Value, Error> {
    let Some((params_form, body)) = args.split_first() else {
        return Err(Error::arity("fn", 2, args.len()));
    };
    if body.is_empty() {
        return Err(Error::arity("fn", 2, args.len()));
    }
    let params_list = match params_form {
        Value::List(params) => params,
        other => {
            return Err(Error::TypeMismatch(format!(
                "fn parameters must be a list, got {}",
                other.kind()
            )));
        }
    };

    let mut params = Vec::with_capacity(params_list.len());
    for param in params_list {
        match param {
            Value::Sym(name) => params.push(name.clone()),
            other => {
                return Err(Error::TypeMismatch(format!(
                    "fn parameters must be symbols, got {}",
                    other.kind()
                )));
            }
        }
    }

    Ok(Value::Fn(Lambda {
        params,
        body: body.to_vec(),
        captured: ctx.bindings.clone(),
    }))
}

/// `(quote form)` - the form, unevaluated.
fn special_quote(args: &[Value]) -> Result<Value, Error> {
    match args {
        [expr] => Ok(expr.clone()),
        _ => Err(Error::arity("quote", 1, args.len())),
    }
}

/// Definitions bootstrapped in the language itself.
const PRELUDE: &str = "\
(def not (fn (x) (if x false true)))
(def map (fn (f coll)
  (if (= (count coll) 0)
      ()
      (cons (f (first coll)) (map f (rest coll))))))";

/// Create the default namespace: named `user`, populated with every
/// builtin by name, plus the prelude.
pub fn default_ns() -> Ns {
    let mut ns = Ns::new("user");
    for op in builtinops::all_ops() {
        ns.def(op.name, Value::Builtin(op));
    }
    let forms = reader::read(PRELUDE).expect("prelude must parse");
    for form in &forms {
        eval(&mut ns, form).expect("prelude must evaluate");
    }
    ns
}
