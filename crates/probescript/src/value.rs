use std::fmt;
use std::sync::{Arc, Condvar, Mutex, Weak};

use indexmap::IndexMap;

use crate::ast::{Expr, Stmt, VarDecl};
use crate::scope::Scope;
use crate::signal::EvalResult;

/// Signature shared by native functions and native-class constructors.
pub type NativeFunction = Arc<dyn Fn(Vec<Value>, &Scope) -> EvalResult + Send + Sync>;

/// A built-in function exposed to interpreted code.
#[derive(Clone)]
pub struct NativeFn(pub NativeFunction);

impl NativeFn {
    pub fn new(f: impl Fn(Vec<Value>, &Scope) -> EvalResult + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[native function]")
    }
}

/// A built-in class whose closure is invoked by `new`.
#[derive(Clone)]
pub struct NativeClass(pub NativeFunction);

impl NativeClass {
    pub fn new(f: impl Fn(Vec<Value>, &Scope) -> EvalResult + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for NativeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[native class]")
    }
}

/// Payload of a user-defined function value.
///
/// The declaration scope is held strongly; the scope chain keeps closures
/// alive, and any resulting cycles are reclaimed at process exit.
pub struct FunctionInner {
    pub name: String,
    pub params: Vec<VarDecl>,
    pub template_params: Vec<VarDecl>,
    pub decl_scope: Scope,
    pub body: Vec<Stmt>,
    pub is_async: bool,
}

/// Payload of a class value: the body statements are re-walked on every
/// `new`, in a scope parented to the declaration scope.
pub struct ClassInner {
    pub name: String,
    pub decl_scope: Scope,
    pub body: Vec<Stmt>,
    pub extends: Option<Expr>,
}

/// Payload of a probe value. Identical in shape to a class; calling it runs
/// the probe protocol instead of constructing an object.
pub struct ProbeInner {
    pub name: String,
    pub decl_scope: Scope,
    pub body: Vec<Stmt>,
    pub extends: Option<Expr>,
}

/// String payload: the text plus the method table injected at construction.
pub struct StrData {
    pub value: String,
    methods: IndexMap<String, Value>,
}

/// Shared string value.
#[derive(Clone)]
pub struct StrValue(Arc<StrData>);

impl StrValue {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();

        let mut methods = IndexMap::new();
        let text = value.clone();
        methods.insert(
            "length".to_string(),
            Value::NativeFn(NativeFn::new(move |_args, _scope| {
                Ok(Value::Number(text.chars().count() as f64))
            })),
        );
        let text = value.clone();
        methods.insert(
            "split".to_string(),
            Value::NativeFn(NativeFn::new(move |args, _scope| {
                let Some(Value::Str(sep)) = args.first() else {
                    return Ok(Value::Undef);
                };
                let parts: Vec<Value> = if sep.as_str().is_empty() {
                    text.chars().map(|c| Value::string(c.to_string())).collect()
                } else {
                    text.split(sep.as_str()).map(Value::string).collect()
                };
                Ok(Value::Array(ArrayValue::new(parts)))
            })),
        );

        Self(Arc::new(StrData { value, methods }))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0.value
    }

    #[must_use]
    pub fn method(&self, name: &str) -> Option<Value> {
        self.0.methods.get(name).cloned()
    }
}

/// Array payload: the element vector plus the method table injected at
/// construction. Methods capture a weak back-reference so the table does not
/// keep the array alive.
pub struct ArrayData {
    items: Mutex<Vec<Value>>,
    methods: Mutex<IndexMap<String, Value>>,
}

/// Shared, mutable array value.
#[derive(Clone)]
pub struct ArrayValue(Arc<ArrayData>);

impl ArrayValue {
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self {
        let data = Arc::new(ArrayData {
            items: Mutex::new(items),
            methods: Mutex::new(IndexMap::new()),
        });

        let mut methods = IndexMap::new();
        let weak: Weak<ArrayData> = Arc::downgrade(&data);
        methods.insert(
            "size".to_string(),
            Value::NativeFn(NativeFn::new(move |_args, _scope| {
                let Some(data) = weak.upgrade() else {
                    return Ok(Value::Undef);
                };
                let len = data.items.lock().expect("array lock poisoned").len();
                Ok(Value::Number(len as f64))
            })),
        );
        let weak = Arc::downgrade(&data);
        methods.insert(
            "push".to_string(),
            Value::NativeFn(NativeFn::new(move |args, _scope| {
                if let Some(data) = weak.upgrade() {
                    data.items.lock().expect("array lock poisoned").extend(args);
                }
                Ok(Value::Undef)
            })),
        );
        let weak = Arc::downgrade(&data);
        methods.insert(
            "join".to_string(),
            Value::NativeFn(NativeFn::new(move |args, _scope| {
                let Some(data) = weak.upgrade() else {
                    return Ok(Value::string(""));
                };
                let sep = args.first().map_or_else(|| ",".to_string(), Value::to_display);
                let items = data.items.lock().expect("array lock poisoned");
                let joined = items.iter().map(Value::to_display).collect::<Vec<_>>().join(&sep);
                Ok(Value::string(joined))
            })),
        );
        *data.methods.lock().expect("array lock poisoned") = methods;

        Self(data)
    }

    #[must_use]
    pub fn items(&self) -> Vec<Value> {
        self.0.items.lock().expect("array lock poisoned").clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.items.lock().expect("array lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.items.lock().expect("array lock poisoned").get(index).cloned()
    }

    /// Writes `items[index]`, growing the array with undefined filler.
    pub fn set(&self, index: usize, value: Value) {
        let mut items = self.0.items.lock().expect("array lock poisoned");
        if index >= items.len() {
            items.resize(index + 1, Value::Undef);
        }
        items[index] = value;
    }

    pub fn push(&self, value: Value) {
        self.0.items.lock().expect("array lock poisoned").push(value);
    }

    #[must_use]
    pub fn method(&self, name: &str) -> Option<Value> {
        self.0.methods.lock().expect("array lock poisoned").get(name).cloned()
    }
}

/// Object payload: an insertion-ordered property map.
#[derive(Default)]
pub struct ObjectData {
    properties: Mutex<IndexMap<String, Value>>,
}

/// Shared, mutable object value.
#[derive(Clone, Default)]
pub struct ObjectValue(Arc<ObjectData>);

impl ObjectValue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_map(map: IndexMap<String, Value>) -> Self {
        Self(Arc::new(ObjectData {
            properties: Mutex::new(map),
        }))
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.properties.lock().expect("object lock poisoned").get(key).cloned()
    }

    pub fn set(&self, key: &str, value: Value) {
        self.0
            .properties
            .lock()
            .expect("object lock poisoned")
            .insert(key.to_string(), value);
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.0.properties.lock().expect("object lock poisoned").contains_key(key)
    }

    /// A snapshot of the property map.
    #[must_use]
    pub fn entries(&self) -> IndexMap<String, Value> {
        self.0.properties.lock().expect("object lock poisoned").clone()
    }
}

/// Shared pending result of an async call.
pub struct FutureState {
    cell: Mutex<Option<Result<Value, String>>>,
    cond: Condvar,
}

/// Handle to a value being computed by a background task.
#[derive(Clone)]
pub struct FutureValue(Arc<FutureState>);

impl FutureValue {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(FutureState {
            cell: Mutex::new(None),
            cond: Condvar::new(),
        }))
    }

    /// Resolves the future; called exactly once by the background task.
    pub fn complete(&self, result: Result<Value, String>) {
        let mut cell = self.0.cell.lock().expect("future lock poisoned");
        *cell = Some(result);
        self.0.cond.notify_all();
    }

    /// Blocks the calling task until the future is ready.
    pub fn wait(&self) -> Result<Value, String> {
        let mut cell = self.0.cell.lock().expect("future lock poisoned");
        while cell.is_none() {
            cell = self.0.cond.wait(cell).expect("future lock poisoned");
        }
        cell.clone().expect("future cell checked above")
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.0.cell.lock().expect("future lock poisoned").is_some()
    }
}

impl Default for FutureValue {
    fn default() -> Self {
        Self::new()
    }
}

/// A runtime value. Absence is represented by `Undef`, never by a missing
/// entry; every expression evaluates to exactly one of these.
#[derive(Clone)]
pub enum Value {
    Number(f64),
    Str(StrValue),
    Bool(bool),
    Null,
    Undef,
    Array(ArrayValue),
    Object(ObjectValue),
    Function(Arc<FunctionInner>),
    NativeFn(NativeFn),
    Class(Arc<ClassInner>),
    NativeClass(NativeClass),
    Probe(Arc<ProbeInner>),
    Future(FutureValue),
}

/// Formats a number the way the language prints it: integral values without
/// a fractional part, everything else in shortest round-trip form.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if n.floor() == n && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    ryu::Buffer::new().format_finite(n).to_string()
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Self::Str(StrValue::new(value))
    }

    /// Display name of this value's type, used in diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Bool(_) => "bool",
            Self::Null => "null",
            Self::Undef => "undefined",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Function(_) => "function",
            Self::NativeFn(_) => "native function",
            Self::Class(_) => "class",
            Self::NativeClass(_) => "native class",
            Self::Probe(_) => "probe",
            Self::Future(_) => "future",
        }
    }

    /// Numeric coercion: strings parse as floats or coerce to 0, booleans
    /// become 0/1, null and undefined become 0.
    #[must_use]
    pub fn to_num(&self) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Str(s) => s.as_str().trim().parse::<f64>().unwrap_or(0.0),
            Self::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    /// Truthiness: nonzero numbers, non-empty strings, and every array,
    /// object, function, class, or probe are truthy.
    #[must_use]
    pub fn to_bool(&self) -> bool {
        match self {
            Self::Number(n) => *n != 0.0,
            Self::Str(s) => !s.as_str().is_empty(),
            Self::Bool(b) => *b,
            Self::Null | Self::Undef => false,
            _ => true,
        }
    }

    /// Plain string form, used by concatenation and `console` output.
    #[must_use]
    pub fn to_display(&self) -> String {
        match self {
            Self::Number(n) => format_number(*n),
            Self::Str(s) => s.as_str().to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Null => "null".to_string(),
            Self::Undef => "undefined".to_string(),
            Self::Array(items) => {
                let parts: Vec<String> = items.items().iter().map(Self::to_display).collect();
                format!("[{}]", parts.join(", "))
            }
            Self::Object(obj) => {
                let entries = obj.entries();
                if entries.is_empty() {
                    return "{  }".to_string();
                }
                let parts: Vec<String> = entries.iter().map(|(k, v)| format!("{k}: {}", v.to_display())).collect();
                format!("{{ {} }}", parts.join(", "))
            }
            Self::Function(f) => format!("[function {}]", f.name),
            Self::NativeFn(_) => "[native function]".to_string(),
            Self::Class(c) => format!("[class {}]", c.name),
            Self::NativeClass(_) => "[native class]".to_string(),
            Self::Probe(p) => format!("[probe {}]", p.name),
            Self::Future(fut) => {
                let status = if fut.is_ready() { "done" } else { "pending" };
                format!("[Future ({status})]")
            }
        }
    }

    /// Console form: like display, but strings are quoted so REPL echoes and
    /// object dumps distinguish them.
    #[must_use]
    pub fn to_console(&self) -> String {
        match self {
            Self::Str(s) => format!("\"{}\"", s.as_str()),
            Self::Array(items) => {
                let parts: Vec<String> = items.items().iter().map(Self::to_console).collect();
                format!("[{}]", parts.join(", "))
            }
            Self::Object(obj) => {
                let entries = obj.entries();
                if entries.is_empty() {
                    return "{  }".to_string();
                }
                let parts: Vec<String> = entries.iter().map(|(k, v)| format!("\"{k}\": {}", v.to_console())).collect();
                format!("{{ {} }}", parts.join(", "))
            }
            other => other.to_display(),
        }
    }

    /// Structural equality: numbers, strings, booleans, null, and undefined
    /// compare by value, arrays element-wise, objects never compare equal.
    #[must_use]
    pub fn compare(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a.as_str() == b.as_str(),
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Null, Self::Null) | (Self::Undef, Self::Undef) => true,
            (Self::Array(a), Self::Array(b)) => {
                let (a, b) = (a.items(), b.items());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.compare(y))
            }
            _ => false,
        }
    }

    /// `+` dispatches on the left operand: numbers add, strings concatenate
    /// the stringified right operand, arrays append.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        match self {
            Self::Str(s) => Self::string(format!("{}{}", s.as_str(), other.to_display())),
            Self::Array(items) => {
                let mut copy = items.items();
                copy.push(other.clone());
                Self::Array(ArrayValue::new(copy))
            }
            _ => Self::Number(self.to_num() + other.to_num()),
        }
    }

    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        Self::Number(self.to_num() - other.to_num())
    }

    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        Self::Number(self.to_num() * other.to_num())
    }

    /// Division follows IEEE-754: dividing by zero yields NaN or an
    /// infinity, never an exception.
    #[must_use]
    pub fn div(&self, other: &Self) -> Self {
        Self::Number(self.to_num() / other.to_num())
    }

    #[must_use]
    pub fn modulo(&self, other: &Self) -> Self {
        Self::Number(self.to_num() % other.to_num())
    }

    /// Looks up a property: object properties, or the method tables injected
    /// into strings and arrays.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<Self> {
        match self {
            Self::Object(obj) => obj.get(key),
            Self::Str(s) => s.method(key),
            Self::Array(items) => items.method(key),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_console())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(Value::Number(1.0).to_bool());
        assert!(!Value::Number(0.0).to_bool());
        assert!(Value::string("x").to_bool());
        assert!(!Value::string("").to_bool());
        assert!(!Value::Null.to_bool());
        assert!(!Value::Undef.to_bool());
        assert!(Value::Array(ArrayValue::new(vec![])).to_bool());
        assert!(Value::Object(ObjectValue::new()).to_bool());
    }

    #[test]
    fn double_negation_preserves_truthiness() {
        for value in [
            Value::Number(0.0),
            Value::Number(3.5),
            Value::string(""),
            Value::string("abc"),
            Value::Null,
            Value::Undef,
            Value::Bool(true),
        ] {
            assert_eq!(!!value.to_bool(), value.to_bool());
        }
    }

    #[test]
    fn numeric_coercion() {
        assert!((Value::string("42").to_num() - 42.0).abs() < f64::EPSILON);
        assert!((Value::string("junk").to_num()).abs() < f64::EPSILON);
        assert!((Value::Bool(true).to_num() - 1.0).abs() < f64::EPSILON);
        assert!((Value::Null.to_num()).abs() < f64::EPSILON);
        assert!((Value::Undef.to_num()).abs() < f64::EPSILON);
    }

    #[test]
    fn add_dispatches_on_left() {
        assert_eq!(Value::Number(2.0).add(&Value::Number(3.0)).to_display(), "5");
        assert_eq!(Value::string("a").add(&Value::Number(1.0)).to_display(), "a1");
        let arr = Value::Array(ArrayValue::new(vec![Value::Number(1.0)]));
        assert_eq!(arr.add(&Value::Number(2.0)).to_display(), "[1, 2]");
        // The original array is untouched.
        assert_eq!(arr.to_display(), "[1]");
    }

    #[test]
    fn arithmetic_numifies() {
        assert_eq!(Value::string("10").sub(&Value::Number(4.0)).to_display(), "6");
        assert_eq!(Value::Bool(true).mul(&Value::Number(5.0)).to_display(), "5");
        assert_eq!(Value::Number(7.0).modulo(&Value::Number(4.0)).to_display(), "3");
    }

    #[test]
    fn division_by_zero_is_ieee() {
        let Value::Number(n) = Value::Number(1.0).div(&Value::Number(0.0)) else {
            panic!("expected number");
        };
        assert!(n.is_infinite());
        let Value::Number(n) = Value::Number(0.0).div(&Value::Number(0.0)) else {
            panic!("expected number");
        };
        assert!(n.is_nan());
    }

    #[test]
    fn structural_equality() {
        assert!(Value::Number(2.0).compare(&Value::Number(2.0)));
        assert!(!Value::Number(2.0).compare(&Value::string("2")));
        assert!(Value::string("a").compare(&Value::string("a")));
        assert!(Value::Null.compare(&Value::Null));
        assert!(!Value::Null.compare(&Value::Undef));

        let a = Value::Array(ArrayValue::new(vec![Value::Number(1.0), Value::string("x")]));
        let b = Value::Array(ArrayValue::new(vec![Value::Number(1.0), Value::string("x")]));
        assert!(a.compare(&b));

        // Objects never compare equal, even to themselves.
        let obj = Value::Object(ObjectValue::new());
        assert!(!obj.compare(&obj.clone()));
    }

    #[test]
    fn nan_is_not_equal_to_itself() {
        assert!(!Value::Number(f64::NAN).compare(&Value::Number(f64::NAN)));
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(55.0), "55");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(f64::NAN), "NaN");
    }

    #[test]
    fn string_methods() {
        let s = Value::string("a,b,c");
        let Some(Value::NativeFn(length)) = s.property("length") else {
            panic!("expected length method");
        };
        let scope = Scope::root(&Arc::new(crate::context::Context::default()));
        let len = (length.0)(vec![], &scope).unwrap();
        assert_eq!(len.to_display(), "5");

        let Some(Value::NativeFn(split)) = s.property("split") else {
            panic!("expected split method");
        };
        let parts = (split.0)(vec![Value::string(",")], &scope).unwrap();
        assert_eq!(parts.to_display(), "[a, b, c]");
    }

    #[test]
    fn array_methods_share_storage() {
        let arr = ArrayValue::new(vec![Value::Number(1.0)]);
        let value = Value::Array(arr.clone());
        let scope = Scope::root(&Arc::new(crate::context::Context::default()));

        let Some(Value::NativeFn(push)) = value.property("push") else {
            panic!("expected push method");
        };
        (push.0)(vec![Value::Number(2.0), Value::Number(3.0)], &scope).unwrap();
        assert_eq!(arr.len(), 3);

        let Some(Value::NativeFn(size)) = value.property("size") else {
            panic!("expected size method");
        };
        assert_eq!((size.0)(vec![], &scope).unwrap().to_display(), "3");

        let Some(Value::NativeFn(join)) = value.property("join") else {
            panic!("expected join method");
        };
        assert_eq!((join.0)(vec![Value::string("-")], &scope).unwrap().to_display(), "1-2-3");
    }

    #[test]
    fn array_set_grows_with_undefined() {
        let arr = ArrayValue::new(vec![]);
        arr.set(2, Value::Number(9.0));
        assert_eq!(arr.len(), 3);
        assert!(matches!(arr.get(0), Some(Value::Undef)));
        assert_eq!(arr.get(2).unwrap().to_display(), "9");
    }

    #[test]
    fn future_completes() {
        let future = FutureValue::new();
        assert!(!future.is_ready());
        future.complete(Ok(Value::Number(42.0)));
        assert!(future.is_ready());
        assert_eq!(future.wait().unwrap().to_display(), "42");
    }
}
