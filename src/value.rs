/*!
The [`Value`] and [`Params`] types.

Captured arguments and return values are represented as a [`Value`]: a tagged union of the primitive types, text, sequences, and nested maps. A [`Params`] is an ordered map of names to values, used for a call's arguments and for the arguments passed alongside a template.

Values can be created from most primitive types through [`From`], generically through [`ToValue`], or from a [`value_bag::ValueBag`] captured by an interception layer.
*/

use core::fmt;

/**
A captured value.
*/
#[derive(Clone, PartialEq, Default)]
pub enum Value {
    /**
    The absence of a value.
    */
    #[default]
    Null,
    /**
    A boolean.
    */
    Bool(bool),
    /**
    A signed integer.
    */
    I64(i64),
    /**
    An unsigned integer.
    */
    U64(u64),
    /**
    A floating point number.
    */
    F64(f64),
    /**
    Text.
    */
    Str(String),
    /**
    A sequence of values.
    */
    Seq(Vec<Value>),
    /**
    A nested map of values.
    */
    Map(Params),
}

impl Value {
    /**
    Whether the value is [`Value::Null`].
    */
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /**
    Try get the value as a floating point number.

    Integers are converted, which may be lossy for very large ones.
    */
    pub fn to_f64(&self) -> Option<f64> {
        match *self {
            Value::F64(v) => Some(v),
            Value::I64(v) => Some(v as f64),
            Value::U64(v) => Some(v as f64),
            _ => None,
        }
    }

    /**
    Try get the value as text.
    */
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    /**
    Try get the value as a nested map.
    */
    pub fn as_map(&self) -> Option<&Params> {
        match self {
            Value::Map(v) => Some(v),
            _ => None,
        }
    }

    /**
    Capture a value using its [`fmt::Display`] implementation.
    */
    pub fn display(value: impl fmt::Display) -> Self {
        Value::Str(value.to_string())
    }

    /**
    Capture a value using its [`fmt::Debug`] implementation.
    */
    pub fn debug(value: impl fmt::Debug) -> Self {
        Value::Str(format!("{:?}", value))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Top-level text is written as-is; nested text is quoted
            Value::Str(v) => f.write_str(v),
            v => fmt::Debug::fmt(v, f),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => fmt::Display::fmt(v, f),
            Value::I64(v) => fmt::Display::fmt(v, f),
            Value::U64(v) => fmt::Display::fmt(v, f),
            Value::F64(v) => fmt::Display::fmt(v, f),
            Value::Str(v) => fmt::Debug::fmt(v, f),
            Value::Seq(v) => {
                f.write_str("[")?;

                let mut first = true;
                for v in v {
                    if !first {
                        f.write_str(", ")?;
                    }
                    first = false;

                    fmt::Debug::fmt(v, f)?;
                }

                f.write_str("]")
            }
            Value::Map(v) => fmt::Debug::fmt(v, f),
        }
    }
}

impl sval::Value for Value {
    fn stream<'sval, S: sval::Stream<'sval> + ?Sized>(&'sval self, stream: &mut S) -> sval::Result {
        match self {
            Value::Null => stream.null(),
            Value::Bool(v) => stream.bool(*v),
            Value::I64(v) => stream.i64(*v),
            Value::U64(v) => stream.u64(*v),
            Value::F64(v) => stream.f64(*v),
            Value::Str(v) => stream.value(&**v),
            Value::Seq(v) => {
                stream.seq_begin(Some(v.len()))?;

                for v in v {
                    stream.seq_value_begin()?;
                    stream.value(v)?;
                    stream.seq_value_end()?;
                }

                stream.seq_end()
            }
            Value::Map(v) => stream.value(v),
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::I64(v) => serializer.serialize_i64(*v),
            Value::U64(v) => serializer.serialize_u64(*v),
            Value::F64(v) => serializer.serialize_f64(*v),
            Value::Str(v) => serializer.serialize_str(v),
            Value::Seq(v) => serializer.collect_seq(v),
            Value::Map(v) => v.serialize(serializer),
        }
    }
}

impl<'v> From<value_bag::ValueBag<'v>> for Value {
    fn from(value: value_bag::ValueBag<'v>) -> Self {
        Value::from(&value)
    }
}

impl<'a, 'v> From<&'a value_bag::ValueBag<'v>> for Value {
    fn from(value: &'a value_bag::ValueBag<'v>) -> Self {
        // Integers are checked before floats because `to_f64` also
        // succeeds for integers
        if let Some(v) = value.to_bool() {
            Value::Bool(v)
        } else if let Some(v) = value.to_i64() {
            Value::I64(v)
        } else if let Some(v) = value.to_u64() {
            Value::U64(v)
        } else if let Some(v) = value.to_f64() {
            Value::F64(v)
        } else if let Some(v) = value.to_borrowed_str() {
            Value::Str(v.to_owned())
        } else {
            Value::Str(value.to_string())
        }
    }
}

/**
Convert a value into a [`Value`].
*/
pub trait ToValue {
    /**
    Capture the value.
    */
    fn to_value(&self) -> Value;
}

impl<'a, T: ToValue + ?Sized> ToValue for &'a T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: ToValue> ToValue for [T] {
    fn to_value(&self) -> Value {
        Value::Seq(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl ToValue for () {
    fn to_value(&self) -> Value {
        Value::Null
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl ToValue for Params {
    fn to_value(&self) -> Value {
        Value::Map(self.clone())
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Str(self.to_owned())
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }
}

macro_rules! impl_primitive {
    ($($variant:ident: $($ty:ty),*;)*) => {
        $(
            $(
                impl From<$ty> for Value {
                    fn from(v: $ty) -> Self {
                        Value::$variant(v.into())
                    }
                }

                impl ToValue for $ty {
                    fn to_value(&self) -> Value {
                        Value::from(*self)
                    }
                }
            )*
        )*
    };
}

impl_primitive! {
    Bool: bool;
    I64: i8, i16, i32, i64;
    U64: u8, u16, u32, u64;
    F64: f32, f64;
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::U64(v as u64)
    }
}

impl ToValue for usize {
    fn to_value(&self) -> Value {
        Value::from(*self)
    }
}

impl From<isize> for Value {
    fn from(v: isize) -> Self {
        Value::I64(v as i64)
    }
}

impl ToValue for isize {
    fn to_value(&self) -> Value {
        Value::from(*self)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::Str(v.to_string())
    }
}

impl ToValue for char {
    fn to_value(&self) -> Value {
        Value::from(*self)
    }
}

impl<'a> From<&'a str> for Value {
    fn from(v: &'a str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Params> for Value {
    fn from(v: Params) -> Self {
        Value::Map(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Seq(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/**
An ordered map of names to [`Value`]s.

Names keep the order they were first inserted in. Inserting a name that's already present replaces its value in place.
*/
#[derive(Clone, PartialEq, Default)]
pub struct Params(Vec<(String, Value)>);

impl Params {
    /**
    Create an empty set of parameters.
    */
    pub const fn new() -> Self {
        Params(Vec::new())
    }

    /**
    Create an empty set of parameters with room for `capacity` entries.
    */
    pub fn with_capacity(capacity: usize) -> Self {
        Params(Vec::with_capacity(capacity))
    }

    /**
    Insert a value, replacing any existing value with the same name.
    */
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();

        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some((_, existing)) => *existing = value,
            None => self.0.push((name, value)),
        }
    }

    /**
    Insert a value, returning the parameters.
    */
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /**
    Get the value with the given name.
    */
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /**
    Whether there's a value with the given name.
    */
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /**
    Iterate over the names and values in order.
    */
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (&**k, v))
    }

    /**
    Iterate over the names in order.
    */
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| &**k)
    }

    /**
    The number of values.
    */
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /**
    Whether there are no values.
    */
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();

        for (k, v) in iter {
            params.insert(k, v);
        }

        params
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Params {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl IntoIterator for Params {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Debug for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;

        let mut first = true;
        for (k, v) in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            first = false;

            write!(f, "{}: {:?}", k, v)?;
        }

        f.write_str("}")
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl sval::Value for Params {
    fn stream<'sval, S: sval::Stream<'sval> + ?Sized>(&'sval self, stream: &mut S) -> sval::Result {
        stream.map_begin(Some(self.len()))?;

        for (k, v) in self.iter() {
            stream.map_key_begin()?;
            stream.value(k)?;
            stream.map_key_end()?;

            stream.map_value_begin()?;
            stream.value(v)?;
            stream.map_value_end()?;
        }

        stream.map_end()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Params {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/**
Build a [`Params`] from a list of `name: value` pairs.

```
let params = autolog::params! {
    x: 1,
    name: "bob",
};

assert_eq!("{x: 1, name: \"bob\"}", params.to_string());
```
*/
#[macro_export]
macro_rules! params {
    ($($name:ident: $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut params = $crate::Params::new();
        $(
            params.insert(stringify!($name), $crate::ToValue::to_value(&$value));
        )*
        params
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_keep_insertion_order() {
        let mut params = Params::new();

        params.insert("b", 1);
        params.insert("a", 2);
        params.insert("b", 3);

        assert_eq!(vec!["b", "a"], params.names().collect::<Vec<_>>());
        assert_eq!(Some(&Value::I64(3)), params.get("b"));
    }

    #[test]
    fn value_fmt() {
        let nested = Params::new()
            .with("x", 1)
            .with("name", "bob")
            .with("tags", vec!["a", "b"])
            .with("missing", Value::Null);

        for (value, display, debug) in [
            (Value::from("text"), "text", "\"text\""),
            (Value::from(1.5), "1.5", "1.5"),
            (Value::from(true), "true", "true"),
            (Value::Null, "null", "null"),
            (
                Value::Map(nested),
                "{x: 1, name: \"bob\", tags: [\"a\", \"b\"], missing: null}",
                "{x: 1, name: \"bob\", tags: [\"a\", \"b\"], missing: null}",
            ),
        ] {
            assert_eq!(display, value.to_string());
            assert_eq!(debug, format!("{:?}", value));
        }
    }

    #[test]
    fn value_from_value_bag() {
        for (bag, expected) in [
            (value_bag::ValueBag::from(42i32), Value::I64(42)),
            (value_bag::ValueBag::from(u64::MAX), Value::U64(u64::MAX)),
            (value_bag::ValueBag::from(1.5f64), Value::F64(1.5)),
            (value_bag::ValueBag::from(true), Value::Bool(true)),
            (value_bag::ValueBag::from("text"), Value::from("text")),
            (
                value_bag::ValueBag::capture_display(&"displayed"),
                Value::from("displayed"),
            ),
        ] {
            assert_eq!(expected, Value::from(bag));
        }
    }

    #[test]
    fn value_to_json() {
        let value = Value::Map(
            Params::new()
                .with("x", 1)
                .with("name", "bob")
                .with("tags", vec![true, false]),
        );

        assert_eq!(
            "{\"x\":1,\"name\":\"bob\",\"tags\":[true,false]}",
            sval_json::stream_to_string(&value).unwrap()
        );
    }

    #[test]
    fn params_macro() {
        let params = crate::params! {
            x: 1,
            name: "bob",
            missing: None::<i32>,
        };

        assert_eq!("{x: 1, name: \"bob\", missing: null}", params.to_string());
    }
}
