/*!
The [`MethodIdentity`] and [`EntryId`] types.
*/

use core::{fmt, hash, str};
use std::sync::Arc;

/**
The identity of an intercepted method.

An identity is the declaring type name, the method name, and the types of its parameters. Two identities are equal when all three are equal, so overloads of the same method name are distinct.

Identities are cheap to clone; clones share their underlying storage.
*/
#[derive(Clone)]
pub struct MethodIdentity(Arc<MethodIdentityInner>);

#[derive(PartialEq, Eq, Hash)]
struct MethodIdentityInner {
    type_name: Box<str>,
    method_name: Box<str>,
    parameter_types: Box<[Box<str>]>,
}

impl MethodIdentity {
    /**
    Create an identity for a method with no parameters.
    */
    pub fn new(type_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self::with_parameter_types(type_name, method_name, Vec::<String>::new())
    }

    /**
    Create an identity for a method with the given parameter types.
    */
    pub fn with_parameter_types(
        type_name: impl Into<String>,
        method_name: impl Into<String>,
        parameter_types: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        MethodIdentity(Arc::new(MethodIdentityInner {
            type_name: type_name.into().into_boxed_str(),
            method_name: method_name.into().into_boxed_str(),
            parameter_types: parameter_types
                .into_iter()
                .map(|ty| ty.into().into_boxed_str())
                .collect(),
        }))
    }

    /**
    The name of the type declaring the method.
    */
    pub fn type_name(&self) -> &str {
        &self.0.type_name
    }

    /**
    The name of the method.
    */
    pub fn method_name(&self) -> &str {
        &self.0.method_name
    }

    /**
    The types of the method's parameters, in declaration order.
    */
    pub fn parameter_types(&self) -> impl Iterator<Item = &str> {
        self.0.parameter_types.iter().map(|ty| &**ty)
    }

    /**
    The `Type.Method` name that rules are matched against.
    */
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.type_name(), self.method_name())
    }
}

impl PartialEq for MethodIdentity {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for MethodIdentity {}

impl hash::Hash for MethodIdentity {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl fmt::Debug for MethodIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

impl fmt::Display for MethodIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.type_name(), self.method_name())?;

        let mut first = true;
        for ty in self.parameter_types() {
            if !first {
                f.write_str(", ")?;
            }
            first = false;

            f.write_str(ty)?;
        }

        f.write_str(")")
    }
}

/**
A random identifier for a log entry.

Ids are version 4 UUIDs, formatted in their hyphenated form like `67e55044-10b1-426f-9247-bb680e5fe0c8`.
*/
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u128);

impl EntryId {
    /**
    Generate a new random id.
    */
    pub fn new_v4() -> Self {
        use rand::Rng;

        let v: u128 = rand::thread_rng().gen();

        Self::from_random(v)
    }

    fn from_random(v: u128) -> Self {
        // Set the version (4) and variant (RFC 4122) bits
        let v = (v & !(0xF << 76)) | (0x4 << 76);
        let v = (v & !(0x3 << 62)) | (0x2 << 62);

        EntryId(v)
    }

    /**
    Get the id as a 128-bit number.
    */
    pub fn to_u128(&self) -> u128 {
        self.0
    }

    /**
    Get the id as its hyphenated hex representation.
    */
    pub fn to_hyphenated(&self) -> [u8; 36] {
        let mut dst = [0; 36];
        let src: [u8; 16] = self.0.to_be_bytes();

        let mut i = 0;
        for (j, b) in src.iter().enumerate() {
            if matches!(j, 4 | 6 | 8 | 10) {
                dst[i] = b'-';
                i += 1;
            }

            dst[i] = HEX[(b >> 4) as usize];
            dst[i + 1] = HEX[(b & 0x0f) as usize];
            i += 2;
        }

        dst
    }
}

const HEX: [u8; 16] = *b"0123456789abcdef";

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hyphenated = self.to_hyphenated();

        // The buffer only ever contains ASCII hex digits and hyphens
        f.write_str(str::from_utf8(&hyphenated).map_err(|_| fmt::Error)?)
    }
}

impl sval::Value for EntryId {
    fn stream<'sval, S: sval::Stream<'sval> + ?Sized>(&'sval self, stream: &mut S) -> sval::Result {
        let hyphenated = self.to_hyphenated();

        match str::from_utf8(&hyphenated) {
            Ok(id) => stream.value_computed(id),
            Err(_) => sval::error(),
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for EntryId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    #[test]
    fn method_identity_eq() {
        let a = MethodIdentity::with_parameter_types("Svc", "Do", ["i32"]);
        let b = MethodIdentity::with_parameter_types("Svc", "Do", ["i32"]);
        let c = MethodIdentity::with_parameter_types("Svc", "Do", ["String"]);

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a.clone(), b, c].into_iter().collect();
        assert_eq!(2, set.len());
    }

    #[test]
    fn method_identity_fmt() {
        let id = MethodIdentity::with_parameter_types("Svc", "Do", ["i32", "&str"]);

        assert_eq!("Svc.Do(i32, &str)", id.to_string());
        assert_eq!("Svc.Do", id.qualified_name());
    }

    #[test]
    fn entry_id_is_v4() {
        let id = EntryId::from_random(u128::MAX);
        let fmt = id.to_string();

        assert_eq!(36, fmt.len());
        assert_eq!("ffffffff-ffff-4fff-bfff-ffffffffffff", fmt);

        let id = EntryId::from_random(0);
        assert_eq!("00000000-0000-4000-8000-000000000000", id.to_string());
    }

    #[test]
    fn entry_id_is_random() {
        assert_ne!(EntryId::new_v4(), EntryId::new_v4());
    }
}
