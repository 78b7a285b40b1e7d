/*!
The [`Empty`] type.

An [`Empty`] can be used as a default in place of a more meaningful implementation of most traits. For [`crate::template::Props`] it behaves like an empty set, and for [`crate::sink::Sink`]s it discards everything written to it.
*/

/**
A type that behaves like a default, empty, null value.
*/
#[derive(Default, Debug, Clone, Copy)]
pub struct Empty;
