/*!
Well-known field names.

These are the names entry fields are exposed under when rendering templates and serializing entries.
*/

/**
The unique id of an entry.
*/
pub const KEY_ID: &str = "Id";

/**
When the intercepted call completed.
*/
pub const KEY_TIMESTAMP: &str = "Timestamp";

/**
The declaring type of the intercepted method.
*/
pub const KEY_TYPE_NAME: &str = "TypeName";

/**
The name of the intercepted method.
*/
pub const KEY_METHOD_NAME: &str = "MethodName";

/**
The severity the entry is written with.
*/
pub const KEY_LEVEL: &str = "Level";

/**
The captured arguments of the call, as a map.
*/
pub const KEY_INPUT_PARAMETERS: &str = "InputParameters";

/**
The captured return value of the call.
*/
pub const KEY_OUTPUT_VALUE: &str = "OutputValue";

/**
The error message of a failed call.
*/
pub const KEY_EXCEPTION_MESSAGE: &str = "ExceptionMessage";

/**
How long the call took, in fractional milliseconds.
*/
pub const KEY_DURATION: &str = "Duration";

/**
The target the entry is routed to.
*/
pub const KEY_TARGET: &str = "Target";

/**
The category framework diagnostics are written under.
*/
pub const INTERNAL_CATEGORY: &str = "autolog";

/**
The target entries are routed to when neither the entry nor the configuration names one.
*/
pub const DEFAULT_TARGET: &str = "autolog::calls";
