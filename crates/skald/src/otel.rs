//! OpenTelemetry semantic-convention attribute keys used by the span
//! machinery. https://opentelemetry.io/docs/specs/otel/trace/exceptions/

pub const EXCEPTION: &str = "exception";
pub const EXCEPTION_TYPE: &str = "exception.type";
pub const EXCEPTION_MESSAGE: &str = "exception.message";
pub const EXCEPTION_STACKTRACE: &str = "exception.stacktrace";
pub const EXCEPTION_ESCAPED: &str = "exception.escaped";
