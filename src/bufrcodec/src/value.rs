/// A decoded or to-be-encoded element value.
///
/// Replaces the original implementation's string-encoded sentinel values
/// (`"MISSING"`, stringified doubles) with a tagged variant so consumers
/// pattern-match instead of re-parsing text.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `(raw + reference) * 10^(-scale)`.
    Numeric(f64),
    /// CCITT IA5 text run, already stripped of the BUFR padding convention.
    Text(String),
    /// A code- or flag-table integer, read as the raw field value.
    Code(u64),
    /// All-ones sentinel for the field's declared width.
    Missing,
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Numeric(v) => Some(*v),
            Value::Code(v) => Some(*v as f64),
            _ => None,
        }
    }
}
