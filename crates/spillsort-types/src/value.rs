use std::cmp::Ordering;
use std::fmt;

use crate::context::{CrossTypePolicy, StatementContext};

/// A dynamically-typed column value.
///
/// Rows handed to the sorter are tuples of `Datum`s. Five storage classes
/// exist: NULL, INTEGER, REAL, TEXT, and BLOB.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum Datum {
    /// Absent value.
    Null,
    /// A 64-bit signed integer.
    Integer(i64),
    /// A 64-bit IEEE 754 floating-point number.
    Float(f64),
    /// A UTF-8 text string.
    Text(String),
    /// A binary large object.
    Blob(Vec<u8>),
}

/// The storage class of a [`Datum`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageClass {
    Null,
    Integer,
    Real,
    Text,
    Blob,
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Text => "text",
            Self::Blob => "blob",
        };
        f.write_str(name)
    }
}

impl Datum {
    /// Returns the storage class of this value.
    pub const fn storage_class(&self) -> StorageClass {
        match self {
            Self::Null => StorageClass::Null,
            Self::Integer(_) => StorageClass::Integer,
            Self::Float(_) => StorageClass::Real,
            Self::Text(_) => StorageClass::Text,
            Self::Blob(_) => StorageClass::Blob,
        }
    }

    /// Returns true if this is a NULL value.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Try to extract an integer value.
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to extract a float value.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Try to extract a text reference.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to extract a blob reference.
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Sort rank of the storage class: NULL < numeric < text < blob.
    const fn class_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Integer(_) | Self::Float(_) => 1,
            Self::Text(_) => 2,
            Self::Blob(_) => 3,
        }
    }

    /// Three-way comparison under a statement context.
    ///
    /// NULL sorts before every other value and equals NULL. Within a class,
    /// integers and floats compare numerically (precision-preserving beyond
    /// 2^53), text compares under the context's collation, and blobs compare
    /// bytewise. Across classes the context's [`CrossTypePolicy`] decides:
    /// order by class rank, or fail with [`CompareError`].
    ///
    /// For any fixed context this is a total order.
    pub fn compare(&self, cx: &StatementContext, other: &Self) -> Result<Ordering, CompareError> {
        match (self, other) {
            (Self::Null, Self::Null) => Ok(Ordering::Equal),
            (Self::Null, _) => Ok(Ordering::Less),
            (_, Self::Null) => Ok(Ordering::Greater),
            (Self::Integer(a), Self::Integer(b)) => Ok(a.cmp(b)),
            (Self::Float(a), Self::Float(b)) => Ok(total_float_cmp(*a, *b)),
            (Self::Integer(a), Self::Float(b)) => Ok(int_float_cmp(*a, *b)),
            (Self::Float(a), Self::Integer(b)) => Ok(int_float_cmp(*b, *a).reverse()),
            (Self::Text(a), Self::Text(b)) => Ok(cx.collation().compare(a.as_bytes(), b.as_bytes())),
            (Self::Blob(a), Self::Blob(b)) => Ok(a.cmp(b)),
            (a, b) => match cx.cross_type() {
                CrossTypePolicy::ClassOrder => Ok(a.class_rank().cmp(&b.class_rank())),
                CrossTypePolicy::Reject => Err(CompareError {
                    left: a.storage_class(),
                    right: b.storage_class(),
                }),
            },
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "'{s}'"),
            Self::Blob(b) => {
                f.write_str("X'")?;
                for byte in b {
                    write!(f, "{byte:02X}")?;
                }
                f.write_str("'")
            }
        }
    }
}

impl From<i64> for Datum {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Datum {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for Datum {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Datum {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<Vec<u8>> for Datum {
    fn from(b: Vec<u8>) -> Self {
        Self::Blob(b)
    }
}

/// Error returned when two values of incompatible classes are compared
/// under [`CrossTypePolicy::Reject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompareError {
    /// Storage class of the left operand.
    pub left: StorageClass,
    /// Storage class of the right operand.
    pub right: StorageClass,
}

impl fmt::Display for CompareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot compare {} with {}", self.left, self.right)
    }
}

impl std::error::Error for CompareError {}

/// Total order over floats: NaN sorts first (it is normalized to NULL by
/// the codec, but a comparison must still be total for in-memory batches).
fn total_float_cmp(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    })
}

/// Compare an integer with a float without losing precision for |i| > 2^53.
///
/// Out-of-range floats are decided immediately; otherwise the float is
/// truncated and integer parts compared, with a float comparison breaking
/// the tie.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn int_float_cmp(i: i64, r: f64) -> Ordering {
    if r.is_nan() {
        return Ordering::Greater;
    }
    if r < -9_223_372_036_854_775_808.0 {
        return Ordering::Greater;
    }
    if r >= 9_223_372_036_854_775_808.0 {
        return Ordering::Less;
    }
    let y = r as i64;
    match i.cmp(&y) {
        Ordering::Less => Ordering::Less,
        Ordering::Greater => Ordering::Greater,
        Ordering::Equal => {
            let s = i as f64;
            s.partial_cmp(&r).unwrap_or(Ordering::Equal)
        }
    }
}
