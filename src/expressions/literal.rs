//! This module contains utilities and classes for SQL literals.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// An enum representing a SQL literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// An integer
    Int(i32),
    /// A big integer (long)
    Long(i64),
    /// A float
    Float(f32),
    /// A double
    Double(f64),
    /// A string
    String(String),
    /// A file-pointer value, used internally to reference tuples by location.
    FilePointer {
        /// The page number the tuple lives on.
        page_no: u16,
        /// The offset of the tuple within the page.
        offset: u16,
    },
    /// A `NULL` value
    Null,
    /// A `TRUE` value
    True,
    /// A `FALSE` value
    False,
}

impl Literal {
    /// Whether the literal is `NULL`.
    #[inline]
    pub fn is_null(&self) -> bool {
        *self == Literal::Null
    }

    /// Whether the literal is a numeric value.
    pub fn is_numeric(&self) -> bool {
        match *self {
            Literal::Int(_) | Literal::Long(_) | Literal::Float(_) | Literal::Double(_) => true,
            _ => false,
        }
    }

    /// Whether the literal is `TRUE` or `FALSE`.
    pub fn is_boolean(&self) -> bool {
        match *self {
            Literal::True | Literal::False => true,
            _ => false,
        }
    }

    /// Whether the literal is a floating-point value.
    pub fn is_floating(&self) -> bool {
        match *self {
            Literal::Float(_) | Literal::Double(_) => true,
            _ => false,
        }
    }

    /// Coerce a numeric literal to an `i64`, when it is an integral type.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Literal::Int(i) => Some(i as i64),
            Literal::Long(l) => Some(l),
            _ => None,
        }
    }

    /// Coerce a numeric literal to an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Literal::Int(i) => Some(i as f64),
            Literal::Long(l) => Some(l as f64),
            Literal::Float(f) => Some(f as f64),
            Literal::Double(d) => Some(d),
            _ => None,
        }
    }

    /// Return the string contents of a string literal.
    pub fn as_string(&self) -> Option<&str> {
        match *self {
            Literal::String(ref s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// Compares two literals for ordering purposes.  `NULL` does not compare against anything
    /// (including another `NULL`), and values of incomparable types do not compare either; both
    /// cases yield `None`.  Numeric values of different widths are coerced before comparison.
    pub fn compare(&self, other: &Literal) -> Option<Ordering> {
        match (self, other) {
            (&Literal::Null, _) | (_, &Literal::Null) => None,
            (&Literal::String(ref a), &Literal::String(ref b)) => Some(a.cmp(b)),
            (&Literal::True, &Literal::True) |
            (&Literal::False, &Literal::False) => Some(Ordering::Equal),
            (&Literal::False, &Literal::True) => Some(Ordering::Less),
            (&Literal::True, &Literal::False) => Some(Ordering::Greater),
            _ => {
                if self.is_numeric() && other.is_numeric() {
                    if self.is_floating() || other.is_floating() {
                        let a = self.as_f64().unwrap();
                        let b = other.as_f64().unwrap();
                        a.partial_cmp(&b)
                    } else {
                        let a = self.as_i64().unwrap();
                        let b = other.as_i64().unwrap();
                        Some(a.cmp(&b))
                    }
                } else {
                    None
                }
            }
        }
    }

    /// A total ordering over literals used for sorting query results.  Unlike
    /// [`compare`](#method.compare), every pair of literals is ordered: `NULL` sorts before
    /// everything else, and values of different non-coercible types sort by a fixed type rank.
    pub fn sort_compare(&self, other: &Literal) -> Ordering {
        fn type_rank(lit: &Literal) -> u8 {
            match *lit {
                Literal::Null => 0,
                Literal::False | Literal::True => 1,
                Literal::Int(_) | Literal::Long(_) | Literal::Float(_) | Literal::Double(_) => 2,
                Literal::String(_) => 3,
                Literal::FilePointer { .. } => 4,
            }
        }

        if let Some(ordering) = self.compare(other) {
            return ordering;
        }
        match (self.is_null(), other.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => type_rank(self).cmp(&type_rank(other)),
        }
    }
}

// Literals are used as grouping keys and in DISTINCT sets, so they must be hashable.  Floats are
// hashed by bit pattern; grouping only ever compares values that came out of `evaluate`, which
// never produces NaN.
impl Eq for Literal {}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match *self {
            Literal::Int(i) => {
                0u8.hash(state);
                i.hash(state);
            }
            Literal::Long(l) => {
                1u8.hash(state);
                l.hash(state);
            }
            Literal::Float(f) => {
                2u8.hash(state);
                f.to_bits().hash(state);
            }
            Literal::Double(d) => {
                3u8.hash(state);
                d.to_bits().hash(state);
            }
            Literal::String(ref s) => {
                4u8.hash(state);
                s.hash(state);
            }
            Literal::FilePointer { page_no, offset } => {
                5u8.hash(state);
                page_no.hash(state);
                offset.hash(state);
            }
            Literal::Null => 6u8.hash(state),
            Literal::True => 7u8.hash(state),
            Literal::False => 8u8.hash(state),
        }
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Literal {
        if b {
            Literal::True
        } else {
            Literal::False
        }
    }
}

impl From<i32> for Literal {
    fn from(i: i32) -> Literal {
        Literal::Int(i)
    }
}

impl From<i64> for Literal {
    fn from(l: i64) -> Literal {
        Literal::Long(l)
    }
}

impl From<f64> for Literal {
    fn from(d: f64) -> Literal {
        Literal::Double(d)
    }
}

impl<'a> From<&'a str> for Literal {
    fn from(s: &'a str) -> Literal {
        Literal::String(s.into())
    }
}

impl ::std::fmt::Display for Literal {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match *self {
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Long(l) => write!(f, "{}", l),
            Literal::Float(fl) => write!(f, "{}", fl),
            Literal::Double(d) => write!(f, "{}", d),
            Literal::String(ref s) => write!(f, "{}", s),
            Literal::FilePointer { page_no, offset } => write!(f, "FP[{}:{}]", page_no, offset),
            Literal::Null => write!(f, "NULL"),
            Literal::True => write!(f, "TRUE"),
            Literal::False => write!(f, "FALSE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::*;

    #[test]
    fn test_compare_numeric_coercion() {
        assert_eq!(Some(Ordering::Equal),
                   Literal::Int(30).compare(&Literal::Long(30)));
        assert_eq!(Some(Ordering::Less),
                   Literal::Int(30).compare(&Literal::Double(30.5)));
        assert_eq!(Some(Ordering::Greater),
                   Literal::Float(2.5).compare(&Literal::Int(2)));
    }

    #[test]
    fn test_compare_null_is_unordered() {
        assert_eq!(None, Literal::Null.compare(&Literal::Null));
        assert_eq!(None, Literal::Null.compare(&Literal::Int(1)));
        assert_eq!(None, Literal::Int(1).compare(&Literal::Null));
    }

    #[test]
    fn test_compare_incompatible_types() {
        assert_eq!(None, Literal::Int(1).compare(&Literal::String("1".into())));
        assert_eq!(None, Literal::True.compare(&Literal::Int(1)));
    }

    #[test]
    fn test_sort_compare_nulls_first() {
        assert_eq!(Ordering::Less, Literal::Null.sort_compare(&Literal::Int(-100)));
        assert_eq!(Ordering::Equal, Literal::Null.sort_compare(&Literal::Null));
        assert_eq!(Ordering::Greater,
                   Literal::String("a".into()).sort_compare(&Literal::Null));
    }
}
