//! Value semantics: increment arithmetic and filter comparison.
//!
//! Documents arrive already encoded, so numeric values are `Int64` or
//! `Double` and nothing else. Increments follow the addition table for those
//! two types; comparisons are defined only within a type family (numbers,
//! strings, timestamps) and refuse everything else.

use bson::{Bson, Document};
use std::cmp::Ordering;

use docport_core::error::{StoreError, StoreResult};
use docport_core::query::{Filter, FilterOp};

use crate::paths::get_at_path;

/// Adds an increment amount to a field's current value.
///
/// An absent current value takes the amount verbatim. Int plus int stays an
/// int (wrapping on overflow); any float operand produces a float.
///
/// # Errors
///
/// A current value that is neither `Int64` nor `Double` fails with
/// [`StoreError::InvalidArgument`]. An amount of any other type fails with
/// [`StoreError::Internal`]; the layer above validates amounts before they
/// reach the engine.
pub(crate) fn add_values(current: Option<&Bson>, amount: &Bson) -> StoreResult<Bson> {
    let Some(current) = current else {
        return Ok(amount.clone());
    };
    match current {
        Bson::Int64(x) => match amount {
            Bson::Int64(y) => Ok(Bson::Int64(x.wrapping_add(*y))),
            Bson::Double(y) => Ok(Bson::Double(*x as f64 + y)),
            other => Err(bad_amount(other)),
        },
        Bson::Double(x) => match amount {
            Bson::Int64(y) => Ok(Bson::Double(x + *y as f64)),
            Bson::Double(y) => Ok(Bson::Double(x + y)),
            other => Err(bad_amount(other)),
        },
        other => Err(StoreError::InvalidArgument(format!(
            "value {other} being incremented not int64 or float64"
        ))),
    }
}

fn bad_amount(amount: &Bson) -> StoreError {
    StoreError::Internal(format!(
        "bad increment amount type {:?}",
        amount.element_type()
    ))
}

/// Compares two encoded values.
///
/// Numbers compare numerically (`Int64` and `Double` mix freely), strings
/// byte-wise, timestamps chronologically.
///
/// # Errors
///
/// Every other pairing fails with [`StoreError::InvalidArgument`].
pub(crate) fn compare_values(left: &Bson, right: &Bson) -> StoreResult<Ordering> {
    match (left, right) {
        (Bson::Int64(a), Bson::Int64(b)) => Ok(a.cmp(b)),
        (Bson::Int64(a), Bson::Double(b)) => Ok((*a as f64).total_cmp(b)),
        (Bson::Double(a), Bson::Int64(b)) => Ok(a.total_cmp(&(*b as f64))),
        (Bson::Double(a), Bson::Double(b)) => Ok(a.total_cmp(b)),
        (Bson::String(a), Bson::String(b)) => Ok(a.cmp(b)),
        (Bson::DateTime(a), Bson::DateTime(b)) => Ok(a.cmp(b)),
        _ => Err(StoreError::InvalidArgument(format!(
            "cannot compare {:?} with {:?}",
            left.element_type(),
            right.element_type()
        ))),
    }
}

/// Reports whether `doc` satisfies every filter clause.
///
/// A document missing a filtered field does not match; a filtered field of a
/// mismatched type fails the whole query.
pub(crate) fn filters_match(filters: &[Filter], doc: &Document) -> StoreResult<bool> {
    for filter in filters {
        if !filter_matches(filter, doc)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn filter_matches(filter: &Filter, doc: &Document) -> StoreResult<bool> {
    // An unreachable path (through a scalar) is treated like an absent field.
    let Ok(Some(value)) = get_at_path(doc, &filter.field_path) else {
        return Ok(false);
    };
    let ordering = compare_values(value, &filter.value)?;
    Ok(match filter.op {
        FilterOp::Eq => ordering == Ordering::Equal,
        FilterOp::Gt => ordering == Ordering::Greater,
        FilterOp::Gte => ordering != Ordering::Less,
        FilterOp::Lt => ordering == Ordering::Less,
        FilterOp::Lte => ordering != Ordering::Greater,
    })
}
