//! Store completion rule.
//!
//! A store is completed when it has at least one grocery and every grocery in
//! it is completed. An empty store is never completed.

/// Decide whether a store is completed from the completion flags of its groceries.
///
/// ```
/// use grocery_core::is_store_completed;
///
/// assert!(!is_store_completed(std::iter::empty()));
/// assert!(is_store_completed([true, true]));
/// assert!(!is_store_completed([true, false]));
/// ```
pub fn is_store_completed<I>(groceries: I) -> bool
where
    I: IntoIterator<Item = bool>,
{
    let mut seen_any = false;
    for completed in groceries {
        if !completed {
            return false;
        }
        seen_any = true;
    }
    seen_any
}
