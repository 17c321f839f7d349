//! Priority ladder: maps a list position to a 1-4 priority.

use super::Priority;

/// Returns the ladder priority for the task at `index` in a list of `total`.
///
/// The sequence is non-increasing from 4 at the top to 1 at the bottom for
/// every list length. Short lists use fixed rungs; longer lists interpolate
/// as `ceil(4 - index * 3 / (total - 1))`. Indices past the end are treated
/// as the last position.
///
/// # Examples
///
/// ```
/// use nextslot::board::domain::priority_at;
///
/// let rungs: Vec<u8> = (0..5).map(|index| priority_at(index, 5).value()).collect();
/// assert_eq!(rungs, vec![4, 4, 3, 2, 1]);
/// ```
#[must_use]
pub fn priority_at(index: usize, total: usize) -> Priority {
    let last = total.saturating_sub(1);
    let position = index.min(last);
    match (total, position) {
        (0 | 1, _) | (2 | 3, 0) => Priority::HIGHEST,
        (2, _) => Priority::LOWEST,
        (3, 1) => Priority::clamped(2),
        (3, _) => Priority::LOWEST,
        _ => {
            // ceil(4 - 3i/(n-1)) == 4 - floor(3i/(n-1)) for integer 4.
            let fall = position
                .saturating_mul(3)
                .checked_div(last)
                .unwrap_or_default();
            Priority::clamped(4_usize.saturating_sub(fall))
        }
    }
}
