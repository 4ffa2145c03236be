/// Value paired with the greatest threshold not above `value`.
///
/// `items` does not need to be sorted. Returns `None` when `value` sits
/// below every threshold.
///
/// ```
/// use cadence_blocks::threshold;
/// use cadence_core::Color;
///
/// let colors = [(0.0, Color::NEUTRAL), (75.0, Some(Color::WARN)), (90.0, Some(Color::URGENT))];
/// assert_eq!(threshold(&colors, 80.0), Some(&Some(Color::WARN)));
/// ```
pub fn threshold<T, V>(items: &[(T, V)], value: T) -> Option<&V>
where
    T: PartialOrd + Copy,
{
    items
        .iter()
        .filter(|(limit, _)| *limit <= value)
        .fold(None, |best: Option<&(T, V)>, item| match best {
            Some(b) if b.0 >= item.0 => Some(b),
            _ => Some(item),
        })
        .map(|(_, v)| v)
}
