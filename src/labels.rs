/// Renders a label set as `name=value` pairs joined by `,`, sorted by name.
///
/// Names are ordered by UTF-16 code units so the output matches what the
/// dashboard frontend produces for the same labels. Nothing is escaped: labels
/// containing `=` or `,` do not split back into the same set.
pub fn format_labels<K, V>(labels: impl IntoIterator<Item = (K, V)>) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs: Vec<(K, V)> = labels.into_iter().collect();
    pairs.sort_by(|(a, _), (b, _)| {
        a.as_ref()
            .encode_utf16()
            .cmp(b.as_ref().encode_utf16())
    });

    pairs
        .iter()
        .map(|(name, value)| format!("{}={}", name.as_ref(), value.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}
