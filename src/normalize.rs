/// Canonicalizes a free-text company or location name so that spellings from
/// different tables can be compared.
///
/// Lowercases first (some capitals lowercase to a letter plus a combining
/// mark), then drops everything that is not a letter, digit or whitespace,
/// collapses whitespace runs into a single space and trims. The output is a
/// fixed point: normalizing it again returns it unchanged.
pub fn normalize(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
