//! Alternate renderings of a candidate name.
//!
//! A redacted name may appear in the document as "Jane Q Doe", "JANE Q DOE",
//! "Doe, Jane Q" or "J.Q.D.". Each form is scored as its own string.

/// A transformation applied to a candidate's text before matching.
///
/// The declaration order is the tie-break order used elsewhere.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TextVariant {
    /// Trimmed text as given.
    Original,
    /// Upper-cased.
    Upper,
    /// "Last, First Middle". Needs two or more words.
    LastFirst,
    /// First letter of each word followed by a period ("N.M."). Needs two
    /// or more words.
    Initials,
}

impl TextVariant {
    pub const ALL: [TextVariant; 4] = [
        TextVariant::Original,
        TextVariant::Upper,
        TextVariant::LastFirst,
        TextVariant::Initials,
    ];

    /// Apply the transformation, or `None` when it is undefined for `text`.
    pub fn apply(self, text: &str) -> Option<String> {
        let text = text.trim();
        match self {
            TextVariant::Original => Some(text.to_string()),
            TextVariant::Upper => Some(text.to_uppercase()),
            TextVariant::LastFirst => {
                let words: Vec<&str> = text.split_whitespace().collect();
                match words.split_last() {
                    Some((last, rest)) if !rest.is_empty() => {
                        Some(format!("{}, {}", last, rest.join(" ")))
                    }
                    _ => None,
                }
            }
            TextVariant::Initials => {
                let words: Vec<&str> = text.split_whitespace().collect();
                if words.len() < 2 {
                    return None;
                }
                let mut out = String::new();
                for w in words {
                    if let Some(c) = w.chars().next() {
                        out.extend(c.to_uppercase());
                        out.push('.');
                    }
                }
                Some(out)
            }
        }
    }
}

/// Distinct variant strings of `text`, in the order of `enabled`.
///
/// The original form is always produced (even for empty text, so a
/// degenerate candidate is still reported). Variants that coincide with an
/// earlier one or are undefined are dropped.
pub fn text_variants(text: &str, enabled: &[TextVariant]) -> Vec<(TextVariant, String)> {
    let mut out: Vec<(TextVariant, String)> = Vec::with_capacity(enabled.len() + 1);
    let mut order: Vec<TextVariant> = vec![TextVariant::Original];
    order.extend(enabled.iter().filter(|v| **v != TextVariant::Original));
    for variant in order {
        if let Some(s) = variant.apply(text) {
            if !out.iter().any(|(_, existing)| *existing == s) {
                out.push((variant, s));
            }
        }
    }
    out
}
