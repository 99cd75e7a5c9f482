use thiserror::Error;

/// Fixed vocabulary of interest tags a profile may select.
pub const INTERESTS: [&str; 15] = [
    "Music",
    "Movies",
    "Gaming",
    "Sports",
    "Technology",
    "Art",
    "Travel",
    "Books",
    "Food",
    "Fitness",
    "Photography",
    "Fashion",
    "Science",
    "Comedy",
    "Nature",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown interest '{0}'")]
pub struct UnknownInterest(pub String);

/// Vocabulary spelling of `tag`, ignoring case and surrounding whitespace.
pub fn canonical(tag: &str) -> Option<&'static str> {
    let tag = tag.trim();
    INTERESTS.iter().copied().find(|known| known.eq_ignore_ascii_case(tag))
}

/// Map every tag onto its vocabulary spelling and drop duplicates, keeping
/// the first occurrence.
pub fn normalize(tags: &[String]) -> Result<Vec<String>, UnknownInterest> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let known = canonical(tag).ok_or_else(|| UnknownInterest(tag.clone()))?;
        if !out.iter().any(|t| t == known) {
            out.push(known.to_string());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_dedupes_in_order() {
        let tags = vec!["Gaming".to_string(), "Music".to_string(), "Gaming".to_string()];
        assert_eq!(normalize(&tags).unwrap(), vec!["Gaming", "Music"]);
    }

    #[test]
    fn normalize_rejects_unknown() {
        let tags = vec!["Music".to_string(), "Knitting".to_string()];
        assert_eq!(normalize(&tags).unwrap_err(), UnknownInterest("Knitting".into()));
    }

    #[test]
    fn tags_take_the_vocabulary_spelling() {
        assert_eq!(canonical(" art "), Some("Art"));
        assert_eq!(canonical("PHOTOGRAPHY"), Some("Photography"));
        assert_eq!(canonical("arts"), None);

        let tags = vec!["music".to_string(), "Music".to_string(), "gAmInG".to_string()];
        assert_eq!(normalize(&tags).unwrap(), vec!["Music", "Gaming"]);
    }
}
