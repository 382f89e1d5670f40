//! Title and slug derivation for content items. Titles come from file and
//! folder names; slugs come from titles and are the idempotency key for every
//! remote lookup.

use std::path::Path;

/// Converts a file or folder name (without extension) into a display title:
/// `-` and `_` become spaces and each word is title-cased (e.g.,
/// `intro-to_numpy` becomes `Intro To Numpy`).
pub fn title_from_name(name: &str) -> String {
    let spaced = name.replace('-', " ").replace('_', " ");
    let mut title = String::with_capacity(spaced.len());
    let mut previous_alphabetic = false;
    for c in spaced.chars() {
        if c.is_alphabetic() {
            if previous_alphabetic {
                title.extend(c.to_lowercase());
            } else {
                title.extend(c.to_uppercase());
            }
            previous_alphabetic = true;
        } else {
            title.push(c);
            previous_alphabetic = false;
        }
    }
    title
}

/// Derives a title from the file stem of a document path.
pub fn title_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(title_from_name)
}

/// Derives a title from the full name of a folder. Unlike
/// [`title_from_path`], dots are kept (`v1.2-notes` is `V1.2 Notes`).
pub fn title_from_folder(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(title_from_name)
}

/// Normalizes a title into a URL-safe slug. The result is lower-case, has
/// non-alphanumeric characters removed and runs of separators collapsed to a
/// single `-`. Equivalent spellings map to the same slug, so `My Notebook`,
/// `my-notebook` and `my_notebook` all produce `my-notebook`.
pub fn slugify(title: &str) -> String {
    // Apostrophes and similar punctuation are dropped outright rather than
    // becoming separators, so "Author's Notes" is `authors-notes`.
    let stripped: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect();
    ::slug::slugify(stripped)
}
