//! Centralized name derivation for collections and documents.
//!
//! Every collection is declared with a single free-form name (`"Post"`,
//! `"blog post"`, `"case-study"`). Everything else the build emits is derived
//! from that name, once, by [`normalize`]:
//!
//! | Derived | Rule | `"blog post"` |
//! |---|---|---|
//! | type name | PascalCase | `BlogPost` |
//! | module name | camelCase, pluralized | `blogPosts` |
//! | variable name | `all` + PascalCase, pluralized | `allBlogPosts` |
//!
//! The same module also owns the per-document helpers used by code generation
//! and provenance: [`identifier`] turns a file base name into a safe JS binding,
//! and [`slugify`] turns it into a URL segment.
//!
//! All functions here are pure and total. Odd inputs produce odd but stable
//! outputs; nothing is rejected at this layer.

/// The three names derived from a collection name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedName {
    /// PascalCase singular, used as the generated type name.
    pub type_name: String,
    /// Pluralized camelCase, used as the output directory and import path.
    pub module_name: String,
    /// `all` + pluralized PascalCase, the exported array binding.
    pub variable_name: String,
}

/// Derive type, module and variable names from a collection name.
///
/// - `"Post"` → `Post`, `posts`, `allPosts`
/// - `"blog-entry"` → `BlogEntry`, `blogEntries`, `allBlogEntries`
/// - `"person"` → `Person`, `people`, `allPeople`
pub fn normalize(name: &str) -> NormalizedName {
    let pascal = pascal_case(name);
    let camel = camel_case(name);
    NormalizedName {
        module_name: pluralize(&camel),
        variable_name: format!("all{}", pluralize(&pascal)),
        type_name: pascal,
    }
}

/// Split a name into words on separators and case boundaries.
///
/// Any non-alphanumeric character separates words. Inside a run of
/// alphanumerics a new word starts at a lower→upper transition (`blogPost`)
/// and before the last capital of an acronym followed by lowercase (`XMLFeed`
/// → `XML`, `Feed`). Digits stick to the word they follow.
pub fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = name.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if let Some(prev) = current.chars().last() {
            let next = chars.get(i + 1).copied();
            let lower_to_upper = (prev.is_lowercase() || prev.is_ascii_digit()) && c.is_uppercase();
            let acronym_end = prev.is_uppercase()
                && c.is_uppercase()
                && next.is_some_and(|n| n.is_lowercase());
            if lower_to_upper || acronym_end {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// `"blog post"` → `"BlogPost"`
pub fn pascal_case(name: &str) -> String {
    split_words(name).iter().map(|w| capitalize(w)).collect()
}

/// `"Blog Post"` → `"blogPost"`
pub fn camel_case(name: &str) -> String {
    split_words(name)
        .iter()
        .enumerate()
        .map(|(i, w)| if i == 0 { w.to_lowercase() } else { capitalize(w) })
        .collect()
}

const UNCOUNTABLE: &[&str] = &[
    "aircraft", "bison", "data", "deer", "equipment", "feedback", "fish", "information",
    "media", "metadata", "moose", "news", "rice", "series", "sheep", "software", "species",
];

const IRREGULAR: &[(&str, &str)] = &[
    ("child", "children"),
    ("foot", "feet"),
    ("goose", "geese"),
    ("man", "men"),
    ("mouse", "mice"),
    ("ox", "oxen"),
    ("person", "people"),
    ("tooth", "teeth"),
    ("woman", "women"),
];

const F_TO_VES: &[&str] = &[
    "calf", "elf", "half", "knife", "leaf", "life", "loaf", "self", "shelf", "thief", "wife",
    "wolf",
];

/// Pluralize the last word of an identifier, preserving the rest verbatim.
///
/// Works on camelCase and PascalCase input: `blogEntry` → `blogEntries`,
/// `Person` → `People`. An input whose last word already looks plural is
/// returned unchanged.
pub fn pluralize(identifier: &str) -> String {
    let split = identifier
        .char_indices()
        .rev()
        .find(|&(i, c)| i > 0 && c.is_uppercase())
        .map(|(i, _)| i)
        .unwrap_or(0);
    let (head, last) = identifier.split_at(split);
    format!("{head}{}", pluralize_word(last))
}

fn pluralize_word(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    let lower = word.to_lowercase();
    let capitalized = word.chars().next().is_some_and(char::is_uppercase);
    let restore = |plural: &str| {
        if capitalized {
            capitalize(plural)
        } else {
            plural.to_string()
        }
    };

    if UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(single, _)| *single == lower) {
        return restore(plural);
    }
    if IRREGULAR.iter().any(|(_, plural)| *plural == lower) {
        return word.to_string();
    }
    if F_TO_VES.contains(&lower.as_str()) {
        let stem = lower.trim_end_matches("fe").trim_end_matches('f');
        return restore(&format!("{stem}ves"));
    }

    let ends_consonant_y = lower.ends_with('y')
        && lower
            .chars()
            .rev()
            .nth(1)
            .is_some_and(|c| !"aeiou".contains(c));
    if ends_consonant_y {
        return format!("{}ies", &word[..word.len() - 1]);
    }
    if lower.ends_with("sis") {
        return format!("{}es", &word[..word.len() - 2]);
    }
    if lower.ends_with("ss")
        || lower.ends_with("us")
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        return format!("{word}es");
    }
    if lower.ends_with('s') {
        return word.to_string();
    }
    format!("{word}s")
}

const RESERVED_WORDS: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
    "if", "import", "in", "instanceof", "let", "new", "null", "return", "static", "super",
    "switch", "this", "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
    // strict mode, which every ES module runs in
    "arguments", "eval", "implements", "interface", "package", "private", "protected", "public",
];

/// Whether `name` can be used verbatim as a JS binding.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$');
    head_ok
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        && !RESERVED_WORDS.contains(&name)
}

/// Turn a document base name into a JS binding for the aggregator module.
///
/// - `"hello-world"` → `helloWorld`
/// - `"2024-recap"` → `_2024Recap`
/// - `"default"` → `_default`
pub fn identifier(base_name: &str) -> String {
    let camel = camel_case(base_name);
    if is_identifier(&camel) {
        camel
    } else {
        format!("_{camel}")
    }
}

/// URL-safe, lowercase slug of a document base name.
///
/// Whitespace runs become a single dash, characters outside
/// `[alphanumeric - _ . ~]` are dropped, and dashes are trimmed.
pub fn slugify(base_name: &str) -> String {
    let mut slug = String::with_capacity(base_name.len());
    for c in base_name.chars() {
        if c.is_whitespace() || c == '-' {
            if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        } else if c.is_alphanumeric() || matches!(c, '_' | '.' | '~') {
            slug.extend(c.to_lowercase());
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalize_single_word() {
        let n = normalize("Post");
        assert_eq!(n.type_name, "Post");
        assert_eq!(n.module_name, "posts");
        assert_eq!(n.variable_name, "allPosts");
    }

    #[test]
    fn normalize_multi_word_with_y_ending() {
        let n = normalize("blog-entry");
        assert_eq!(n.type_name, "BlogEntry");
        assert_eq!(n.module_name, "blogEntries");
        assert_eq!(n.variable_name, "allBlogEntries");
    }

    #[test]
    fn normalize_irregular_plural() {
        let n = normalize("person");
        assert_eq!(n.type_name, "Person");
        assert_eq!(n.module_name, "people");
        assert_eq!(n.variable_name, "allPeople");
    }

    #[test]
    fn normalize_uncountable() {
        let n = normalize("news");
        assert_eq!(n.module_name, "news");
        assert_eq!(n.variable_name, "allNews");
    }

    #[test]
    fn normalize_already_plural_is_unchanged() {
        let n = normalize("posts");
        assert_eq!(n.type_name, "Posts");
        assert_eq!(n.module_name, "posts");
        assert_eq!(n.variable_name, "allPosts");
    }

    #[test]
    fn normalize_empty_name_is_total() {
        let n = normalize("");
        assert_eq!(n.type_name, "");
        assert_eq!(n.module_name, "");
        assert_eq!(n.variable_name, "all");
    }

    #[test]
    fn split_words_on_case_and_separators() {
        assert_eq!(split_words("blogPost"), vec!["blog", "Post"]);
        assert_eq!(split_words("XMLFeed"), vec!["XML", "Feed"]);
        assert_eq!(split_words("case_study 2"), vec!["case", "study", "2"]);
        assert_eq!(split_words("--a--"), vec!["a"]);
    }

    #[test]
    fn case_conversions() {
        assert_eq!(pascal_case("case study"), "CaseStudy");
        assert_eq!(camel_case("Case Study"), "caseStudy");
        assert_eq!(camel_case("FOO"), "foo");
        assert_eq!(pascal_case("post2go"), "Post2go");
    }

    #[test]
    fn pluralize_suffix_rules() {
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("church"), "churches");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("knife"), "knives");
        assert_eq!(pluralize("analysis"), "analyses");
        assert_eq!(pluralize("status"), "statuses");
    }

    #[test]
    fn pluralize_only_touches_last_word() {
        assert_eq!(pluralize("caseStudy"), "caseStudies");
        assert_eq!(pluralize("TeamPerson"), "TeamPeople");
    }

    #[test]
    fn identifier_from_base_names() {
        assert_eq!(identifier("hello"), "hello");
        assert_eq!(identifier("hello-world"), "helloWorld");
        assert_eq!(identifier("2024-recap"), "_2024Recap");
        assert_eq!(identifier("default"), "_default");
        assert_eq!(identifier("public"), "_public");
        assert_eq!(identifier("eval"), "_eval");
        assert_eq!(identifier("!!!"), "_");
    }

    #[test]
    fn slug_from_base_names() {
        assert_eq!(slugify("Test File"), "test-file");
        assert_eq!(slugify("README"), "readme");
        assert_eq!(slugify("  What's new?  "), "whats-new");
        assert_eq!(slugify("v1.2_notes"), "v1.2_notes");
    }

    proptest! {
        #[test]
        fn normalize_is_deterministic(name in ".{0,40}") {
            prop_assert_eq!(normalize(&name), normalize(&name));
        }

        #[test]
        fn variable_name_always_prefixed(name in "[a-zA-Z][a-zA-Z0-9 _-]{0,30}") {
            let n = normalize(&name);
            prop_assert!(n.variable_name.starts_with("all"));
            prop_assert!(n.module_name.chars().all(|c| c.is_alphanumeric()));
        }

        #[test]
        fn identifiers_are_valid_bindings(base in "[a-zA-Z0-9 _.-]{0,40}") {
            let id = identifier(&base);
            prop_assert!(id == "_" || is_identifier(&id));
        }
    }
}
