//! Pure list queries over feed records. Nothing here performs I/O or mutates
//! its input; every function works on plain articles and overlaid records
//! alike.

use std::collections::HashSet;

use crate::core::feed::Article;

/// Category value meaning "no filter".
pub const ALL_CATEGORIES: &str = "全部";

pub fn filter_by_category<T>(articles: &[T], category: &str) -> Vec<T>
where
    T: AsRef<Article> + Clone,
{
    if category.is_empty() || category == ALL_CATEGORIES {
        return articles.to_vec();
    }
    articles
        .iter()
        .filter(|record| record.as_ref().category == category)
        .cloned()
        .collect()
}

/// Case-insensitive substring match on title, description or any tag.
pub fn search_by_keyword<T>(articles: &[T], keyword: &str) -> Vec<T>
where
    T: AsRef<Article> + Clone,
{
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return articles.to_vec();
    }
    let needle = keyword.to_lowercase();
    articles
        .iter()
        .filter(|record| matches_keyword(record.as_ref(), &needle))
        .cloned()
        .collect()
}

/// Category first, then keyword, the way the list view applies them.
pub fn apply_filters<T>(articles: &[T], category: &str, keyword: &str) -> Vec<T>
where
    T: AsRef<Article> + Clone,
{
    search_by_keyword(&filter_by_category(articles, category), keyword)
}

pub fn find_article<'a, T>(articles: &'a [T], id: &str) -> Option<&'a T>
where
    T: AsRef<Article>,
{
    articles.iter().find(|record| record.as_ref().id == id)
}

/// The "All" sentinel followed by each distinct non-empty category in
/// first-seen order.
pub fn categories<T>(articles: &[T]) -> Vec<String>
where
    T: AsRef<Article>,
{
    let mut seen = HashSet::new();
    let mut result = vec![ALL_CATEGORIES.to_string()];
    for record in articles {
        let category = record.as_ref().category.as_str();
        if category.is_empty() || category == ALL_CATEGORIES {
            continue;
        }
        if seen.insert(category) {
            result.push(category.to_string());
        }
    }
    result
}

fn matches_keyword(article: &Article, needle: &str) -> bool {
    article.title.to_lowercase().contains(needle)
        || article.description.to_lowercase().contains(needle)
        || article
            .tags
            .iter()
            .any(|tag| tag.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::OverlaidArticle;

    fn article(id: &str, title: &str, description: &str, tags: &[&str], category: &str) -> Article {
        Article {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            category: category.to_string(),
            ..Article::default()
        }
    }

    fn sample() -> Vec<Article> {
        vec![
            article("1", "春分", "昼夜平分", &["节气", "天文"], "节气"),
            article("2", "Why the Sky is Blue", "Rayleigh scattering", &["Physics"], "科普"),
            article("3", "Black holes", "what happens at the horizon", &["天文"], "科普"),
            article("4", "立春", "一年之始", &[], "节气"),
            article("5", "Untitled", "", &["misc"], ""),
        ]
    }

    fn ids<T: AsRef<Article>>(records: &[T]) -> Vec<&str> {
        records.iter().map(|record| record.as_ref().id.as_str()).collect()
    }

    #[test]
    fn category_filter_is_exact_and_case_sensitive() {
        let articles = sample();
        assert_eq!(ids(&filter_by_category(&articles, "科普")), vec!["2", "3"]);
        assert!(filter_by_category(&articles, "科").is_empty());

        let mixed = vec![article("a", "", "", &[], "Tech"), article("b", "", "", &[], "tech")];
        assert_eq!(ids(&filter_by_category(&mixed, "tech")), vec!["b"]);
    }

    #[test]
    fn empty_or_all_category_returns_everything() {
        let articles = sample();
        assert_eq!(filter_by_category(&articles, ""), articles);
        assert_eq!(filter_by_category(&articles, ALL_CATEGORIES), articles);
    }

    #[test]
    fn keyword_matches_title_description_or_tag_ignoring_case() {
        let articles = sample();
        assert_eq!(ids(&search_by_keyword(&articles, "SKY")), vec!["2"]);
        assert_eq!(ids(&search_by_keyword(&articles, "horizon")), vec!["3"]);
        assert_eq!(ids(&search_by_keyword(&articles, "天文")), vec!["1", "3"]);
        assert_eq!(ids(&search_by_keyword(&articles, "physics")), vec!["2"]);
        assert!(search_by_keyword(&articles, "nothing like this").is_empty());
    }

    #[test]
    fn blank_keyword_returns_everything() {
        let articles = sample();
        assert_eq!(search_by_keyword(&articles, ""), articles);
        assert_eq!(search_by_keyword(&articles, "  \t "), articles);
    }

    #[test]
    fn filters_commute() {
        let articles = sample();
        let categories_to_try = ["", ALL_CATEGORIES, "科普", "节气", "missing"];
        let keywords = ["", "天文", "s", "BLUE", "zzz"];
        for category in categories_to_try {
            for keyword in keywords {
                let category_first =
                    search_by_keyword(&filter_by_category(&articles, category), keyword);
                let keyword_first =
                    filter_by_category(&search_by_keyword(&articles, keyword), category);
                assert_eq!(
                    category_first, keyword_first,
                    "category={category:?} keyword={keyword:?}"
                );
                assert_eq!(apply_filters(&articles, category, keyword), category_first);
            }
        }
    }

    #[test]
    fn queries_work_on_overlaid_records() {
        let overlaid: Vec<OverlaidArticle> = sample()
            .into_iter()
            .map(|article| OverlaidArticle {
                is_favorited: article.id == "3",
                article,
            })
            .collect();

        let hits = apply_filters(&overlaid, "科普", "black");
        assert_eq!(ids(&hits), vec!["3"]);
        assert!(hits[0].is_favorited);
        assert_eq!(find_article(&overlaid, "2").map(|record| record.article.title.as_str()), Some("Why the Sky is Blue"));
        assert!(find_article(&overlaid, "404").is_none());
    }

    #[test]
    fn categories_list_distinct_values_after_sentinel() {
        let articles = sample();
        assert_eq!(
            categories(&articles),
            vec![ALL_CATEGORIES.to_string(), "节气".to_string(), "科普".to_string()]
        );
    }
}
