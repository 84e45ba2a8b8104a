use reqwest::Url;

use crate::{
    types::Category,
    utils::{sanitize_filename, short_hash},
};

/// Stable, filesystem-safe id for a post url.
///
/// Photos are keyed on the `fbid` and `set` query parameters
/// (`photo_{fbid}_{set}`), videos on the `v` query parameter of `/watch`
/// links or else the last non-empty path segment. When the url carries
/// neither, the id falls back to `{category}_{hash}` where the hash is
/// derived from the full url.
pub fn assign_id(source_url: &str, category: Category) -> String {
    structural_id(source_url, category)
        .map(|id| sanitize_filename(&id))
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| format!("{}_{}", category.as_str(), short_hash(source_url)))
}

fn structural_id(source_url: &str, category: Category) -> Option<String> {
    let url = Url::parse(source_url).ok()?;
    let query = |key: &str| {
        url.query_pairs()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.into_owned())
    };
    match category {
        Category::Photo => {
            let fbid = query("fbid")?;
            let set = query("set").unwrap_or_else(|| "unknown".into());
            Some(format!("photo_{}_{}", fbid, set))
        }
        Category::Video => query("v").or_else(|| {
            url.path_segments()?
                .filter(|s| !s.is_empty())
                .last()
                .map(|s| s.to_string())
        }),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn photo_ids_use_fbid_and_set() {
        assert_eq!(
            assign_id(
                "https://www.facebook.com/photo/?fbid=1234&set=a.5678",
                Category::Photo
            ),
            "photo_1234_a.5678"
        );
        assert_eq!(
            assign_id("https://www.facebook.com/photo.php?fbid=99", Category::Photo),
            "photo_99_unknown"
        );
    }

    #[test]
    fn same_fbid_different_set_differ() {
        let a = assign_id("https://www.facebook.com/photo/?fbid=1&set=a.1", Category::Photo);
        let b = assign_id("https://www.facebook.com/photo/?fbid=1&set=a.2", Category::Photo);
        assert_ne!(a, b);
    }

    #[test]
    fn ids_are_stable() {
        let url = "https://www.facebook.com/photo/?fbid=1&set=pcb.2%2F3";
        assert_eq!(assign_id(url, Category::Photo), assign_id(url, Category::Photo));
        assert_eq!(assign_id(url, Category::Photo), "photo_1_pcb.2_3");
    }

    #[test]
    fn video_ids_use_last_segment() {
        assert_eq!(
            assign_id("https://www.facebook.com/demo/videos/1122334455/", Category::Video),
            "1122334455"
        );
        assert_eq!(
            assign_id("https://www.facebook.com/reel/77?s=1", Category::Video),
            "77"
        );
        // every /watch link would otherwise collapse onto "watch"
        assert_eq!(
            assign_id("https://www.facebook.com/watch/?v=31337", Category::Video),
            "31337"
        );
    }

    #[test]
    fn falls_back_to_hash() {
        let id = assign_id("https://www.facebook.com/photo/", Category::Photo);
        assert!(id.starts_with("photo_"));
        assert_eq!(id.len(), "photo_".len() + 8);

        let id = assign_id("https://www.facebook.com/", Category::Video);
        assert!(id.starts_with("video_"));
        assert_eq!(id.len(), "video_".len() + 8);

        let id = assign_id("not a url", Category::Video);
        assert_eq!(id, format!("video_{}", short_hash("not a url")));
    }
}
