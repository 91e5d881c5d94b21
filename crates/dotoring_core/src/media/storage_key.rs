//! Storage key normalization and upload key naming.

use once_cell::sync::Lazy;
use regex::Regex;

static HTTP_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?://").expect("valid http url regex"));

const OBJECT_MARKER: &str = "/storage/v1/object/";

/// Returns whether `raw` is already a fetchable absolute URL.
pub fn is_absolute_url(raw: &str) -> bool {
    HTTP_URL_RE.is_match(raw.trim())
}

/// Extracts the storage key from a raw key or a storage URL of `bucket`.
///
/// - Raw keys lose leading slashes.
/// - `/storage/v1/object/public/<bucket>/<key>` and
///   `/storage/v1/object/sign/<bucket>/<key>?token=...` yield `<key>`.
/// - Foreign URLs and empty input yield `None`.
pub fn normalize_storage_key(raw: &str, bucket: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if !is_absolute_url(trimmed) {
        let key = trimmed.trim_start_matches('/');
        return (!key.is_empty()).then(|| key.to_string());
    }

    let (_, rest) = trimmed.split_once(OBJECT_MARKER)?;
    let path = rest.split(['?', '#']).next().unwrap_or_default();
    let mut segments = path.split('/');
    segments.by_ref().find(|segment| *segment == bucket)?;
    let key = segments.collect::<Vec<_>>().join("/");
    (!key.is_empty()).then_some(key)
}

/// Storage key and content type for a freshly picked coupon image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUploadTarget {
    /// `coupons/<user_id>/<coupon_id>.<ext>`; stable per coupon so a
    /// replacement upload overwrites the previous object.
    pub key: String,
    pub content_type: &'static str,
}

/// Derives where a local image for `coupon_id` is uploaded.
pub fn coupon_image_key(user_id: &str, coupon_id: &str, local_uri: &str) -> ImageUploadTarget {
    let path = local_uri
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let (ext, content_type) = if path.ends_with(".png") {
        ("png", "image/png")
    } else if path.ends_with(".webp") {
        ("webp", "image/webp")
    } else {
        ("jpg", "image/jpeg")
    };

    ImageUploadTarget {
        key: format!("coupons/{user_id}/{coupon_id}.{ext}"),
        content_type,
    }
}

#[cfg(test)]
mod tests {
    use super::{coupon_image_key, is_absolute_url, normalize_storage_key};

    const BUCKET: &str = "coupon-images";

    #[test]
    fn raw_keys_lose_leading_slashes() {
        assert_eq!(
            normalize_storage_key("//coupons/u/c.jpg", BUCKET).as_deref(),
            Some("coupons/u/c.jpg")
        );
        assert_eq!(normalize_storage_key("   ", BUCKET), None);
        assert_eq!(normalize_storage_key("///", BUCKET), None);
    }

    #[test]
    fn extracts_key_from_public_and_signed_urls() {
        let public =
            "https://x.supabase.co/storage/v1/object/public/coupon-images/coupons/u/c.png";
        assert_eq!(
            normalize_storage_key(public, BUCKET).as_deref(),
            Some("coupons/u/c.png")
        );

        let signed =
            "https://x.supabase.co/storage/v1/object/sign/coupon-images/coupons/u/c.png?token=abc";
        assert_eq!(
            normalize_storage_key(signed, BUCKET).as_deref(),
            Some("coupons/u/c.png")
        );
    }

    #[test]
    fn foreign_urls_have_no_key() {
        assert_eq!(normalize_storage_key("https://cdn.example.com/a.png", BUCKET), None);
        assert_eq!(
            normalize_storage_key(
                "https://x.supabase.co/storage/v1/object/public/other-bucket/a.png",
                BUCKET
            ),
            None
        );
    }

    #[test]
    fn url_detection_is_case_insensitive() {
        assert!(is_absolute_url("HTTPS://example.com/a.png"));
        assert!(!is_absolute_url("coupons/http-cat.png"));
    }

    #[test]
    fn upload_key_guesses_extension() {
        let png = coupon_image_key("u-1", "c-1", "file:///tmp/IMG_1.PNG");
        assert_eq!(png.key, "coupons/u-1/c-1.png");
        assert_eq!(png.content_type, "image/png");

        let heic = coupon_image_key("u-1", "c-1", "file:///tmp/IMG_2.heic?x=1");
        assert_eq!(heic.key, "coupons/u-1/c-1.jpg");
        assert_eq!(heic.content_type, "image/jpeg");
    }
}
