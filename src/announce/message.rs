//! Announcement text

use crate::models::VideoRecord;
use crate::utils::{group_digits, truncate_chars};

/// Hashtag appended to every announcement
pub const SITE_HASHTAG: &str = "ニコニコ動画";

/// Titles longer than this are shortened so the post stays within feed limits
pub const MAX_TITLE_CHARS: usize = 100;

/// Format the announcement for `record`:
///
/// `12,345回再生 678コメント 90マイリスト - {title} https://nico.ms/{id} #{id} #ニコニコ動画`
pub fn format_announcement(record: &VideoRecord) -> String {
    format!(
        "{views}回再生 {comments}コメント {mylists}マイリスト - {title} {url} #{id} #{tag}",
        views = group_digits(record.view_count),
        comments = group_digits(record.comment_count),
        mylists = group_digits(record.mylist_count),
        title = truncate_chars(record.title.trim(), MAX_TITLE_CHARS),
        url = record.short_url(),
        id = record.content_id,
        tag = SITE_HASHTAG,
    )
}
