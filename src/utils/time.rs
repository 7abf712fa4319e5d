use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

/// `20240131093005`: sortable, filesystem-safe timestamp for file names.
pub const FILE_STAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day][hour][minute][second]");

/// `Wed, Jan 31 2024 09:30 AM`: human-readable timestamp for the chat context.
pub const CLOCK_STAMP: &[BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short], [month repr:short] [day] [year] [hour repr:12]:[minute] [period]"
);

/// `+09:00`: UTC offset of a timestamp.
pub const OFFSET_STAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[offset_hour sign:mandatory]:[offset_minute]");

/// The current time in the local offset, or UTC when the offset cannot be
/// determined (the `time` crate refuses to read it once threads are running).
pub fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Formats `when` with `format`, falling back to RFC 3339-ish debug output.
pub fn format(when: OffsetDateTime, format: &[BorrowedFormatItem<'_>]) -> String {
    when.format(format).unwrap_or_else(|_| when.to_string())
}
