use ammonia;

/// Clean HTML content using the ammonia library.
///
/// Question and option bodies arrive from word-processor copy-paste and from
/// the admin's rich-text editor, so they may carry markup. Whitelist-based
/// sanitization keeps safe formatting tags (<b>, <p>, sub/sup for formulas)
/// while stripping <script>, <iframe> and event-handler attributes before
/// anything is stored.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
