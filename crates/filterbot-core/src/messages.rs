//! User-facing texts.

use crate::error::ButtonParseError;
use crate::types::Filter;

pub const HELP: &str = "🤖 Welcome to Multi-Group Filter Bot! 🤖\n\n\
This bot allows you to create message filters in any group, including private ones.\n\n\
How to use:\n\
1️⃣ Add this bot to your group (must be admin)\n\
2️⃣ Use /filter to create a new filter (admin only)\n\
3️⃣ Send an image within 60 seconds (or skip with /skip)\n\
4️⃣ Create buttons in format: text|url, text2|url2\n\
5️⃣ Set the trigger word for your filter\n\n\
Filter Management:\n\
• /filters - List all filters in current chat\n\
• /stop - Cancel current operation\n\
• /deletefilter <trigger> - Remove a filter (admin only)";

pub const RATE_LIMITED: &str = "⚠️ You're making requests too quickly. Please wait a minute and try again.";
pub const NOT_ADMIN_CREATE: &str = "❌ You need to be an admin to create filters in this group.";
pub const NOT_ADMIN_DELETE: &str = "❌ Only admins can delete filters.";
pub const ALREADY_IN_PROGRESS: &str =
    "⚠️ You are already creating a filter. Finish it or use /stop to cancel.";

pub const TIMED_OUT: &str = "⏰ Time's up! Filter creation canceled. Use /filter to start again.";
pub const CANCELLED: &str = "Operation canceled.";

pub const IMAGE_RECEIVED: &str = "✅ Image received! Now, please send the buttons you want to include in format:\n\
text|url, text2|url2\n\n\
Or send /skip if you don't want buttons.";
pub const IMAGE_SKIPPED: &str = "🔄 Skipped image. Now, please send the buttons you want to include in format:\n\
text|url, text2|url2\n\n\
Or send /skip if you don't want buttons.";
pub const IMAGE_EXPECTED: &str = "📸 Please send an image, or use /skip to continue without one.";
pub const DOWNLOAD_FAILED: &str = "❌ Failed to download image. Please try again with /filter command.";

pub const BUTTONS_PREVIEW: &str = "✅ Buttons configured! Here's a preview:";
pub const BUTTONS_SKIPPED: &str =
    "🔄 Skipped buttons. Finally, please send the trigger word or phrase for this filter.";
pub const ASK_TRIGGER: &str = "Finally, please send the trigger word or phrase for this filter.";
pub const EMPTY_TRIGGER: &str = "❌ The trigger cannot be empty. Please send a word or phrase.";

pub const SAVE_FAILED: &str =
    "⚠️ There was an issue saving your filter, but it will work until the bot restarts.";
pub const DELETE_SAVE_FAILED: &str =
    "⚠️ The filter was removed, but saving failed. It may come back after the bot restarts.";

pub const NO_FILTERS: &str = "No filters found in this chat.";
pub const DELETE_USAGE: &str =
    "❌ Please specify the filter trigger to delete.\nExample: /deletefilter hello";

pub fn ask_image(timeout_secs: u64) -> String {
    format!(
        "📸 Please send an image for your filter within {timeout_secs} seconds.\n\
         Or use /skip if you don't want to include an image."
    )
}

pub fn invalid_buttons(err: &ButtonParseError) -> String {
    match err {
        ButtonParseError::InvalidUrl { url } => format!(
            "❌ Invalid URL: {url}\nPlease enter a valid URL starting with http:// or https://"
        ),
        other => format!(
            "❌ Invalid button format: {other}.\nPlease use text|url, text2|url2 format or /skip."
        ),
    }
}

pub fn duplicate_trigger(trigger: &str) -> String {
    format!(
        "❌ A filter with trigger '{trigger}' already exists in this chat. \
         Please use /deletefilter {trigger} first or choose a different trigger."
    )
}

pub fn filter_created(filter: &Filter) -> String {
    format!(
        "✅ Filter created successfully!\n\n\
         • Trigger: {}\n\
         • Image: {}\n\
         • Buttons: {}\n\n\
         Users can now trigger this filter by typing: {}",
        filter.trigger,
        if filter.has_image() { "Yes" } else { "No" },
        filter.buttons.len(),
        filter.trigger
    )
}

pub fn filter_list(filters: &[Filter]) -> String {
    if filters.is_empty() {
        return NO_FILTERS.to_string();
    }
    let mut response = String::from("📋 List of filters in this chat:\n\n");
    for (i, filter) in filters.iter().enumerate() {
        response.push_str(&format!("{}. {}", i + 1, filter.trigger));
        if filter.has_image() {
            response.push_str(" (with image)");
        }
        if !filter.buttons.is_empty() {
            response.push_str(&format!(" ({} buttons)", filter.buttons.len()));
        }
        response.push('\n');
    }
    response.push_str("\nTo use a filter, simply type its trigger word in the chat.");
    response
}

pub fn filter_deleted(trigger: &str) -> String {
    format!("✅ Filter '{trigger}' has been deleted.")
}

pub fn filter_not_found(trigger: &str) -> String {
    format!("❌ No filter with trigger '{trigger}' found in this chat.")
}
