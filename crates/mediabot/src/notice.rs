//! User-facing texts

pub const GREETING: &str = "🚀 Ready. Send me links to videos.";
pub const PROMPT_DOWNLOAD_BUTTON: &str = "🚀 Download";
pub const PROMPT_TRIM_BUTTON: &str = "✂️ Trim";
pub const STARTING: &str = "🚀 Starting...";
pub const TRIM_PROMPT: &str = "✂️ Send a time range (e.g. `10-20`):";
pub const TRIM_EXAMPLE: &str = "⚠️ Example: `10-20`";
pub const LINK_EXPIRED: &str = "⚠️ Link expired.";
pub const PROCESSING: &str = "⚙️ Processing...";
pub const UPLOADING: &str = "⬆️ Uploading...";
pub const GENERIC_ERROR: &str = "❌ Error";

/// Text of the download/trim choice for a link
pub fn choice(url: &str) -> String {
    format!("📹 {}", url)
}

/// Acknowledgement for an accepted trim range
pub fn trimming(bounds: &crate::trim::TrimBounds) -> String {
    format!("✂️ Trimming {}s...", bounds)
}
