//! User-facing text for admission reports, failures and batch summaries.
//!
//! Every sentence the presentation layer shows lives here so wording can
//! change in one place and tests can assert on it without a live server.

/// Shown after a payload-size rejection when the server supplied no
/// deployment hint.
pub const GENERIC_SIZE_GUIDANCE: &str =
    "Compress the file or split it into smaller parts, then try again.";

/// Fallback when a failure carries no message at all.
pub const UNKNOWN_FAILURE: &str = "Unknown conversion error";

/// Fallback when a 2xx JSON body has no `error` field.
pub const CONVERSION_FAILED: &str = "Conversion failed";

/// Headline when nothing converted.
pub const NOTHING_CONVERTED: &str = "No file was converted successfully.";

/// Headline for a single success.
pub const SINGLE_SUCCESS: &str = "Your file was converted successfully.";

/// Label for the bulk download action.
pub const DOWNLOAD_ALL_LABEL: &str = "Download all";

/// Message for a `PayloadTooLarge` failure.
///
/// `limit_text` is the readable edge limit; `hint` is the server's
/// deployment hint, or [`GENERIC_SIZE_GUIDANCE`] when it sent none.
pub fn payload_too_large(limit_text: &str, hint: &str) -> String {
    let hint = hint.trim();
    let hint = if hint.is_empty() {
        GENERIC_SIZE_GUIDANCE
    } else {
        hint
    };
    format!("The file exceeds the upload limit of {limit_text} accepted by the server.\n{hint}")
}

/// Candidate exceeded the active limit during pre-flight filtering.
pub fn oversized_skipped(names: &[&str], limit_text: &str) -> String {
    format!(
        "{} file(s) exceed the {limit_text} upload limit and were not added: {}",
        names.len(),
        names.join(", ")
    )
}

/// Batch was cut down to fit the selection.
pub fn truncated(max: usize, added: usize) -> String {
    format!("Limit of {max} files. Only the first {added} were added.")
}

/// Headline for several successes.
pub fn plural_success(count: usize) -> String {
    format!("{count} files converted successfully.")
}

/// Synthesised message when the service sent no readable body.
pub fn http_status(status: u16, reason: &str) -> String {
    format!("HTTP {status}: {reason}")
}

/// Error banner listing every failure with its reason.
pub fn all_failed(failures: &[(&str, String)]) -> String {
    let mut msg = NOTHING_CONVERTED.to_string();
    if !failures.is_empty() {
        msg.push_str("\n\nErrors:");
        for (name, reason) in failures {
            msg.push_str(&format!("\n• {name}: {reason}"));
        }
    }
    msg
}

/// Secondary warning naming the files that failed next to some successes.
pub fn partial_failure(names: &[&str]) -> String {
    let list: Vec<String> = names.iter().map(|n| format!("- {n}")).collect();
    format!(
        "Some files could not be converted.\n\n{} file(s) failed:\n{}",
        names.len(),
        list.join("\n")
    )
}

/// Label for a single download action.
pub fn download_label(file_name: &str) -> String {
    format!("Download {file_name}")
}
