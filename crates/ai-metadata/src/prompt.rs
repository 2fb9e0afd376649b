//! System prompt assembly.

/// Categories the submission form accepts, in its own spelling.
pub const CATEGORIES: [&str; 27] = [
    "Abstract",
    "Animals/Wildlife",
    "Arts",
    "Backgrounds/Textures",
    "Beauty/Fashion",
    "Buildings/Landmarks",
    "Business/Finance",
    "Celebrities",
    "Editorial",
    "Education",
    "Food and drink",
    "Healthcare/Medical",
    "Holidays",
    "Industrial",
    "Interiors",
    "Miscellaneous",
    "Nature",
    "Objects",
    "Parks/Outdoor",
    "People",
    "Religion",
    "Science",
    "Signs/Symbols",
    "Sports/Recreation",
    "Technology",
    "Transportation",
    "Vintage",
];

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a stock photography metadata expert. \
Look at the image and return a JSON object with a \"title\" (one descriptive sentence, \
at most 200 characters, no keyword stuffing) and \"keywords\" (an array of 30 to 50 \
relevant single words or short phrases, most important first).";

/// The stored prompt, or the default one when blank.
pub fn base_prompt(stored: Option<&str>) -> &str {
    stored
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT)
}

/// Append the category list and image type instruction unless the prompt
/// already asks for `category1`.
pub fn augment(prompt: &str) -> String {
    if prompt.contains("category1") {
        return prompt.to_string();
    }
    let list = serde_json::to_string(&CATEGORIES).unwrap_or_default();
    format!(
        "{prompt}\nAlso provide \"category1\", \"category2\" (optional) from this list: {list}. \
         \nProvide \"imageType\" as either \"Photo\" or \"Illustration\". return JSON."
    )
}

/// Prompt actually sent for an item.
pub fn effective_prompt(stored: Option<&str>) -> String {
    augment(base_prompt(stored))
}
