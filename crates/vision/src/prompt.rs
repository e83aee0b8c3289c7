//! Fixed instructional text sent to the model.

/// Instructions for reading the three indicator spots.
pub const PATCH_PROMPT: &str = "You are an expert at analyzing medical patches from images. Your task is to identify the colors of three specific spots on the patch.

The patch has three indicators:
1.  **pH spot**: Turns from **blue (normal)** to **yellow (acidic)** when tissue is ischemic.
2.  **Lactate spot**: Changes from **clear (normal)** to **dark blue** or **purple** if lactate is elevated, indicating anaerobic metabolism.
3.  **Temperature spot**: Uses thermochromic ink to turn from **blue (normal)** to **red** if there's a fever or inflammation.

Analyze the provided image and determine the color of each spot. Only return the colors.";

/// Appended to [`PATCH_PROMPT`] so providers without structured output still answer in JSON.
pub const PATCH_ANSWER_FORMAT: &str =
    "Answer with a single JSON object with the string fields \"ph\", \"lactate\" and \"temp\".";

pub const LOCATION_PROMPT: &str = "You are an AI assistant designed to improve the accuracy of user locations for volunteer ride requests.

Given the user's initial location info and the volunteer's feedback, give a more accurate address or place.";

pub const LOCATION_ANSWER_FORMAT: &str =
    "Answer with a single JSON object with the string field \"enhancedLocation\".";

/// Full instruction text for a patch reading.
pub fn patch_instructions() -> String {
    format!("{PATCH_PROMPT}\n\n{PATCH_ANSWER_FORMAT}")
}

/// Full instruction text for a location refinement.
pub fn location_instructions(initial_location: &str, volunteer_feedback: &str) -> String {
    format!(
        "{LOCATION_PROMPT}\n\nInitial Location: {initial_location}\nVolunteer Feedback: {volunteer_feedback}\n\n{LOCATION_ANSWER_FORMAT}"
    )
}
