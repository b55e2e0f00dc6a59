//! Static knowledge base of skin conditions the classifier can report.

/// Returned for any label without a known description
pub const NO_DESCRIPTION: &str = "No medical description available.";

const DESCRIPTIONS: &[(&str, &str)] = &[
    (
        "Basal Cell Carcinoma",
        "A common type of skin cancer that arises from basal cells. Usually slow-growing and rarely spreads.",
    ),
    (
        "Melanoma",
        "A serious form of skin cancer that begins in cells known as melanocytes. Can spread rapidly if not caught early.",
    ),
    (
        "Benign Keratosis",
        "Non-cancerous skin growth, often appearing as a brown, black, or light tan patch. Typically harmless.",
    ),
    (
        "Actinic Keratosis",
        "A rough, scaly patch on your skin caused by years of sun exposure. Can be a precursor to skin cancer.",
    ),
    (
        "Dermatofibroma",
        "A common benign skin nodule, typically firm and raised. Often harmless.",
    ),
    (
        "Vascular Lesion",
        "An abnormality of blood vessels in the skin. Can be benign or malignant depending on the type.",
    ),
    (
        "Squamous Cell Carcinoma",
        "A type of skin cancer that may appear as a scaly red patch or sore. Can become invasive.",
    ),
    (
        "Seborrheic Keratosis",
        "A benign, often pigmented growth that looks like it's stuck onto the skin. Very common in older adults.",
    ),
    (
        "Melanocytic Nevi",
        "A common mole formed by clusters of pigment cells. Usually benign, but changes in shape or color should be checked.",
    ),
];

/// Spellings used by the HAM10000 model config, mapped to their entries
const ALIASES: &[(&str, &str)] = &[
    ("actinic keratoses", "Actinic Keratosis"),
    ("vascular lesions", "Vascular Lesion"),
    ("benign keratosis like lesions", "Benign Keratosis"),
];

/// Look up the description for a diagnosis label.
///
/// Matching ignores case and treats `_` and `-` as spaces, so
/// `basal_cell_carcinoma` resolves to "Basal Cell Carcinoma". The model's
/// plural spellings go through [`ALIASES`]. Never fails: unknown labels
/// yield [`NO_DESCRIPTION`].
pub fn describe(label: &str) -> &'static str {
    let wanted = normalize(label);
    let canonical = ALIASES
        .iter()
        .find(|(alias, _)| *alias == wanted)
        .map(|(_, name)| normalize(name))
        .unwrap_or(wanted);

    DESCRIPTIONS
        .iter()
        .find(|(name, _)| normalize(name) == canonical)
        .map(|(_, description)| *description)
        .unwrap_or(NO_DESCRIPTION)
}

fn normalize(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
