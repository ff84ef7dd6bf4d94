use chrono::Local;
use verdant_core::{HistoryEntry, IdentificationResult};

const MAX_DESCRIPTION_CHARS: usize = 400;

pub fn format_confidence(probability: f64) -> String {
    format!("{:.1}%", probability * 100.0)
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}…", cut.trim_end())
}

/// Multi-line detail view of a single result.
pub fn format_result(result: &IdentificationResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", result.species_name));
    out.push_str(&format!(
        "  Confidence:      {}\n",
        format_confidence(result.probability)
    ));
    out.push_str(&format!("  Scientific name: {}\n", result.scientific_name));
    if !result.common_names.is_empty() {
        out.push_str(&format!(
            "  Common names:    {}\n",
            result.common_names.join(", ")
        ));
    }
    out.push_str(&format!(
        "  Description:     {}\n",
        truncate(&result.description, MAX_DESCRIPTION_CHARS)
    ));
    if !result.reference_url.is_empty() {
        out.push_str(&format!("  More info:       {}\n", result.reference_url));
    }
    out
}

/// One-line summary used by `verdant history`.
pub fn format_entry(entry: &HistoryEntry) -> String {
    format!(
        "{}  {:<32} {:>6}  {}",
        entry
            .created_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M"),
        truncate(&entry.result.species_name, 32),
        format_confidence(entry.result.probability),
        entry.image_reference
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rosa() -> IdentificationResult {
        IdentificationResult {
            species_name: "Rosa".to_string(),
            probability: 0.87,
            scientific_name: "Rosa".to_string(),
            common_names: vec!["Rose".to_string(), "Briar".to_string()],
            description: "No description available".to_string(),
            reference_url: "https://x".to_string(),
            similar_images: vec![],
        }
    }

    #[test]
    fn test_format_confidence() {
        assert_eq!(format_confidence(0.87), "87.0%");
        assert_eq!(format_confidence(1.0), "100.0%");
        assert_eq!(format_confidence(0.0), "0.0%");
    }

    #[test]
    fn test_format_result_lists_fields() {
        let text = format_result(&rosa());
        assert!(text.starts_with("Rosa\n"));
        assert!(text.contains("87.0%"));
        assert!(text.contains("Rose, Briar"));
        assert!(text.contains("https://x"));
    }

    #[test]
    fn test_format_result_omits_empty_optional_fields() {
        let mut result = rosa();
        result.common_names.clear();
        result.reference_url.clear();
        let text = format_result(&result);
        assert!(!text.contains("Common names"));
        assert!(!text.contains("More info"));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Pflanzenblätter", 10), "Pflanzenbl…");
    }
}
