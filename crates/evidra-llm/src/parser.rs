//! Parse model output into claim drafts and contradiction verdicts

use crate::LlmError;
use evidra_domain::traits::{ClaimDraft, ContradictionVerdict};
use evidra_domain::{Category, EvidenceLevel, StudyDesign};
use serde_json::Value;
use tracing::warn;

/// Parse a model JSON response into claim drafts
///
/// Invalid entries are skipped with a warning rather than failing the
/// whole batch; a model that gets one claim wrong should not cost us
/// the rest of the abstract.
pub fn parse_draft_response(response: &str) -> Result<Vec<ClaimDraft>, LlmError> {
    let json_str = extract_json(response)?;

    let json: Value = serde_json::from_str(&json_str)
        .map_err(|e| LlmError::InvalidResponse(format!("JSON parse error: {}", e)))?;

    let drafts_array = json
        .as_array()
        .ok_or_else(|| LlmError::InvalidResponse("Expected JSON array".to_string()))?;

    let mut drafts = Vec::new();
    for (idx, draft_json) in drafts_array.iter().enumerate() {
        match parse_draft_json(draft_json) {
            Ok(draft) => drafts.push(draft),
            Err(e) => {
                warn!("Failed to parse draft {}: {}", idx, e);
            }
        }
    }

    Ok(drafts)
}

/// Parse a model JSON response into a contradiction verdict
pub fn parse_verdict_response(response: &str) -> Result<ContradictionVerdict, LlmError> {
    let json_str = extract_json(response)?;

    let json: Value = serde_json::from_str(&json_str)
        .map_err(|e| LlmError::InvalidResponse(format!("JSON parse error: {}", e)))?;

    let obj = json
        .as_object()
        .ok_or_else(|| LlmError::InvalidResponse("Expected JSON object".to_string()))?;

    let contradicts = obj
        .get("contradicts")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| LlmError::InvalidResponse("Missing or invalid 'contradicts'".to_string()))?;

    let strength = obj
        .get("strength")
        .and_then(|v| v.as_f64())
        .unwrap_or(if contradicts { 0.5 } else { 0.0 })
        .clamp(0.0, 1.0);

    let rationale = obj
        .get("rationale")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    Ok(ContradictionVerdict {
        contradicts,
        strength,
        rationale,
    })
}

/// Extract JSON from response, handling markdown code blocks
fn extract_json(response: &str) -> Result<String, LlmError> {
    let trimmed = response.trim();

    // Models sometimes wrap JSON in markdown code blocks
    if trimmed.starts_with("```json") || trimmed.starts_with("```") {
        let lines: Vec<&str> = trimmed.lines().collect();
        if lines.len() < 2 {
            return Err(LlmError::InvalidResponse("Empty code block".to_string()));
        }

        // Skip first line (```json or ```) and last line (```)
        let json_lines = &lines[1..lines.len().saturating_sub(1)];
        Ok(json_lines.join("\n"))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Parse a single claim draft from JSON
fn parse_draft_json(json: &Value) -> Result<ClaimDraft, String> {
    let obj = json
        .as_object()
        .ok_or_else(|| "Draft is not a JSON object".to_string())?;

    let text = obj
        .get("text")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| "Missing or empty 'text'".to_string())?
        .to_string();

    let summary = obj
        .get("summary")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| "Missing or empty 'summary'".to_string())?
        .to_string();

    // Unknown categories degrade to General instead of dropping the draft
    let category = obj
        .get("category")
        .and_then(|v| v.as_str())
        .map(Category::parse_lenient)
        .ok_or_else(|| "Missing 'category'".to_string())?;

    let evidence_level = obj
        .get("evidence_level")
        .and_then(|v| v.as_u64())
        .and_then(|n| EvidenceLevel::from_rank(n as u8))
        .ok_or_else(|| "Missing or out-of-range 'evidence_level'".to_string())?;

    let confidence = obj
        .get("confidence")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| "Missing or invalid 'confidence'".to_string())?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(format!("Confidence {} outside [0, 1]", confidence));
    }

    let sample_size = obj
        .get("sample_size")
        .and_then(|v| v.as_u64())
        .map(|n| n as u32);

    let study_design = obj
        .get("study_design")
        .and_then(|v| v.as_str())
        .and_then(|s| StudyDesign::from_str_strict(s).ok());

    let string_list = |key: &str| -> Vec<String> {
        obj.get(key)
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    };

    Ok(ClaimDraft {
        text,
        summary,
        category,
        evidence_level,
        confidence,
        sample_size,
        study_design,
        key_findings: string_list("key_findings"),
        limitations: string_list("limitations"),
    })
}
