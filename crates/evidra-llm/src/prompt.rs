//! Prompt construction for extraction and contradiction checks

use evidra_domain::traits::ExtractionInput;
use evidra_domain::Category;

/// Build the claim extraction prompt for one publication
pub fn extraction_prompt(input: &ExtractionInput) -> String {
    let categories: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
    let authors = if input.authors.is_empty() {
        "unknown".to_string()
    } else {
        input.authors.join(", ")
    };
    let journal = input.journal.as_deref().unwrap_or("unknown");

    format!(
        "You extract factual claims from exercise science abstracts.\n\
         \n\
         Title: {title}\n\
         Authors: {authors}\n\
         Journal: {journal}\n\
         Abstract:\n{abstract_text}\n\
         \n\
         Return ONLY a JSON array. Each element:\n\
         {{\n\
           \"text\": full claim statement,\n\
           \"summary\": one sentence,\n\
           \"category\": one of {categories:?},\n\
           \"evidence_level\": integer 1-5 (5 = meta-analysis),\n\
           \"confidence\": number in [0, 1],\n\
           \"sample_size\": integer or null,\n\
           \"study_design\": string or null,\n\
           \"key_findings\": array of strings,\n\
           \"limitations\": array of strings\n\
         }}\n\
         Extract only claims directly supported by the abstract. Return [] if none.",
        title = input.title,
        authors = authors,
        journal = journal,
        abstract_text = input.abstract_text,
        categories = categories,
    )
}

/// Build the contradiction assessment prompt for a claim pair
pub fn contradiction_prompt(a: &str, b: &str) -> String {
    format!(
        "Do these two exercise science claims contradict each other?\n\
         \n\
         Claim A: {a}\n\
         Claim B: {b}\n\
         \n\
         Return ONLY a JSON object:\n\
         {{\"contradicts\": bool, \"strength\": number in [0, 1], \"rationale\": short string}}\n\
         Claims about different populations or protocols do not contradict.",
    )
}
