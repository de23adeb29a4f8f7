//! Stage Prompts

/// Classify the query; answer directly behind the sentinel or extract key terms
#[must_use]
pub fn triage(query: &str) -> String {
    format!(
        "If the prompt DOES NOT require deep reasoning and research, output \"0\" \
         (eg. \"0Here is an example response\") followed by your response to the prompt. \
         Otherwise, adhere to the following instructions. From the following text extract \
         all key terms, named entities, and relations that should be represented in a \
         semantic embedding space. Output only the precise tokens that maximize vector \
         representation quality as a comma-separated list. Do not start the list with a \
         digit. Do not write a response blurb. Use the following prompt: {query}"
    )
}

/// Keep the most central half of the extracted terms
#[must_use]
pub fn compress(keywords: &str) -> String {
    format!(
        "Select only the most semantically central 50% of keywords, entities, or relations \
         that best describe the input's overall meaning. Discard secondary, repetitive, or \
         weakly connected tokens. Output minimal, high-importance items only as a \
         comma-separated list. Do not write a response blurb. Use the following text: {keywords}"
    )
}

/// Research the compressed terms into at most seven key points
#[must_use]
pub fn research(keywords: &str) -> String {
    format!(
        "From the input text, list up to seven distinct key points capturing the most \
         critical findings, ideas, or conclusions. Output only a numbered list of points: \
         {keywords}"
    )
}

/// Expand the key points into a full answer
#[must_use]
pub fn expand(key_points: &str) -> String {
    format!(
        "You are a professional in the field of the following list of topics. Take each key \
         finding and expand and elaborate on them (eg. related insights, advancements, \
         implications, examples, statistics, and supporting evidence), and teach them as if \
         you were a professional. Do not write a response blurb and use these key points: \
         {key_points}"
    )
}
