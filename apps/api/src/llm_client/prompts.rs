// Shared prompt constants and prompt-building utilities.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Common instruction appended to all extraction prompts.
pub const NO_GUESSING_INSTRUCTION: &str = "\
    CRITICAL: Copy dates, times, regions, and session numbers exactly as written. \
    Do NOT infer missing values, do NOT invent sessions, and do NOT convert \
    region names into cities yourself. Use null for anything that is not stated.";
