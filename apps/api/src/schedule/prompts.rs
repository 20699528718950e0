// Exam schedule LLM prompt templates.
// All prompts for the schedule module are defined here.

pub const NOTICE_OCR_SYSTEM: &str = "\
You are an OCR engine for Korean insurance licensing exam notices. \
Transcribe every visible line of text exactly, preserving table rows as one line each \
with cells separated by ' | '. Do not summarise, translate, or add commentary.";

pub const NOTICE_OCR_INSTRUCTION: &str = "\
Extract all text from this exam schedule notice image. \
Keep regional group names (수도권, 영남, 대구, 호남, 중부, 원주), session labels (1차, 2차), \
dates, and times exactly as printed.";

pub const OFFICIAL_STRUCTURE_SYSTEM: &str = "\
You are a precise extractor of official insurance licensing exam sessions. \
Parse the notice text into structured JSON. \
You MUST respond with valid JSON only — no markdown fences, no explanations.";

pub const OFFICIAL_STRUCTURE_PROMPT: &str = r#"Extract every exam session from the official notice text below.

TARGET YEAR: {year}
TARGET EXAM TYPE: {exam_type}

NOTICE TEXT:
{text}

OUTPUT SCHEMA (return exactly this structure):
{
  "schedules": [
    {
      "year": number | null,
      "exam_type": "생보" | "손보" | "제3보험" | null,
      "session_number": number | null,
      "registration_start": "M월 D일" | "YYYY-MM-DD" | null,
      "registration_end": "M월 D일" | "YYYY-MM-DD" | null,
      "exam_date": "M월 D일" | "YYYY-MM-DD" | null,
      "exam_time_start": "HH:MM" | null,
      "exam_time_end": "HH:MM" | null,
      "locations": ["region or city name as printed"],
      "notes": "string"
    }
  ]
}

RULES:
1. One object per (region row, session) as printed; do not merge rows yourself.
2. session_number is the number before 차; use null if the row has none.
3. locations keeps the printed names (e.g. "수도권", "영남", "서울").
4. Return ONLY the JSON object — nothing else, no code fences."#;

pub const INTERNAL_STRUCTURE_SYSTEM: &str = "\
You are a precise extractor of a company's internal exam application deadlines. \
Parse the memo into structured JSON. \
You MUST respond with valid JSON only — no markdown fences, no explanations.";

pub const INTERNAL_STRUCTURE_PROMPT: &str = r#"Extract every internal application deadline from the memo below.

TARGET YEAR: {year}
TARGET EXAM TYPE: {exam_type}

MEMO TEXT:
{text}

OUTPUT SCHEMA (return exactly this structure):
{
  "schedules": [
    {
      "year": number | null,
      "exam_type": "생보" | "손보" | "제3보험" | null,
      "session_range": "N~M차" | "N차",
      "deadline_date": "M월 D일" | "YYYY-MM-DD",
      "deadline_time": "오전 H시" | "오후 H시" | "HH:MM" | null,
      "notice_date": "M월 D일" | "YYYY-MM-DD" | null,
      "notice_time": "오전 H시" | "오후 H시" | "HH:MM" | null,
      "notes": "string"
    }
  ]
}

RULES:
1. session_range is copied verbatim from the memo (e.g. "1~4차").
2. Keep 오전/오후 wording for times; do not convert to 24-hour yourself.
3. notice_date/notice_time are only for ID or admission slip announcements.
4. Return ONLY the JSON object — nothing else, no code fences."#;
