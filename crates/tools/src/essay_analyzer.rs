//! Rule-based feedback on statements of purpose: structure, keyword
//! coverage, length, clarity and clichés, rolled up into a 0-100 score.

use crate::{parse, require_text};
use async_trait::async_trait;
use gradwise_core::error::ToolError;
use gradwise_core::tool::{Artifact, Tool, ToolArgs, ToolOutput};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

/// Shorter essays are rejected outright.
pub const MIN_ESSAY_CHARS: usize = 100;

const IDEAL_MIN_WORDS: usize = 500;
const IDEAL_MAX_WORDS: usize = 1000;
const MAX_SUGGESTIONS: usize = 5;

const TRANSITIONS: &[&str] = &[
    "furthermore",
    "moreover",
    "additionally",
    "however",
    "nevertheless",
    "in addition",
    "consequently",
    "therefore",
    "as a result",
    "specifically",
    "for example",
    "for instance",
    "in particular",
];

const KEYWORD_CATEGORIES: &[(&str, &[&str])] = &[
    ("research", &["research", "investigate", "study", "explore", "analyze"]),
    (
        "technical",
        &[
            "machine learning",
            "artificial intelligence",
            "algorithms",
            "systems",
            "data",
            "programming",
            "software",
            "neural networks",
            "deep learning",
            "computer vision",
            "nlp",
            "natural language",
        ],
    ),
    (
        "motivation",
        &["passion", "driven", "motivated", "inspired", "curious", "dedicated", "committed", "interested"],
    ),
    (
        "experience",
        &[
            "project",
            "internship",
            "publication",
            "thesis",
            "developed",
            "implemented",
            "designed",
            "built",
            "created",
            "led",
        ],
    ),
    ("goals", &["goal", "aim", "aspire", "plan", "future", "career", "contribute"]),
    (
        "fit",
        &["professor", "faculty", "lab", "group", "department", "program", "university", "fit", "align", "match"],
    ),
];

const CLICHES: &[&str] = &[
    "since I was a child",
    "ever since I was young",
    "from a young age",
    "I have always wanted",
    "my dream has always been",
    "I am a hard worker",
    "I am a quick learner",
    "I am a team player",
    "Webster's dictionary defines",
    "In this essay, I will",
];

const PASSIVE_MARKERS: &[&str] = &[
    "was", "were", "been", "being", "is being", "are being", "has been", "have been", "had been",
];

const STRONG_VERBS: &[&str] = &[
    "developed",
    "implemented",
    "designed",
    "created",
    "led",
    "managed",
    "analyzed",
    "evaluated",
    "improved",
    "optimized",
    "built",
    "architected",
    "discovered",
    "pioneered",
    "established",
    "transformed",
    "increased",
    "reduced",
    "achieved",
    "published",
    "presented",
    "collaborated",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    #[default]
    Full,
    Structure,
    Keywords,
    Length,
    Clarity,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Structure => "structure",
            Self::Keywords => "keywords",
            Self::Length => "length",
            Self::Clarity => "clarity",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StructureReport {
    pub score: u32,
    pub paragraph_count: usize,
    pub sentence_count: usize,
    pub avg_paragraph_length: usize,
    pub has_clear_intro: bool,
    pub has_clear_conclusion: bool,
    pub transition_count: usize,
    pub feedback: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct KeywordReport {
    pub score: u32,
    pub found_keywords: BTreeMap<&'static str, Vec<&'static str>>,
    pub missing_categories: Vec<&'static str>,
    pub feedback: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthStatus {
    TooShort,
    Good,
    TooLong,
}

#[derive(Debug, Serialize)]
pub struct LengthReport {
    pub score: u32,
    pub word_count: usize,
    pub character_count: usize,
    pub status: LengthStatus,
    pub ideal_range: String,
    pub feedback: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ClarityReport {
    pub score: u32,
    pub avg_sentence_length: f64,
    pub long_sentences: usize,
    pub passive_voice_indicators: usize,
    pub feedback: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ClicheReport {
    pub score: u32,
    pub found: Vec<&'static str>,
    pub feedback: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EssayReport {
    pub overall_score: u32,
    pub word_count: usize,
    pub structure: StructureReport,
    pub keywords: KeywordReport,
    pub length_analysis: LengthReport,
    pub clarity: ClarityReport,
    pub red_flags: ClicheReport,
    pub strong_points: Vec<String>,
    pub suggestions: Vec<String>,
    pub target_school: Option<String>,
    pub target_program: Option<String>,
}

fn sentences(essay: &str) -> Vec<&str> {
    essay
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn paragraphs(essay: &str) -> Vec<&str> {
    essay
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn analyze_structure(essay: &str) -> StructureReport {
    let paragraphs = paragraphs(essay);
    let lower = essay.to_lowercase();

    let has_clear_intro = paragraphs.first().is_some_and(|p| word_count(p) >= 50);
    let has_clear_conclusion = paragraphs.len() > 2 && paragraphs.last().is_some_and(|p| word_count(p) >= 40);
    let good_paragraph_count = (3..=7).contains(&paragraphs.len());
    let transition_count = TRANSITIONS.iter().filter(|t| lower.contains(*t)).count();
    let avg_paragraph_length = if paragraphs.is_empty() {
        0
    } else {
        let total: usize = paragraphs.iter().map(|p| word_count(p)).sum();
        (total as f64 / paragraphs.len() as f64).round() as usize
    };

    let mut score = 0;
    let mut feedback = Vec::new();
    let mut check = |ok: bool, good: String, bad: String| {
        if ok {
            score += 25;
            feedback.push(good);
        } else {
            feedback.push(bad);
        }
    };
    check(
        has_clear_intro,
        "Strong opening paragraph".into(),
        "Consider strengthening your introduction".into(),
    );
    check(
        has_clear_conclusion,
        "Clear conclusion".into(),
        "Consider adding a stronger conclusion".into(),
    );
    check(
        good_paragraph_count,
        format!("Good paragraph count ({} paragraphs)", paragraphs.len()),
        format!("Consider restructuring ({} paragraphs, aim for 4-6)", paragraphs.len()),
    );
    check(
        transition_count >= 3,
        format!("Good use of transitions ({transition_count} found)"),
        "Consider adding more transitional phrases".into(),
    );

    StructureReport {
        score,
        paragraph_count: paragraphs.len(),
        sentence_count: sentences(essay).len(),
        avg_paragraph_length,
        has_clear_intro,
        has_clear_conclusion,
        transition_count,
        feedback,
    }
}

pub fn analyze_keywords(essay: &str) -> KeywordReport {
    let lower = essay.to_lowercase();
    let mut found_keywords = BTreeMap::new();
    let mut missing_categories = Vec::new();

    for (category, keywords) in KEYWORD_CATEGORIES {
        let found: Vec<&'static str> = keywords.iter().copied().filter(|k| lower.contains(k)).collect();
        if found.is_empty() {
            missing_categories.push(*category);
        }
        found_keywords.insert(*category, found);
    }

    let covered = KEYWORD_CATEGORIES.len() - missing_categories.len();
    let score = (covered * 100 / KEYWORD_CATEGORIES.len()) as u32;

    let mut feedback = vec![
        match covered {
            5.. => "Excellent keyword coverage across categories",
            3..=4 => "Good keyword coverage",
            _ => "Consider adding more relevant keywords",
        }
        .to_string(),
    ];
    if !missing_categories.is_empty() {
        feedback.push(format!("Missing keywords in: {}", missing_categories.join(", ")));
    }

    KeywordReport {
        score,
        found_keywords,
        missing_categories,
        feedback,
    }
}

pub fn analyze_length(essay: &str) -> LengthReport {
    let words = word_count(essay);
    let (status, score, feedback) = if words < IDEAL_MIN_WORDS {
        (
            LengthStatus::TooShort,
            (words * 70 / IDEAL_MIN_WORDS) as u32,
            format!("Essay is short ({words} words). Aim for {IDEAL_MIN_WORDS}-{IDEAL_MAX_WORDS} words."),
        )
    } else if words > IDEAL_MAX_WORDS {
        let penalty = (words - IDEAL_MAX_WORDS) * 50 / IDEAL_MAX_WORDS;
        (
            LengthStatus::TooLong,
            100u32.saturating_sub(penalty as u32).max(50),
            format!("Essay is long ({words} words). Consider trimming to {IDEAL_MAX_WORDS} words."),
        )
    } else {
        (LengthStatus::Good, 100, format!("Good length ({words} words)"))
    };

    LengthReport {
        score: score.min(100),
        word_count: words,
        character_count: essay.chars().count(),
        status,
        ideal_range: format!("{IDEAL_MIN_WORDS}-{IDEAL_MAX_WORDS} words"),
        feedback: vec![feedback],
    }
}

pub fn analyze_clarity(essay: &str) -> ClarityReport {
    let sentences = sentences(essay);
    let lengths: Vec<usize> = sentences.iter().map(|s| word_count(s)).collect();
    let avg = if lengths.is_empty() {
        0.0
    } else {
        lengths.iter().sum::<usize>() as f64 / lengths.len() as f64
    };
    let long_sentences = lengths.iter().filter(|&&l| l > 30).count();

    let lower = essay.to_lowercase();
    let passive: usize = PASSIVE_MARKERS.iter().map(|p| lower.matches(p).count()).sum();
    let passive_ratio = if sentences.is_empty() {
        0.0
    } else {
        passive as f64 / sentences.len() as f64
    };

    let mut score: u32 = 100;
    let mut feedback = Vec::new();
    if avg < 25.0 {
        feedback.push(format!("Good sentence length (avg {avg:.1} words)"));
    } else {
        score -= 15;
        feedback.push(format!("Some sentences are long (avg {avg:.1} words)"));
    }
    if long_sentences > 3 {
        score -= 10;
        feedback.push(format!("{long_sentences} sentences exceed 30 words"));
    }
    if passive_ratio > 0.3 {
        score -= 10;
        feedback.push("Consider using more active voice".into());
    } else {
        feedback.push("Good use of active voice".into());
    }

    ClarityReport {
        score,
        avg_sentence_length: (avg * 10.0).round() / 10.0,
        long_sentences,
        passive_voice_indicators: passive,
        feedback,
    }
}

pub fn check_cliches(essay: &str) -> ClicheReport {
    let lower = essay.to_lowercase();
    let found: Vec<&'static str> = CLICHES
        .iter()
        .copied()
        .filter(|c| lower.contains(&c.to_lowercase()))
        .collect();

    let feedback = if found.is_empty() {
        vec!["No common clichés detected".to_string()]
    } else {
        std::iter::once("Found cliché phrases to reconsider:".to_string())
            .chain(found.iter().map(|c| format!("  - '{c}'")))
            .collect()
    };

    ClicheReport {
        score: 100u32.saturating_sub(15 * found.len() as u32),
        found,
        feedback,
    }
}

fn strong_points(essay: &str) -> Vec<String> {
    let lower = essay.to_lowercase();
    let mut points = Vec::new();

    let verbs = STRONG_VERBS.iter().filter(|v| lower.contains(*v)).count();
    if verbs >= 5 {
        points.push(format!("Good use of action verbs ({verbs} found)"));
    }

    let numbers = essay
        .split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .count();
    if numbers >= 3 {
        points.push("Includes specific quantitative details".into());
    }
    if ["professor", "dr.", "faculty"].iter().any(|k| lower.contains(k)) {
        points.push("Mentions specific faculty or professors".into());
    }
    if lower.contains("research") && (lower.contains("project") || lower.contains("paper")) {
        points.push("Discusses research experience".into());
    }
    if ["goal", "aim", "future"].iter().any(|k| lower.contains(k)) {
        points.push("Articulates future goals".into());
    }
    points
}

/// Full analysis with an overall score weighted across every section.
pub fn analyze(essay: &str, target_school: Option<String>, target_program: Option<String>) -> EssayReport {
    let structure = analyze_structure(essay);
    let keywords = analyze_keywords(essay);
    let length = analyze_length(essay);
    let clarity = analyze_clarity(essay);
    let red_flags = check_cliches(essay);

    let weighted = f64::from(structure.score) * 0.25
        + f64::from(keywords.score) * 0.20
        + f64::from(length.score) * 0.15
        + f64::from(clarity.score) * 0.25
        + f64::from(red_flags.score) * 0.15;

    let mut suggestions = Vec::new();
    if structure.score < 75 {
        suggestions.push(
            "Strengthen your essay structure with a clear introduction, body paragraphs, and conclusion".to_string(),
        );
    }
    for category in keywords.missing_categories.iter().take(2) {
        suggestions.push(format!("Add content related to {category}"));
    }
    match length.status {
        LengthStatus::TooShort => {
            suggestions.push("Expand on your experiences and motivations with specific examples".into())
        }
        LengthStatus::TooLong => suggestions.push("Remove redundant phrases and focus on your strongest points".into()),
        LengthStatus::Good => {}
    }
    if clarity.score < 80 {
        suggestions.push("Shorten long sentences for better readability".into());
    }
    if !red_flags.found.is_empty() {
        suggestions.push("Replace cliché phrases with specific, personal statements".into());
    }
    if let Some(school) = &target_school {
        suggestions.push(format!("Mention why {school} specifically fits your goals"));
    }
    if let Some(program) = &target_program {
        suggestions.push(format!("Reference specific aspects of the {program} program"));
    }
    suggestions.truncate(MAX_SUGGESTIONS);

    EssayReport {
        overall_score: weighted as u32,
        word_count: length.word_count,
        strong_points: strong_points(essay),
        structure,
        keywords,
        length_analysis: length,
        clarity,
        red_flags,
        suggestions,
        target_school,
        target_program,
    }
}

#[derive(Deserialize)]
struct EssayArgs {
    essay_text: Option<String>,
    target_school: Option<String>,
    target_program: Option<String>,
    #[serde(default)]
    analysis_type: AnalysisType,
}

pub struct EssayAnalyzerTool;

#[async_trait]
impl Tool for EssayAnalyzerTool {
    fn name(&self) -> &str {
        crate::ESSAY_ANALYZER
    }

    fn description(&self) -> &str {
        "Analyze a Statement of Purpose: structure, keywords, length, clarity and clichés, with an overall score and suggestions."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "essay_text": { "type": "string", "description": "The full text of the essay" },
                "target_school": { "type": "string" },
                "target_program": { "type": "string" },
                "analysis_type": {
                    "type": "string",
                    "enum": ["full", "structure", "keywords", "length", "clarity"],
                    "default": "full"
                }
            },
            "required": ["essay_text"]
        })
    }

    async fn execute(&self, arguments: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let args: EssayArgs = parse(arguments)?;
        let essay = require_text(args.essay_text, "essay_text")?;
        if essay.chars().count() < MIN_ESSAY_CHARS {
            return Err(ToolError::InvalidArguments(
                "Essay text is too short to analyze. Please provide the full essay.".into(),
            ));
        }

        let mut tags = BTreeMap::from([
            ("analysis_type".to_string(), args.analysis_type.as_str().to_string()),
            ("word_count".to_string(), word_count(&essay).to_string()),
        ]);

        let (message, data) = match args.analysis_type {
            AnalysisType::Full => {
                let report = analyze(&essay, args.target_school, args.target_program);
                tags.insert("overall_score".into(), report.overall_score.to_string());
                if let Some(school) = &report.target_school {
                    tags.insert("target_school".into(), school.clone());
                }
                (
                    format!("Essay analyzed: overall score {}/100", report.overall_score),
                    json!(report),
                )
            }
            AnalysisType::Structure => {
                let report = analyze_structure(&essay);
                (format!("Structure score: {}/100", report.score), json!(report))
            }
            AnalysisType::Keywords => {
                let report = analyze_keywords(&essay);
                (format!("Keyword score: {}/100", report.score), json!(report))
            }
            AnalysisType::Length => {
                let report = analyze_length(&essay);
                (format!("Length score: {}/100", report.score), json!(report))
            }
            AnalysisType::Clarity => {
                let report = analyze_clarity(&essay);
                (format!("Clarity score: {}/100", report.score), json!(report))
            }
        };

        Ok(ToolOutput::message(message)
            .with_data(data)
            .with_artifact(Artifact { body: essay, tags }))
    }
}
