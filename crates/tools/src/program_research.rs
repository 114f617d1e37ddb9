//! Program research over a small built-in catalog of graduate programs:
//! deadlines, admission requirements, funding, rankings and faculty areas.

use crate::{parse, require_text};
use async_trait::async_trait;
use gradwise_core::error::ToolError;
use gradwise_core::tool::{Tool, ToolArgs, ToolOutput};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Serialize)]
pub struct Requirements {
    pub gre_required: bool,
    pub gre_recommended: bool,
    pub toefl_minimum: u32,
    pub ielts_minimum: f32,
    pub gpa_minimum: Option<f32>,
    pub gpa_recommended: f32,
    pub letters_required: u32,
}

#[derive(Debug, Serialize)]
pub struct Funding {
    pub tuition_per_year: u32,
    pub tuition_out_of_state: Option<u32>,
    pub funding_types: &'static [&'static str],
    pub funding_coverage: &'static str,
    pub stipend_amount: u32,
}

#[derive(Debug, Serialize)]
pub struct Ranking {
    pub us_news: u32,
    pub csrankings: u32,
}

#[derive(Debug, Serialize)]
pub struct ProgramInfo {
    pub school: &'static str,
    pub program: &'static str,
    pub degree_types: &'static [&'static str],
    pub deadline: &'static str,
    pub deadline_date: &'static str,
    pub requirements: Requirements,
    pub funding: Funding,
    pub ranking: Ranking,
    pub faculty_areas: &'static [&'static str],
    pub website: &'static str,
}

const FULL_PHD: &str = "Full tuition + stipend for PhD";

pub static CATALOG: &[ProgramInfo] = &[
    ProgramInfo {
        school: "MIT",
        program: "Computer Science",
        degree_types: &["MS", "PhD"],
        deadline: "December 15",
        deadline_date: "2025-12-15",
        requirements: Requirements {
            gre_required: false,
            gre_recommended: true,
            toefl_minimum: 100,
            ielts_minimum: 7.0,
            gpa_minimum: None,
            gpa_recommended: 3.5,
            letters_required: 3,
        },
        funding: Funding {
            tuition_per_year: 58240,
            tuition_out_of_state: None,
            funding_types: &["RA", "TA", "Fellowship"],
            funding_coverage: FULL_PHD,
            stipend_amount: 45000,
        },
        ranking: Ranking { us_news: 1, csrankings: 1 },
        faculty_areas: &[
            "Artificial Intelligence",
            "Machine Learning",
            "Systems",
            "Theory",
            "Graphics",
            "HCI",
            "Robotics",
        ],
        website: "https://www.eecs.mit.edu/academics/graduate-programs/",
    },
    ProgramInfo {
        school: "Stanford",
        program: "Computer Science",
        degree_types: &["MS", "PhD"],
        deadline: "December 1",
        deadline_date: "2025-12-01",
        requirements: Requirements {
            gre_required: false,
            gre_recommended: false,
            toefl_minimum: 100,
            ielts_minimum: 7.0,
            gpa_minimum: None,
            gpa_recommended: 3.6,
            letters_required: 3,
        },
        funding: Funding {
            tuition_per_year: 61731,
            tuition_out_of_state: None,
            funding_types: &["RA", "TA", "Fellowship", "Knight-Hennessy"],
            funding_coverage: FULL_PHD,
            stipend_amount: 50000,
        },
        ranking: Ranking { us_news: 1, csrankings: 2 },
        faculty_areas: &[
            "Artificial Intelligence",
            "Machine Learning",
            "NLP",
            "Computer Vision",
            "Systems",
            "Theory",
            "HCI",
        ],
        website: "https://cs.stanford.edu/admissions/graduate",
    },
    ProgramInfo {
        school: "Carnegie Mellon",
        program: "Computer Science",
        degree_types: &["MS", "PhD"],
        deadline: "December 10",
        deadline_date: "2025-12-10",
        requirements: Requirements {
            gre_required: false,
            gre_recommended: true,
            toefl_minimum: 100,
            ielts_minimum: 7.5,
            gpa_minimum: None,
            gpa_recommended: 3.5,
            letters_required: 3,
        },
        funding: Funding {
            tuition_per_year: 52316,
            tuition_out_of_state: None,
            funding_types: &["RA", "TA", "Fellowship"],
            funding_coverage: FULL_PHD,
            stipend_amount: 43000,
        },
        ranking: Ranking { us_news: 1, csrankings: 3 },
        faculty_areas: &[
            "Machine Learning",
            "Robotics",
            "Computer Vision",
            "NLP",
            "Systems",
            "Security",
            "Human-Computer Interaction",
        ],
        website: "https://www.cs.cmu.edu/academics/graduate-admissions",
    },
    ProgramInfo {
        school: "UC Berkeley",
        program: "Computer Science",
        degree_types: &["MS", "PhD"],
        deadline: "December 15",
        deadline_date: "2025-12-15",
        requirements: Requirements {
            gre_required: false,
            gre_recommended: false,
            toefl_minimum: 90,
            ielts_minimum: 7.0,
            gpa_minimum: Some(3.0),
            gpa_recommended: 3.7,
            letters_required: 3,
        },
        funding: Funding {
            tuition_per_year: 14312,
            tuition_out_of_state: Some(29272),
            funding_types: &["RA", "TA", "GSR", "Fellowship"],
            funding_coverage: FULL_PHD,
            stipend_amount: 40000,
        },
        ranking: Ranking { us_news: 1, csrankings: 4 },
        faculty_areas: &[
            "Artificial Intelligence",
            "Machine Learning",
            "Systems",
            "Security",
            "Theory",
            "Databases",
            "Graphics",
        ],
        website: "https://eecs.berkeley.edu/academics/graduate",
    },
    ProgramInfo {
        school: "Georgia Tech",
        program: "Computer Science",
        degree_types: &["MS", "PhD"],
        deadline: "December 15",
        deadline_date: "2025-12-15",
        requirements: Requirements {
            gre_required: false,
            gre_recommended: true,
            toefl_minimum: 100,
            ielts_minimum: 7.5,
            gpa_minimum: Some(3.0),
            gpa_recommended: 3.5,
            letters_required: 3,
        },
        funding: Funding {
            tuition_per_year: 13452,
            tuition_out_of_state: Some(30698),
            funding_types: &["RA", "TA", "GRA"],
            funding_coverage: FULL_PHD,
            stipend_amount: 35000,
        },
        ranking: Ranking { us_news: 8, csrankings: 5 },
        faculty_areas: &[
            "Machine Learning",
            "Robotics",
            "Computer Vision",
            "Systems",
            "HCI",
            "Computational Science",
        ],
        website: "https://www.cc.gatech.edu/academics/graduate/admissions",
    },
];

const SCHOOL_ALIASES: &[(&str, &str)] = &[
    ("mit", "MIT"),
    ("massachusetts institute of technology", "MIT"),
    ("stanford", "Stanford"),
    ("stanford university", "Stanford"),
    ("cmu", "Carnegie Mellon"),
    ("carnegie mellon", "Carnegie Mellon"),
    ("carnegie mellon university", "Carnegie Mellon"),
    ("berkeley", "UC Berkeley"),
    ("uc berkeley", "UC Berkeley"),
    ("cal", "UC Berkeley"),
    ("georgia tech", "Georgia Tech"),
    ("gatech", "Georgia Tech"),
    ("georgia institute of technology", "Georgia Tech"),
];

const PROGRAM_ALIASES: &[(&str, &str)] = &[
    ("cs", "Computer Science"),
    ("computer science", "Computer Science"),
    ("eecs", "Computer Science"),
    ("ms cs", "Computer Science"),
    ("phd cs", "Computer Science"),
    ("mscs", "Computer Science"),
];

fn canonical<'a>(aliases: &[(&str, &'static str)], name: &'a str) -> &'a str {
    let lower = name.to_lowercase();
    aliases
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map_or(name, |&(_, canonical)| canonical)
}

/// Catalog entry for `school` and `program`, accepting common aliases.
pub fn lookup(school: &str, program: &str) -> Option<&'static ProgramInfo> {
    let school = canonical(SCHOOL_ALIASES, school);
    let program = canonical(PROGRAM_ALIASES, program);
    CATALOG
        .iter()
        .find(|p| p.school.eq_ignore_ascii_case(school) && p.program.eq_ignore_ascii_case(program))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoType {
    Deadline,
    Requirements,
    Funding,
    Ranking,
    Faculty,
    #[default]
    All,
}

#[derive(Deserialize)]
struct ResearchArgs {
    school: Option<String>,
    program: Option<String>,
    #[serde(default)]
    info_type: InfoType,
}

fn describe(info: &ProgramInfo, info_type: InfoType) -> (String, serde_json::Value) {
    let name = format!("{} {}", info.school, info.program);
    let mut data = match info_type {
        InfoType::All => json!(info),
        InfoType::Deadline => json!({
            "deadline": info.deadline,
            "deadline_date": info.deadline_date,
            "degree_types": info.degree_types,
        }),
        InfoType::Requirements => json!(info.requirements),
        InfoType::Funding => json!(info.funding),
        InfoType::Ranking => json!({
            "us_news_rank": info.ranking.us_news,
            "csrankings_rank": info.ranking.csrankings,
        }),
        InfoType::Faculty => json!({
            "research_areas": info.faculty_areas,
            "website": info.website,
        }),
    };
    data["found"] = json!(true);
    data["school"] = json!(info.school);
    data["program"] = json!(info.program);

    let message = match info_type {
        InfoType::Deadline | InfoType::All => format!("{name} applications are due {}", info.deadline),
        InfoType::Requirements => format!(
            "{name} requires a TOEFL of at least {} and {} letters of recommendation",
            info.requirements.toefl_minimum, info.requirements.letters_required
        ),
        InfoType::Funding => format!(
            "{name} tuition is ${} per year; funding: {}",
            info.funding.tuition_per_year,
            info.funding.funding_types.join(", ")
        ),
        InfoType::Ranking => format!(
            "{name} is ranked #{} on CSRankings and #{} by US News",
            info.ranking.csrankings, info.ranking.us_news
        ),
        InfoType::Faculty => format!("{name} research areas: {}", info.faculty_areas.join(", ")),
    };
    (message, data)
}

pub struct ProgramResearchTool;

#[async_trait]
impl Tool for ProgramResearchTool {
    fn name(&self) -> &str {
        crate::PROGRAM_RESEARCH
    }

    fn description(&self) -> &str {
        "Research graduate programs: deadlines, admission requirements (GRE, TOEFL, GPA), tuition and funding, rankings, faculty areas."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "school": { "type": "string", "description": "University name, e.g. 'MIT' or 'Stanford University'" },
                "program": { "type": "string", "description": "Program name, e.g. 'Computer Science' or 'MS CS'" },
                "info_type": {
                    "type": "string",
                    "enum": ["deadline", "requirements", "funding", "ranking", "faculty", "all"],
                    "default": "all"
                }
            },
            "required": ["school", "program"]
        })
    }

    async fn execute(&self, arguments: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let args: ResearchArgs = parse(arguments)?;
        let school = require_text(args.school, "school")?;
        let program = require_text(args.program, "program")?;

        let Some(info) = lookup(&school, &program) else {
            let known: Vec<&str> = CATALOG.iter().map(|p| p.school).collect();
            return Ok(ToolOutput::message(format!(
                "I don't have detailed information about {program} at {school} in my database."
            ))
            .with_data(json!({ "found": false, "known_schools": known })));
        };

        let (message, data) = describe(info, args.info_type);
        Ok(ToolOutput::message(message).with_data(data))
    }
}
