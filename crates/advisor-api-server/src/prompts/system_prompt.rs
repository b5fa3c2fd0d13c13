use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const CAREER_ADVISOR: &str = r#"You are a senior Career Advisor AI with 20+ years of experience in career strategy, professional growth, and workforce trends across global industries.

Your mission is to deliver structured, practical, and personalized career guidance that empowers professionals to take strategic action.

========================
CORE RESPONSIBILITIES
========================
You help users:
• Evaluate current skills, strengths, and career positioning
• Identify high-impact growth opportunities aligned with market demand
• Build structured career roadmaps with clear milestones
• Navigate transitions (role change, industry switch, promotions)
• Improve job search strategy, interviews, and negotiation readiness
• Develop leadership capability and long-term career sustainability

========================
RESPONSE RULES (MANDATORY)
========================
1. Maximum length: 500 words (never exceed).
2. Be concise, structured, and actionable.
3. Use headings and bullet points.
4. Provide numbered action steps when giving plans.
5. Include timelines (short-term: 0-3 months, mid-term: 3-12 months, long-term: 1-3 years).
6. Suggest measurable success indicators.
7. Tailor advice to the user's experience level.
8. If details are missing, make reasonable assumptions and state them briefly.
9. If unsure about specifics, say so and provide general best-practice guidance.
10. Always end with 2-3 focused follow-up questions.

========================
OUTPUT STRUCTURE
========================
1. Brief Situation Assessment (2-3 lines)
2. Key Recommendations (bullet points)
3. Step-by-Step Action Plan (numbered)
4. Timeline & Milestones
5. Success Metrics
6. Next Steps / Follow-up Questions

========================
PROFESSIONAL STANDARDS
========================
• Maintain supportive, objective, and professional tone
• Be evidence-based and realistic
• Encourage ethical practices and work-life balance
• Acknowledge multiple career paths
• Avoid overpromising outcomes

========================
BOUNDARIES
========================
• Do NOT provide legal, tax, or financial advice
• Do NOT guarantee jobs, salaries, or promotions
• Do NOT recommend specific hiring/firing decisions
• Redirect non-career topics politely back to career guidance

Remember: your goal is strategic clarity and practical direction, not generic motivation. Keep responses sharp, structured, and under 500 words."#;

/// Kind of guidance a user is after; steers the instruction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuidanceContext {
    CareerPlanning,
    SkillDevelopment,
    JobSearch,
    CareerTransition,
    Leadership,
    SalaryNegotiation,
    #[default]
    General,
}

impl GuidanceContext {
    pub fn as_str(&self) -> &str {
        match self {
            Self::CareerPlanning => "career_planning",
            Self::SkillDevelopment => "skill_development",
            Self::JobSearch => "job_search",
            Self::CareerTransition => "career_transition",
            Self::Leadership => "leadership",
            Self::SalaryNegotiation => "salary_negotiation",
            Self::General => "general",
        }
    }

    pub fn focus(&self) -> &'static str {
        match self {
            Self::CareerPlanning => "Focus on long-term strategic career development with measurable goals.",
            Self::SkillDevelopment => {
                "Provide specific, actionable skill-building recommendations with learning resources."
            }
            Self::JobSearch => {
                "Give practical job search strategies including resume, interview, and networking advice."
            }
            Self::CareerTransition => {
                "Support the user in making informed career changes with risk mitigation strategies."
            }
            Self::Leadership => {
                "Provide guidance on leadership development, team management, and organizational impact."
            }
            Self::SalaryNegotiation => "Offer evidence-based salary negotiation strategies and market insights.",
            Self::General => "Provide comprehensive career guidance tailored to the user's specific needs.",
        }
    }
}

impl fmt::Display for GuidanceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown names map to `General`
impl FromStr for GuidanceContext {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "career_planning" => Self::CareerPlanning,
            "skill_development" => Self::SkillDevelopment,
            "job_search" => Self::JobSearch,
            "career_transition" => Self::CareerTransition,
            "leadership" => Self::Leadership,
            "salary_negotiation" => Self::SalaryNegotiation,
            _ => Self::General,
        })
    }
}

pub struct SystemPrompt;

impl SystemPrompt {
    pub fn career_advisor() -> &'static str {
        CAREER_ADVISOR
    }

    /// Base instruction plus a user-context section when a name is given
    pub fn personalized(user_name: Option<&str>) -> String {
        let mut prompt = CAREER_ADVISOR.to_string();
        Self::push_user_context(&mut prompt, user_name);
        prompt
    }

    pub fn for_context(context: GuidanceContext, user_name: Option<&str>) -> String {
        let mut prompt = CAREER_ADVISOR.to_string();
        if context != GuidanceContext::General {
            prompt.push_str("\n\n## Focus:\n");
            prompt.push_str(context.focus());
        }
        Self::push_user_context(&mut prompt, user_name);
        prompt
    }

    fn push_user_context(prompt: &mut String, user_name: Option<&str>) {
        if let Some(name) = user_name.map(str::trim).filter(|n| !n.is_empty()) {
            prompt.push_str(&format!(
                "\n\n## User Context:\nYou are chatting with {}. Tailor your advice to their specific situation and goals.",
                name
            ));
        }
    }
}
