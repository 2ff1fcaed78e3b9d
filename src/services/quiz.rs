use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::services::ai_error::AiError;
use crate::services::credentials::Credential;
use crate::services::gemini::{GenerationRequest, GenerativeBackend};

pub const QUIZ_QUESTIONS: usize = 10;
pub const QUIZ_OPTIONS: usize = 4;

/// Multiple-choice quiz as four parallel arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<String>,
    pub options: Vec<Vec<String>>,
    pub answers: Vec<String>,
    pub explanations: Vec<String>,
}

impl Quiz {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn validate(&self) -> Result<(), AiError> {
        let n = self.questions.len();
        if n == 0 {
            return Err(AiError::InvalidOutput("quiz has no questions".into()));
        }
        if self.options.len() != n || self.answers.len() != n || self.explanations.len() != n {
            return Err(AiError::InvalidOutput(format!(
                "quiz arrays differ in length: questions={n} options={} answers={} explanations={}",
                self.options.len(),
                self.answers.len(),
                self.explanations.len()
            )));
        }
        if let Some(i) = self.options.iter().position(|o| o.is_empty()) {
            return Err(AiError::InvalidOutput(format!("question {i} has no options")));
        }
        Ok(())
    }

    /// Parses model output, tolerating Markdown code fences and prose around
    /// the JSON object.
    pub fn parse(text: &str) -> Result<Self, AiError> {
        let json = extract_json_object(text)
            .ok_or_else(|| AiError::InvalidOutput("no JSON object in response".into()))?;
        let quiz: Quiz = serde_json::from_str(json)?;
        quiz.validate()?;
        Ok(quiz)
    }
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[derive(Debug, Clone, Copy)]
pub struct QuizRequest<'a> {
    pub subject: &'a str,
    pub syllabus: &'a str,
    pub report: &'a str,
}

/// The richer first tier of quiz generation. Any error sends the caller to
/// the plain rotating tier.
pub trait QuizAgent: Send + Sync {
    fn generate_quiz<'a>(&'a self, request: QuizRequest<'a>) -> BoxFuture<'a, Result<Quiz, AiError>>;
}

/// Quiz agent that lets the model research the subject with search
/// grounding, using the primary credential.
pub struct GroundedQuizAgent<G> {
    backend: Arc<G>,
    credential: Credential,
}

impl<G: GenerativeBackend> GroundedQuizAgent<G> {
    pub fn new(backend: Arc<G>, credential: Credential) -> Self {
        Self {
            backend,
            credential,
        }
    }
}

impl<G: GenerativeBackend + 'static> QuizAgent for GroundedQuizAgent<G> {
    fn generate_quiz<'a>(&'a self, request: QuizRequest<'a>) -> BoxFuture<'a, Result<Quiz, AiError>> {
        Box::pin(async move {
            let generation = GenerationRequest::new(agent_prompt(&request))
                .with_system(AGENT_INSTRUCTIONS)
                .with_search_grounding();
            let text = self.backend.generate(&self.credential, &generation).await?;
            Quiz::parse(&text)
        })
    }
}

const AGENT_INSTRUCTIONS: &str = "Based on the given subject, report, and syllabus, generate a quiz of \
10 MCQs. Analyze weaknesses from the report when designing questions. Return a valid JSON object \
with keys: 'questions', 'options', 'answers', and 'explanations'.";

fn agent_prompt(request: &QuizRequest<'_>) -> String {
    format!(
        "Generate the quiz for {} based on the syllabus and report.\nSyllabus:\n{}\nReport:\n{}",
        request.subject, request.syllabus, request.report
    )
}

pub(crate) fn json_mode_prompt(request: &QuizRequest<'_>) -> String {
    format!(
        "Create {QUIZ_QUESTIONS} Multiple Choice Questions for the subject '{subject}' using the provided \
syllabus and student report.\nFocus on areas of weakness identified in the report.\n\n\
Return a valid JSON object. The root object must have these four keys and only these four keys:\n\
1. \"questions\": A list of {QUIZ_QUESTIONS} question strings.\n\
2. \"options\": A list of {QUIZ_QUESTIONS} lists, where each inner list contains {QUIZ_OPTIONS} option strings.\n\
3. \"answers\": A list of {QUIZ_QUESTIONS} correct answer strings.\n\
4. \"explanations\": A list of {QUIZ_QUESTIONS} strings, one concise explanation per question.\n\n\
Syllabus:\n{syllabus}\nReport:\n{report}",
        subject = request.subject,
        syllabus = request.syllabus,
        report = request.report,
    )
}
