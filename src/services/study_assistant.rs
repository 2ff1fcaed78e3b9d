use std::sync::Arc;

use crate::services::gemini::{GenerationRequest, GenerativeBackend};
use crate::services::invoker::RotatingInvoker;
use crate::services::quiz::{json_mode_prompt, Quiz, QuizAgent, QuizRequest};

const QUIZ_CONTEXT_CHARS: usize = 3000;

/// The AI operations the application offers, all routed through one
/// rotating invoker. Every operation returns its fallback instead of an
/// error.
pub struct StudyAssistant<G> {
    backend: Arc<G>,
    invoker: RotatingInvoker,
    quiz_agent: Option<Arc<dyn QuizAgent>>,
}

impl<G: GenerativeBackend> StudyAssistant<G> {
    pub fn new(backend: Arc<G>, invoker: RotatingInvoker) -> Self {
        Self {
            backend,
            invoker,
            quiz_agent: None,
        }
    }

    pub fn with_quiz_agent(mut self, agent: Arc<dyn QuizAgent>) -> Self {
        self.quiz_agent = Some(agent);
        self
    }

    pub fn invoker(&self) -> &RotatingInvoker {
        &self.invoker
    }

    pub async fn analyze_report(&self, report: &str) -> Option<String> {
        let request = GenerationRequest::new(format!(
            "Analyze the given student report:\n{report}\n\n\
             Note: Do not include prefatory phrases; answer directly."
        ))
        .with_system(
            "You are a very professional academic report analyzer. Analyze the student's report \
             and provide detailed strengths, weaknesses, and achievements.",
        );
        self.generate_text("analyze_report", &request).await
    }

    pub async fn generate_timetable(
        &self,
        report: &str,
        syllabus: &str,
        quiz_context: Option<&serde_json::Value>,
    ) -> Option<String> {
        let mut prompt = format!(
            "Generate a weekly timetable to cover the provided topics for each subject based on \
             the student's performance.\nReport:\n{report}\nSyllabus:\n{syllabus}"
        );
        push_quiz_context(&mut prompt, quiz_context);

        let request = GenerationRequest::new(prompt).with_system(
            "You are a professional education developer. Provide a tabular timetable for 7 days \
             (8-10 hours per day in 1-hour periods) based on the provided report and syllabus.",
        );
        self.generate_text("generate_timetable", &request).await
    }

    pub async fn generate_roadmap(
        &self,
        report: &str,
        syllabus: &str,
        quiz_context: Option<&serde_json::Value>,
    ) -> Option<String> {
        let mut prompt = format!(
            "Generate a step-by-step roadmap from the report and syllabus.\n\
             Report:\n{report}\nSyllabus:\n{syllabus}"
        );
        push_quiz_context(&mut prompt, quiz_context);

        let request = GenerationRequest::new(prompt).with_system(
            "You are a proficient educational roadmap generator. Provide a step-by-step roadmap \
             for the student to excel based on the given report and syllabus.",
        );
        self.generate_text("generate_roadmap", &request).await
    }

    /// First line of the model's answer, `None` when it is blank or the call
    /// fell back.
    pub async fn extract_topic(&self, question: &str) -> Option<String> {
        let request = GenerationRequest::new(format!(
            "Question: {question}\nReturn only the topic phrase."
        ))
        .with_system(
            "You are an educational assistant. Extract the concise topic that the question relates to.",
        );
        let text = self.generate_text("extract_topic", &request).await?;
        first_line(&text)
    }

    pub async fn chat_reply(&self, message: &str, syllabus: &str, analysis: &str) -> Option<String> {
        let request = GenerationRequest::new(format!(
            "Syllabus:\n{syllabus}\n\nPrevious analysis:\n{analysis}\n\nStudent: {message}"
        ))
        .with_system(
            "You are a helpful study assistant. Answer the student's question using the syllabus \
             and the analysis of their performance as context.",
        );
        self.generate_text("chat_reply", &request).await
    }

    /// Tries the quiz agent when one is configured, then the rotating
    /// JSON-mode call, then an empty quiz.
    pub async fn generate_quiz(&self, subject: &str, syllabus: &str, report: &str) -> Quiz {
        let request = QuizRequest {
            subject,
            syllabus,
            report,
        };

        if let Some(agent) = &self.quiz_agent {
            match agent.generate_quiz(request).await {
                Ok(quiz) => return quiz,
                Err(err) => {
                    tracing::warn!(error = %err, "quiz agent failed, falling back to JSON mode");
                }
            }
        }

        let generation = GenerationRequest::new(json_mode_prompt(&request)).json();
        let backend = self.backend.as_ref();
        let generation = &generation;
        self.invoker
            .invoke("generate_quiz", Quiz::default(), move |credential| async move {
                let text = backend.generate(&credential, generation).await?;
                Quiz::parse(&text)
            })
            .await
    }

    async fn generate_text(&self, operation: &str, request: &GenerationRequest) -> Option<String> {
        let backend = self.backend.as_ref();
        self.invoker
            .invoke(operation, None, move |credential| async move {
                backend.generate(&credential, request).await.map(Some)
            })
            .await
    }
}

fn push_quiz_context(prompt: &mut String, quiz_context: Option<&serde_json::Value>) {
    let Some(context) = quiz_context else {
        return;
    };
    if context.is_null() {
        return;
    }
    let serialized = context.to_string();
    let truncated: String = serialized.chars().take(QUIZ_CONTEXT_CHARS).collect();
    prompt.push_str("\nQuiz Results Context: ");
    prompt.push_str(&truncated);
}

fn first_line(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.lines().next().map(|line| line.trim().to_string())
}
