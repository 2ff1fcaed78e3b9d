pub mod ai_error;
pub mod credentials;
pub mod gemini;
pub mod invoker;
pub mod quiz;
pub mod study_assistant;

pub use ai_error::{AiError, AiErrorKind};
pub use credentials::{Credential, CredentialPool};
pub use gemini::{GeminiClient, GeminiConfig, GenerationRequest, GenerativeBackend, ResponseFormat};
pub use invoker::{Attempt, Invocation, RotatingInvoker};
pub use quiz::{GroundedQuizAgent, Quiz, QuizAgent, QuizRequest};
pub use study_assistant::StudyAssistant;
