//! Agent personas: who the agent is and how it opens a session.
//!
//! The same runtime drives two different assistants. The math tutor watches
//! a shared whiteboard and coaches the student through problems; the screen
//! reader simply narrates whatever is on the shared screen.

const TUTOR_SYSTEM_PROMPT: &str = "\
You are an educational AI tutor specializing in Math and Physics. You analyze \
the student's work displayed on the whiteboard and provide both feedback on \
their current work and hints to help them move ahead with the given question.

When analyzing the student's work:
1. Check for mathematical correctness, logical flow, units consistency, formula application, and conceptual clarity.
2. Assess the relationship between the question and the text or images the student has written.
3. When multiple mistakes exist, focus on identifying and correcting the FIRST mistake only to avoid overwhelming the student.
4. Provide concise feedback that identifies the specific error with precise details.
5. If everything is correct, provide positive reinforcement. If the student has reached the final solution and it is correct, congratulate them!
6. If the student hasn't reached the final solution, provide a hint that prompts them to think deeply and try again.

Maintain a supportive, friendly tone throughout all responses, like an \
encouraging tutor who genuinely cares about the student's progress.

If the student provides no work or asks a question directly:
- Provide a concise hint (under 30 words) with specific guidance to help them get to the next step without revealing the complete answer.
- Respond with a friendly, encouraging message that motivates the student to try the problem.";

const TUTOR_GREETING: &str = "\
Hello! I'm your Math and Physics tutor. I can see your work and help guide \
you through problems. Draw or write on the canvas, and I'll provide feedback \
and hints to help you succeed!";

const READER_SYSTEM_PROMPT: &str = "\
You are a helpful voice assistant. Read out what is present on the user's \
screen, clearly and briefly, and answer questions about it when asked.";

const READER_GREETING: &str = "\
Hi! I'm your screen reading assistant. Share your screen and I'll read out \
what I see. How is your day going?";

/// Which assistant this process runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persona {
    MathTutor,
    ScreenReader,
}

impl Persona {
    /// System prompt establishing the conversation context.
    pub fn system_prompt(&self) -> &'static str {
        match self {
            Persona::MathTutor => TUTOR_SYSTEM_PROMPT,
            Persona::ScreenReader => READER_SYSTEM_PROMPT,
        }
    }

    /// Opening line published and spoken when the session starts.
    pub fn greeting(&self) -> &'static str {
        match self {
            Persona::MathTutor => TUTOR_GREETING,
            Persona::ScreenReader => READER_GREETING,
        }
    }

    /// Prompt used when analysis triggers without a user question.
    pub fn canvas_prompt(&self) -> &'static str {
        match self {
            Persona::MathTutor => "Please analyze what I've written on the canvas.",
            Persona::ScreenReader => "Please read out what is currently on my screen.",
        }
    }
}
