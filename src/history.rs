//! Conversation history.
//!
//! An explicitly owned, append-only list of `(prompt, answer)` turns. A
//! fresh history is created per query batch and passed by reference into
//! each pipeline call; the caller appends the result.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub prompt: String,
    pub answer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, prompt: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(Turn {
            prompt: prompt.into(),
            answer: answer.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Plain-text transcript used when condensing follow-up questions.
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("Human: {}\nAssistant: {}", t.prompt, t.answer))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_keeps_order() {
        let mut h = History::new();
        assert!(h.is_empty());
        h.push("q1", "a1");
        h.push("q2".to_string(), "a2");
        assert_eq!(h.len(), 2);
        assert_eq!(h.turns()[0].prompt, "q1");
        assert_eq!(h.last().unwrap().answer, "a2");
    }

    #[test]
    fn transcript_format() {
        let mut h = History::new();
        h.push("Is the sky blue?", "Yes.");
        h.push("Why?", "Rayleigh scattering.");
        assert_eq!(
            h.transcript(),
            "Human: Is the sky blue?\nAssistant: Yes.\nHuman: Why?\nAssistant: Rayleigh scattering."
        );
    }
}
