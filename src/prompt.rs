//! Prompt templates.
//!
//! A [`PromptTemplate`] is a fixed string with `{name}` placeholders and a
//! list of required variables. Expansion is strict: every required variable
//! must be supplied, and there are no defaults.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// The templates used by the query flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateId {
    /// Restates the user's topic as a question against the documents.
    Title,
    /// Asks for an evidence-based answer grounded in knowledge lookup text.
    ScriptWithResearch,
}

#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub input_variables: &'static [&'static str],
    pub template: &'static str,
}

pub const TITLE_TEMPLATE: PromptTemplate = PromptTemplate {
    input_variables: &["topic"],
    template: "Answer with the best possible answer to {topic} using data",
};

pub const SCRIPT_TEMPLATE: PromptTemplate = PromptTemplate {
    input_variables: &["title", "wikipedia_research"],
    template: "ChatGPT, considering your last update in September 2021 and leveraging all the \
               information you have up to that point, provide a detailed and evidence-based answer \
               on {title}. Please be specific, cite any relevant information, and leverage \
               {wikipedia_research}",
};

impl TemplateId {
    pub fn template(self) -> &'static PromptTemplate {
        match self {
            TemplateId::Title => &TITLE_TEMPLATE,
            TemplateId::ScriptWithResearch => &SCRIPT_TEMPLATE,
        }
    }
}

impl PromptTemplate {
    /// Substitute every `{name}` placeholder.
    ///
    /// Fails with [`Error::MissingVariable`] naming the first required
    /// variable absent from `vars`. Values are inserted verbatim; braces in
    /// a value are not re-expanded.
    pub fn format(&self, vars: &HashMap<String, String>) -> Result<String> {
        for name in self.input_variables {
            if !vars.contains_key(*name) {
                return Err(Error::MissingVariable(name.to_string()));
            }
        }

        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) if vars.contains_key(&after[..close]) => {
                    out.push_str(&vars[&after[..close]]);
                    rest = &after[close + 1..];
                }
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}

pub fn compose(id: TemplateId, vars: &HashMap<String, String>) -> Result<String> {
    id.template().format(vars)
}

/// Build a variable map from string pairs.
pub fn vars<const N: usize>(pairs: [(&str, &str); N]) -> HashMap<String, String> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_embeds_topic() {
        let prompt = compose(TemplateId::Title, &vars([("topic", "X")])).unwrap();
        assert_eq!(prompt, "Answer with the best possible answer to X using data");
    }

    #[test]
    fn title_without_topic_fails() {
        let err = compose(TemplateId::Title, &HashMap::new()).unwrap_err();
        match err {
            Error::MissingVariable(name) => assert_eq!(name, "topic"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn script_requires_both_variables() {
        let err = compose(TemplateId::ScriptWithResearch, &vars([("title", "t")])).unwrap_err();
        assert!(matches!(err, Error::MissingVariable(ref n) if n == "wikipedia_research"));

        let prompt = compose(
            TemplateId::ScriptWithResearch,
            &vars([("title", "sky color"), ("wikipedia_research", "Page: Sky")]),
        )
        .unwrap();
        assert!(prompt.starts_with("ChatGPT, considering your last update in September 2021"));
        assert!(prompt.contains("evidence-based answer on sky color. Please be specific"));
        assert!(prompt.ends_with("and leverage Page: Sky"));
    }

    #[test]
    fn values_with_braces_are_not_reexpanded() {
        let prompt = compose(TemplateId::Title, &vars([("topic", "{topic} {x}")])).unwrap();
        assert_eq!(
            prompt,
            "Answer with the best possible answer to {topic} {x} using data"
        );
    }

    #[test]
    fn extra_variables_are_ignored() {
        let prompt = compose(TemplateId::Title, &vars([("topic", "a"), ("other", "b")])).unwrap();
        assert_eq!(prompt, "Answer with the best possible answer to a using data");
    }
}
