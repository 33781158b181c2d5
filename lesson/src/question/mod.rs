use serde::{Deserialize, Serialize};

/// The token that marks a free-text answer as "accept any number".
pub const ANY_ANSWER: &str = "any";

/// An assessment item closed by a `{: .choose_best ... }` or
/// `{: .free_text_number ... }` marker line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionBlock {
    ChooseBest(ChooseBest),
    FreeTextNumber(FreeTextNumber),
}

/// Multiple choice with exactly one designated answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChooseBest {
    pub id: String,
    pub title: String,
    /// Kept signed so non-positive values survive parsing and reach the validator.
    pub points: i64,
    pub options: Vec<ChoiceOption>,
    /// 1-based index into `options`. Not range-checked by the parser.
    pub answer: i64,
}

/// A list item bound to a `choose_best` question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub text: String,
    /// Indented lines under the option, list markers removed.
    pub feedback: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeTextNumber {
    pub id: String,
    pub title: String,
    pub points: i64,
    pub answer: FreeTextAnswer,
}

/// Answer key of a free-text question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreeTextAnswer {
    /// Any well-formed numeric response is accepted.
    Any,
    Literal(String),
}

impl FreeTextAnswer {
    /// Interpret the raw `answer` attribute. The sentinel token always wins,
    /// so `Literal("any")` is never produced.
    pub fn from_attribute(value: &str) -> Self {
        if value == ANY_ANSWER {
            FreeTextAnswer::Any
        } else {
            FreeTextAnswer::Literal(value.to_string())
        }
    }

    pub fn as_attribute(&self) -> &str {
        match self {
            FreeTextAnswer::Any => ANY_ANSWER,
            FreeTextAnswer::Literal(value) => value,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, FreeTextAnswer::Any)
    }
}

impl QuestionBlock {
    pub fn id(&self) -> &str {
        match self {
            QuestionBlock::ChooseBest(q) => &q.id,
            QuestionBlock::FreeTextNumber(q) => &q.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            QuestionBlock::ChooseBest(q) => &q.title,
            QuestionBlock::FreeTextNumber(q) => &q.title,
        }
    }

    pub fn points(&self) -> i64 {
        match self {
            QuestionBlock::ChooseBest(q) => q.points,
            QuestionBlock::FreeTextNumber(q) => q.points,
        }
    }

    /// Options in source order; empty for free-text questions.
    pub fn options(&self) -> &[ChoiceOption] {
        match self {
            QuestionBlock::ChooseBest(q) => &q.options,
            QuestionBlock::FreeTextNumber(_) => &[],
        }
    }

    /// The marker class, without the leading dot.
    pub fn class(&self) -> &'static str {
        match self {
            QuestionBlock::ChooseBest(_) => "choose_best",
            QuestionBlock::FreeTextNumber(_) => "free_text_number",
        }
    }
}

impl ChooseBest {
    /// The option at `answer`, if the index is in range.
    pub fn correct_option(&self) -> Option<&ChoiceOption> {
        let index = usize::try_from(self.answer).ok()?.checked_sub(1)?;
        self.options.get(index)
    }

    pub fn answer_in_range(&self) -> bool {
        self.correct_option().is_some()
    }
}
