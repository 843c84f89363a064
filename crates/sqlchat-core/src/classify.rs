//! Intent classification: does the utterance ask for a chart?

use std::sync::Arc;

use crate::llm::ChatModel;
use crate::prompts::{render, CLASSIFY_TEMPLATE};

/// Parsed classifier output
///
/// Only the exact literals `True` and `False` are recognized. The model is
/// told to emit nothing else, so anything different (casing, padding,
/// explanations) is kept verbatim as `Unrecognized`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Visualize,
    DataLookup,
    Unrecognized(String),
}

impl Classification {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "True" => Classification::Visualize,
            "False" => Classification::DataLookup,
            other => Classification::Unrecognized(other.to_string()),
        }
    }

    /// Routing policy: anything but an exact `True` is a data lookup
    pub fn wants_chart(&self) -> bool {
        matches!(self, Classification::Visualize)
    }
}

pub struct IntentClassifier {
    llm: Arc<dyn ChatModel>,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self { llm }
    }

    /// Classify one utterance. History and schema are not sent.
    ///
    /// A failed LLM call is reported as `Unrecognized` so the turn still
    /// routes to the data-lookup branch.
    pub async fn classify(&self, utterance: &str) -> Classification {
        let prompt = render(CLASSIFY_TEMPLATE, &[("question", utterance)]);

        let classification = match self.llm.complete(&prompt).await {
            Ok(raw) => Classification::parse(&raw),
            Err(e) => {
                tracing::warn!(error = %e, "intent classification call failed");
                Classification::Unrecognized(String::new())
            }
        };

        if let Classification::Unrecognized(ref raw) = classification {
            tracing::warn!(raw = %raw, "classifier output not recognized, routing to data lookup");
        } else {
            tracing::debug!(?classification, "utterance classified");
        }

        classification
    }
}
