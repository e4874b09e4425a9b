//! Speaker-tagged call transcripts.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Agent,
    Driver,
    Other,
}

impl Speaker {
    fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "agent" | "support" | "executive" => Some(Self::Agent),
            "driver" | "customer" | "caller"  => Some(Self::Driver),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Utterance {
    pub speaker: Speaker,
    pub text: String,
}

impl Utterance {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self { speaker, text: text.into() }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self::new(Speaker::Agent, text)
    }

    pub fn driver(text: impl Into<String>) -> Self {
        Self::new(Speaker::Driver, text)
    }
}

/// Ordered sequence of utterances. Turn index = position in the sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transcript {
    pub utterances: Vec<Utterance>,
}

impl Transcript {
    pub fn new(utterances: Vec<Utterance>) -> Self {
        Self { utterances }
    }

    /// Parse "Agent: ..." / "Driver: ..." lines.
    ///
    /// Lines without a recognised label continue the previous utterance;
    /// leading unlabelled lines become `Other`. Blank lines are skipped.
    pub fn parse(raw: &str) -> Self {
        let mut utterances: Vec<Utterance> = Vec::new();
        for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let labelled = line
                .split_once(':')
                .and_then(|(label, rest)| Speaker::from_label(label).map(|s| (s, rest.trim())));
            match (labelled, utterances.last_mut()) {
                (Some((speaker, text)), _) => utterances.push(Utterance::new(speaker, text)),
                (None, Some(prev)) => {
                    prev.text.push(' ');
                    prev.text.push_str(line);
                }
                (None, None) => utterances.push(Utterance::new(Speaker::Other, line)),
            }
        }
        Self { utterances }
    }

    pub fn is_empty(&self) -> bool {
        self.utterances.iter().all(|u| u.text.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.utterances.len()
    }

    /// (turn index, lowercase text) for every agent utterance.
    pub fn agent_turns(&self) -> impl Iterator<Item = (usize, String)> + '_ {
        self.utterances
            .iter()
            .enumerate()
            .filter(|(_, u)| u.speaker == Speaker::Agent)
            .map(|(i, u)| (i, u.text.to_lowercase()))
    }

    /// All agent speech, lowercased and joined.
    pub fn agent_text(&self) -> String {
        self.agent_turns().map(|(_, t)| t).collect::<Vec<_>>().join(" ")
    }

    /// Everything said on the call, lowercased and joined.
    pub fn full_text(&self) -> String {
        self.utterances
            .iter()
            .map(|u| u.text.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// First agent turn whose lowercase text contains any of `needles`.
    pub fn first_agent_turn_with(&self, needles: &[&str]) -> Option<usize> {
        self.agent_turns()
            .find(|(_, text)| contains_any(text, needles))
            .map(|(i, _)| i)
    }

    /// Agent speech up to the first mention of any of `needles`: every
    /// earlier agent turn plus the lead-in of the matching turn. With no
    /// match this is all agent speech.
    pub fn agent_text_before(&self, needles: &[&str]) -> String {
        let mut parts = Vec::new();
        for (_, text) in self.agent_turns() {
            match needles.iter().filter_map(|n| text.find(n)).min() {
                Some(cut) => {
                    parts.push(text[..cut].to_string());
                    break;
                }
                None => parts.push(text),
            }
        }
        parts.join(" ")
    }

    pub fn last_agent_text(&self) -> Option<String> {
        self.agent_turns().last().map(|(_, t)| t)
    }
}

pub fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

pub fn count_matches(haystack: &str, needles: &[&str]) -> usize {
    needles.iter().filter(|n| haystack.contains(*n)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_labels_and_continuations() {
        let t = Transcript::parse(
            "
            Agent: Battery Smart support.
            Driver: My battery is low.
            I am near Tilak Nagar.
            Agent: Go to Station B.
            ",
        );
        assert_eq!(t.len(), 3);
        assert_eq!(t.utterances[1].speaker, Speaker::Driver);
        assert!(t.utterances[1].text.ends_with("near Tilak Nagar."));
        assert_eq!(t.first_agent_turn_with(&["station b"]), Some(2));
    }

    #[test]
    fn text_before_stops_at_first_needle() {
        let t = Transcript::parse(
            "
            Agent: Let me see if it clears.
            Driver: It did not.
            Agent: Okay, escalating now, please wait.
            Agent: Still there?
            ",
        );
        assert_eq!(t.agent_text_before(&["escalat"]), "let me see if it clears. okay, ");
        assert_eq!(t.agent_text_before(&["refund"]), t.agent_text());
    }

    #[test]
    fn blank_input_is_empty() {
        assert!(Transcript::parse("   \n\n").is_empty());
        assert!(Transcript::default().is_empty());
    }
}
