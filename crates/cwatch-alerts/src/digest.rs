//! Grouping, mention resolution and digest construction.
//!
//! After every metric has been evaluated, a cycle's outcomes go through:
//! - [`GroupAggregator`]: order-preserving grouping by title
//! - [`MentionResolver`]: alert-gated watcher collection into a [`RecipientSet`]
//! - [`DigestBuilder`]: assembly of the final [`Digest`]

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::evaluator::EvaluationOutcome;
use crate::types::{MetricSpec, MetricStatus};

/// Prefix of the trailing notify line.
pub const NOTIFY_PREFIX: &str = "Notifying:";

/// One rendered metric line inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLine {
    /// The metric label.
    pub label: String,
    /// The metric's status this cycle.
    pub status: MetricStatus,
    /// The rendered text.
    pub text: String,
}

/// The metrics sharing one title, in configuration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    /// The shared title.
    pub title: String,
    /// One line per metric.
    pub lines: Vec<StatusLine>,
}

impl Group {
    /// Returns true if any metric in the group is in violation.
    #[must_use]
    pub fn has_violation(&self) -> bool {
        self.lines.iter().any(|l| l.status.is_violation())
    }
}

/// Result of grouping one cycle's outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    groups: Vec<Group>,
    violating_titles: HashSet<String>,
    violating_labels: HashSet<String>,
}

impl Aggregation {
    /// Returns the groups in first-seen title order.
    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Returns the titles with at least one violation, in group order.
    pub fn titles_with_violation(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .filter(|g| self.violating_titles.contains(&g.title))
            .map(|g| g.title.as_str())
    }

    /// Returns true if `title` had a violation this cycle.
    #[must_use]
    pub fn is_title_violating(&self, title: &str) -> bool {
        self.violating_titles.contains(title)
    }

    /// Returns true if the metric `label` was in violation this cycle.
    #[must_use]
    pub fn is_label_violating(&self, label: &str) -> bool {
        self.violating_labels.contains(label)
    }

    /// Returns true if anything was in violation this cycle.
    #[must_use]
    pub fn has_violation(&self) -> bool {
        !self.violating_labels.is_empty()
    }
}

/// Groups evaluation outcomes by title.
///
/// Titles keep the order in which they first appear; metrics keep their
/// order within a title. Groups only exist for titles that received at
/// least one outcome.
#[derive(Debug, Default)]
pub struct GroupAggregator {
    index: HashMap<String, usize>,
    aggregation: Aggregation,
}

impl GroupAggregator {
    /// Creates an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one outcome to its title's group.
    pub fn push(&mut self, outcome: &EvaluationOutcome) {
        let groups = &mut self.aggregation.groups;
        let position = *self.index.entry(outcome.title.clone()).or_insert_with(|| {
            groups.push(Group {
                title: outcome.title.clone(),
                lines: Vec::new(),
            });
            groups.len() - 1
        });

        groups[position].lines.push(StatusLine {
            label: outcome.label.clone(),
            status: outcome.status,
            text: outcome.line.clone(),
        });

        if outcome.status.is_violation() {
            self.aggregation
                .violating_titles
                .insert(outcome.title.clone());
            self.aggregation
                .violating_labels
                .insert(outcome.label.clone());
        }
    }

    /// Finishes grouping.
    #[must_use]
    pub fn finish(self) -> Aggregation {
        self.aggregation
    }

    /// Groups a whole cycle in one call.
    #[must_use]
    pub fn aggregate<'a>(outcomes: impl IntoIterator<Item = &'a EvaluationOutcome>) -> Aggregation {
        let mut aggregator = Self::new();
        for outcome in outcomes {
            aggregator.push(outcome);
        }
        aggregator.finish()
    }
}

/// A resolved chat recipient.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recipient {
    /// Recipient identity (email or UPN).
    pub identity: String,
    /// Name shown in the tag.
    pub display_name: String,
}

/// Recipients to tag this cycle, unique by identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientSet {
    by_identity: HashMap<String, String>,
}

impl RecipientSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a recipient. A later display name for the same identity wins.
    pub fn insert(&mut self, identity: impl Into<String>, display_name: impl Into<String>) {
        self.by_identity.insert(identity.into(), display_name.into());
    }

    /// Returns the display name recorded for an identity.
    #[must_use]
    pub fn display_name(&self, identity: &str) -> Option<&str> {
        self.by_identity.get(identity).map(String::as_str)
    }

    /// Returns the number of recipients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_identity.len()
    }

    /// Returns true if nobody is to be tagged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_identity.is_empty()
    }

    /// Returns the recipients ordered by display name (case-insensitive),
    /// then by identity.
    #[must_use]
    pub fn sorted(&self) -> Vec<Recipient> {
        let mut recipients: Vec<Recipient> = self
            .by_identity
            .iter()
            .map(|(identity, name)| Recipient {
                identity: identity.clone(),
                display_name: name.clone(),
            })
            .collect();

        recipients.sort_by(|a, b| {
            a.display_name
                .to_lowercase()
                .cmp(&b.display_name.to_lowercase())
                .then_with(|| a.identity.to_lowercase().cmp(&b.identity.to_lowercase()))
                .then_with(|| a.identity.cmp(&b.identity))
        });

        recipients
    }
}

/// Which watchers are tagged when a title alerts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MentionScope {
    /// Every watcher declared by any metric of a violating title.
    #[default]
    Title,
    /// Only watchers declared by the violating metrics themselves.
    Metric,
}

/// Collects the watchers to tag for one cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct MentionResolver {
    scope: MentionScope,
}

impl MentionResolver {
    /// Creates a resolver with the given scope.
    #[must_use]
    pub const fn new(scope: MentionScope) -> Self {
        Self { scope }
    }

    /// Returns the configured scope.
    #[must_use]
    pub const fn scope(&self) -> MentionScope {
        self.scope
    }

    /// Resolves recipients from the specs' watchers.
    ///
    /// Nothing is collected for titles without a violation, whatever their
    /// metrics declare.
    #[must_use]
    pub fn resolve(&self, specs: &[MetricSpec], aggregation: &Aggregation) -> RecipientSet {
        let mut recipients = RecipientSet::new();

        for spec in specs {
            let selected = match self.scope {
                MentionScope::Title => aggregation.is_title_violating(spec.title()),
                MentionScope::Metric => aggregation.is_label_violating(&spec.label),
            };
            if !selected {
                continue;
            }
            for watcher in &spec.watchers {
                recipients.insert(watcher.identity(), watcher.display_name());
            }
        }

        recipients
    }
}

/// An inline tag for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mention {
    /// The tag text, e.g. `<at>Ann</at>`.
    pub text: String,
    /// The recipient behind the tag.
    pub recipient: Recipient,
}

impl Mention {
    /// Creates the tag for a recipient.
    #[must_use]
    pub fn new(recipient: Recipient) -> Self {
        Self {
            text: format!("<at>{}</at>", recipient.display_name),
            recipient,
        }
    }
}

/// The trailing section listing everyone tagged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotifySection {
    /// The rendered line, e.g. `Notifying: <at>Ann</at> <at>Bob</at>`.
    pub text: String,
    /// One tag per recipient, in display order.
    pub mentions: Vec<Mention>,
}

/// One flattened entry of a digest, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestEntry<'a> {
    /// A title heading.
    Heading(&'a str),
    /// A metric status line.
    Line(&'a str),
    /// The notify line.
    Notify(&'a str),
}

/// The structured notification produced once per cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Digest {
    /// One section per title.
    pub sections: Vec<Group>,
    /// Present only when someone is tagged.
    pub notify: Option<NotifySection>,
}

impl Digest {
    /// Returns the mentions carried by the notify section.
    #[must_use]
    pub fn mentions(&self) -> &[Mention] {
        match &self.notify {
            Some(notify) => &notify.mentions,
            None => &[],
        }
    }

    /// Returns every entry in display order, without blank separators.
    #[must_use]
    pub fn entries(&self) -> Vec<DigestEntry<'_>> {
        let mut entries = Vec::new();
        for section in &self.sections {
            entries.push(DigestEntry::Heading(&section.title));
            for line in &section.lines {
                entries.push(DigestEntry::Line(&line.text));
            }
        }
        if let Some(notify) = &self.notify {
            entries.push(DigestEntry::Notify(&notify.text));
        }
        entries
    }

    /// Renders the digest as plain text, one entry per line.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for entry in self.entries() {
            match entry {
                DigestEntry::Heading(text) | DigestEntry::Notify(text) => out.push_str(text),
                DigestEntry::Line(text) => {
                    out.push_str("  - ");
                    out.push_str(text);
                }
            }
            out.push('\n');
        }
        out
    }
}

/// Assembles a [`Digest`] from grouped lines and resolved recipients.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestBuilder;

impl DigestBuilder {
    /// Creates a builder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds the digest. The notify section is omitted when `recipients`
    /// is empty.
    #[must_use]
    pub fn build(&self, aggregation: &Aggregation, recipients: &RecipientSet) -> Digest {
        let sections = aggregation
            .groups()
            .iter()
            .filter(|g| !g.lines.is_empty())
            .cloned()
            .collect();

        Digest {
            sections,
            notify: Self::notify_section(recipients),
        }
    }

    fn notify_section(recipients: &RecipientSet) -> Option<NotifySection> {
        if recipients.is_empty() {
            return None;
        }

        let mentions: Vec<Mention> = recipients.sorted().into_iter().map(Mention::new).collect();
        let tags: Vec<&str> = mentions.iter().map(|m| m.text.as_str()).collect();

        Some(NotifySection {
            text: format!("{NOTIFY_PREFIX} {}", tags.join(" ")),
            mentions,
        })
    }
}
