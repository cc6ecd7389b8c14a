//! Chat card wire format.
//!
//! A [`Digest`] is delivered as a message envelope carrying a single
//! Adaptive Card attachment. Mentions travel twice: inline as `<at>` tags
//! in the last text block, and as entity records under the card's `msteams`
//! extension so the chat host can resolve them into real tags.

use serde::{Deserialize, Serialize};

use crate::digest::{Digest, Mention};

/// Envelope `type` value.
pub const MESSAGE_TYPE: &str = "message";

/// Attachment content type for Adaptive Cards.
pub const CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";

/// Adaptive Card schema URL.
pub const CARD_SCHEMA: &str = "http://adaptivecards.io/schemas/adaptive-card.json";

/// Adaptive Card schema version.
pub const CARD_VERSION: &str = "1.4";

/// The top-level message posted to the webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Always [`MESSAGE_TYPE`].
    #[serde(rename = "type")]
    pub kind: String,
    /// Exactly one card attachment.
    pub attachments: Vec<Attachment>,
}

impl MessageEnvelope {
    /// Wraps a digest into an envelope.
    #[must_use]
    pub fn from_digest(digest: &Digest) -> Self {
        Self {
            kind: MESSAGE_TYPE.to_string(),
            attachments: vec![Attachment {
                content_type: CARD_CONTENT_TYPE.to_string(),
                content: AdaptiveCard::from_digest(digest),
            }],
        }
    }

    /// Returns the card carried by the envelope.
    #[must_use]
    pub fn card(&self) -> Option<&AdaptiveCard> {
        self.attachments.first().map(|a| &a.content)
    }
}

/// A card attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Always [`CARD_CONTENT_TYPE`].
    #[serde(rename = "contentType")]
    pub content_type: String,
    /// The card.
    pub content: AdaptiveCard,
}

/// The card body and its platform extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveCard {
    /// Schema URL.
    #[serde(rename = "$schema")]
    pub schema: String,
    /// Always `AdaptiveCard`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Schema version.
    pub version: String,
    /// Text blocks in display order.
    pub body: Vec<TextBlock>,
    /// Teams extension carrying mention entities.
    pub msteams: TeamsExtension,
}

impl AdaptiveCard {
    /// Renders a digest as a card.
    #[must_use]
    pub fn from_digest(digest: &Digest) -> Self {
        let mut body = Vec::new();

        for section in &digest.sections {
            body.push(TextBlock::heading(&section.title));
            for line in &section.lines {
                body.push(TextBlock::line(format!("  - {}", line.text)));
            }
        }

        if let Some(notify) = &digest.notify {
            body.push(TextBlock::plain(&notify.text, Spacing::Medium));
        }

        Self {
            schema: CARD_SCHEMA.to_string(),
            kind: "AdaptiveCard".to_string(),
            version: CARD_VERSION.to_string(),
            body,
            msteams: TeamsExtension {
                entities: digest.mentions().iter().map(MentionEntity::from_mention).collect(),
            },
        }
    }
}

/// Vertical spacing above a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Spacing {
    /// Tight spacing, used for metric lines.
    Small,
    /// Default spacing, used for headings and the notify line.
    Medium,
}

/// One text block of the card body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    /// Always `TextBlock`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The text.
    pub text: String,
    /// `Bolder` for headings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    /// `Medium` for headings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Always true.
    pub wrap: bool,
    /// Spacing above the block.
    pub spacing: Spacing,
}

impl TextBlock {
    /// A bold section heading.
    #[must_use]
    pub fn heading(text: impl Into<String>) -> Self {
        Self {
            weight: Some("Bolder".to_string()),
            size: Some("Medium".to_string()),
            ..Self::plain(text, Spacing::Medium)
        }
    }

    /// A metric line.
    #[must_use]
    pub fn line(text: impl Into<String>) -> Self {
        Self::plain(text, Spacing::Small)
    }

    /// A plain block.
    #[must_use]
    pub fn plain(text: impl Into<String>, spacing: Spacing) -> Self {
        Self {
            kind: "TextBlock".to_string(),
            text: text.into(),
            weight: None,
            size: None,
            wrap: true,
            spacing,
        }
    }

    /// Returns true for heading blocks.
    #[must_use]
    pub fn is_heading(&self) -> bool {
        self.weight.is_some()
    }
}

/// The `msteams` card extension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamsExtension {
    /// Mention entities; empty when nobody is tagged.
    pub entities: Vec<MentionEntity>,
}

/// A mention entity resolved by the chat host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionEntity {
    /// Always `mention`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The inline tag text this entity resolves.
    pub text: String,
    /// Who is mentioned.
    pub mentioned: Mentioned,
}

impl MentionEntity {
    /// Creates the entity for a digest mention.
    #[must_use]
    pub fn from_mention(mention: &Mention) -> Self {
        Self {
            kind: "mention".to_string(),
            text: mention.text.clone(),
            mentioned: Mentioned {
                id: mention.recipient.identity.clone(),
                name: mention.recipient.display_name.clone(),
            },
        }
    }
}

/// The mentioned recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mentioned {
    /// Recipient identity.
    pub id: String,
    /// Display name.
    pub name: String,
}
