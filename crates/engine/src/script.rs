use serde::{Deserialize, Serialize};

/// Product record handed over by the scraper. Every field is optional on the
/// wire and defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductData {
    pub title: String,
    pub description: String,
    pub price: String,
    pub images: Vec<String>,
    pub features: Vec<String>,
}

/// Three-part ad script. Each segment is shown over one 3 second clip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdScript {
    pub hook: String,
    pub body: String,
    pub cta: String,
}

impl AdScript {
    pub fn new(hook: impl Into<String>, body: impl Into<String>, cta: impl Into<String>) -> Self {
        AdScript {
            hook: hook.into(),
            body: body.into(),
            cta: cta.into(),
        }
    }

    pub fn segment(&self, segment: Segment) -> &str {
        match segment {
            Segment::Hook => &self.hook,
            Segment::Body => &self.body,
            Segment::Cta => &self.cta,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Segment {
    Hook,
    Body,
    Cta,
}

impl Segment {
    /// Segments in playback order.
    pub const ALL: [Segment; 3] = [Segment::Hook, Segment::Body, Segment::Cta];

    /// Asset slot the segment is drawn over.
    pub fn slot(self) -> usize {
        match self {
            Segment::Hook => 0,
            Segment::Body => 1,
            Segment::Cta => 2,
        }
    }

    pub fn for_slot(slot: usize) -> Option<Segment> {
        Segment::ALL.get(slot).copied()
    }
}
