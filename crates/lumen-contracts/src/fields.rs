use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed vocabulary of structured-description fields.
///
/// Declaration order is the canonical order used by the schema builder, the
/// selection instruction and serialised payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    ImageType,
    Style,
    Subjects,
    Composition,
    Environment,
    Lighting,
    Camera,
    Materials,
    ColorPalette,
    Typography,
    NegativeConstraints,
    MasterPrompt,
}

pub const MANDATORY_FIELD: FieldName = FieldName::MasterPrompt;

impl FieldName {
    pub const ALL: [FieldName; 12] = [
        FieldName::ImageType,
        FieldName::Style,
        FieldName::Subjects,
        FieldName::Composition,
        FieldName::Environment,
        FieldName::Lighting,
        FieldName::Camera,
        FieldName::Materials,
        FieldName::ColorPalette,
        FieldName::Typography,
        FieldName::NegativeConstraints,
        FieldName::MasterPrompt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldName::ImageType => "image_type",
            FieldName::Style => "style",
            FieldName::Subjects => "subjects",
            FieldName::Composition => "composition",
            FieldName::Environment => "environment",
            FieldName::Lighting => "lighting",
            FieldName::Camera => "camera",
            FieldName::Materials => "materials",
            FieldName::ColorPalette => "color_palette",
            FieldName::Typography => "typography",
            FieldName::NegativeConstraints => "negative_constraints",
            FieldName::MasterPrompt => "master_prompt",
        }
    }

    pub fn parse(raw: &str) -> Option<FieldName> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        FieldName::ALL
            .into_iter()
            .find(|field| field.as_str() == normalized)
    }

    pub fn is_mandatory(self) -> bool {
        self == MANDATORY_FIELD
    }

    /// Schema-level description sent to the generator.
    pub fn description(self) -> &'static str {
        match self {
            FieldName::ImageType => {
                "The kind of image to produce, e.g. photograph, editorial illustration, 3D render, poster, infographic, logo, product shot or UI mockup."
            }
            FieldName::Style => "Overall aesthetic direction of the image.",
            FieldName::Subjects => "The people, creatures or objects the image depicts.",
            FieldName::Composition => "How the scene is arranged inside the frame.",
            FieldName::Environment => "Where and when the scene takes place.",
            FieldName::Lighting => {
                "Physically plausible lighting setup, including sources, quality and colour temperature."
            }
            FieldName::Camera => "Optical characteristics of the virtual camera.",
            FieldName::Materials => {
                "Physically based descriptions of important surfaces and materials (roughness, reflectance, translucency)."
            }
            FieldName::ColorPalette => "Dominant colours of the image, most prominent first.",
            FieldName::Typography => {
                "Any text that must be rendered legibly inside the image, with its exact wording."
            }
            FieldName::NegativeConstraints => "Elements, artefacts or styles the image must avoid.",
            FieldName::MasterPrompt => {
                "A single self-contained paragraph that blends every other populated field into one cohesive image-generation instruction. This is the only text the image model receives."
            }
        }
    }

    /// When the selector should pick this field.
    pub fn selection_hint(self) -> &'static str {
        match self {
            FieldName::ImageType => "the request implies or names a medium or deliverable",
            FieldName::Style => "an aesthetic, artist, era or mood is requested or would clearly help",
            FieldName::Subjects => "the image depicts identifiable people, animals or objects",
            FieldName::Composition => "framing, viewpoint or layout matters for the request",
            FieldName::Environment => "the scene has a setting, time of day or weather",
            FieldName::Lighting => "the image is photographic, cinematic or otherwise light-driven",
            FieldName::Camera => "the image should read as a photograph or film still",
            FieldName::Materials => "surfaces, products or textures are important",
            FieldName::ColorPalette => "colours are requested or define the look",
            FieldName::Typography => "the image must contain rendered words, labels, titles or logos",
            FieldName::NegativeConstraints => "the user asks to avoid something",
            FieldName::MasterPrompt => "always",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of fields the generator must populate for one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredFields(BTreeSet<FieldName>);

impl RequiredFields {
    /// `{master_prompt}`.
    pub fn mandatory() -> Self {
        Self(BTreeSet::from([MANDATORY_FIELD]))
    }

    /// Builds a set without enforcing the mandatory field.
    pub fn from_fields(fields: impl IntoIterator<Item = FieldName>) -> Self {
        Self(fields.into_iter().collect())
    }

    /// Builds a set from wire names, always including the mandatory field.
    /// Names outside the vocabulary are returned alongside the set.
    pub fn from_names<I, S>(names: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::mandatory();
        let mut unknown = Vec::new();
        for name in names {
            let name = name.as_ref();
            match FieldName::parse(name) {
                Some(field) => {
                    set.insert(field);
                }
                None => unknown.push(name.to_string()),
            }
        }
        (set, unknown)
    }

    pub fn insert(&mut self, field: FieldName) -> bool {
        self.0.insert(field)
    }

    pub fn contains(&self, field: FieldName) -> bool {
        self.0.contains(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = FieldName> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(FieldName::as_str).collect()
    }
}

impl FromIterator<FieldName> for RequiredFields {
    fn from_iter<T: IntoIterator<Item = FieldName>>(iter: T) -> Self {
        Self::from_fields(iter)
    }
}
