use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::fields::{FieldName, RequiredFields};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaType {
    String,
    Integer,
    Boolean,
    Array,
    Object,
}

/// A node of the structured-output schema, in the dialect the remote
/// reasoning service accepts (camelCase keys, upper-case type names).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    #[serde(rename = "type")]
    pub kind: SchemaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, SchemaNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub property_ordering: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl SchemaNode {
    fn leaf(kind: SchemaType, description: &str) -> Self {
        Self {
            kind,
            description: Some(description.to_string()),
            format: None,
            enum_values: Vec::new(),
            items: None,
            properties: IndexMap::new(),
            property_ordering: Vec::new(),
            required: Vec::new(),
        }
    }

    pub fn string(description: &str) -> Self {
        Self::leaf(SchemaType::String, description)
    }

    pub fn integer(description: &str) -> Self {
        Self::leaf(SchemaType::Integer, description)
    }

    pub fn boolean(description: &str) -> Self {
        Self::leaf(SchemaType::Boolean, description)
    }

    pub fn string_list(description: &str) -> Self {
        let mut node = Self::leaf(SchemaType::Array, description);
        node.items = Some(Box::new(Self::leaf(SchemaType::String, "One entry.")));
        node
    }

    pub fn object(description: &str, properties: Vec<(&str, SchemaNode)>) -> Self {
        let mut node = Self::leaf(SchemaType::Object, description);
        for (name, property) in properties {
            node.property_ordering.push(name.to_string());
            node.properties.insert(name.to_string(), property);
        }
        node
    }

    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.properties.get(name)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Builds the response schema for one turn.
///
/// The full vocabulary is always declared; `required` is the projection of
/// `required_fields` in canonical order and is the only part that varies.
pub fn build_schema(required_fields: &RequiredFields) -> SchemaNode {
    let mut root = SchemaNode::object(
        "Structured description of the image to generate.",
        FieldName::ALL
            .into_iter()
            .map(|field| (field.as_str(), field_shape(field)))
            .collect(),
    );
    root.required = required_fields
        .iter()
        .map(|field| field.as_str().to_string())
        .collect();
    root
}

/// Schema for the selection stage: an array of vocabulary names.
pub fn field_selection_schema() -> SchemaNode {
    let mut item = SchemaNode::string("Name of a relevant field.");
    item.format = Some("enum".to_string());
    item.enum_values = FieldName::ALL
        .into_iter()
        .map(|field| field.as_str().to_string())
        .collect();
    let mut node = SchemaNode::leaf(
        SchemaType::Array,
        "Names of the fields relevant to the request.",
    );
    node.items = Some(Box::new(item));
    node
}

fn field_shape(field: FieldName) -> SchemaNode {
    let description = field.description();
    match field {
        FieldName::ImageType => SchemaNode::string(description),
        FieldName::Style => SchemaNode::object(
            description,
            vec![
                (
                    "medium",
                    SchemaNode::string("Medium or technique, e.g. oil painting, 35mm photograph, vector art."),
                ),
                (
                    "art_direction",
                    SchemaNode::string("One sentence describing the intended look and feel."),
                ),
                (
                    "references",
                    SchemaNode::string_list("Artists, movements, eras or franchises to draw from."),
                ),
                (
                    "mood_keywords",
                    SchemaNode::string_list("Short adjectives describing the emotional tone."),
                ),
            ],
        ),
        FieldName::Subjects => SchemaNode::object(
            description,
            vec![
                ("primary", SchemaNode::string("The main subject, described concretely.")),
                (
                    "secondary",
                    SchemaNode::string_list("Supporting subjects or props."),
                ),
                (
                    "count",
                    SchemaNode::integer("How many instances of the primary subject appear."),
                ),
                ("actions", SchemaNode::string("What the subjects are doing, including pose and expression.")),
                (
                    "details",
                    SchemaNode::string("Clothing, markings, age, species or other identifying details."),
                ),
            ],
        ),
        FieldName::Composition => SchemaNode::object(
            description,
            vec![
                ("framing", SchemaNode::string("Shot size, e.g. extreme close-up, medium shot, wide establishing shot.")),
                ("camera_angle", SchemaNode::string("Viewpoint, e.g. eye level, low angle, top-down.")),
                ("focal_point", SchemaNode::string("Where the viewer's eye should land first.")),
                (
                    "negative_space",
                    SchemaNode::boolean("Whether deliberate empty space is left, e.g. for copy."),
                ),
                ("layout_notes", SchemaNode::string("Any further arrangement guidance such as rule of thirds or symmetry.")),
            ],
        ),
        FieldName::Environment => SchemaNode::object(
            description,
            vec![
                ("setting", SchemaNode::string("The location or backdrop.")),
                ("time_of_day", SchemaNode::string("Time of day or era.")),
                ("weather", SchemaNode::string("Weather or atmospheric conditions.")),
                (
                    "background_elements",
                    SchemaNode::string_list("Notable elements visible behind the subjects."),
                ),
            ],
        ),
        FieldName::Lighting => SchemaNode::object(
            description,
            vec![
                ("setup", SchemaNode::string("Overall lighting scheme, e.g. three-point studio, golden hour, neon practicals.")),
                ("key_light", SchemaNode::string("Direction, size and softness of the key light.")),
                (
                    "color_temperature_kelvin",
                    SchemaNode::integer("Dominant colour temperature in Kelvin."),
                ),
                ("mood", SchemaNode::string("Emotional effect of the light.")),
                (
                    "volumetric",
                    SchemaNode::boolean("Whether light shafts, haze or fog are visible."),
                ),
            ],
        ),
        FieldName::Camera => SchemaNode::object(
            description,
            vec![
                (
                    "lens_focal_length_mm",
                    SchemaNode::integer("Equivalent focal length in millimetres."),
                ),
                ("aperture", SchemaNode::string("Aperture, e.g. f/1.8.")),
                ("depth_of_field", SchemaNode::string("Shallow, deep, tilt-shift and so on.")),
                ("film_or_sensor", SchemaNode::string("Film stock or sensor character, e.g. Kodak Portra 400, medium format digital.")),
            ],
        ),
        FieldName::Materials => SchemaNode::string_list(description),
        FieldName::ColorPalette => SchemaNode::string_list(description),
        FieldName::Typography => SchemaNode::object(
            description,
            vec![
                (
                    "text_content",
                    SchemaNode::string("The exact text to render, verbatim, including capitalisation."),
                ),
                ("font_style", SchemaNode::string("Typeface character, e.g. bold condensed sans-serif, hand-lettered script.")),
                ("placement", SchemaNode::string("Where the text sits in the frame.")),
                ("color", SchemaNode::string("Text colour and any outline or shadow.")),
                ("emphasis", SchemaNode::string("Hierarchy or emphasis between text elements.")),
            ],
        ),
        FieldName::NegativeConstraints => SchemaNode::string_list(description),
        FieldName::MasterPrompt => SchemaNode::string(description),
    }
}
