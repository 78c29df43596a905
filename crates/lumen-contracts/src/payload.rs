use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::fields::{FieldName, RequiredFields};
use crate::response::{parse_json_value, ResponseParseError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub art_direction: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub references: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub mood_keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectsSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub secondary: Vec<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_integer"
    )]
    pub count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_angle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_point: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_space: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout_notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setting: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub background_elements: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_light: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_integer"
    )]
    pub color_temperature_kelvin: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volumetric: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSpec {
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_integer"
    )]
    pub lens_focal_length_mm: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aperture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth_of_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub film_or_sensor: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypographySpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emphasis: Option<String>,
}

/// The synthesis stage's output, one optional member per vocabulary field.
///
/// Unknown keys are dropped on parse. `master_prompt` is guaranteed
/// non-empty for any value produced by [`parse_structured_payload`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subjects: Option<SubjectsSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composition: Option<CompositionSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lighting: Option<LightingSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub materials: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_palette: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typography: Option<TypographySpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_constraints: Option<Vec<String>>,
    #[serde(deserialize_with = "null_as_default")]
    pub master_prompt: String,
}

impl StructuredPayload {
    pub fn has_field(&self, field: FieldName) -> bool {
        match field {
            FieldName::ImageType => self.image_type.is_some(),
            FieldName::Style => self.style.is_some(),
            FieldName::Subjects => self.subjects.is_some(),
            FieldName::Composition => self.composition.is_some(),
            FieldName::Environment => self.environment.is_some(),
            FieldName::Lighting => self.lighting.is_some(),
            FieldName::Camera => self.camera.is_some(),
            FieldName::Materials => self.materials.is_some(),
            FieldName::ColorPalette => self.color_palette.is_some(),
            FieldName::Typography => self.typography.is_some(),
            FieldName::NegativeConstraints => self.negative_constraints.is_some(),
            FieldName::MasterPrompt => !self.master_prompt.trim().is_empty(),
        }
    }

    pub fn present_fields(&self) -> Vec<FieldName> {
        FieldName::ALL
            .into_iter()
            .filter(|field| self.has_field(*field))
            .collect()
    }

    /// Drops every optional field outside `required`. `master_prompt` stays.
    pub fn retain_fields(&mut self, required: &RequiredFields) -> Vec<FieldName> {
        let mut dropped = Vec::new();
        for field in FieldName::ALL {
            if field.is_mandatory() || required.contains(field) || !self.has_field(field) {
                continue;
            }
            self.clear(field);
            dropped.push(field);
        }
        dropped
    }

    fn clear(&mut self, field: FieldName) {
        match field {
            FieldName::ImageType => self.image_type = None,
            FieldName::Style => self.style = None,
            FieldName::Subjects => self.subjects = None,
            FieldName::Composition => self.composition = None,
            FieldName::Environment => self.environment = None,
            FieldName::Lighting => self.lighting = None,
            FieldName::Camera => self.camera = None,
            FieldName::Materials => self.materials = None,
            FieldName::ColorPalette => self.color_palette = None,
            FieldName::Typography => self.typography = None,
            FieldName::NegativeConstraints => self.negative_constraints = None,
            FieldName::MasterPrompt => {}
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Parses the synthesis stage's reply, tolerating a Markdown code fence.
pub fn parse_structured_payload(text: &str) -> Result<StructuredPayload, ResponseParseError> {
    const CONTEXT: &str = "prompt synthesis";
    let value = parse_json_value(text, CONTEXT)?;
    if !value.is_object() {
        return Err(ResponseParseError::UnexpectedShape {
            context: CONTEXT,
            expected: "a JSON object",
        });
    }
    let mut payload: StructuredPayload = serde_json::from_value(value)
        .map_err(|source| ResponseParseError::SchemaMismatch {
            context: CONTEXT,
            source,
        })?;
    payload.master_prompt = payload.master_prompt.trim().to_string();
    if payload.master_prompt.is_empty() {
        return Err(ResponseParseError::MissingMasterPrompt);
    }
    Ok(payload)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float.round() as i64)),
        Some(Value::String(text)) => {
            let digits: String = text
                .trim()
                .chars()
                .take_while(|ch| ch.is_ascii_digit() || *ch == '-')
                .collect();
            digits.parse().ok()
        }
        _ => None,
    })
}
