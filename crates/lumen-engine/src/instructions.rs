use lumen_contracts::fields::{FieldName, MANDATORY_FIELD};

/// System instruction for the selection stage.
pub fn field_selection_instruction() -> String {
    let mut catalog = String::new();
    for field in FieldName::ALL {
        catalog.push_str(&format!(
            "- {}: {} Select when {}.\n",
            field.as_str(),
            field.description(),
            field.selection_hint()
        ));
    }
    format!(
        "You analyse image-generation requests and decide which structured fields are worth describing.\n\
The request may contain text, reference images, or both.\n\
\n\
Available fields:\n\
{catalog}\
\n\
Rules:\n\
- Return only a JSON array of field names from the list above, with no commentary.\n\
- Always include \"{mandatory}\".\n\
- Include a field when the user mentions it or when describing it would clearly improve the image.\n\
- Include \"typography\" only when the image must contain legible words.\n\
- Prefer a focused selection over listing every field.",
        mandatory = MANDATORY_FIELD.as_str()
    )
}

/// System instruction for the synthesis stage.
pub fn prompt_synthesis_instruction() -> String {
    format!(
        "You are an expert prompt engineer for a state-of-the-art image generation model.\n\
The model excels at:\n\
- Typography fidelity: it renders exact wording legibly, so quote any requested text verbatim and describe font, placement and colour.\n\
- Physically based rendering: describe light sources, their direction, softness and colour temperature, and how materials respond (roughness, reflection, subsurface scattering).\n\
- Camera composition: specify shot size, viewpoint, lens and depth of field the way a cinematographer would.\n\
\n\
Turn the user's request (text and any reference images) into a JSON object that follows the response schema.\n\
- Respond with JSON only. No Markdown, no explanation.\n\
- Populate every required field. When the user leaves a creative parameter open (lighting, composition, palette and so on), invent a plausible, specific choice that serves the request.\n\
- When reference images are attached, carry over their relevant subjects, style and details.\n\
- Finally write \"{mandatory}\": one cohesive paragraph that blends every populated field into a single self-contained instruction for the image model. It must stand on its own, because it is the only text the image model will see.",
        mandatory = MANDATORY_FIELD.as_str()
    )
}
