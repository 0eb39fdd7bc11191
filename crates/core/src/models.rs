//! Model capability catalog.
//!
//! The request strategy in [`crate::openai`] depends on whether the selected
//! model accepts image content directly. Models not listed here are treated
//! as text-only and routed through the extraction step.

/// Static description of a selectable model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub supports_vision: bool,
}

/// Models offered in the settings UI.
pub const AVAILABLE_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "gpt-4o",
        name: "GPT-4o",
        description: "Latest multimodal model with image understanding",
        supports_vision: true,
    },
    ModelInfo {
        id: "gpt-4o-mini",
        name: "GPT-4o Mini",
        description: "Lightweight multimodal model",
        supports_vision: true,
    },
    ModelInfo {
        id: "gpt-4-turbo",
        name: "GPT-4 Turbo",
        description: "High-performance model with vision support",
        supports_vision: true,
    },
    ModelInfo {
        id: "o1",
        name: "o1",
        description: "Deep reasoning model",
        supports_vision: false,
    },
    ModelInfo {
        id: "o1-mini",
        name: "o1-mini",
        description: "Lightweight reasoning model",
        supports_vision: false,
    },
    ModelInfo {
        id: "o3-mini",
        name: "o3-mini",
        description: "Latest reasoning model",
        supports_vision: false,
    },
];

/// Vision-capable model used for the text-extraction sub-call.
pub const EXTRACTION_MODEL: &str = "gpt-4o-mini";

/// Looks up a model by id.
pub fn find(id: &str) -> Option<&'static ModelInfo> {
    AVAILABLE_MODELS.iter().find(|m| m.id == id)
}

/// Whether the model accepts image content parts. Unknown ids are text-only.
pub fn supports_vision(id: &str) -> bool {
    find(id).is_some_and(|m| m.supports_vision)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_known_model() {
        let model = find("gpt-4o").unwrap();
        assert_eq!(model.name, "GPT-4o");
        assert!(model.supports_vision);
    }

    #[test]
    fn unknown_model_is_text_only() {
        assert!(find("gpt-99-ultra").is_none());
        assert!(!supports_vision("gpt-99-ultra"));
    }

    #[test]
    fn reasoning_models_are_text_only() {
        for id in ["o1", "o1-mini", "o3-mini"] {
            assert!(!supports_vision(id), "{id} should not be vision-capable");
        }
    }

    #[test]
    fn extraction_model_is_vision_capable() {
        assert!(supports_vision(EXTRACTION_MODEL));
    }
}
