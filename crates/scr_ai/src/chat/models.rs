use serde::Serialize;

/// A chat model offered to the user.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ModelInfo {
    pub label: &'static str,
    pub id: &'static str,
    pub description: &'static str,
    pub cost: &'static str,
}

pub static CATALOG: [ModelInfo; 4] = [
    ModelInfo {
        label: "GPT-4o Mini",
        id: "gpt-4o-mini",
        description: "Fast and economical",
        cost: "low",
    },
    ModelInfo {
        label: "GPT-3.5 Turbo",
        id: "gpt-3.5-turbo",
        description: "Balanced",
        cost: "very low",
    },
    ModelInfo {
        label: "GPT-4o",
        id: "gpt-4o",
        description: "Most capable",
        cost: "high",
    },
    ModelInfo {
        label: "GPT-4 Turbo",
        id: "gpt-4-turbo",
        description: "Optimized GPT-4",
        cost: "high",
    },
];

/// Strongest vs cheapest, the pair used by comparison mode.
pub const COMPARISON_PAIR: [&str; 2] = ["gpt-4o", "gpt-3.5-turbo"];

/// Look a model up by id or label, ignoring case.
pub fn find(name: &str) -> Option<&'static ModelInfo> {
    let name = name.trim();
    CATALOG
        .iter()
        .find(|m| m.id.eq_ignore_ascii_case(name) || m.label.eq_ignore_ascii_case(name))
}
